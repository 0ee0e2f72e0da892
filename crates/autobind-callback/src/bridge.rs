//! Callback registration
//!
//! Handle lifecycle: registered by [`CallbackBridge::register`], torn down by
//! [`CallbackBridge::unregister`]. There is no way back to registered; a new
//! registration always yields a new handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use autobind_core::{CallContextId, FunctionInvoker};

use crate::arena::{Handle, HandleArena};
use crate::closure::{ClosureFactory, Teardown};
use crate::error::{CallbackError, Result};
use crate::signature::CallbackSignature;
use crate::trampolines::{self, EntryPoint};

static CALLBACKS: HandleArena<CallbackInfo> = HandleArena::new();
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide callback arena shared by every bridge
pub(crate) fn callbacks() -> &'static HandleArena<CallbackInfo> {
    &CALLBACKS
}

/// What a handle resolves to
pub struct CallbackInfo {
    /// Registration id, unique within the process
    pub id: u64,
    /// Fully qualified interpreted function name
    pub function: String,
    /// Call context that registered the callback
    pub context: CallContextId,
    pub signature: CallbackSignature,
    pub(crate) invoker: Arc<dyn FunctionInvoker>,
    cleanup: Mutex<Option<Teardown>>,
}

impl CallbackInfo {
    fn take_cleanup(&self) -> Option<Teardown> {
        self.cleanup.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Whether the entry point was synthesized at runtime
    pub fn is_dynamic(&self) -> bool {
        self.cleanup.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl fmt::Debug for CallbackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackInfo")
            .field("id", &self.id)
            .field("function", &self.function)
            .field("context", &self.context)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: u64,
    /// Native function pointer to hand to the library
    pub trampoline: EntryPoint,
    /// Opaque context to pass alongside the trampoline
    pub handle: Handle,
    /// Whether `trampoline` came from the closure factory
    pub dynamic: bool,
}

/// Registers interpreted functions as native callbacks
pub struct CallbackBridge {
    invoker: Arc<dyn FunctionInvoker>,
    closures: Option<Arc<dyn ClosureFactory>>,
}

impl CallbackBridge {
    pub fn new(invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self { invoker, closures: None }
    }

    /// Fall back to `factory` for signatures without a fixed trampoline
    pub fn with_closure_factory(mut self, factory: Arc<dyn ClosureFactory>) -> Self {
        self.closures = Some(factory);
        self
    }

    /// Register `function` for native calls of shape `signature`
    ///
    /// Names without `::` are qualified with `namespace`.
    pub fn register(
        &self,
        namespace: &str,
        function: &str,
        signature: &str,
        context: CallContextId,
    ) -> Result<Registration> {
        let qualified = qualify(namespace, function);
        if !self.invoker.function_exists(&qualified) {
            return Err(CallbackError::FunctionNotFound(qualified));
        }

        let parsed = CallbackSignature::parse(signature)?;
        let canonical = parsed.canonical();
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        let info = CallbackInfo {
            id,
            function: qualified.clone(),
            context,
            signature: parsed.clone(),
            invoker: Arc::clone(&self.invoker),
            cleanup: Mutex::new(None),
        };
        let handle = CALLBACKS.insert(info).ok_or(CallbackError::ArenaExhausted)?;

        if let Some(trampoline) = trampolines::lookup(&canonical) {
            debug!(function = %qualified, signature = %canonical, id = id, handle = %handle, "callback registered");
            return Ok(Registration {
                id,
                trampoline,
                handle,
                dynamic: false,
            });
        }

        let synthesized = match &self.closures {
            Some(factory) => factory.synthesize(&parsed, handle),
            None => Err(CallbackError::ClosureFailed {
                signature: canonical.clone(),
                reason: "no closure factory configured".to_string(),
            }),
        };

        match synthesized {
            Ok(entry) => {
                if let Some(info) = CALLBACKS.get(handle) {
                    *info.cleanup.lock().unwrap_or_else(PoisonError::into_inner) = Some(entry.teardown);
                }
                info!(function = %qualified, signature = %canonical, id = id, "callback registered with dynamic closure");
                Ok(Registration {
                    id,
                    trampoline: entry.entry,
                    handle,
                    dynamic: true,
                })
            }
            Err(e) => {
                CALLBACKS.remove(handle);
                Err(CallbackError::unsupported(signature, e.to_string()))
            }
        }
    }

    /// Tear down a registration; cleanup runs at most once
    pub fn unregister(&self, handle: Handle) -> Result<()> {
        let info = CALLBACKS
            .remove(handle)
            .ok_or(CallbackError::StaleHandle(handle.raw()))?;
        if let Some(cleanup) = info.take_cleanup() {
            cleanup();
        }
        debug!(function = %info.function, id = info.id, "callback unregistered");
        Ok(())
    }

    /// Resolve a live handle
    pub fn lookup(&self, handle: Handle) -> Result<Arc<CallbackInfo>> {
        CALLBACKS.get(handle).ok_or(CallbackError::StaleHandle(handle.raw()))
    }

    /// Fixed trampoline for `signature`, without registering anything
    pub fn trampoline_for(&self, signature: &str) -> Result<EntryPoint> {
        let parsed = CallbackSignature::parse(signature)?;
        trampolines::lookup(&parsed.canonical())
            .ok_or_else(|| CallbackError::unsupported(signature, "no fixed trampoline"))
    }

    pub fn supported_shapes(&self) -> &'static [&'static str] {
        trampolines::SHAPES
    }
}

fn qualify(namespace: &str, function: &str) -> String {
    if function.contains("::") || namespace.is_empty() {
        function.to_string()
    } else {
        format!("{}::{}", namespace, function)
    }
}
