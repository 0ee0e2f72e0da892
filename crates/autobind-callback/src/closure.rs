//! Dynamic closure capability
//!
//! Signatures outside the fixed trampoline table need a native entry point
//! generated at runtime. The bridge does not generate code itself; a host
//! that can (e.g. through libffi) plugs in a [`ClosureFactory`]. Generated
//! entry points should forward to [`crate::dispatch`] and convert its result
//! with [`crate::coerce_return`].

use crate::arena::Handle;
use crate::error::Result;
use crate::signature::CallbackSignature;
use crate::trampolines::EntryPoint;

/// Releases a synthesized entry point
pub type Teardown = Box<dyn FnOnce() + Send>;

/// A generated native entry point bound to one handle
pub struct SynthesizedEntry {
    pub entry: EntryPoint,
    pub teardown: Teardown,
}

/// Generates native entry points for arbitrary signatures
pub trait ClosureFactory: Send + Sync {
    /// Build an entry point for `signature` that dispatches to `handle`
    fn synthesize(&self, signature: &CallbackSignature, handle: Handle) -> Result<SynthesizedEntry>;
}
