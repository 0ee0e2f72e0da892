//! Invocation gateway
//!
//! Every call from native code into the interpreter passes through
//! [`dispatch`], which holds one process-wide lock for the duration of the
//! interpreted call. The host call mechanism is not reentrant, so a callback
//! that synchronously triggers another callback on the same thread
//! deadlocks. A hung callback holds the lock indefinitely; there is no
//! timeout.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace, warn};

use autobind_core::Value;

use crate::arena::Handle;
use crate::bridge::callbacks;
use crate::error::{CallbackError, Result};

static INVOCATION_LOCK: Mutex<()> = Mutex::new(());

/// Run the function registered under `context` with `args`
///
/// Returns the first value the function produced, if any. Dynamic entry
/// points call this exactly like the fixed trampolines do.
pub fn dispatch(context: usize, args: Vec<Value>) -> Result<Option<Value>> {
    let info = callbacks()
        .get(Handle::from_raw(context))
        .ok_or(CallbackError::StaleHandle(context))?;

    let _guard = INVOCATION_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    trace!(function = %info.function, id = info.id, args = args.len(), "invoking callback");

    let values = info.invoker.invoke(&info.function, info.context, args)?;
    Ok(values.into_iter().next())
}

/// Trampoline side of [`dispatch`]: errors and panics become `None`
pub(crate) fn call(context: usize, args: Vec<Value>) -> Option<Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| dispatch(context, args))) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            debug!(context = context, error = %e, "callback failed, returning default");
            None
        }
        Err(_) => {
            warn!(context = context, "callback panicked, returning default");
            None
        }
    }
}
