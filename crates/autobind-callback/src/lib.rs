//! autobind callback bridge
//!
//! Lets native libraries call interpreted functions. Registration pairs an
//! interpreted function with a native entry point (a fixed trampoline or a
//! synthesized closure) and an opaque [`Handle`] the library passes back as
//! user data. All invocations are serialized through one gateway lock.

pub mod arena;
pub mod bridge;
pub mod closure;
pub mod error;
pub mod gateway;
pub mod marshal;
pub mod signature;
pub mod trampolines;

pub use arena::{Handle, HandleArena};
pub use bridge::{CallbackBridge, CallbackInfo, Registration};
pub use closure::{ClosureFactory, SynthesizedEntry, Teardown};
pub use error::{CallbackError, Result};
pub use gateway::dispatch;
pub use marshal::coerce_return;
pub use signature::{ArgKind, CallbackSignature};
pub use trampolines::{EntryPoint, SHAPES};
