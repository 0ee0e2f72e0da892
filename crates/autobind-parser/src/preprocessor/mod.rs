//! C Preprocessor
//!
//! Line-oriented conditional compilation seeded with the macros a native
//! compiler would predefine for the target platform.

pub mod filter;
pub mod platform;

pub use filter::PreprocessorState;
pub use platform::{Architecture, MacroDefinition, Platform, PlatformError, TargetOs};
