//! Fixed trampoline table
//!
//! One `extern "C"` function per supported shape. Each takes the callback
//! handle as a trailing pointer-sized context argument, except `ptr->ptr`
//! (thread-start style) where the single argument is the handle itself.
//! These shapes are the only native contract that holds without a
//! [`ClosureFactory`](crate::ClosureFactory).
//!
//! Calling a trampoline with a handle that was already unregistered is
//! caught by the arena and yields the zero default, but the native side
//! must not keep using function pointer and handle after teardown.

use std::ffi::{c_char, c_int, c_void};

use crate::gateway::call;
use crate::marshal::{
    bool_return, double_arg, double_return, float_arg, float_return, int_arg, int_return, ptr_arg, ptr_return,
    string_arg,
};

/// Every shape with a fixed trampoline, in canonical form
pub const SHAPES: &[&str] = &[
    "ptr,ptr->int",
    "int,int->int",
    "ptr->ptr",
    "double->double",
    "ptr,ptr,ptr->int",
    "void->void",
    "ptr->void",
    "int->int",
    "int->void",
    "ptr,int->void",
    "ptr,int->int",
    "ptr,ptr->void",
    "float->float",
    "string->void",
    "double,double->double",
    "string->int",
    "int,int->void",
    "ptr,ptr->bool",
];

/// Address of a native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPoint(usize);

impl EntryPoint {
    pub fn from_addr(addr: usize) -> Self {
        EntryPoint(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }
}

/// Fixed trampoline for a canonical signature
pub fn lookup(canonical: &str) -> Option<EntryPoint> {
    let addr = match canonical {
        "ptr,ptr->int" => ptr_ptr_int as usize,
        "int,int->int" => int_int_int as usize,
        "ptr->ptr" => ptr_ptr as usize,
        "double->double" => double_double as usize,
        "ptr,ptr,ptr->int" => ptr_ptr_ptr_int as usize,
        "void->void" => void_void as usize,
        "ptr->void" => ptr_void as usize,
        "int->int" => int_int as usize,
        "int->void" => int_void as usize,
        "ptr,int->void" => ptr_int_void as usize,
        "ptr,int->int" => ptr_int_int as usize,
        "ptr,ptr->void" => ptr_ptr_void as usize,
        "float->float" => float_float as usize,
        "string->void" => string_void as usize,
        "double,double->double" => double_double_double as usize,
        "string->int" => string_int as usize,
        "int,int->void" => int_int_void as usize,
        "ptr,ptr->bool" => ptr_ptr_bool as usize,
        _ => return None,
    };
    Some(EntryPoint(addr))
}

/// Comparator shape (`qsort`, `bsearch`)
pub extern "C" fn ptr_ptr_int(a: *mut c_void, b: *mut c_void, context: usize) -> c_int {
    int_return(call(context, vec![ptr_arg(a), ptr_arg(b)]))
}

pub extern "C" fn int_int_int(a: c_int, b: c_int, context: usize) -> c_int {
    int_return(call(context, vec![int_arg(a), int_arg(b)]))
}

/// Thread-start shape: `arg` is the handle
pub extern "C" fn ptr_ptr(arg: *mut c_void) -> *mut c_void {
    ptr_return(call(arg as usize, vec![ptr_arg(arg)]))
}

pub extern "C" fn double_double(a: f64, context: usize) -> f64 {
    double_return(call(context, vec![double_arg(a)]))
}

pub extern "C" fn ptr_ptr_ptr_int(a: *mut c_void, b: *mut c_void, c: *mut c_void, context: usize) -> c_int {
    int_return(call(context, vec![ptr_arg(a), ptr_arg(b), ptr_arg(c)]))
}

pub extern "C" fn void_void(context: usize) {
    call(context, Vec::new());
}

pub extern "C" fn ptr_void(a: *mut c_void, context: usize) {
    call(context, vec![ptr_arg(a)]);
}

pub extern "C" fn int_int(a: c_int, context: usize) -> c_int {
    int_return(call(context, vec![int_arg(a)]))
}

pub extern "C" fn int_void(a: c_int, context: usize) {
    call(context, vec![int_arg(a)]);
}

pub extern "C" fn ptr_int_void(a: *mut c_void, b: c_int, context: usize) {
    call(context, vec![ptr_arg(a), int_arg(b)]);
}

pub extern "C" fn ptr_int_int(a: *mut c_void, b: c_int, context: usize) -> c_int {
    int_return(call(context, vec![ptr_arg(a), int_arg(b)]))
}

pub extern "C" fn ptr_ptr_void(a: *mut c_void, b: *mut c_void, context: usize) {
    call(context, vec![ptr_arg(a), ptr_arg(b)]);
}

pub extern "C" fn float_float(a: f32, context: usize) -> f32 {
    float_return(call(context, vec![float_arg(a)]))
}

/// # Safety
///
/// `s` must be null or a valid NUL-terminated string.
pub unsafe extern "C" fn string_void(s: *const c_char, context: usize) {
    call(context, vec![string_arg(s)]);
}

pub extern "C" fn double_double_double(a: f64, b: f64, context: usize) -> f64 {
    double_return(call(context, vec![double_arg(a), double_arg(b)]))
}

/// # Safety
///
/// `s` must be null or a valid NUL-terminated string.
pub unsafe extern "C" fn string_int(s: *const c_char, context: usize) -> c_int {
    int_return(call(context, vec![string_arg(s)]))
}

pub extern "C" fn int_int_void(a: c_int, b: c_int, context: usize) {
    call(context, vec![int_arg(a), int_arg(b)]);
}

/// Predicate shape; the result is 1 or 0
pub extern "C" fn ptr_ptr_bool(a: *mut c_void, b: *mut c_void, context: usize) -> c_int {
    bool_return(call(context, vec![ptr_arg(a), ptr_arg(b)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::CallbackSignature;

    #[test]
    fn test_every_shape_has_a_trampoline() {
        for shape in SHAPES {
            assert!(lookup(shape).is_some(), "missing trampoline for {}", shape);
            assert_eq!(&CallbackSignature::parse(shape).unwrap().canonical(), shape);
        }
    }

    #[test]
    fn test_lookup_unknown_shape() {
        assert!(lookup("double,int->double").is_none());
        assert!(lookup("ptr, ptr -> int").is_none());
    }

    #[test]
    fn test_stale_context_returns_defaults() {
        let bogus = usize::MAX;
        assert_eq!(int_int_int(1, 2, bogus), 0);
        assert_eq!(double_double(1.5, bogus), 0.0);
        assert!(ptr_ptr(bogus as *mut c_void).is_null());
        assert_eq!(ptr_ptr_bool(std::ptr::null_mut(), std::ptr::null_mut(), bogus), 0);
        void_void(bogus);
    }
}
