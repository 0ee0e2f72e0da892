//! Conversions between native arguments and interpreter values
//!
//! Return conversions never fail: anything that does not fit the native
//! return type becomes zero, false or null.

use std::ffi::{c_char, c_int, c_void, CStr};

use autobind_core::Value;

use crate::signature::ArgKind;

pub(crate) fn ptr_arg(p: *mut c_void) -> Value {
    Value::Pointer(p as usize)
}

pub(crate) fn int_arg(v: c_int) -> Value {
    Value::Int(i64::from(v))
}

pub(crate) fn double_arg(v: f64) -> Value {
    Value::Float(v)
}

pub(crate) fn float_arg(v: f32) -> Value {
    Value::Float(f64::from(v))
}

/// Copy a C string into an interpreter string; null becomes nil
///
/// # Safety
///
/// `p` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
pub(crate) unsafe fn string_arg(p: *const c_char) -> Value {
    if p.is_null() {
        return Value::Nil;
    }
    Value::Str(CStr::from_ptr(p).to_string_lossy().into_owned())
}

pub(crate) fn int_return(value: Option<Value>) -> c_int {
    match value {
        Some(Value::Int(v)) => v as c_int,
        Some(Value::Float(v)) => v as c_int,
        Some(Value::Bool(b)) => c_int::from(b),
        _ => 0,
    }
}

pub(crate) fn double_return(value: Option<Value>) -> f64 {
    match value {
        Some(Value::Float(v)) => v,
        Some(Value::Int(v)) => v as f64,
        _ => 0.0,
    }
}

pub(crate) fn float_return(value: Option<Value>) -> f32 {
    double_return(value) as f32
}

pub(crate) fn ptr_return(value: Option<Value>) -> *mut c_void {
    match value {
        Some(Value::Pointer(p)) => p as *mut c_void,
        _ => std::ptr::null_mut(),
    }
}

/// Booleans cross the boundary as a C `int`
pub(crate) fn bool_return(value: Option<Value>) -> c_int {
    match value {
        Some(Value::Bool(b)) => c_int::from(b),
        Some(Value::Int(v)) => c_int::from(v != 0),
        _ => 0,
    }
}

/// Normalize a callback result to the value a `kind` return carries
///
/// Dynamic entry points use this to apply the same defaults as the fixed
/// trampolines.
pub fn coerce_return(value: Option<Value>, kind: ArgKind) -> Value {
    match kind {
        ArgKind::Int => Value::Int(i64::from(int_return(value))),
        ArgKind::Bool => Value::Bool(bool_return(value) != 0),
        ArgKind::Double => Value::Float(double_return(value)),
        ArgKind::Float => Value::Float(f64::from(float_return(value))),
        ArgKind::Ptr => Value::Pointer(ptr_return(value) as usize),
        ArgKind::Str | ArgKind::Void => Value::Nil,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_int_return_defaults() {
        assert_eq!(int_return(Some(Value::Int(-3))), -3);
        assert_eq!(int_return(Some(Value::Float(2.9))), 2);
        assert_eq!(int_return(Some(Value::Bool(true))), 1);
        assert_eq!(int_return(Some(Value::Str("1".into()))), 0);
        assert_eq!(int_return(None), 0);
    }

    #[test]
    fn test_double_and_float_returns() {
        assert_eq!(double_return(Some(Value::Int(4))), 4.0);
        assert_eq!(double_return(Some(Value::Float(0.5))), 0.5);
        assert_eq!(double_return(Some(Value::Nil)), 0.0);
        assert_eq!(float_return(Some(Value::Float(1.5))), 1.5f32);
    }

    #[test]
    fn test_ptr_and_bool_returns() {
        assert_eq!(ptr_return(Some(Value::Pointer(0x1000))) as usize, 0x1000);
        assert!(ptr_return(Some(Value::Int(0x1000))).is_null());
        assert!(ptr_return(None).is_null());

        assert_eq!(bool_return(Some(Value::Bool(true))), 1);
        assert_eq!(bool_return(Some(Value::Int(7))), 1);
        assert_eq!(bool_return(Some(Value::Int(0))), 0);
        assert_eq!(bool_return(Some(Value::Float(1.0))), 0);
    }

    #[test]
    fn test_string_arg() {
        let s = CString::new("hello").unwrap();
        assert_eq!(unsafe { string_arg(s.as_ptr()) }, Value::Str("hello".into()));
        assert_eq!(unsafe { string_arg(std::ptr::null()) }, Value::Nil);
    }

    #[test]
    fn test_coerce_return() {
        assert_eq!(coerce_return(Some(Value::Float(3.7)), ArgKind::Int), Value::Int(3));
        assert_eq!(coerce_return(None, ArgKind::Ptr), Value::Pointer(0));
        assert_eq!(coerce_return(Some(Value::Int(1)), ArgKind::Bool), Value::Bool(true));
        assert_eq!(coerce_return(Some(Value::Int(1)), ArgKind::Void), Value::Nil);
    }
}
