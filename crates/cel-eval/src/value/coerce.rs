//! Scalar coercions used when building well-known messages from CEL values.
//!
//! `None` (an absent field) and `null` coerce to the zero value of the target.
//! Wrappers and `uint` are unwrapped first. Anything else is a type mismatch.

use cel_eval_common::CelType;

use super::{CelError, CelResult, CelVal};

/// 2^63 and 2^64, the first doubles outside the integer ranges.
pub(crate) const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
pub(crate) const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

fn unbox(val: Option<&CelVal>) -> Option<CelVal> {
    match val {
        None | Some(CelVal::Null) | Some(CelVal::TypedNull(_)) => None,
        Some(CelVal::Wrapped(w)) => Some(w.clone().into_inner()),
        Some(v) => Some(v.clone()),
    }
}

fn mismatch<T>(id: i64, expected: &str, val: &CelVal) -> CelResult<T> {
    Err(CelError::type_mismatch(id, expected, &val.cel_type()).into())
}

pub fn coerce_to_bool(id: i64, val: Option<&CelVal>) -> CelResult<bool> {
    match unbox(val) {
        None => Ok(false),
        Some(CelVal::Bool(b)) => Ok(b),
        Some(other) => mismatch(id, "bool", &other),
    }
}

pub fn coerce_to_i64(id: i64, val: Option<&CelVal>) -> CelResult<i64> {
    match unbox(val) {
        None => Ok(0),
        Some(CelVal::Int(i)) => Ok(i),
        Some(CelVal::UInt(u)) => {
            i64::try_from(u.0).map_err(|_| CelError::overflow(id, "conversion", &CelType::Int).into())
        }
        Some(CelVal::Double(d)) if d.fract() == 0.0 && d >= -I64_BOUND && d < I64_BOUND => Ok(d as i64),
        Some(other) => mismatch(id, "integer", &other),
    }
}

pub fn coerce_to_u64(id: i64, val: Option<&CelVal>) -> CelResult<u64> {
    match unbox(val) {
        None => Ok(0),
        Some(CelVal::UInt(u)) => Ok(u.0),
        Some(CelVal::Int(i)) => {
            u64::try_from(i).map_err(|_| CelError::overflow(id, "conversion", &CelType::UInt).into())
        }
        Some(CelVal::Double(d)) if d.fract() == 0.0 && d >= 0.0 && d < U64_BOUND => Ok(d as u64),
        Some(other) => mismatch(id, "integer", &other),
    }
}

pub fn coerce_to_f64(id: i64, val: Option<&CelVal>) -> CelResult<f64> {
    match unbox(val) {
        None => Ok(0.0),
        Some(CelVal::Double(d)) => Ok(d),
        Some(CelVal::Int(i)) => Ok(i as f64),
        Some(CelVal::UInt(u)) => Ok(u.0 as f64),
        Some(other) => mismatch(id, "number", &other),
    }
}

pub fn coerce_to_string(id: i64, val: Option<&CelVal>) -> CelResult<String> {
    match unbox(val) {
        None => Ok(String::new()),
        Some(CelVal::String(s)) => Ok(s.to_string()),
        Some(other) => mismatch(id, "string", &other),
    }
}

pub fn coerce_to_bytes(id: i64, val: Option<&CelVal>) -> CelResult<Vec<u8>> {
    match unbox(val) {
        None => Ok(Vec::new()),
        Some(CelVal::Bytes(b)) => Ok(b.to_vec()),
        Some(other) => mismatch(id, "bytes", &other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Wrapper;

    #[test]
    fn test_absent_and_null_are_zero() {
        assert_eq!(coerce_to_i64(1, None).unwrap(), 0);
        assert_eq!(coerce_to_string(1, Some(&CelVal::Null)).unwrap(), "");
        assert!(!coerce_to_bool(1, None).unwrap());
        assert!(coerce_to_bytes(1, None).unwrap().is_empty());
    }

    #[test]
    fn test_wrappers_unwrap() {
        let w = CelVal::Wrapped(Wrapper::Int(5));
        assert_eq!(coerce_to_i64(1, Some(&w)).unwrap(), 5);
        assert_eq!(coerce_to_f64(1, Some(&CelVal::uint(3))).unwrap(), 3.0);
    }

    #[test]
    fn test_mismatch() {
        let err = coerce_to_string(4, Some(&CelVal::Int(1))).unwrap_err();
        assert_eq!(err.as_error().unwrap().message, "type mismatch: string vs int");
        assert!(coerce_to_u64(4, Some(&CelVal::Int(-1))).is_err());
    }
}
