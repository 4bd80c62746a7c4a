//! Type conversions: `int()`, `uint()`, `double()`, `bool()`, `string()`,
//! `bytes()`, `timestamp()`, `duration()`, `type()` and `dyn()`.

use std::sync::Arc;

use cel_eval_common::CelType;

use super::no_overload;
use crate::func::{Function, Overload};
use crate::value::time::{format_duration, format_timestamp, parse_duration, parse_timestamp};
use crate::value::{CelError, CelResult, CelUint, CelVal, Duration, Timestamp, I64_BOUND, U64_BOUND};

type Conversion = fn(i64, &CelVal) -> CelResult;

pub(super) fn functions() -> Vec<Function> {
    vec![
        conversion(
            "int",
            &[
                ("int64_to_int64", CelType::Int),
                ("uint64_to_int64", CelType::UInt),
                ("double_to_int64", CelType::Double),
                ("string_to_int64", CelType::String),
                ("timestamp_to_int64", CelType::Timestamp),
            ],
            to_int,
        ),
        conversion(
            "uint",
            &[
                ("uint64_to_uint64", CelType::UInt),
                ("int64_to_uint64", CelType::Int),
                ("double_to_uint64", CelType::Double),
                ("string_to_uint64", CelType::String),
            ],
            to_uint,
        ),
        conversion(
            "double",
            &[
                ("double_to_double", CelType::Double),
                ("int64_to_double", CelType::Int),
                ("uint64_to_double", CelType::UInt),
                ("string_to_double", CelType::String),
            ],
            to_double,
        ),
        conversion(
            "bool",
            &[("bool_to_bool", CelType::Bool), ("string_to_bool", CelType::String)],
            to_bool,
        ),
        conversion(
            "string",
            &[
                ("string_to_string", CelType::String),
                ("int64_to_string", CelType::Int),
                ("uint64_to_string", CelType::UInt),
                ("double_to_string", CelType::Double),
                ("bool_to_string", CelType::Bool),
                ("bytes_to_string", CelType::Bytes),
                ("timestamp_to_string", CelType::Timestamp),
                ("duration_to_string", CelType::Duration),
            ],
            to_string,
        ),
        conversion(
            "bytes",
            &[("bytes_to_bytes", CelType::Bytes), ("string_to_bytes", CelType::String)],
            to_bytes,
        ),
        conversion(
            "timestamp",
            &[
                ("timestamp_to_timestamp", CelType::Timestamp),
                ("string_to_timestamp", CelType::String),
                ("int64_to_timestamp", CelType::Int),
            ],
            to_timestamp,
        ),
        conversion(
            "duration",
            &[
                ("duration_to_duration", CelType::Duration),
                ("string_to_duration", CelType::String),
                ("int64_to_duration", CelType::Int),
            ],
            to_duration,
        ),
        Function::new("type").with_overload(Overload::unary("type", CelType::Dyn, |_, x| {
            Ok(CelVal::Type(x.cel_type()))
        })),
        Function::new("dyn").with_overload(Overload::unary("to_dyn", CelType::Dyn, |_, x| Ok(x.clone()))),
    ]
}

/// One function whose overloads all share a single conversion routine; the
/// guards only select which source types are accepted.
fn conversion(name: &str, sources: &[(&str, CelType)], f: Conversion) -> Function {
    sources.iter().fold(Function::new(name), |function, (overload, ty)| {
        function.with_overload(Overload::unary(*overload, ty.clone(), f))
    })
}

fn to_int(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::Int(i) => Ok(CelVal::Int(*i)),
        CelVal::UInt(CelUint(u)) => i64::try_from(*u)
            .map(CelVal::Int)
            .map_err(|_| CelError::overflow(id, "conversion", &CelType::Int).into()),
        // Truncates toward zero; NaN and values outside the range overflow.
        CelVal::Double(d) if d.is_finite() && *d >= -I64_BOUND && *d < I64_BOUND => {
            Ok(CelVal::Int(d.trunc() as i64))
        }
        CelVal::Double(_) => Err(CelError::overflow(id, "conversion", &CelType::Int).into()),
        CelVal::String(s) => s
            .parse::<i64>()
            .map(CelVal::Int)
            .map_err(|e| CelError::invalid_argument(id, "int", e).into()),
        CelVal::Timestamp(t) => Ok(CelVal::Int(t.seconds)),
        other => Err(no_overload(id, "int", &[other])),
    }
}

fn to_uint(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::UInt(u) => Ok(CelVal::UInt(*u)),
        CelVal::Int(i) => u64::try_from(*i)
            .map(CelVal::uint)
            .map_err(|_| CelError::overflow(id, "conversion", &CelType::UInt).into()),
        CelVal::Double(d) if d.is_finite() && *d > -1.0 && *d < U64_BOUND => {
            Ok(CelVal::uint(d.trunc() as u64))
        }
        CelVal::Double(_) => Err(CelError::overflow(id, "conversion", &CelType::UInt).into()),
        CelVal::String(s) => s
            .parse::<u64>()
            .map(CelVal::uint)
            .map_err(|e| CelError::invalid_argument(id, "uint", e).into()),
        other => Err(no_overload(id, "uint", &[other])),
    }
}

fn to_double(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::Double(d) => Ok(CelVal::Double(*d)),
        CelVal::Int(i) => Ok(CelVal::Double(*i as f64)),
        CelVal::UInt(CelUint(u)) => Ok(CelVal::Double(*u as f64)),
        CelVal::String(s) => s
            .parse::<f64>()
            .map(CelVal::Double)
            .map_err(|e| CelError::invalid_argument(id, "double", e).into()),
        other => Err(no_overload(id, "double", &[other])),
    }
}

fn to_bool(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::Bool(b) => Ok(CelVal::Bool(*b)),
        CelVal::String(s) => match s.as_ref() {
            "true" | "TRUE" | "True" | "t" | "1" => Ok(CelVal::Bool(true)),
            "false" | "FALSE" | "False" | "f" | "0" => Ok(CelVal::Bool(false)),
            other => Err(CelError::invalid_argument(id, "bool", format!("cannot parse '{}'", other)).into()),
        },
        other => Err(no_overload(id, "bool", &[other])),
    }
}

fn to_string(id: i64, x: &CelVal) -> CelResult {
    let s = match x {
        CelVal::String(s) => return Ok(CelVal::String(s.clone())),
        CelVal::Int(i) => i.to_string(),
        CelVal::UInt(CelUint(u)) => u.to_string(),
        CelVal::Double(d) => format_double(*d),
        CelVal::Bool(b) => b.to_string(),
        CelVal::Bytes(b) => std::str::from_utf8(b)
            .map_err(|e| CelError::bad_string_bytes(id, e))?
            .to_string(),
        CelVal::Timestamp(t) => format_timestamp(t),
        CelVal::Duration(d) => format_duration(d),
        other => return Err(no_overload(id, "string", &[other])),
    };
    Ok(CelVal::from(s))
}

fn to_bytes(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::Bytes(b) => Ok(CelVal::Bytes(b.clone())),
        CelVal::String(s) => Ok(CelVal::Bytes(Arc::from(s.as_bytes()))),
        other => Err(no_overload(id, "bytes", &[other])),
    }
}

fn to_timestamp(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::Timestamp(t) => Ok(CelVal::Timestamp(*t)),
        CelVal::String(s) => Ok(CelVal::Timestamp(parse_timestamp(id, s)?)),
        CelVal::Int(i) => Ok(CelVal::Timestamp(Timestamp::normalize(id, *i, 0)?)),
        other => Err(no_overload(id, "timestamp", &[other])),
    }
}

fn to_duration(id: i64, x: &CelVal) -> CelResult {
    match x {
        CelVal::Duration(d) => Ok(CelVal::Duration(*d)),
        CelVal::String(s) => Ok(CelVal::Duration(parse_duration(id, s)?)),
        CelVal::Int(i) => Ok(CelVal::Duration(Duration::normalize(id, *i, 0)?)),
        other => Err(no_overload(id, "duration", &[other])),
    }
}

/// Whole doubles keep a trailing `.0` so they read back as doubles.
fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d.is_sign_positive() { "+infinity" } else { "-infinity" }.to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{:.1}", d)
    } else {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::{dispatch_candidates, Dispatcher, FuncRegistry};

    fn call(name: &str, arg: CelVal) -> CelResult {
        let mut registry = FuncRegistry::new();
        registry.add_all(functions()).unwrap();
        let candidates: Vec<_> = registry.find(name).into_iter().collect();
        dispatch_candidates(1, name, &candidates, &[Ok(arg)])
    }

    fn message(result: CelResult) -> String {
        result.unwrap_err().as_error().unwrap().message.clone()
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(call("int", CelVal::Double(-2.9)).unwrap(), CelVal::Int(-2));
        assert_eq!(call("int", CelVal::from("-17")).unwrap(), CelVal::Int(-17));
        assert_eq!(
            message(call("int", CelVal::uint(u64::MAX))),
            "int return error for overflow during conversion"
        );
        assert_eq!(
            message(call("int", CelVal::Double(f64::NAN))),
            "int return error for overflow during conversion"
        );
        assert_eq!(
            message(call("int", CelVal::Double(9.3e18))),
            "int return error for overflow during conversion"
        );
        assert!(message(call("int", CelVal::from("1.5"))).starts_with("invalid argument to function int"));
    }

    #[test]
    fn test_uint_conversions() {
        assert_eq!(call("uint", CelVal::Int(7)).unwrap(), CelVal::uint(7));
        assert_eq!(call("uint", CelVal::Double(0.5)).unwrap(), CelVal::uint(0));
        assert_eq!(
            message(call("uint", CelVal::Int(-1))),
            "uint return error for overflow during conversion"
        );
    }

    #[test]
    fn test_string_conversions() {
        assert_eq!(call("string", CelVal::Double(3.0)).unwrap(), CelVal::from("3.0"));
        assert_eq!(call("string", CelVal::Double(2.5)).unwrap(), CelVal::from("2.5"));
        assert_eq!(call("string", CelVal::uint(4)).unwrap(), CelVal::from("4"));
        assert_eq!(
            call("string", CelVal::Timestamp(Timestamp { seconds: 0, nanos: 0 })).unwrap(),
            CelVal::from("1970-01-01T00:00:00Z")
        );
        assert!(message(call("string", CelVal::bytes(&b"\xff"[..])))
            .starts_with("Failed to decode bytes as string"));
    }

    #[test]
    fn test_bool_accepts_common_spellings() {
        assert_eq!(call("bool", CelVal::from("t")).unwrap(), CelVal::Bool(true));
        assert_eq!(call("bool", CelVal::from("FALSE")).unwrap(), CelVal::Bool(false));
        assert!(call("bool", CelVal::from("yes")).is_err());
    }

    #[test]
    fn test_time_conversions() {
        assert_eq!(
            call("timestamp", CelVal::Int(86400)).unwrap(),
            CelVal::Timestamp(Timestamp { seconds: 86400, nanos: 0 })
        );
        assert_eq!(
            call("duration", CelVal::from("1m30s")).unwrap(),
            CelVal::Duration(Duration { seconds: 90, nanos: 0 })
        );
        assert!(call("timestamp", CelVal::Int(i64::MAX)).is_err());
    }

    #[test]
    fn test_type_and_dyn() {
        assert_eq!(call("type", CelVal::from("a")).unwrap(), CelVal::Type(CelType::String));
        assert_eq!(call("dyn", CelVal::Int(1)).unwrap(), CelVal::Int(1));
        assert_eq!(
            message(call("int", CelVal::Bool(true))),
            "found no matching overload for 'int' applied to '(bool)'"
        );
    }
}
