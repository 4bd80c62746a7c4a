//! Arithmetic: checked integer math, IEEE doubles, concatenation and time
//! arithmetic.

use std::sync::Arc;

use cel_eval_common::CelType;
use cel_eval_proto::operators;

use super::no_overload;
use crate::func::{Function, Overload};
use crate::value::{CelError, CelResult, CelUint, CelVal};

type IntOp = fn(i64, i64) -> Option<i64>;
type UintOp = fn(u64, u64) -> Option<u64>;

pub(super) fn functions() -> Vec<Function> {
    vec![
        Function::new(operators::ADD)
            .with_overload(int_op(operators::ADD, "add_int64", "addition", i64::checked_add))
            .with_overload(uint_op(operators::ADD, "add_uint64", "addition", u64::checked_add))
            .with_overload(double_op(operators::ADD, "add_double", |a, b| a + b))
            .with_overload(Overload::binary(
                "add_string",
                CelType::String,
                CelType::String,
                |id, a, b| match (a, b) {
                    (CelVal::String(x), CelVal::String(y)) => {
                        let mut s = String::with_capacity(x.len() + y.len());
                        s.push_str(x);
                        s.push_str(y);
                        Ok(CelVal::from(s))
                    }
                    _ => Err(no_overload(id, operators::ADD, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "add_bytes",
                CelType::Bytes,
                CelType::Bytes,
                |id, a, b| match (a, b) {
                    (CelVal::Bytes(x), CelVal::Bytes(y)) => {
                        let joined: Arc<[u8]> = x.iter().chain(y.iter()).copied().collect();
                        Ok(CelVal::Bytes(joined))
                    }
                    _ => Err(no_overload(id, operators::ADD, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "add_list",
                CelType::dyn_list(),
                CelType::dyn_list(),
                |id, a, b| match (a, b) {
                    (CelVal::List(x), CelVal::List(y)) => Ok(CelVal::List(x.concat(id, y)?)),
                    _ => Err(no_overload(id, operators::ADD, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "add_timestamp_duration",
                CelType::Timestamp,
                CelType::Duration,
                |id, a, b| match (a, b) {
                    (CelVal::Timestamp(t), CelVal::Duration(d)) => {
                        Ok(CelVal::Timestamp(t.add_duration(id, d, 1)?))
                    }
                    _ => Err(no_overload(id, operators::ADD, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "add_duration_timestamp",
                CelType::Duration,
                CelType::Timestamp,
                |id, a, b| match (a, b) {
                    (CelVal::Duration(d), CelVal::Timestamp(t)) => {
                        Ok(CelVal::Timestamp(t.add_duration(id, d, 1)?))
                    }
                    _ => Err(no_overload(id, operators::ADD, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "add_duration_duration",
                CelType::Duration,
                CelType::Duration,
                |id, a, b| match (a, b) {
                    (CelVal::Duration(x), CelVal::Duration(y)) => Ok(CelVal::Duration(x.add(id, y, 1)?)),
                    _ => Err(no_overload(id, operators::ADD, &[a, b])),
                },
            )),
        Function::new(operators::SUBTRACT)
            .with_overload(int_op(operators::SUBTRACT, "subtract_int64", "subtraction", i64::checked_sub))
            .with_overload(uint_op(
                operators::SUBTRACT,
                "subtract_uint64",
                "subtraction",
                u64::checked_sub,
            ))
            .with_overload(double_op(operators::SUBTRACT, "subtract_double", |a, b| a - b))
            .with_overload(Overload::binary(
                "subtract_timestamp_timestamp",
                CelType::Timestamp,
                CelType::Timestamp,
                |id, a, b| match (a, b) {
                    (CelVal::Timestamp(x), CelVal::Timestamp(y)) => Ok(CelVal::Duration(x.since(id, y)?)),
                    _ => Err(no_overload(id, operators::SUBTRACT, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "subtract_timestamp_duration",
                CelType::Timestamp,
                CelType::Duration,
                |id, a, b| match (a, b) {
                    (CelVal::Timestamp(t), CelVal::Duration(d)) => {
                        Ok(CelVal::Timestamp(t.add_duration(id, d, -1)?))
                    }
                    _ => Err(no_overload(id, operators::SUBTRACT, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "subtract_duration_duration",
                CelType::Duration,
                CelType::Duration,
                |id, a, b| match (a, b) {
                    (CelVal::Duration(x), CelVal::Duration(y)) => Ok(CelVal::Duration(x.add(id, y, -1)?)),
                    _ => Err(no_overload(id, operators::SUBTRACT, &[a, b])),
                },
            )),
        Function::new(operators::MULTIPLY)
            .with_overload(int_op(
                operators::MULTIPLY,
                "multiply_int64",
                "multiplication",
                i64::checked_mul,
            ))
            .with_overload(uint_op(
                operators::MULTIPLY,
                "multiply_uint64",
                "multiplication",
                u64::checked_mul,
            ))
            .with_overload(double_op(operators::MULTIPLY, "multiply_double", |a, b| a * b)),
        Function::new(operators::DIVIDE)
            .with_overload(Overload::binary(
                "divide_int64",
                CelType::Int,
                CelType::Int,
                |id, a, b| match (a, b) {
                    (CelVal::Int(_), CelVal::Int(0)) => {
                        Err(CelError::division_by_zero(id, &CelType::Int).into())
                    }
                    (CelVal::Int(x), CelVal::Int(y)) => x
                        .checked_div(*y)
                        .map(CelVal::Int)
                        .ok_or_else(|| CelError::overflow(id, "division", &CelType::Int).into()),
                    _ => Err(no_overload(id, operators::DIVIDE, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "divide_uint64",
                CelType::UInt,
                CelType::UInt,
                |id, a, b| match (a, b) {
                    (CelVal::UInt(_), CelVal::UInt(CelUint(0))) => {
                        Err(CelError::division_by_zero(id, &CelType::UInt).into())
                    }
                    (CelVal::UInt(x), CelVal::UInt(y)) => Ok(CelVal::uint(x.0 / y.0)),
                    _ => Err(no_overload(id, operators::DIVIDE, &[a, b])),
                },
            ))
            .with_overload(double_op(operators::DIVIDE, "divide_double", |a, b| a / b)),
        Function::new(operators::MODULO)
            .with_overload(Overload::binary(
                "modulo_int64",
                CelType::Int,
                CelType::Int,
                |id, a, b| match (a, b) {
                    (CelVal::Int(_), CelVal::Int(0)) => {
                        Err(CelError::modulo_by_zero(id, &CelType::Int).into())
                    }
                    (CelVal::Int(x), CelVal::Int(y)) => x
                        .checked_rem(*y)
                        .map(CelVal::Int)
                        .ok_or_else(|| CelError::overflow(id, "modulus", &CelType::Int).into()),
                    _ => Err(no_overload(id, operators::MODULO, &[a, b])),
                },
            ))
            .with_overload(Overload::binary(
                "modulo_uint64",
                CelType::UInt,
                CelType::UInt,
                |id, a, b| match (a, b) {
                    (CelVal::UInt(_), CelVal::UInt(CelUint(0))) => {
                        Err(CelError::modulo_by_zero(id, &CelType::UInt).into())
                    }
                    (CelVal::UInt(x), CelVal::UInt(y)) => Ok(CelVal::uint(x.0 % y.0)),
                    _ => Err(no_overload(id, operators::MODULO, &[a, b])),
                },
            )),
        Function::new(operators::NEGATE)
            .with_overload(Overload::unary("negate_int64", CelType::Int, |id, x| match x {
                CelVal::Int(i) => i
                    .checked_neg()
                    .map(CelVal::Int)
                    .ok_or_else(|| CelError::overflow(id, "negation", &CelType::Int).into()),
                other => Err(no_overload(id, operators::NEGATE, &[other])),
            }))
            .with_overload(Overload::unary("negate_double", CelType::Double, |id, x| match x {
                CelVal::Double(d) => Ok(CelVal::Double(-d)),
                other => Err(no_overload(id, operators::NEGATE, &[other])),
            }))
            .with_overload(Overload::unary("negate_duration", CelType::Duration, |id, x| match x {
                CelVal::Duration(d) => Ok(CelVal::Duration(d.negate(id)?)),
                other => Err(no_overload(id, operators::NEGATE, &[other])),
            })),
    ]
}

fn int_op(function: &'static str, overload: &str, op: &'static str, f: IntOp) -> Overload {
    Overload::binary(overload, CelType::Int, CelType::Int, move |id, a, b| match (a, b) {
        (CelVal::Int(x), CelVal::Int(y)) => f(*x, *y)
            .map(CelVal::Int)
            .ok_or_else(|| CelError::overflow(id, op, &CelType::Int).into()),
        _ => Err(no_overload(id, function, &[a, b])),
    })
}

fn uint_op(function: &'static str, overload: &str, op: &'static str, f: UintOp) -> Overload {
    Overload::binary(overload, CelType::UInt, CelType::UInt, move |id, a, b| match (a, b) {
        (CelVal::UInt(x), CelVal::UInt(y)) => f(x.0, y.0)
            .map(CelVal::uint)
            .ok_or_else(|| CelError::overflow(id, op, &CelType::UInt).into()),
        _ => Err(no_overload(id, function, &[a, b])),
    })
}

fn double_op(function: &'static str, overload: &str, f: fn(f64, f64) -> f64) -> Overload {
    Overload::binary(overload, CelType::Double, CelType::Double, move |id, a, b| -> CelResult {
        match (a, b) {
            (CelVal::Double(x), CelVal::Double(y)) => Ok(CelVal::Double(f(*x, *y))),
            _ => Err(no_overload(id, function, &[a, b])),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::{dispatch_candidates, Dispatcher, FuncRegistry};
    use crate::value::{Duration, Timestamp};

    fn call(name: &str, args: Vec<CelVal>) -> CelResult {
        let mut registry = FuncRegistry::new();
        registry.add_all(functions()).unwrap();
        let args: Vec<CelResult> = args.into_iter().map(Ok).collect();
        let candidates: Vec<_> = registry.find(name).into_iter().collect();
        dispatch_candidates(1, name, &candidates, &args)
    }

    fn message(result: CelResult) -> String {
        result.unwrap_err().as_error().unwrap().message.clone()
    }

    #[test]
    fn test_int_overflow_is_an_error() {
        assert_eq!(
            message(call("_+_", vec![CelVal::Int(i64::MAX), CelVal::Int(1)])),
            "int return error for overflow during addition"
        );
        assert_eq!(
            message(call("_-_", vec![CelVal::uint(0), CelVal::uint(1)])),
            "uint return error for overflow during subtraction"
        );
        assert_eq!(
            message(call("-_", vec![CelVal::Int(i64::MIN)])),
            "int return error for overflow during negation"
        );
        assert_eq!(
            message(call("_/_", vec![CelVal::Int(i64::MIN), CelVal::Int(-1)])),
            "int return error for overflow during division"
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(message(call("_/_", vec![CelVal::Int(1), CelVal::Int(0)])), "int divide by zero");
        assert_eq!(message(call("_%_", vec![CelVal::uint(1), CelVal::uint(0)])), "uint modulus by zero");
        let inf = call("_/_", vec![CelVal::Double(1.0), CelVal::Double(0.0)]).unwrap();
        assert_eq!(inf.as_double(), Some(f64::INFINITY));
    }

    #[test]
    fn test_mixed_numeric_types_do_not_add() {
        assert_eq!(
            message(call("_+_", vec![CelVal::Int(1), CelVal::uint(1)])),
            "found no matching overload for '_+_' applied to '(int, uint)'"
        );
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(call("_+_", vec![CelVal::from("ab"), CelVal::from("c")]).unwrap(), CelVal::from("abc"));
        let l = call(
            "_+_",
            vec![CelVal::list(vec![CelVal::Int(1)]), CelVal::list(vec![CelVal::Int(2)])],
        )
        .unwrap();
        assert_eq!(l, CelVal::list(vec![CelVal::Int(1), CelVal::Int(2)]));
        assert_eq!(
            call("_+_", vec![CelVal::bytes(&b"a"[..]), CelVal::bytes(&b"b"[..])]).unwrap(),
            CelVal::bytes(&b"ab"[..])
        );
    }

    #[test]
    fn test_time_arithmetic() {
        let t = CelVal::Timestamp(Timestamp { seconds: 10, nanos: 500_000_000 });
        let d = CelVal::Duration(Duration { seconds: 1, nanos: 600_000_000 });
        let sum = call("_+_", vec![t.clone(), d.clone()]).unwrap();
        assert_eq!(sum, CelVal::Timestamp(Timestamp { seconds: 12, nanos: 100_000_000 }));
        let back = call("_-_", vec![sum, t]).unwrap();
        assert_eq!(back, d);
        let neg = call("-_", vec![d]).unwrap();
        assert_eq!(neg, CelVal::Duration(Duration { seconds: -2, nanos: 400_000_000 }));
    }
}
