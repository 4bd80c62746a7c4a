//! Logical operators, equality, ordering, membership and string predicates.

use std::cmp::Ordering;

use cel_eval_common::CelType;
use cel_eval_proto::operators;
use regex::Regex;

use super::no_overload;
use crate::adapter::{CelAdapter, ValueAdapter};
use crate::func::{Function, Overload};
use crate::value::{CelError, CelResult, CelVal};

pub(super) fn functions() -> Vec<Function> {
    vec![
        Function::new(operators::NOT).with_overload(Overload::unary(
            "logical_not",
            CelType::Bool,
            |id, x| match x {
                CelVal::Bool(b) => Ok(CelVal::Bool(!b)),
                other => Err(no_overload(id, operators::NOT, &[other])),
            },
        )),
        // Comprehension loop conditions: only a definite `false` stops the loop.
        Function::new(operators::NOT_STRICTLY_FALSE).with_overload(Overload::non_strict(
            "not_strictly_false",
            1,
            |_, args| {
                let strictly_false = matches!(
                    args.first().cloned().map(|r| r.map(CelVal::unwrapped)),
                    Some(Ok(CelVal::Bool(false)))
                );
                Ok(CelVal::Bool(!strictly_false))
            },
        )),
        Function::new(operators::EQUALS).with_overload(Overload::binary(
            "equals",
            CelType::Dyn,
            CelType::Dyn,
            |_, a, b| Ok(CelVal::Bool(CelAdapter.equals(a, b))),
        )),
        Function::new(operators::NOT_EQUALS).with_overload(Overload::binary(
            "not_equals",
            CelType::Dyn,
            CelType::Dyn,
            |_, a, b| Ok(CelVal::Bool(!CelAdapter.equals(a, b))),
        )),
        ordering(operators::LESS, "less", |o| o == Ordering::Less),
        ordering(operators::LESS_EQUALS, "less_equals", |o| o != Ordering::Greater),
        ordering(operators::GREATER, "greater", |o| o == Ordering::Greater),
        ordering(operators::GREATER_EQUALS, "greater_equals", |o| o != Ordering::Less),
        Function::new(operators::IN)
            .with_overload(Overload::binary(
                "in_list",
                CelType::Dyn,
                CelType::dyn_list(),
                |id, x, list| match list {
                    CelVal::List(l) => {
                        for item in l.iter(id) {
                            if CelAdapter.equals(x, &item?) {
                                return Ok(CelVal::Bool(true));
                            }
                        }
                        Ok(CelVal::Bool(false))
                    }
                    other => Err(no_overload(id, operators::IN, &[x, other])),
                },
            ))
            .with_overload(Overload::binary(
                "in_map",
                CelType::Dyn,
                CelType::dyn_map(),
                |id, x, map| match map {
                    CelVal::Map(m) => Ok(CelVal::Bool(m.contains_key(id, x))),
                    other => Err(no_overload(id, operators::IN, &[x, other])),
                },
            )),
        Function::new("size")
            .with_overload(Overload::unary("size_string", CelType::String, |id, x| {
                size(id, x)
            }))
            .with_overload(Overload::unary("size_bytes", CelType::Bytes, |id, x| size(id, x)))
            .with_overload(Overload::unary("size_list", CelType::dyn_list(), |id, x| {
                size(id, x)
            }))
            .with_overload(Overload::unary("size_map", CelType::dyn_map(), |id, x| size(id, x))),
        string_predicate("contains", "contains_string", |s, sub| Ok(s.contains(sub))),
        string_predicate("startsWith", "starts_with_string", |s, p| Ok(s.starts_with(p))),
        string_predicate("endsWith", "ends_with_string", |s, p| Ok(s.ends_with(p))),
        string_predicate("matches", "matches_string", |s, pattern| {
            let re = Regex::new(pattern).map_err(|e| e.to_string())?;
            Ok(re.is_match(s))
        }),
    ]
}

fn ordering(name: &'static str, id_prefix: &str, test: fn(Ordering) -> bool) -> Function {
    Function::new(name).with_overload(Overload::binary(
        id_prefix,
        CelType::Dyn,
        CelType::Dyn,
        move |id, a, b| match CelAdapter.compare(a, b) {
            Some(ord) => Ok(CelVal::Bool(test(ord))),
            None => Err(no_overload(id, name, &[a, b])),
        },
    ))
}

fn size(id: i64, x: &CelVal) -> CelResult {
    let n = match x {
        CelVal::String(s) => s.chars().count(),
        CelVal::Bytes(b) => b.len(),
        CelVal::List(l) => l.len(),
        CelVal::Map(m) => m.len(),
        other => return Err(no_overload(id, "size", &[other])),
    };
    i64::try_from(n)
        .map(CelVal::Int)
        .map_err(|_| CelError::overflow(id, "size", &CelType::Int).into())
}

/// `receiver.name(arg)` over two strings; an `Err` from `test` is reported as
/// an invalid argument.
fn string_predicate(
    name: &'static str,
    overload: &str,
    test: fn(&str, &str) -> Result<bool, String>,
) -> Function {
    Function::new(name).with_overload(Overload::binary(
        overload,
        CelType::String,
        CelType::String,
        move |id, a, b| match (a, b) {
            (CelVal::String(s), CelVal::String(arg)) => test(s, arg)
                .map(CelVal::Bool)
                .map_err(|issue| CelError::invalid_argument(id, name, issue).into()),
            _ => Err(no_overload(id, name, &[a, b])),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::{Dispatcher, FuncRegistry};

    fn call(name: &str, args: Vec<CelVal>) -> CelResult {
        let mut registry = FuncRegistry::new();
        registry.add_all(functions()).unwrap();
        let function = registry.find(name).unwrap();
        let args: Vec<CelResult> = args.into_iter().map(Ok).collect();
        function.dispatch(1, &args).unwrap_or_else(|| {
            Err(CelError::overload_not_found(1, name, &[]).into())
        })
    }

    #[test]
    fn test_equality_is_heterogeneous() {
        assert_eq!(call("_==_", vec![CelVal::Int(1), CelVal::uint(1)]).unwrap(), CelVal::Bool(true));
        assert_eq!(call("_==_", vec![CelVal::Int(1), CelVal::from("1")]).unwrap(), CelVal::Bool(false));
        assert_eq!(
            call("_!=_", vec![CelVal::Double(f64::NAN), CelVal::Double(f64::NAN)]).unwrap(),
            CelVal::Bool(true)
        );
    }

    #[test]
    fn test_ordering_across_numeric_types() {
        assert_eq!(call("_<_", vec![CelVal::Int(-1), CelVal::uint(0)]).unwrap(), CelVal::Bool(true));
        assert_eq!(call("_>=_", vec![CelVal::Double(2.0), CelVal::Int(2)]).unwrap(), CelVal::Bool(true));
        let err = call("_<_", vec![CelVal::Int(1), CelVal::from("a")]).unwrap_err();
        assert_eq!(
            err.as_error().unwrap().message,
            "found no matching overload for '_<_' applied to '(int, string)'"
        );
    }

    #[test]
    fn test_in_list_and_map() {
        let list = CelVal::list(vec![CelVal::Int(1), CelVal::from("a")]);
        assert_eq!(call("@in", vec![CelVal::Double(1.0), list.clone()]).unwrap(), CelVal::Bool(true));
        assert_eq!(call("@in", vec![CelVal::from("b"), list]).unwrap(), CelVal::Bool(false));

        let map = CelVal::map(1, vec![(CelVal::uint(2), CelVal::Null)]).unwrap();
        assert_eq!(call("@in", vec![CelVal::Int(2), map]).unwrap(), CelVal::Bool(true));
    }

    #[test]
    fn test_size_counts_code_points() {
        assert_eq!(call("size", vec![CelVal::from("héllo")]).unwrap(), CelVal::Int(5));
        assert_eq!(call("size", vec![CelVal::bytes(&b"h\xc3\xa9"[..])]).unwrap(), CelVal::Int(3));
    }

    #[test]
    fn test_not_strictly_false() {
        let function = functions()
            .into_iter()
            .find(|f| f.name == "@not_strictly_false")
            .unwrap();
        let err: CelResult = Err(CelError::unresolved_attr(1).into());
        assert_eq!(function.dispatch(1, &[err]).unwrap().unwrap(), CelVal::Bool(true));
        assert_eq!(
            function.dispatch(1, &[Ok(CelVal::Bool(false))]).unwrap().unwrap(),
            CelVal::Bool(false)
        );
    }

    #[test]
    fn test_string_predicates() {
        assert_eq!(
            call("startsWith", vec![CelVal::from("hello"), CelVal::from("he")]).unwrap(),
            CelVal::Bool(true)
        );
        assert_eq!(
            call("matches", vec![CelVal::from("abc123"), CelVal::from("^[a-z]+\\d+$")]).unwrap(),
            CelVal::Bool(true)
        );
        let err = call("matches", vec![CelVal::from("x"), CelVal::from("(")]).unwrap_err();
        assert!(err
            .as_error()
            .unwrap()
            .message
            .starts_with("invalid argument to function matches"));
    }
}
