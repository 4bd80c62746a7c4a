//! End-to-end evaluation through `CelEnv` with hand-built expression trees.

use std::sync::Arc;

use cel_eval::{
    CelEnv, CelResult, CelUnknown, CelVal, ErrorKind, Fault, FuncRegistry, Function, Overload,
};
use cel_eval_common::{CelType, Expr, ExprBuilder};
use serde_json::json;

fn eval(env: &CelEnv, expr: &Expr) -> CelResult {
    let plan = env.plan(expr).unwrap();
    env.eval(&plan)
}

fn error_message(result: CelResult) -> String {
    match result {
        Err(Fault::Error(e)) => e.message,
        other => panic!("expected an error, got {:?}", other),
    }
}

/// `1 / 0 == 0`
fn failing(b: &mut ExprBuilder) -> Expr {
    let one = b.int(1);
    let zero = b.int(0);
    let div = b.call("_/_", vec![one, zero]);
    let rhs = b.int(0);
    b.call("_==_", vec![div, rhs])
}

#[test]
fn short_circuit_absorbs_errors() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();

    let f = b.bool(false);
    let err = failing(&mut b);
    let and = b.call("_&&_", vec![f, err]);
    assert_eq!(eval(&env, &and), Ok(CelVal::Bool(false)));

    let err = failing(&mut b);
    let t = b.bool(true);
    let or = b.call("_||_", vec![err, t]);
    assert_eq!(eval(&env, &or), Ok(CelVal::Bool(true)));

    let t = b.bool(true);
    let err = failing(&mut b);
    let and = b.call("_&&_", vec![t, err]);
    assert_eq!(error_message(eval(&env, &and)), "int divide by zero");
}

#[test]
fn ternary_only_evaluates_the_chosen_branch() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let cond = b.bool(true);
    let yes = b.string("yes");
    let err = failing(&mut b);
    let expr = b.ternary(cond, yes, err);
    assert_eq!(eval(&env, &expr), Ok(CelVal::from("yes")));
}

#[test]
fn numbers_compare_across_types() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();

    let i = b.int(1);
    let u = b.uint(1);
    let eq = b.call("_==_", vec![i, u]);
    assert_eq!(eval(&env, &eq), Ok(CelVal::Bool(true)));

    let u = b.uint(1);
    let d = b.double(1.0);
    let eq = b.call("_==_", vec![u, d]);
    assert_eq!(eval(&env, &eq), Ok(CelVal::Bool(true)));

    let i = b.int(-1);
    let u = b.uint(0);
    let lt = b.call("_<_", vec![i, u]);
    assert_eq!(eval(&env, &lt), Ok(CelVal::Bool(true)));
}

#[test]
fn map_lookup_with_any_numeric_key() {
    let env = CelEnv::new();
    let keys: [fn(&mut ExprBuilder) -> Expr; 3] =
        [|b| b.int(1), |b| b.uint(1), |b| b.double(1.0)];
    for key in keys {
        let mut b = ExprBuilder::new();
        let k = b.int(1);
        let v = b.string("a");
        let map = b.map(vec![(k, v)]);
        let key = key(&mut b);
        let expr = b.index(map, key);
        assert_eq!(eval(&env, &expr), Ok(CelVal::from("a")));
    }
}

#[test]
fn map_literal_rejects_duplicate_keys() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let k1 = b.int(1);
    let v1 = b.string("a");
    let k2 = b.uint(1);
    let v2 = b.string("b");
    let map = b.map(vec![(k1, v1), (k2, v2)]);
    match eval(&env, &map) {
        Err(Fault::Error(e)) => assert_eq!(e.kind, ErrorKind::MapKeyConflict),
        other => panic!("expected a key conflict, got {:?}", other),
    }
}

#[test]
fn map_literal_keeps_bool_and_int_keys_apart() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let (t, a, one, x) = (b.bool(true), b.string("a"), b.int(1), b.string("b"));
    let map = b.map(vec![(t, a), (one, x)]);
    let key = b.int(1);
    let expr = b.index(map, key);
    assert_eq!(eval(&env, &expr), Ok(CelVal::from("b")));

    let (t, x) = (b.bool(true), b.string("x"));
    let map = b.map(vec![(t, x)]);
    let key = b.int(1);
    let expr = b.index(map, key);
    assert_eq!(error_message(eval(&env, &expr)), "key not found");
}

#[test]
fn map_literal_prefers_unknown_over_error() {
    let mut env = CelEnv::new();
    env.set("u", Err::<CelVal, Fault>(CelUnknown::new(42).into()));
    let mut b = ExprBuilder::new();
    let missing = b.ident("missing");
    let u = b.ident("u");
    let map = b.map(vec![(missing, u)]);
    assert_eq!(eval(&env, &map), Err(Fault::Unknown(CelUnknown::new(42))));
}

#[test]
fn oversized_durations_are_range_errors() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let text = b.string("99999999999999999999999999999999999h");
    let expr = b.call("duration", vec![text]);
    assert_eq!(error_message(eval(&env, &expr)), "duration out of range");
}

#[test]
fn oversized_timezone_offsets_are_rejected() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let zero = b.int(0);
    let ts = b.call("timestamp", vec![zero]);
    let tz = b.string("99999999:00");
    let expr = b.member_call(ts, "getHours", vec![tz]);
    assert_eq!(error_message(eval(&env, &expr)), "invalid timezone: 99999999:00");
}

#[test]
fn list_index_out_of_range() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let items = vec![b.int(1), b.int(2)];
    let list = b.list(items);
    let idx = b.int(2);
    let expr = b.index(list, idx);
    assert_eq!(error_message(eval(&env, &expr)), "index 2 out of bounds [0, 2)");
}

#[test]
fn unregistered_function_reports_argument_types() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let arg = b.int(1);
    let expr = b.call("foo", vec![arg]);
    assert_eq!(
        error_message(eval(&env, &expr)),
        "found no matching overload for 'foo' applied to '(int)'"
    );
}

#[test]
fn host_overload_wins_over_standard_library() {
    let mut registry = FuncRegistry::new();
    registry
        .add(Function::new("_+_").with_overload(Overload::binary(
            "add_int64_saturating",
            CelType::Int,
            CelType::Int,
            |_, a, b| {
                let (a, b) = (a.as_int().unwrap_or(0), b.as_int().unwrap_or(0));
                Ok(CelVal::Int(a.saturating_add(b)))
            },
        )))
        .unwrap();

    let mut b = ExprBuilder::new();
    let max = b.int(i64::MAX);
    let one = b.int(1);
    let expr = b.call("_+_", vec![max, one]);

    let mut env = CelEnv::new();
    assert_eq!(
        error_message(eval(&env, &expr)),
        "int return error for overflow during addition"
    );
    env.override_funcs(Arc::new(registry));
    assert_eq!(eval(&env, &expr), Ok(CelVal::Int(i64::MAX)));
}

#[test]
fn json_bindings_support_field_access() {
    let mut env = CelEnv::new();
    env.set("user", json!({"name": "ada", "age": 36, "tags": ["admin"]}));
    let mut b = ExprBuilder::new();

    let user = b.ident("user");
    let name = b.select(user, "name");
    assert_eq!(eval(&env, &name), Ok(CelVal::from("ada")));

    let user = b.ident("user");
    let missing = b.select(user, "email");
    assert_eq!(error_message(eval(&env, &missing)), "field not found: email");

    let user = b.ident("user");
    let has = b.has(user, "email");
    assert_eq!(eval(&env, &has), Ok(CelVal::Bool(false)));

    let user = b.ident("user");
    let tags = b.select(user, "tags");
    let size = b.call("size", vec![tags]);
    assert_eq!(eval(&env, &size), Ok(CelVal::Int(1)));
}

#[test]
fn undeclared_identifier() {
    let env = CelEnv::new().with_container("acme");
    let mut b = ExprBuilder::new();
    let expr = b.ident("missing");
    assert_eq!(
        error_message(eval(&env, &expr)),
        "undeclared reference to 'missing' (in container 'acme')"
    );
}

#[test]
fn wrapper_literal_is_unwrapped_in_arithmetic() {
    let env = CelEnv::new();
    let mut b = ExprBuilder::new();
    let v = b.int(41);
    let wrapped = b.message("google.protobuf.Int64Value", vec![("value", v)]);
    let one = b.int(1);
    let expr = b.call("_+_", vec![wrapped, one]);
    assert_eq!(eval(&env, &expr), Ok(CelVal::Int(42)));
}

#[test]
fn strings_extension_is_opt_in() {
    let mut b = ExprBuilder::new();
    let target = b.string("hello");
    let expr = b.member_call(target, "upperAscii", vec![]);

    let plain = CelEnv::new();
    assert!(error_message(eval(&plain, &expr)).starts_with("found no matching overload"));

    let env = CelEnv::new().with_functions(cel_eval::ext::strings_registry());
    assert_eq!(eval(&env, &expr), Ok(CelVal::from("HELLO")));
}

#[test]
fn run_json_round_trips_through_a_parser() {
    let env = CelEnv::new().with_parser(|source: &str| -> Result<Expr, String> {
        let mut b = ExprBuilder::new();
        match source {
            "[1, 'two']" => {
                let items = vec![b.int(1), b.string("two")];
                Ok(b.list(items))
            }
            _ => Err(format!("cannot parse {}", source)),
        }
    });
    assert_eq!(env.run_json("[1, 'two']").unwrap(), Ok(json!([1, "two"])));
    assert!(env.run_json("1 +").is_err());
}
