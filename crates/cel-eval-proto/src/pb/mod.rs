//! The `cel.expr` protobuf messages used on the wire.
//!
//! Field numbers follow `cel/expr/syntax.proto`, `value.proto` and
//! `eval.proto` so payloads interoperate with other CEL implementations.

mod eval;
mod syntax;
mod values;

pub use eval::{expr_value, ErrorSet, ExprValue, Status, UnknownSet};
pub use syntax::{constant, expr, Constant, Expr, ParsedExpr};
pub use values::{map_value, value, EnumValue, ListValue, MapValue, NullValue, Value};
