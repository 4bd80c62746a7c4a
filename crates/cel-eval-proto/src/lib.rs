//! Wire formats for the cel-eval engine.
//!
//! This crate carries the `cel.expr` protobuf messages that other CEL
//! implementations exchange (parsed expressions, values, evaluation
//! results) and converts parsed expressions into the `cel-eval-common` AST.
//!
//! # Example
//!
//! ```
//! use cel_eval_common::ExprBuilder;
//! use cel_eval_proto::{from_proto_expr, to_proto_expr};
//!
//! let mut b = ExprBuilder::new();
//! let x = b.ident("x");
//! let one = b.int(1);
//! let ast = b.call("_+_", vec![x, one]);
//!
//! let proto = to_proto_expr(&ast);
//! assert_eq!(from_proto_expr(&proto).unwrap(), ast);
//! ```

mod converter;
mod error;
pub mod operators;
pub mod pb;

pub use converter::{from_parsed_expr, from_proto_expr, to_proto_expr};
pub use error::ConversionError;

pub use pb::{ExprValue, ListValue, MapValue, ParsedExpr, Value};

use prost::Message;

/// Decode a serialized `cel.expr.ParsedExpr` straight into the AST.
pub fn decode_parsed_expr(bytes: &[u8]) -> Result<cel_eval_common::Expr, ConversionError> {
    let parsed = ParsedExpr::decode(bytes)?;
    from_parsed_expr(&parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_eval_common::ExprBuilder;

    #[test]
    fn test_decode_parsed_expr() {
        let mut b = ExprBuilder::new();
        let t = b.bool(true);
        let not = b.call(operators::NOT, vec![t]);
        let parsed = ParsedExpr {
            expr: Some(to_proto_expr(&not)),
        };
        let bytes = parsed.encode_to_vec();
        assert_eq!(decode_parsed_expr(&bytes).unwrap(), not);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_parsed_expr(&[0xff, 0xff, 0xff]),
            Err(ConversionError::Decode(_))
        ));
    }
}
