//! Bidirectional converter between the cel-eval AST and the proto `Expr`.

use cel_eval_common::{CelValue, EntryKey, Expr, ExprKind, StructEntry};

use crate::error::ConversionError;
use crate::pb::{
    constant::ConstantKind,
    expr::{
        create_struct::{entry::KeyKind, Entry},
        Call, CreateList, CreateStruct, ExprKind as ProtoKind, Ident, Select,
    },
    Constant, Expr as ProtoExpr, NullValue, ParsedExpr,
};

/// Convert a proto expression into the AST, preserving node ids.
pub fn from_proto_expr(expr: &ProtoExpr) -> Result<Expr, ConversionError> {
    let kind = match &expr.expr_kind {
        None => return Err(ConversionError::UnknownExprKind { expr_id: expr.id }),
        Some(kind) => match kind {
            ProtoKind::ConstExpr(c) => ExprKind::Const(const_to_ast(expr.id, c)?),
            ProtoKind::IdentExpr(ident) => ExprKind::Ident(ident.name.clone()),
            ProtoKind::SelectExpr(select) => {
                let operand = select.operand.as_ref().ok_or(ConversionError::MissingField {
                    expr_id: expr.id,
                    field: "operand",
                })?;
                ExprKind::Select {
                    operand: Box::new(from_proto_expr(operand)?),
                    field: select.field.clone(),
                    test_only: select.test_only,
                }
            }
            ProtoKind::CallExpr(call) => ExprKind::Call {
                target: match &call.target {
                    Some(t) => Some(Box::new(from_proto_expr(t)?)),
                    None => None,
                },
                function: call.function.clone(),
                args: call
                    .args
                    .iter()
                    .map(from_proto_expr)
                    .collect::<Result<_, _>>()?,
            },
            ProtoKind::ListExpr(list) => ExprKind::List(
                list.elements
                    .iter()
                    .map(from_proto_expr)
                    .collect::<Result<_, _>>()?,
            ),
            ProtoKind::StructExpr(s) => struct_to_ast(s)?,
            ProtoKind::ComprehensionExpr(_) => {
                return Err(ConversionError::UnsupportedComprehension { expr_id: expr.id });
            }
        },
    };
    Ok(Expr::new(expr.id, kind))
}

/// Convert the root of a `ParsedExpr`.
pub fn from_parsed_expr(parsed: &ParsedExpr) -> Result<Expr, ConversionError> {
    let expr = parsed.expr.as_ref().ok_or(ConversionError::MissingField {
        expr_id: 0,
        field: "expr",
    })?;
    from_proto_expr(expr)
}

/// Convert an AST into its proto form.
pub fn to_proto_expr(expr: &Expr) -> ProtoExpr {
    let kind = match &expr.kind {
        ExprKind::Const(c) => ProtoKind::ConstExpr(const_to_proto(c)),
        ExprKind::Ident(name) => ProtoKind::IdentExpr(Ident { name: name.clone() }),
        ExprKind::Select {
            operand,
            field,
            test_only,
        } => ProtoKind::SelectExpr(Select {
            operand: Some(Box::new(to_proto_expr(operand))),
            field: field.clone(),
            test_only: *test_only,
        }),
        ExprKind::Call {
            target,
            function,
            args,
        } => ProtoKind::CallExpr(Call {
            target: target.as_ref().map(|t| Box::new(to_proto_expr(t))),
            function: function.clone(),
            args: args.iter().map(to_proto_expr).collect(),
        }),
        ExprKind::List(elements) => ProtoKind::ListExpr(CreateList {
            elements: elements.iter().map(to_proto_expr).collect(),
            optional_indices: Vec::new(),
        }),
        ExprKind::Struct {
            message_name,
            entries,
        } => ProtoKind::StructExpr(CreateStruct {
            message_name: message_name.clone(),
            entries: entries
                .iter()
                .map(|e| Entry {
                    id: e.id,
                    key_kind: Some(match &e.key {
                        EntryKey::Field(name) => KeyKind::FieldKey(name.clone()),
                        EntryKey::Map(k) => KeyKind::MapKey(to_proto_expr(k)),
                    }),
                    value: Some(to_proto_expr(&e.value)),
                    optional_entry: false,
                })
                .collect(),
        }),
    };
    ProtoExpr {
        id: expr.id,
        expr_kind: Some(kind),
    }
}

fn const_to_ast(expr_id: i64, c: &Constant) -> Result<CelValue, ConversionError> {
    match &c.constant_kind {
        None => Err(ConversionError::MissingField {
            expr_id,
            field: "constant_kind",
        }),
        Some(kind) => match kind {
            ConstantKind::NullValue(_) => Ok(CelValue::Null),
            ConstantKind::BoolValue(v) => Ok(CelValue::Bool(*v)),
            ConstantKind::Int64Value(v) => Ok(CelValue::Int(*v)),
            ConstantKind::Uint64Value(v) => Ok(CelValue::UInt(*v)),
            ConstantKind::DoubleValue(v) => Ok(CelValue::Double(*v)),
            ConstantKind::StringValue(v) => Ok(CelValue::String(v.clone())),
            ConstantKind::BytesValue(v) => Ok(CelValue::Bytes(v.clone())),
            ConstantKind::DurationValue(_) => Err(ConversionError::InvalidConstant {
                expr_id,
                message: "duration constants are not supported".to_string(),
            }),
            ConstantKind::TimestampValue(_) => Err(ConversionError::InvalidConstant {
                expr_id,
                message: "timestamp constants are not supported".to_string(),
            }),
        },
    }
}

fn const_to_proto(c: &CelValue) -> Constant {
    let kind = match c {
        CelValue::Null => ConstantKind::NullValue(NullValue::NullValue as i32),
        CelValue::Bool(v) => ConstantKind::BoolValue(*v),
        CelValue::Int(v) => ConstantKind::Int64Value(*v),
        CelValue::UInt(v) => ConstantKind::Uint64Value(*v),
        CelValue::Double(v) => ConstantKind::DoubleValue(*v),
        CelValue::String(v) => ConstantKind::StringValue(v.clone()),
        CelValue::Bytes(v) => ConstantKind::BytesValue(v.clone()),
    };
    Constant {
        constant_kind: Some(kind),
    }
}

fn struct_to_ast(s: &CreateStruct) -> Result<ExprKind, ConversionError> {
    let is_map = s.message_name.is_empty();
    let entries = s
        .entries
        .iter()
        .map(|entry| {
            let key = match (&entry.key_kind, is_map) {
                (Some(KeyKind::MapKey(k)), true) => EntryKey::Map(from_proto_expr(k)?),
                (Some(KeyKind::FieldKey(name)), false) => EntryKey::Field(name.clone()),
                (_, true) => {
                    return Err(ConversionError::MissingField {
                        expr_id: entry.id,
                        field: "map_key",
                    })
                }
                (_, false) => {
                    return Err(ConversionError::MissingField {
                        expr_id: entry.id,
                        field: "field_key",
                    })
                }
            };
            let value = entry.value.as_ref().ok_or(ConversionError::MissingField {
                expr_id: entry.id,
                field: "value",
            })?;
            Ok(StructEntry {
                id: entry.id,
                key,
                value: from_proto_expr(value)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExprKind::Struct {
        message_name: s.message_name.clone(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pb::expr::Comprehension;
    use cel_eval_common::ExprBuilder;

    #[test]
    fn test_call_with_receiver() {
        let mut b = ExprBuilder::new();
        let s = b.string("abc");
        let arg = b.string("b");
        let call = b.member_call(s, "contains", vec![arg]);
        let proto = to_proto_expr(&call);
        match &proto.expr_kind {
            Some(ProtoKind::CallExpr(c)) => {
                assert_eq!(c.function, "contains");
                assert!(c.target.is_some());
                assert_eq!(c.args.len(), 1);
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(from_proto_expr(&proto).unwrap(), call);
    }

    #[test]
    fn test_struct_and_map_entries() {
        let mut b = ExprBuilder::new();
        let v = b.int(1);
        let msg = b.message("pkg.Msg", vec![("f", v)]);
        let k = b.string("k");
        let v2 = b.bool(true);
        let map = b.map(vec![(k, v2)]);
        let list = b.list(vec![msg, map]);
        assert_eq!(from_proto_expr(&to_proto_expr(&list)).unwrap(), list);
    }

    #[test]
    fn test_missing_kind_is_rejected() {
        let expr = ProtoExpr {
            id: 4,
            expr_kind: None,
        };
        let err = from_proto_expr(&expr).unwrap_err();
        assert_eq!(err.to_string(), "expr 4: unknown expression kind");
    }

    #[test]
    fn test_comprehension_is_rejected() {
        let expr = ProtoExpr {
            id: 9,
            expr_kind: Some(ProtoKind::ComprehensionExpr(Comprehension::default())),
        };
        assert!(matches!(
            from_proto_expr(&expr),
            Err(ConversionError::UnsupportedComprehension { expr_id: 9 })
        ));
    }

    #[test]
    fn test_map_entry_requires_map_key() {
        let expr = ProtoExpr {
            id: 1,
            expr_kind: Some(ProtoKind::StructExpr(CreateStruct {
                message_name: String::new(),
                entries: vec![Entry {
                    id: 2,
                    key_kind: Some(KeyKind::FieldKey("f".into())),
                    value: None,
                    optional_entry: false,
                }],
            })),
        };
        let err = from_proto_expr(&expr).unwrap_err();
        assert_eq!(err.to_string(), "expr 2: missing required field 'map_key'");
    }
}
