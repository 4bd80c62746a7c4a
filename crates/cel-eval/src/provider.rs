//! Type and value providers: struct-literal construction, type identifiers
//! and constant identifiers such as enum values.

use std::fmt::Debug;
use std::sync::Arc;

use cel_eval_common::{wk_proto_type, CelType};

use crate::value::{
    coerce_to_bool, coerce_to_bytes, coerce_to_f64, coerce_to_i64, coerce_to_string,
    coerce_to_u64, CelError, CelResult, CelVal, Duration, Timestamp, Wrapper,
};

/// Resolves type names and builds values for struct literals.
pub trait ValueProvider: Debug + Send + Sync {
    /// Build a value of `type_name` from literal fields; `None` when the type
    /// is not known to this provider.
    fn new_value(&self, id: i64, type_name: &str, fields: &[(String, CelVal)]) -> Option<CelResult>;

    fn find_type(&self, name: &str) -> Option<CelType>;

    /// Resolve an identifier that is not bound in the activation.
    fn find_ident(&self, id: i64, name: &str) -> Option<CelResult>;
}

/// The type denoted by a builtin type identifier or well-known message name.
pub fn builtin_type(name: &str) -> Option<CelType> {
    Some(match name {
        "int" => CelType::Int,
        "uint" => CelType::UInt,
        "double" => CelType::Double,
        "bool" => CelType::Bool,
        "string" => CelType::String,
        "bytes" => CelType::Bytes,
        "list" => CelType::dyn_list(),
        "map" => CelType::dyn_map(),
        "null_type" => CelType::Null,
        "type" => CelType::type_type(),
        "dyn" => CelType::Dyn,
        _ => return wk_proto_type(name),
    })
}

/// Provider without a registry: builtin types and the well-known messages
/// that have a direct CEL representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProvider;

fn lookup<'a>(fields: &'a [(String, CelVal)], name: &str) -> Option<&'a CelVal> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn check_fields(id: i64, type_name: &str, fields: &[(String, CelVal)], allowed: &[&str]) -> CelResult<()> {
    match fields.iter().find(|(n, _)| !allowed.contains(&n.as_str())) {
        Some((n, _)) => Err(CelError::field_not_found(id, n, Some(type_name)).into()),
        None => Ok(()),
    }
}

impl EmptyProvider {
    fn build(&self, id: i64, type_name: &str, fields: &[(String, CelVal)]) -> CelResult {
        let value = lookup(fields, "value");
        let wrapped = |w: Wrapper| -> CelResult {
            check_fields(id, type_name, fields, &["value"])?;
            Ok(CelVal::Wrapped(w))
        };
        match type_name {
            "google.protobuf.BoolValue" => wrapped(Wrapper::Bool(coerce_to_bool(id, value)?)),
            "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => {
                wrapped(Wrapper::Int(coerce_to_i64(id, value)?))
            }
            "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
                wrapped(Wrapper::UInt(coerce_to_u64(id, value)?))
            }
            "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
                wrapped(Wrapper::Double(coerce_to_f64(id, value)?))
            }
            "google.protobuf.StringValue" => {
                wrapped(Wrapper::String(Arc::from(coerce_to_string(id, value)?)))
            }
            "google.protobuf.BytesValue" => {
                wrapped(Wrapper::Bytes(Arc::from(coerce_to_bytes(id, value)?)))
            }
            "google.protobuf.Timestamp" | "google.protobuf.Duration" => {
                check_fields(id, type_name, fields, &["seconds", "nanos"])?;
                let seconds = coerce_to_i64(id, lookup(fields, "seconds"))?;
                let nanos = coerce_to_i64(id, lookup(fields, "nanos"))?;
                if type_name == "google.protobuf.Timestamp" {
                    Ok(CelVal::Timestamp(Timestamp::normalize(id, seconds, nanos)?))
                } else {
                    Ok(CelVal::Duration(Duration::normalize(id, seconds, nanos)?))
                }
            }
            "google.protobuf.Value" => {
                check_fields(
                    id,
                    type_name,
                    fields,
                    &[
                        "null_value",
                        "number_value",
                        "string_value",
                        "bool_value",
                        "struct_value",
                        "list_value",
                    ],
                )?;
                match fields.first() {
                    None => Ok(CelVal::Null),
                    Some((name, _)) if name == "null_value" => Ok(CelVal::Null),
                    Some((_, v)) => Ok(v.clone()),
                }
            }
            "google.protobuf.Struct" => {
                check_fields(id, type_name, fields, &["fields"])?;
                match lookup(fields, "fields") {
                    Some(m @ CelVal::Map(_)) => Ok(m.clone()),
                    Some(other) => Err(CelError::type_mismatch(id, "map", &other.cel_type()).into()),
                    None => CelVal::map(id, Vec::new()),
                }
            }
            "google.protobuf.ListValue" => {
                check_fields(id, type_name, fields, &["values"])?;
                match lookup(fields, "values") {
                    Some(l @ CelVal::List(_)) => Ok(l.clone()),
                    Some(other) => Err(CelError::type_mismatch(id, "list", &other.cel_type()).into()),
                    None => Ok(CelVal::list(Vec::new())),
                }
            }
            _ => Err(CelError::type_not_found(id, type_name).into()),
        }
    }
}

impl ValueProvider for EmptyProvider {
    fn new_value(&self, id: i64, type_name: &str, fields: &[(String, CelVal)]) -> Option<CelResult> {
        wk_proto_type(type_name)?;
        if type_name == "google.protobuf.Any" || type_name == "google.protobuf.NullValue" {
            return None;
        }
        Some(self.build(id, type_name, fields))
    }

    fn find_type(&self, name: &str) -> Option<CelType> {
        builtin_type(name)
    }

    fn find_ident(&self, _id: i64, name: &str) -> Option<CelResult> {
        builtin_type(name).map(|t| Ok(CelVal::Type(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, CelVal)]) -> Vec<(String, CelVal)> {
        pairs.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_type_identifiers() {
        let p = EmptyProvider;
        assert_eq!(p.find_type("uint"), Some(CelType::UInt));
        assert_eq!(p.find_type("google.protobuf.Struct"), Some(CelType::json_object()));
        assert_eq!(p.find_type("pkg.Msg"), None);
        let t = p.find_ident(1, "list").unwrap().unwrap();
        assert_eq!(t.cel_type().fullname(), "type(list(dyn))");
    }

    #[test]
    fn test_wrapper_literal() {
        let v = EmptyProvider
            .new_value(1, "google.protobuf.Int32Value", &fields(&[("value", CelVal::Int(4))]))
            .unwrap()
            .unwrap();
        assert_eq!(v.cel_type(), CelType::wrapper(CelType::Int));
        assert_eq!(v, CelVal::Int(4));

        let zero = EmptyProvider
            .new_value(1, "google.protobuf.StringValue", &[])
            .unwrap()
            .unwrap();
        assert_eq!(zero, CelVal::from(""));
    }

    #[test]
    fn test_timestamp_literal_normalizes() {
        let v = EmptyProvider
            .new_value(
                1,
                "google.protobuf.Duration",
                &fields(&[("seconds", CelVal::Int(0)), ("nanos", CelVal::Int(-1))]),
            )
            .unwrap()
            .unwrap();
        match v {
            CelVal::Duration(d) => assert_eq!((d.seconds, d.nanos), (-1, 999_999_999)),
            other => panic!("expected duration, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EmptyProvider
            .new_value(5, "google.protobuf.BoolValue", &fields(&[("val", CelVal::Bool(true))]))
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err.as_error().unwrap().message,
            "field not found: val in google.protobuf.BoolValue"
        );
    }

    #[test]
    fn test_non_wkt_is_not_handled() {
        assert!(EmptyProvider.new_value(1, "pkg.Msg", &[]).is_none());
        assert!(EmptyProvider.new_value(1, "google.protobuf.Any", &[]).is_none());
    }
}
