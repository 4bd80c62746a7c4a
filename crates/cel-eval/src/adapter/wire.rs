//! Adapter for the `cel.expr.Value` wire tree.

use cel_eval_common::CelType;
use cel_eval_proto::pb::{expr_value, map_value, value::Kind, ErrorSet, ExprValue, Status, UnknownSet};
use cel_eval_proto::{ListValue, MapValue, Value};
use prost::Message;

use super::{ProtoAdapter, ValueAdapter};
use crate::provider::builtin_type;
use crate::value::{
    AdaptedList, AdaptedMap, CelError, CelResult, CelUnknown, CelVal, Duration, ErrorKind, Fault,
    Timestamp,
};

const TIMESTAMP_URL: &str = "type.googleapis.com/google.protobuf.Timestamp";
const DURATION_URL: &str = "type.googleapis.com/google.protobuf.Duration";

/// `google.rpc.Code.INVALID_ARGUMENT`
const INVALID_ARGUMENT: i32 = 3;

/// Adapter over `cel.expr.Value`, the representation used by conformance
/// fixtures and RPC boundaries.
///
/// Packed messages other than Timestamp and Duration need a [`ProtoAdapter`]
/// to be unpacked.
#[derive(Debug, Clone, Default)]
pub struct WireAdapter {
    proto: Option<ProtoAdapter>,
}

impl WireAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proto(proto: ProtoAdapter) -> Self {
        Self { proto: Some(proto) }
    }

    fn any_to_cel(&self, id: i64, any: &prost_types::Any) -> CelResult {
        let decode_err = |e: prost::DecodeError| CelError::invalid_argument(id, "decode", e);
        match any.type_url.as_str() {
            TIMESTAMP_URL => {
                let ts = prost_types::Timestamp::decode(&any.value[..]).map_err(decode_err)?;
                Ok(CelVal::Timestamp(Timestamp::normalize(id, ts.seconds, ts.nanos.into())?))
            }
            DURATION_URL => {
                let d = prost_types::Duration::decode(&any.value[..]).map_err(decode_err)?;
                Ok(CelVal::Duration(Duration::normalize(id, d.seconds, d.nanos.into())?))
            }
            url => match &self.proto {
                Some(proto) => proto.unpack_any(id, url, &any.value),
                None => Err(CelError::unrecognized_any(id, url).into()),
            },
        }
    }

    fn object_to_any(&self, id: i64, val: &CelVal) -> CelResult<prost_types::Any> {
        match val {
            CelVal::Timestamp(ts) => Ok(prost_types::Any {
                type_url: TIMESTAMP_URL.to_string(),
                value: prost_types::Timestamp {
                    seconds: ts.seconds,
                    nanos: ts.nanos,
                }
                .encode_to_vec(),
            }),
            CelVal::Duration(d) => Ok(prost_types::Any {
                type_url: DURATION_URL.to_string(),
                value: prost_types::Duration {
                    seconds: d.seconds,
                    nanos: d.nanos,
                }
                .encode_to_vec(),
            }),
            _ => {
                let Some(proto) = &self.proto else {
                    return Err(CelError::type_mismatch(id, "wire value", &val.cel_type()).into());
                };
                let desc = proto
                    .registry()
                    .get_message("google.protobuf.Any")
                    .ok_or_else(|| CelError::type_not_found(id, "google.protobuf.Any"))?;
                let packed = proto.message_from_cel(id, &desc, val)?;
                packed
                    .transcode_to::<prost_types::Any>()
                    .map_err(|e| CelError::invalid_argument(id, "decode", e).into())
            }
        }
    }

    /// Convert an evaluation result from the wire.
    pub fn expr_value_to_cel(&self, id: i64, expr: &ExprValue) -> CelResult {
        match &expr.kind {
            Some(expr_value::Kind::Value(v)) => self.to_cel(id, v),
            Some(expr_value::Kind::Error(set)) => {
                let mut errors = set
                    .errors
                    .iter()
                    .map(|s| CelError::new(id, ErrorKind::InvalidArgument, s.message.clone()));
                let mut first = errors
                    .next()
                    .unwrap_or_else(|| CelError::new(id, ErrorKind::InvalidArgument, "empty error set"));
                errors.for_each(|e| first.add(e));
                Err(first.into())
            }
            Some(expr_value::Kind::Unknown(set)) => {
                Err(CelUnknown::from_ids(set.exprs.iter().copied()).into())
            }
            None => Ok(CelVal::Null),
        }
    }

    /// Convert an evaluation result to the wire. Values that have no wire
    /// form are reported as errors.
    pub fn result_to_expr_value(&self, result: &CelResult) -> ExprValue {
        let converted = result
            .as_ref()
            .map_err(Clone::clone)
            .and_then(|v| self.from_cel(0, v));
        let kind = match converted {
            Ok(v) => expr_value::Kind::Value(v),
            Err(Fault::Unknown(u)) => expr_value::Kind::Unknown(UnknownSet {
                exprs: u.ids.into_iter().collect(),
            }),
            Err(Fault::Error(e)) => {
                let errors = std::iter::once(&e)
                    .chain(e.additional.iter())
                    .map(|err| Status {
                        code: INVALID_ARGUMENT,
                        message: err.message.clone(),
                        details: Vec::new(),
                    })
                    .collect();
                expr_value::Kind::Error(ErrorSet { errors })
            }
        };
        ExprValue { kind: Some(kind) }
    }
}

impl ValueAdapter for WireAdapter {
    type Native = Value;

    fn to_cel(&self, id: i64, native: &Value) -> CelResult {
        let Some(kind) = &native.kind else {
            return Ok(CelVal::Null);
        };
        Ok(match kind {
            Kind::NullValue(_) => CelVal::Null,
            Kind::BoolValue(b) => CelVal::Bool(*b),
            Kind::Int64Value(i) => CelVal::Int(*i),
            Kind::Uint64Value(u) => CelVal::uint(*u),
            Kind::DoubleValue(d) => CelVal::Double(*d),
            Kind::StringValue(s) => CelVal::string(s.as_str()),
            Kind::BytesValue(b) => CelVal::bytes(b.as_slice()),
            Kind::EnumValue(e) => CelVal::Int(e.value.into()),
            Kind::ObjectValue(any) => return self.any_to_cel(id, any),
            Kind::ListValue(list) => CelVal::List(
                AdaptedList::new(self.clone(), list.values.clone()).into_list(CelType::dyn_list()),
            ),
            Kind::MapValue(map) => {
                let entries = map
                    .entries
                    .iter()
                    .map(|e| match (&e.key, &e.value) {
                        (Some(k), Some(v)) => Ok((k.clone(), v.clone())),
                        _ => Err(CelError::invalid_argument(id, "map", "entry without key or value")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                CelVal::Map(AdaptedMap::try_new(id, self.clone(), entries)?.into_map(CelType::dyn_map()))
            }
            Kind::TypeValue(name) => {
                CelVal::Type(builtin_type(name).unwrap_or_else(|| CelType::message(name)))
            }
        })
    }

    fn from_cel(&self, id: i64, val: &CelVal) -> CelResult<Value> {
        let kind = match val {
            CelVal::Null | CelVal::TypedNull(_) => Kind::NullValue(0),
            CelVal::Bool(b) => Kind::BoolValue(*b),
            CelVal::Int(i) => Kind::Int64Value(*i),
            CelVal::UInt(u) => Kind::Uint64Value(u.0),
            CelVal::Double(d) => Kind::DoubleValue(*d),
            CelVal::String(s) => Kind::StringValue(s.to_string()),
            CelVal::Bytes(b) => Kind::BytesValue(b.to_vec()),
            CelVal::Wrapped(w) => return self.from_cel(id, &w.clone().into_inner()),
            CelVal::List(l) => Kind::ListValue(ListValue {
                values: l
                    .values(id)?
                    .iter()
                    .map(|v| self.from_cel(id, v))
                    .collect::<CelResult<_>>()?,
            }),
            CelVal::Map(m) => Kind::MapValue(MapValue {
                entries: m
                    .entries(id)?
                    .iter()
                    .map(|(k, v)| {
                        Ok(map_value::Entry {
                            key: Some(self.from_cel(id, k)?),
                            value: Some(self.from_cel(id, v)?),
                        })
                    })
                    .collect::<CelResult<_>>()?,
            }),
            CelVal::Type(t) => Kind::TypeValue(t.name()),
            CelVal::Timestamp(_) | CelVal::Duration(_) | CelVal::Object(_) => {
                Kind::ObjectValue(self.object_to_any(id, val)?)
            }
        };
        Ok(Value::from_kind(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_eval_common::ProtoTypeRegistry;
    use cel_eval_proto::pb::EnumValue;

    fn v(kind: Kind) -> Value {
        Value::from_kind(kind)
    }

    #[test]
    fn test_scalars() {
        let a = WireAdapter::new();
        assert_eq!(a.to_cel(1, &v(Kind::Uint64Value(3))).unwrap().cel_type(), CelType::UInt);
        assert_eq!(a.to_cel(1, &Value::default()).unwrap(), CelVal::Null);
        let e = v(Kind::EnumValue(EnumValue {
            r#type: "pkg.Color".into(),
            value: 2,
        }));
        assert_eq!(a.to_cel(1, &e).unwrap(), CelVal::Int(2));
    }

    #[test]
    fn test_round_trip_containers() {
        let a = WireAdapter::new();
        let list = v(Kind::ListValue(ListValue {
            values: vec![v(Kind::Int64Value(1)), v(Kind::StringValue("x".into()))],
        }));
        let map = v(Kind::MapValue(MapValue {
            entries: vec![map_value::Entry {
                key: Some(v(Kind::BoolValue(true))),
                value: Some(list.clone()),
            }],
        }));
        let cel = a.to_cel(1, &map).unwrap();
        assert_eq!(a.from_cel(1, &cel).unwrap(), map);
    }

    #[test]
    fn test_time_values_pack_as_any() {
        let a = WireAdapter::new();
        let ts = CelVal::Timestamp(Timestamp { seconds: 10, nanos: 5 });
        let wire = a.from_cel(1, &ts).unwrap();
        match &wire.kind {
            Some(Kind::ObjectValue(any)) => assert_eq!(any.type_url, TIMESTAMP_URL),
            other => panic!("expected object value, got {:?}", other),
        }
        assert_eq!(a.to_cel(1, &wire).unwrap(), ts);
    }

    #[test]
    fn test_unknown_any_without_registry() {
        let a = WireAdapter::new();
        let wire = v(Kind::ObjectValue(prost_types::Any {
            type_url: "type.googleapis.com/pkg.Msg".into(),
            value: Vec::new(),
        }));
        let err = a.to_cel(4, &wire).unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, ErrorKind::UnrecognizedAny);
    }

    #[test]
    fn test_packed_wrapper_with_registry() {
        let a = WireAdapter::with_proto(ProtoAdapter::new(ProtoTypeRegistry::new()));
        let wire = a.from_cel(1, &CelVal::Wrapped(crate::value::Wrapper::Int(9))).unwrap();
        assert_eq!(wire, v(Kind::Int64Value(9)));

        let packed = v(Kind::ObjectValue(prost_types::Any {
            type_url: "type.googleapis.com/google.protobuf.Int64Value".into(),
            value: 9i64.encode_to_vec(),
        }));
        let unpacked = a.to_cel(1, &packed).unwrap();
        assert_eq!(unpacked.cel_type(), CelType::wrapper(CelType::Int));
        assert_eq!(unpacked, CelVal::Int(9));
    }

    #[test]
    fn test_type_values() {
        let a = WireAdapter::new();
        let t = a.to_cel(1, &v(Kind::TypeValue("google.protobuf.Duration".into()))).unwrap();
        assert_eq!(t, CelVal::Type(CelType::Duration));
        assert_eq!(a.from_cel(1, &CelVal::Type(CelType::Int)).unwrap(), v(Kind::TypeValue("int".into())));
    }

    #[test]
    fn test_expr_value_faults() {
        let a = WireAdapter::new();
        let mut err = CelError::new(2, ErrorKind::DivisionByZero, "int divide by zero");
        err.add(CelError::new(3, ErrorKind::Overflow, "second"));
        let wire = a.result_to_expr_value(&Err(err.into()));
        let back = a.expr_value_to_cel(7, &wire).unwrap_err();
        let back = back.as_error().unwrap();
        assert_eq!(back.message, "int divide by zero");
        assert_eq!(back.additional.len(), 1);

        let wire = a.result_to_expr_value(&Err(CelUnknown::from_ids([4, 5]).into()));
        assert_eq!(
            a.expr_value_to_cel(7, &wire).unwrap_err(),
            Fault::Unknown(CelUnknown::from_ids([4, 5]))
        );
    }
}
