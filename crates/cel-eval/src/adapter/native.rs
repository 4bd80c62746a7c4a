use serde_json::{Map, Number, Value as Json};

use super::ValueAdapter;
use crate::value::{time, AdaptedList, AdaptedMap, CelError, CelResult, CelVal};
use cel_eval_common::CelType;

/// Adapter for plain host data, represented as JSON values.
///
/// Arrays become `list(dyn)` and objects `map(string, dyn)`, both read
/// lazily. On the way back, values follow the protobuf JSON mapping:
/// timestamps and durations become strings, bytes an array of octets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAdapter;

impl ValueAdapter for NativeAdapter {
    type Native = Json;

    fn to_cel(&self, id: i64, native: &Json) -> CelResult {
        Ok(match native {
            Json::Null => CelVal::Null,
            Json::Bool(b) => CelVal::Bool(*b),
            Json::Number(n) => number_to_cel(n),
            Json::String(s) => CelVal::string(s.as_str()),
            Json::Array(items) => {
                CelVal::List(AdaptedList::new(*self, items.clone()).into_list(CelType::dyn_list()))
            }
            Json::Object(fields) => {
                let entries = fields
                    .iter()
                    .map(|(k, v)| (Json::String(k.clone()), v.clone()))
                    .collect();
                CelVal::Map(AdaptedMap::try_new(id, *self, entries)?.into_map(CelType::json_object()))
            }
        })
    }

    fn from_cel(&self, id: i64, val: &CelVal) -> CelResult<Json> {
        Ok(match val {
            CelVal::Null | CelVal::TypedNull(_) => Json::Null,
            CelVal::Bool(b) => Json::Bool(*b),
            CelVal::Int(i) => Json::from(*i),
            CelVal::UInt(u) => Json::from(u.0),
            CelVal::Double(d) => match Number::from_f64(*d) {
                Some(n) => Json::Number(n),
                None => {
                    return Err(CelError::invalid_argument(id, "json", format!("{} is not representable", d)).into())
                }
            },
            CelVal::String(s) => Json::String(s.to_string()),
            CelVal::Bytes(b) => Json::Array(b.iter().map(|&o| Json::from(o)).collect()),
            CelVal::Timestamp(t) => Json::String(time::format_timestamp(t)),
            CelVal::Duration(d) => Json::String(time::format_duration(d)),
            CelVal::Wrapped(w) => self.from_cel(id, &w.clone().into_inner())?,
            CelVal::List(l) => Json::Array(
                l.values(id)?
                    .iter()
                    .map(|v| self.from_cel(id, v))
                    .collect::<CelResult<_>>()?,
            ),
            CelVal::Map(m) => {
                let mut out = Map::new();
                for (k, v) in m.entries(id)? {
                    out.insert(json_key(id, &k)?, self.from_cel(id, &v)?);
                }
                Json::Object(out)
            }
            CelVal::Object(o) => {
                let mut out = Map::new();
                for name in o.field_names() {
                    if o.is_set(id, &name)? {
                        out.insert(name.clone(), self.from_cel(id, &o.get(id, &name)?)?);
                    }
                }
                Json::Object(out)
            }
            CelVal::Type(t) => Json::String(t.fullname()),
        })
    }
}

fn number_to_cel(n: &Number) -> CelVal {
    if let Some(i) = n.as_i64() {
        CelVal::Int(i)
    } else if let Some(u) = n.as_u64() {
        CelVal::uint(u)
    } else {
        CelVal::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// JSON object keys are strings; other scalar keys are stringified.
fn json_key(id: i64, key: &CelVal) -> CelResult<String> {
    match key {
        CelVal::String(s) => Ok(s.to_string()),
        CelVal::Int(i) => Ok(i.to_string()),
        CelVal::UInt(u) => Ok(u.0.to_string()),
        CelVal::Bool(b) => Ok(b.to_string()),
        other => Err(CelError::type_mismatch(id, "string", &other.cel_type()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(v: Json) -> Json {
        let a = NativeAdapter;
        a.from_cel(1, &a.to_cel(1, &v).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        for v in [
            json!(null),
            json!(true),
            json!(-3),
            json!(u64::MAX),
            json!(1.5),
            json!("hi"),
            json!([]),
            json!([1, "a", [false]]),
            json!({}),
            json!({"a": {"b": [1, 2]}}),
        ] {
            assert_eq!(round_trip(v.clone()), v);
        }
    }

    #[test]
    fn test_numbers_keep_their_kind() {
        let a = NativeAdapter;
        assert_eq!(a.to_cel(1, &json!(7)).unwrap().cel_type(), CelType::Int);
        assert_eq!(a.to_cel(1, &json!(u64::MAX)).unwrap().cel_type(), CelType::UInt);
        assert_eq!(a.to_cel(1, &json!(2.0)).unwrap().cel_type(), CelType::Double);
    }

    #[test]
    fn test_object_is_string_keyed_map() {
        let m = NativeAdapter.to_cel(1, &json!({"k": 1})).unwrap();
        assert_eq!(m.cel_type().fullname(), "map(string, dyn)");
        let m = m.as_map().unwrap().clone();
        assert_eq!(m.get(1, &CelVal::from("k")).unwrap(), Some(CelVal::Int(1)));
    }

    #[test]
    fn test_nan_is_rejected() {
        assert!(NativeAdapter.from_cel(3, &CelVal::Double(f64::NAN)).is_err());
    }

    #[test]
    fn test_same_adapter_lists_compare_elementwise() {
        let a = NativeAdapter;
        assert!(a.equals(&json!([1, 2.0]), &json!([1.0, 2])));
        assert!(!a.equals(&json!({"a": 1}), &json!({"a": 2})));
    }
}
