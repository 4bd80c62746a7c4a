//! Reflection adapter over registered protobuf messages.
//!
//! Messages are read field by field through their descriptors. Well-known
//! types collapse to CEL scalars on read: wrappers become `Wrapped`
//! (32-bit and float widened), Timestamp and Duration become time values,
//! `Value`/`Struct`/`ListValue` become JSON-shaped values and `Any` is
//! unpacked through the registry.

use std::sync::Arc;

use cel_eval_common::{proto_message_to_cel_type, CelType, ProtoTypeRegistry};
use prost::bytes::Bytes;
use prost::Message;
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MapKey as ProtoMapKey, MessageDescriptor, ReflectMessage,
    Value,
};
use tracing::debug;

use super::ValueAdapter;
use crate::provider::{EmptyProvider, ValueProvider};
use crate::value::{
    coerce_to_bool, coerce_to_bytes, coerce_to_f64, coerce_to_i64, coerce_to_string,
    coerce_to_u64, AdaptedList, AdaptedMap, AdaptedObject, CelError, CelResult, CelVal, Duration,
    Timestamp, Wrapper,
};

const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Adapter over `prost_reflect::Value`, backed by a type registry.
#[derive(Debug, Clone)]
pub struct ProtoAdapter {
    registry: ProtoTypeRegistry,
}

fn decode_error(id: i64, e: impl std::fmt::Display) -> CelError {
    CelError::invalid_argument(id, "decode", e)
}

fn set_error(id: i64, desc: &MessageDescriptor, val: &CelVal) -> CelError {
    CelError::type_mismatch(id, desc.full_name(), &val.cel_type())
}

/// Read a wrapper message's `value` field, widening to 64 bits.
fn read_wrapper(name: &str, inner: &Value) -> Option<Wrapper> {
    Some(match name {
        "google.protobuf.BoolValue" => Wrapper::Bool(inner.as_bool()?),
        "google.protobuf.Int32Value" => Wrapper::Int(inner.as_i32()?.into()),
        "google.protobuf.Int64Value" => Wrapper::Int(inner.as_i64()?),
        "google.protobuf.UInt32Value" => Wrapper::UInt(inner.as_u32()?.into()),
        "google.protobuf.UInt64Value" => Wrapper::UInt(inner.as_u64()?),
        "google.protobuf.FloatValue" => Wrapper::Double(inner.as_f32()?.into()),
        "google.protobuf.DoubleValue" => Wrapper::Double(inner.as_f64()?),
        "google.protobuf.StringValue" => Wrapper::String(Arc::from(inner.as_str()?)),
        "google.protobuf.BytesValue" => Wrapper::Bytes(Arc::from(&inner.as_bytes()?[..])),
        _ => return None,
    })
}

fn map_key_to_value(key: &ProtoMapKey) -> Value {
    match key {
        ProtoMapKey::Bool(b) => Value::Bool(*b),
        ProtoMapKey::I32(i) => Value::I32(*i),
        ProtoMapKey::I64(i) => Value::I64(*i),
        ProtoMapKey::U32(u) => Value::U32(*u),
        ProtoMapKey::U64(u) => Value::U64(*u),
        ProtoMapKey::String(s) => Value::String(s.clone()),
    }
}

fn narrow_i32(id: i64, v: i64) -> CelResult<i32> {
    i32::try_from(v).map_err(|_| CelError::overflow(id, "conversion", &CelType::Int).into())
}

fn narrow_u32(id: i64, v: u64) -> CelResult<u32> {
    u32::try_from(v).map_err(|_| CelError::overflow(id, "conversion", &CelType::UInt).into())
}

impl ProtoAdapter {
    pub fn new(registry: ProtoTypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProtoTypeRegistry {
        &self.registry
    }

    fn descriptor(&self, id: i64, name: &str) -> CelResult<MessageDescriptor> {
        self.registry
            .get_message(name)
            .ok_or_else(|| CelError::type_not_found(id, name).into())
    }

    // ==================== Read Path ====================

    /// Convert a message to CEL, collapsing well-known types.
    pub fn message_to_cel(&self, id: i64, msg: &DynamicMessage) -> CelResult {
        let desc = msg.descriptor();
        let name = desc.full_name();
        match name {
            "google.protobuf.Any" => {
                let any: prost_types::Any = msg.transcode_to().map_err(|e| decode_error(id, e))?;
                self.unpack_any(id, &any.type_url, &any.value)
            }
            "google.protobuf.Timestamp" => {
                let ts: prost_types::Timestamp =
                    msg.transcode_to().map_err(|e| decode_error(id, e))?;
                Ok(CelVal::Timestamp(Timestamp::normalize(id, ts.seconds, ts.nanos.into())?))
            }
            "google.protobuf.Duration" => {
                let d: prost_types::Duration =
                    msg.transcode_to().map_err(|e| decode_error(id, e))?;
                Ok(CelVal::Duration(Duration::normalize(id, d.seconds, d.nanos.into())?))
            }
            "google.protobuf.Value" => self.json_value_to_cel(id, msg),
            "google.protobuf.Struct" => match msg.get_field_by_name("fields") {
                Some(fields) => match fields.as_map() {
                    Some(map) => self.map_to_cel(id, map, CelType::json_object()),
                    None => Err(set_error(id, &desc, &CelVal::Null).into()),
                },
                None => Ok(CelVal::Map(
                    AdaptedMap::try_new(id, self.clone(), Vec::new())?.into_map(CelType::json_object()),
                )),
            },
            "google.protobuf.ListValue" => {
                let values = msg
                    .get_field_by_name("values")
                    .and_then(|v| v.as_list().map(<[Value]>::to_vec))
                    .unwrap_or_default();
                Ok(CelVal::List(AdaptedList::new(self.clone(), values).into_list(CelType::dyn_list())))
            }
            _ => {
                if let Some(inner) = msg.get_field_by_name("value") {
                    if let Some(w) = read_wrapper(name, &inner) {
                        return Ok(CelVal::Wrapped(w));
                    }
                }
                Ok(CelVal::Object(
                    AdaptedObject::new(self.clone(), Value::Message(msg.clone()))
                        .into_object(CelType::message(name)),
                ))
            }
        }
    }

    /// Unpack an `Any` payload through the registry.
    pub fn unpack_any(&self, id: i64, type_url: &str, bytes: &[u8]) -> CelResult {
        if type_url.is_empty() {
            return Err(CelError::any_empty_type_url(id).into());
        }
        let name = type_url.rsplit('/').next().unwrap_or(type_url);
        let Some(desc) = self.registry.get_message(name) else {
            debug!(id, type_url, "any payload type not in registry");
            return Err(CelError::any_not_in_registry(id, type_url).into());
        };
        let msg = DynamicMessage::decode(desc, bytes).map_err(|e| decode_error(id, e))?;
        self.message_to_cel(id, &msg)
    }

    fn json_value_to_cel(&self, id: i64, msg: &DynamicMessage) -> CelResult {
        for (field, value) in msg.fields() {
            return match field.name() {
                "null_value" => Ok(CelVal::Null),
                "number_value" => Ok(CelVal::Double(value.as_f64().unwrap_or_default())),
                "string_value" => Ok(CelVal::string(value.as_str().unwrap_or_default())),
                "bool_value" => Ok(CelVal::Bool(value.as_bool().unwrap_or_default())),
                "struct_value" | "list_value" => self.to_cel(id, value),
                _ => continue,
            };
        }
        Ok(CelVal::Null)
    }

    fn map_to_cel(
        &self,
        id: i64,
        map: &std::collections::HashMap<ProtoMapKey, Value>,
        ty: CelType,
    ) -> CelResult {
        let mut entries: Vec<(&ProtoMapKey, &Value)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let entries = entries
            .into_iter()
            .map(|(k, v)| (map_key_to_value(k), v.clone()))
            .collect();
        Ok(CelVal::Map(AdaptedMap::try_new(id, self.clone(), entries)?.into_map(ty)))
    }

    fn field_to_cel(&self, id: i64, msg: &DynamicMessage, field: &FieldDescriptor) -> CelResult {
        let value = msg.get_field(field);
        if field.is_map() {
            return match value.as_map() {
                Some(map) => self.map_to_cel(id, map, self.registry.field_type(field)),
                None => Err(CelError::type_mismatch(id, "map", &CelType::Dyn).into()),
            };
        }
        if field.is_list() {
            let items = value.as_list().map(<[Value]>::to_vec).unwrap_or_default();
            return Ok(CelVal::List(
                AdaptedList::new(self.clone(), items).into_list(self.registry.field_type(field)),
            ));
        }
        if let Kind::Message(desc) = field.kind() {
            if !msg.has_field(field) {
                return Ok(CelVal::typed_null(desc.full_name(), self.zero_value(id, &desc)?));
            }
        }
        self.to_cel(id, &value)
    }

    /// The value an unset field of message type `desc` stands for.
    fn zero_value(&self, id: i64, desc: &MessageDescriptor) -> CelResult {
        let name = desc.full_name();
        Ok(match name {
            "google.protobuf.Timestamp" => CelVal::Timestamp(Timestamp::default()),
            "google.protobuf.Duration" => CelVal::Duration(Duration::default()),
            "google.protobuf.Value" | "google.protobuf.Any" => CelVal::Null,
            "google.protobuf.BoolValue" => CelVal::Wrapped(Wrapper::Bool(false)),
            "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => {
                CelVal::Wrapped(Wrapper::Int(0))
            }
            "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
                CelVal::Wrapped(Wrapper::UInt(0))
            }
            "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
                CelVal::Wrapped(Wrapper::Double(0.0))
            }
            "google.protobuf.StringValue" => CelVal::Wrapped(Wrapper::String(Arc::from(""))),
            "google.protobuf.BytesValue" => CelVal::Wrapped(Wrapper::Bytes(Arc::from(&[][..]))),
            _ => self.message_to_cel(id, &DynamicMessage::new(desc.clone()))?,
        })
    }

    // ==================== Write Path ====================

    /// Build a message of type `desc` from the fields of a struct literal.
    ///
    /// Null fields are left unset. Unknown field names are errors.
    pub fn message_from_fields(
        &self,
        id: i64,
        desc: &MessageDescriptor,
        fields: &[(String, CelVal)],
    ) -> CelResult<DynamicMessage> {
        let mut msg = DynamicMessage::new(desc.clone());
        for (name, val) in fields {
            let field = desc
                .get_field_by_name(name)
                .ok_or_else(|| CelError::field_not_found(id, name, Some(desc.full_name())))?;
            if val.is_null() {
                continue;
            }
            let value = self.field_from_cel(id, &field, val)?;
            msg.try_set_field(&field, value)
                .map_err(|_| set_error(id, desc, val))?;
        }
        Ok(msg)
    }

    fn field_from_cel(&self, id: i64, field: &FieldDescriptor, val: &CelVal) -> CelResult<Value> {
        let kind = field.kind();
        if field.is_map() {
            let (Kind::Message(entry), CelVal::Map(map)) = (&kind, val) else {
                return Err(CelError::type_mismatch(id, "map", &val.cel_type()).into());
            };
            let key_kind = entry.map_entry_key_field().kind();
            let value_kind = entry.map_entry_value_field().kind();
            let mut out = std::collections::HashMap::new();
            for (k, v) in map.entries(id)? {
                out.insert(
                    self.map_key_from_cel(id, &key_kind, &k)?,
                    self.kind_from_cel(id, &value_kind, &v)?,
                );
            }
            return Ok(Value::Map(out));
        }
        if field.is_list() {
            let CelVal::List(list) = val else {
                return Err(CelError::type_mismatch(id, "list", &val.cel_type()).into());
            };
            return Ok(Value::List(
                list.values(id)?
                    .iter()
                    .map(|v| self.kind_from_cel(id, &kind, v))
                    .collect::<CelResult<_>>()?,
            ));
        }
        self.kind_from_cel(id, &kind, val)
    }

    fn map_key_from_cel(&self, id: i64, kind: &Kind, key: &CelVal) -> CelResult<ProtoMapKey> {
        let key = Some(key);
        Ok(match kind {
            Kind::Bool => ProtoMapKey::Bool(coerce_to_bool(id, key)?),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
                ProtoMapKey::I32(narrow_i32(id, coerce_to_i64(id, key)?)?)
            }
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => ProtoMapKey::I64(coerce_to_i64(id, key)?),
            Kind::Uint32 | Kind::Fixed32 => ProtoMapKey::U32(narrow_u32(id, coerce_to_u64(id, key)?)?),
            Kind::Uint64 | Kind::Fixed64 => ProtoMapKey::U64(coerce_to_u64(id, key)?),
            _ => ProtoMapKey::String(coerce_to_string(id, key)?),
        })
    }

    fn kind_from_cel(&self, id: i64, kind: &Kind, val: &CelVal) -> CelResult<Value> {
        let v = Some(val);
        Ok(match kind {
            Kind::Double => Value::F64(coerce_to_f64(id, v)?),
            Kind::Float => Value::F32(coerce_to_f64(id, v)? as f32),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
                Value::I32(narrow_i32(id, coerce_to_i64(id, v)?)?)
            }
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(coerce_to_i64(id, v)?),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(narrow_u32(id, coerce_to_u64(id, v)?)?),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(coerce_to_u64(id, v)?),
            Kind::Bool => Value::Bool(coerce_to_bool(id, v)?),
            Kind::String => Value::String(coerce_to_string(id, v)?),
            Kind::Bytes => Value::Bytes(Bytes::from(coerce_to_bytes(id, v)?)),
            Kind::Enum(_) => Value::EnumNumber(narrow_i32(id, coerce_to_i64(id, v)?)?),
            Kind::Message(desc) => Value::Message(self.message_from_cel(id, desc, val)?),
        })
    }

    /// Convert a CEL value into a message of type `desc`.
    pub fn message_from_cel(
        &self,
        id: i64,
        desc: &MessageDescriptor,
        val: &CelVal,
    ) -> CelResult<DynamicMessage> {
        let mut msg = DynamicMessage::new(desc.clone());
        let name = desc.full_name();
        let set = |msg: &mut DynamicMessage, field: &str, value: Value| {
            msg.try_set_field_by_name(field, value)
                .map_err(|_| set_error(id, desc, val))
        };
        match name {
            "google.protobuf.Timestamp" => {
                let CelVal::Timestamp(ts) = val else {
                    return Err(set_error(id, desc, val).into());
                };
                set(&mut msg, "seconds", Value::I64(ts.seconds))?;
                set(&mut msg, "nanos", Value::I32(ts.nanos))?;
            }
            "google.protobuf.Duration" => {
                let CelVal::Duration(d) = val else {
                    return Err(set_error(id, desc, val).into());
                };
                set(&mut msg, "seconds", Value::I64(d.seconds))?;
                set(&mut msg, "nanos", Value::I32(d.nanos))?;
            }
            "google.protobuf.Any" => {
                let packed = self.to_message(id, val)?;
                set(
                    &mut msg,
                    "type_url",
                    Value::String(format!("{}{}", TYPE_URL_PREFIX, packed.descriptor().full_name())),
                )?;
                set(&mut msg, "value", Value::Bytes(Bytes::from(packed.encode_to_vec())))?;
            }
            "google.protobuf.Value" => return self.json_value_from_cel(id, desc, val),
            "google.protobuf.Struct" => {
                let CelVal::Map(map) = val else {
                    return Err(set_error(id, desc, val).into());
                };
                let value_desc = self.descriptor(id, "google.protobuf.Value")?;
                let mut fields = std::collections::HashMap::new();
                for (k, v) in map.entries(id)? {
                    let CelVal::String(k) = k else {
                        return Err(CelError::type_mismatch(id, "string", &k.cel_type()).into());
                    };
                    fields.insert(
                        ProtoMapKey::String(k.to_string()),
                        Value::Message(self.json_value_from_cel(id, &value_desc, &v)?),
                    );
                }
                set(&mut msg, "fields", Value::Map(fields))?;
            }
            "google.protobuf.ListValue" => {
                let CelVal::List(list) = val else {
                    return Err(set_error(id, desc, val).into());
                };
                let value_desc = self.descriptor(id, "google.protobuf.Value")?;
                let values = list
                    .values(id)?
                    .iter()
                    .map(|v| Ok(Value::Message(self.json_value_from_cel(id, &value_desc, v)?)))
                    .collect::<CelResult<_>>()?;
                set(&mut msg, "values", Value::List(values))?;
            }
            "google.protobuf.BoolValue" => set(&mut msg, "value", Value::Bool(coerce_to_bool(id, Some(val))?))?,
            "google.protobuf.Int32Value" => set(
                &mut msg,
                "value",
                Value::I32(narrow_i32(id, coerce_to_i64(id, Some(val))?)?),
            )?,
            "google.protobuf.Int64Value" => set(&mut msg, "value", Value::I64(coerce_to_i64(id, Some(val))?))?,
            "google.protobuf.UInt32Value" => set(
                &mut msg,
                "value",
                Value::U32(narrow_u32(id, coerce_to_u64(id, Some(val))?)?),
            )?,
            "google.protobuf.UInt64Value" => set(&mut msg, "value", Value::U64(coerce_to_u64(id, Some(val))?))?,
            "google.protobuf.FloatValue" => {
                set(&mut msg, "value", Value::F32(coerce_to_f64(id, Some(val))? as f32))?
            }
            "google.protobuf.DoubleValue" => set(&mut msg, "value", Value::F64(coerce_to_f64(id, Some(val))?))?,
            "google.protobuf.StringValue" => {
                set(&mut msg, "value", Value::String(coerce_to_string(id, Some(val))?))?
            }
            "google.protobuf.BytesValue" => set(
                &mut msg,
                "value",
                Value::Bytes(Bytes::from(coerce_to_bytes(id, Some(val))?)),
            )?,
            _ => {
                let existing = proto_object(val).filter(|m| m.descriptor() == *desc);
                return existing.cloned().ok_or_else(|| set_error(id, desc, val).into());
            }
        }
        Ok(msg)
    }

    fn json_value_from_cel(
        &self,
        id: i64,
        desc: &MessageDescriptor,
        val: &CelVal,
    ) -> CelResult<DynamicMessage> {
        let mut msg = DynamicMessage::new(desc.clone());
        let (field, value) = match val.clone().unwrapped() {
            CelVal::Null | CelVal::TypedNull(_) => ("null_value", Value::EnumNumber(0)),
            CelVal::Bool(b) => ("bool_value", Value::Bool(b)),
            CelVal::Int(_) | CelVal::UInt(_) | CelVal::Double(_) => {
                ("number_value", Value::F64(coerce_to_f64(id, Some(val))?))
            }
            CelVal::String(s) => ("string_value", Value::String(s.to_string())),
            CelVal::Timestamp(t) => (
                "string_value",
                Value::String(crate::value::time::format_timestamp(&t)),
            ),
            CelVal::Duration(d) => (
                "string_value",
                Value::String(crate::value::time::format_duration(&d)),
            ),
            list @ CelVal::List(_) => {
                let desc = self.descriptor(id, "google.protobuf.ListValue")?;
                ("list_value", Value::Message(self.message_from_cel(id, &desc, &list)?))
            }
            map @ CelVal::Map(_) => {
                let desc = self.descriptor(id, "google.protobuf.Struct")?;
                ("struct_value", Value::Message(self.message_from_cel(id, &desc, &map)?))
            }
            other => return Err(set_error(id, desc, &other).into()),
        };
        msg.try_set_field_by_name(field, value)
            .map_err(|_| set_error(id, desc, val))?;
        Ok(msg)
    }

    /// The message a CEL value naturally packs into, for `Any` fields.
    fn to_message(&self, id: i64, val: &CelVal) -> CelResult<DynamicMessage> {
        let name = match val {
            CelVal::Object(_) => {
                return proto_object(val)
                    .cloned()
                    .ok_or_else(|| CelError::type_mismatch(id, "message", &val.cel_type()).into())
            }
            CelVal::Timestamp(_) => "google.protobuf.Timestamp",
            CelVal::Duration(_) => "google.protobuf.Duration",
            CelVal::Wrapped(w) => w.message_name(),
            CelVal::Bool(_) => "google.protobuf.BoolValue",
            CelVal::Int(_) => "google.protobuf.Int64Value",
            CelVal::UInt(_) => "google.protobuf.UInt64Value",
            CelVal::Double(_) => "google.protobuf.DoubleValue",
            CelVal::String(_) => "google.protobuf.StringValue",
            CelVal::Bytes(_) => "google.protobuf.BytesValue",
            CelVal::List(_) => "google.protobuf.ListValue",
            CelVal::Map(_) => "google.protobuf.Struct",
            _ => "google.protobuf.Value",
        };
        let desc = self.descriptor(id, name)?;
        self.message_from_cel(id, &desc, val)
    }
}

/// The message behind a CEL object, when that object was read by this adapter.
fn proto_object(val: &CelVal) -> Option<&DynamicMessage> {
    let CelVal::Object(obj) = val else {
        return None;
    };
    obj.backing()
        .as_any()
        .downcast_ref::<AdaptedObject<ProtoAdapter>>()
        .and_then(|o| o.value().as_message())
}

impl ValueAdapter for ProtoAdapter {
    type Native = Value;

    fn to_cel(&self, id: i64, native: &Value) -> CelResult {
        Ok(match native {
            Value::Bool(b) => CelVal::Bool(*b),
            Value::I32(i) => CelVal::Int((*i).into()),
            Value::I64(i) => CelVal::Int(*i),
            Value::U32(u) => CelVal::uint((*u).into()),
            Value::U64(u) => CelVal::uint(*u),
            Value::F32(f) => CelVal::Double((*f).into()),
            Value::F64(f) => CelVal::Double(*f),
            Value::String(s) => CelVal::string(s.as_str()),
            Value::Bytes(b) => CelVal::bytes(&b[..]),
            Value::EnumNumber(n) => CelVal::Int((*n).into()),
            Value::Message(msg) => return self.message_to_cel(id, msg),
            Value::List(items) => {
                CelVal::List(AdaptedList::new(self.clone(), items.clone()).into_list(CelType::dyn_list()))
            }
            Value::Map(map) => return self.map_to_cel(id, map, CelType::dyn_map()),
        })
    }

    fn from_cel(&self, id: i64, val: &CelVal) -> CelResult<Value> {
        Ok(match val {
            CelVal::Bool(b) => Value::Bool(*b),
            CelVal::Int(i) => Value::I64(*i),
            CelVal::UInt(u) => Value::U64(u.0),
            CelVal::Double(d) => Value::F64(*d),
            CelVal::String(s) => Value::String(s.to_string()),
            CelVal::Bytes(b) => Value::Bytes(Bytes::copy_from_slice(b)),
            CelVal::Wrapped(w) => return self.from_cel(id, &w.clone().into_inner()),
            CelVal::List(l) => Value::List(
                l.values(id)?
                    .iter()
                    .map(|v| self.from_cel(id, v))
                    .collect::<CelResult<_>>()?,
            ),
            _ => Value::Message(self.to_message(id, val)?),
        })
    }

    fn access_by_name(&self, id: i64, obj: &Value, name: &str) -> Option<CelResult> {
        let msg = obj.as_message()?;
        let field = msg.descriptor().get_field_by_name(name)?;
        Some(self.field_to_cel(id, msg, &field))
    }

    fn is_set_by_name(&self, id: i64, obj: &Value, name: &str) -> CelResult<bool> {
        let Some(msg) = obj.as_message() else {
            return Ok(false);
        };
        let desc = msg.descriptor();
        match desc.get_field_by_name(name) {
            Some(field) => Ok(msg.has_field(&field)),
            None => Err(CelError::field_not_found(id, name, Some(desc.full_name())).into()),
        }
    }

    fn get_fields(&self, obj: &Value) -> Vec<String> {
        obj.as_message()
            .map(|m| m.descriptor().fields().map(|f| f.name().to_string()).collect())
            .unwrap_or_default()
    }
}

// ==================== Provider ====================

/// Value provider backed by a protobuf registry: message construction,
/// message types and enum constants.
#[derive(Debug, Clone)]
pub struct ProtoProvider {
    adapter: ProtoAdapter,
}

impl ProtoProvider {
    pub fn new(adapter: ProtoAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &ProtoAdapter {
        &self.adapter
    }
}

impl ValueProvider for ProtoProvider {
    fn new_value(&self, id: i64, type_name: &str, fields: &[(String, CelVal)]) -> Option<CelResult> {
        if let Some(result) = EmptyProvider.new_value(id, type_name, fields) {
            return Some(result);
        }
        let desc = self.adapter.registry.get_message(type_name)?;
        if type_name == "google.protobuf.Any" {
            let url = fields.iter().find(|(n, _)| n == "type_url").map(|(_, v)| v);
            let bytes = fields.iter().find(|(n, _)| n == "value").map(|(_, v)| v);
            return Some(coerce_to_string(id, url).and_then(|url| {
                let bytes = coerce_to_bytes(id, bytes)?;
                self.adapter.unpack_any(id, &url, &bytes)
            }));
        }
        Some(
            self.adapter
                .message_from_fields(id, &desc, fields)
                .and_then(|msg| self.adapter.message_to_cel(id, &msg)),
        )
    }

    fn find_type(&self, name: &str) -> Option<CelType> {
        EmptyProvider.find_type(name).or_else(|| {
            self.adapter
                .registry
                .get_message(name)
                .map(|desc| proto_message_to_cel_type(desc.full_name()))
        })
    }

    fn find_ident(&self, id: i64, name: &str) -> Option<CelResult> {
        if let Some(n) = self.adapter.registry.resolve_enum_constant(name) {
            return Some(Ok(CelVal::Int(n.into())));
        }
        self.find_type(name)
            .map(|t| Ok(CelVal::Type(t)))
            .or_else(|| EmptyProvider.find_ident(id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ErrorKind;
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MessageOptions};

    fn field(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            type_name: type_name.map(String::from),
            json_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// `test.Inner{int32 n; string s}` and `test.Outer{Inner inner; Int32Value w;
    /// repeated uint32 ids; map<string, int64> counts; Any payload}`.
    fn registry() -> ProtoTypeRegistry {
        let mut repeated = field("ids", 3, Type::Uint32, None);
        repeated.label = Some(Label::Repeated as i32);
        let mut counts = field("counts", 4, Type::Message, Some(".test.Outer.CountsEntry"));
        counts.label = Some(Label::Repeated as i32);
        let entry = DescriptorProto {
            name: Some("CountsEntry".into()),
            field: vec![
                field("key", 1, Type::String, None),
                field("value", 2, Type::Int64, None),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("test.proto".into()),
            package: Some("test".into()),
            dependency: vec![
                "google/protobuf/wrappers.proto".into(),
                "google/protobuf/any.proto".into(),
            ],
            syntax: Some("proto3".into()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Inner".into()),
                    field: vec![
                        field("n", 1, Type::Int32, None),
                        field("s", 2, Type::String, None),
                    ],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Outer".into()),
                    field: vec![
                        field("inner", 1, Type::Message, Some(".test.Inner")),
                        field("w", 2, Type::Message, Some(".google.protobuf.Int32Value")),
                        repeated,
                        counts,
                        field("payload", 5, Type::Message, Some(".google.protobuf.Any")),
                    ],
                    nested_type: vec![entry],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut pool = DescriptorPool::global();
        pool.add_file_descriptor_proto(file).unwrap();
        ProtoTypeRegistry::from_pool(pool)
    }

    fn outer(adapter: &ProtoAdapter, fields: &[(&str, CelVal)]) -> CelVal {
        let desc = adapter.registry().get_message("test.Outer").unwrap();
        let fields: Vec<(String, CelVal)> =
            fields.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
        let msg = adapter.message_from_fields(1, &desc, &fields).unwrap();
        adapter.message_to_cel(1, &msg).unwrap()
    }

    fn get(obj: &CelVal, name: &str) -> CelResult {
        match obj {
            CelVal::Object(o) => o.get(2, name),
            other => panic!("not an object: {:?}", other),
        }
    }

    #[test]
    fn test_unset_message_field_is_typed_null() {
        let adapter = ProtoAdapter::new(registry());
        let obj = outer(&adapter, &[]);
        let inner = get(&obj, "inner").unwrap();
        assert!(inner.is_null());
        assert_eq!(inner.cel_type(), CelType::message("test.Inner"));
        let w = get(&obj, "w").unwrap();
        assert_eq!(w.cel_type(), CelType::wrapper(CelType::Int));
    }

    #[test]
    fn test_unknown_field_names_the_type() {
        let adapter = ProtoAdapter::new(registry());
        let obj = outer(&adapter, &[]);
        let err = get(&obj, "nope").unwrap_err();
        assert_eq!(err.as_error().unwrap().message, "field not found: nope in test.Outer");
    }

    #[test]
    fn test_scalars_are_widened() {
        let adapter = ProtoAdapter::new(registry());
        let obj = outer(
            &adapter,
            &[
                ("w", CelVal::Int(7)),
                ("ids", CelVal::list(vec![CelVal::uint(1), CelVal::uint(2)])),
            ],
        );
        assert_eq!(get(&obj, "w").unwrap(), CelVal::Wrapped(Wrapper::Int(7)));
        let ids = get(&obj, "ids").unwrap();
        assert_eq!(ids.cel_type().fullname(), "list(uint)");
        assert_eq!(ids.as_list().unwrap().values(1).unwrap(), vec![CelVal::uint(1), CelVal::uint(2)]);
    }

    #[test]
    fn test_map_field_is_typed() {
        let adapter = ProtoAdapter::new(registry());
        let counts = CelVal::map(1, vec![(CelVal::from("a"), CelVal::Int(3))]).unwrap();
        let obj = outer(&adapter, &[("counts", counts)]);
        let m = get(&obj, "counts").unwrap();
        assert_eq!(m.cel_type().fullname(), "map(string, int)");
        assert_eq!(m.as_map().unwrap().get(1, &CelVal::from("a")).unwrap(), Some(CelVal::Int(3)));
    }

    #[test]
    fn test_nested_message_round_trip_through_any() {
        let adapter = ProtoAdapter::new(registry());
        let provider = ProtoProvider::new(adapter.clone());
        let inner = provider
            .new_value(1, "test.Inner", &[("n".to_string(), CelVal::Int(5))])
            .unwrap()
            .unwrap();
        let obj = outer(&adapter, &[("payload", inner.clone()), ("inner", inner.clone())]);
        assert_eq!(get(&obj, "payload").unwrap(), inner);
        assert_eq!(get(&obj, "inner").unwrap(), inner);
        assert_eq!(get(&get(&obj, "inner").unwrap(), "n").unwrap(), CelVal::Int(5));
    }

    #[test]
    fn test_unknown_literal_field_rejected() {
        let adapter = ProtoAdapter::new(registry());
        let provider = ProtoProvider::new(adapter);
        let err = provider
            .new_value(3, "test.Inner", &[("bogus".to_string(), CelVal::Int(5))])
            .unwrap()
            .unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, ErrorKind::FieldNotFound);
    }

    #[test]
    fn test_any_errors() {
        let adapter = ProtoAdapter::new(registry());
        let err = adapter.unpack_any(9, "", &[]).unwrap_err();
        assert_eq!(err.as_error().unwrap().message, "Unpack Any failed: invalid empty type_url");
        let err = adapter.unpack_any(9, "type.googleapis.com/x.Y", &[]).unwrap_err();
        let err = err.as_error().unwrap();
        assert_eq!(err.id, 9);
        assert_eq!(err.message, "Unpack Any failed: type_url type.googleapis.com/x.Y not in registry");
    }

    #[test]
    fn test_enum_constants_and_types() {
        let provider = ProtoProvider::new(ProtoAdapter::new(registry()));
        assert_eq!(provider.find_type("test.Inner"), Some(CelType::message("test.Inner")));
        assert_eq!(
            provider.find_type("google.protobuf.Int32Value"),
            Some(CelType::wrapper(CelType::Int))
        );
        assert!(provider.find_ident(1, "test.Missing").is_none());
    }

    #[test]
    fn test_struct_value_reads_as_json_map() {
        let adapter = ProtoAdapter::new(registry());
        let desc = adapter.registry().get_message("google.protobuf.Struct").unwrap();
        let map = CelVal::map(1, vec![(CelVal::from("a"), CelVal::Double(1.5))]).unwrap();
        let msg = adapter.message_from_cel(1, &desc, &map).unwrap();
        let back = adapter.message_to_cel(1, &msg).unwrap();
        assert_eq!(back.cel_type().fullname(), "map(string, dyn)");
        assert_eq!(back, map);
    }
}
