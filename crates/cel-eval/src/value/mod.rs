//! The runtime value domain.
//!
//! `CelVal` is a closed sum over every value an expression can produce.
//! Containers (`CelList`, `CelMap`, `CelObject`) pair host data with the
//! adapter that interprets it, so a list of proto messages stays a list of
//! proto messages until an element is actually read.

use std::fmt;
use std::sync::Arc;

use cel_eval_common::{CelType, CelValue};

mod coerce;
mod container;
mod error;
pub mod time;

pub(crate) use coerce::{I64_BOUND, U64_BOUND};
pub use coerce::{coerce_to_bool, coerce_to_bytes, coerce_to_f64, coerce_to_i64, coerce_to_string, coerce_to_u64};
pub use container::{
    AdaptedList, AdaptedMap, AdaptedObject, CelList, CelMap, CelObject, ListItems, MapEntries,
    MapKey, StructFields,
};
pub use error::{coerce_to_values, merge_faults, CelError, CelResult, CelUnknown, ErrorKind, Fault};
pub use time::{Duration, Timestamp};

use crate::adapter::{CelAdapter, ValueAdapter};

/// An unsigned 64-bit integer, kept distinct from `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CelUint(pub u64);

/// A protobuf wrapper message (`google.protobuf.Int64Value` and friends)
/// holding a scalar. 32-bit and float wrappers are widened on read.
#[derive(Debug, Clone, PartialEq)]
pub enum Wrapper {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl Wrapper {
    /// The bare scalar inside the wrapper.
    pub fn into_inner(self) -> CelVal {
        match self {
            Wrapper::Bool(v) => CelVal::Bool(v),
            Wrapper::Int(v) => CelVal::Int(v),
            Wrapper::UInt(v) => CelVal::UInt(CelUint(v)),
            Wrapper::Double(v) => CelVal::Double(v),
            Wrapper::String(v) => CelVal::String(v),
            Wrapper::Bytes(v) => CelVal::Bytes(v),
        }
    }

    pub fn cel_type(&self) -> CelType {
        let inner = match self {
            Wrapper::Bool(_) => CelType::Bool,
            Wrapper::Int(_) => CelType::Int,
            Wrapper::UInt(_) => CelType::UInt,
            Wrapper::Double(_) => CelType::Double,
            Wrapper::String(_) => CelType::String,
            Wrapper::Bytes(_) => CelType::Bytes,
        };
        CelType::wrapper(inner)
    }

    /// Fully qualified name of the 64-bit wrapper message.
    pub fn message_name(&self) -> &'static str {
        match self {
            Wrapper::Bool(_) => "google.protobuf.BoolValue",
            Wrapper::Int(_) => "google.protobuf.Int64Value",
            Wrapper::UInt(_) => "google.protobuf.UInt64Value",
            Wrapper::Double(_) => "google.protobuf.DoubleValue",
            Wrapper::String(_) => "google.protobuf.StringValue",
            Wrapper::Bytes(_) => "google.protobuf.BytesValue",
        }
    }
}

/// An unset message-typed field: `null`, but remembering the field's type
/// and the zero value of that type.
#[derive(Debug, Clone)]
pub struct TypedNull {
    pub type_name: Arc<str>,
    pub zero: CelVal,
}

/// A CEL runtime value.
#[derive(Debug, Clone)]
pub enum CelVal {
    Null,
    Bool(bool),
    Int(i64),
    UInt(CelUint),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    Timestamp(Timestamp),
    Duration(Duration),
    Wrapped(Wrapper),
    TypedNull(Arc<TypedNull>),
    List(CelList),
    Map(CelMap),
    Object(CelObject),
    Type(CelType),
}

// ==================== Constructors ====================

impl CelVal {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        CelVal::String(s.into())
    }

    pub fn bytes(b: impl Into<Arc<[u8]>>) -> Self {
        CelVal::Bytes(b.into())
    }

    pub fn uint(v: u64) -> Self {
        CelVal::UInt(CelUint(v))
    }

    /// An untyped `list(dyn)`.
    pub fn list(values: Vec<CelVal>) -> Self {
        CelVal::List(CelList::from_vals(values))
    }

    /// A map of CEL values; fails on keys that collide after canonicalization.
    pub fn map(id: i64, entries: Vec<(CelVal, CelVal)>) -> CelResult {
        Ok(CelVal::Map(CelMap::from_vals(id, entries)?))
    }

    pub fn typed_null(type_name: &str, zero: CelVal) -> Self {
        CelVal::TypedNull(Arc::new(TypedNull {
            type_name: Arc::from(type_name),
            zero,
        }))
    }
}

impl From<&CelValue> for CelVal {
    fn from(c: &CelValue) -> Self {
        match c {
            CelValue::Null => CelVal::Null,
            CelValue::Bool(v) => CelVal::Bool(*v),
            CelValue::Int(v) => CelVal::Int(*v),
            CelValue::UInt(v) => CelVal::uint(*v),
            CelValue::Double(v) => CelVal::Double(*v),
            CelValue::String(v) => CelVal::string(v.as_str()),
            CelValue::Bytes(v) => CelVal::bytes(v.as_slice()),
        }
    }
}

impl From<bool> for CelVal {
    fn from(v: bool) -> Self {
        CelVal::Bool(v)
    }
}

impl From<i64> for CelVal {
    fn from(v: i64) -> Self {
        CelVal::Int(v)
    }
}

impl From<u64> for CelVal {
    fn from(v: u64) -> Self {
        CelVal::uint(v)
    }
}

impl From<f64> for CelVal {
    fn from(v: f64) -> Self {
        CelVal::Double(v)
    }
}

impl From<&str> for CelVal {
    fn from(v: &str) -> Self {
        CelVal::string(v)
    }
}

impl From<String> for CelVal {
    fn from(v: String) -> Self {
        CelVal::string(v)
    }
}

// ==================== Type Reflection ====================

impl CelVal {
    /// The structural type of this value.
    pub fn cel_type(&self) -> CelType {
        match self {
            CelVal::Null => CelType::Null,
            CelVal::Bool(_) => CelType::Bool,
            CelVal::Int(_) => CelType::Int,
            CelVal::UInt(_) => CelType::UInt,
            CelVal::Double(_) => CelType::Double,
            CelVal::String(_) => CelType::String,
            CelVal::Bytes(_) => CelType::Bytes,
            CelVal::Timestamp(_) => CelType::Timestamp,
            CelVal::Duration(_) => CelType::Duration,
            CelVal::Wrapped(w) => w.cel_type(),
            CelVal::TypedNull(n) => n.zero.cel_type(),
            CelVal::List(l) => l.cel_type().clone(),
            CelVal::Map(m) => m.cel_type().clone(),
            CelVal::Object(o) => o.cel_type().clone(),
            CelVal::Type(t) => CelType::type_of(t.clone()),
        }
    }

    /// `null` or an unset message field.
    pub fn is_null(&self) -> bool {
        matches!(self, CelVal::Null | CelVal::TypedNull(_))
    }

    /// Strip a wrapper down to its bare scalar.
    pub fn unwrapped(self) -> CelVal {
        CelAdapter.unwrap(self)
    }
}

// ==================== Accessors ====================

impl CelVal {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CelVal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CelVal::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            CelVal::UInt(u) => Some(u.0),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            CelVal::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CelVal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CelVal::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&CelList> {
        match self {
            CelVal::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&CelMap> {
        match self {
            CelVal::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Values compare with CEL equality: `1 == 1u == 1.0`, and `NaN != NaN`.
impl PartialEq for CelVal {
    fn eq(&self, other: &Self) -> bool {
        CelAdapter.equals(self, other)
    }
}

impl fmt::Display for CelVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelVal::Null => write!(f, "null"),
            CelVal::Bool(b) => write!(f, "{}", b),
            CelVal::Int(i) => write!(f, "{}", i),
            CelVal::UInt(u) => write!(f, "{}u", u.0),
            CelVal::Double(d) => write!(f, "{}", d),
            CelVal::String(s) => write!(f, "{:?}", s),
            CelVal::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            CelVal::Timestamp(t) => write!(f, "timestamp({:?})", time::format_timestamp(t)),
            CelVal::Duration(d) => write!(f, "duration({:?})", time::format_duration(d)),
            CelVal::Wrapped(w) => write!(f, "{}", w.clone().into_inner()),
            CelVal::TypedNull(n) => write!(f, "null({})", n.type_name),
            CelVal::List(l) => write!(f, "<list of {}>", l.len()),
            CelVal::Map(m) => write!(f, "<map of {}>", m.len()),
            CelVal::Object(o) => write!(f, "<{}>", o.cel_type()),
            CelVal::Type(t) => write!(f, "{}", t),
        }
    }
}
