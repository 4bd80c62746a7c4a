//! The runtime type lattice.
//!
//! `CelType` values are data: they appear as results of `type(x)`, in error
//! messages and in overload guards. Identity has two strengths:
//!
//! - [`CelType::equals`] compares base names only (`list(int)` equals `list`).
//! - [`CelType::identical`] compares fully parameterized names.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A CEL runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelType {
    // ==================== Special ====================
    /// Dynamic type, the element type of untyped containers.
    Dyn,
    /// The type of `null`.
    Null,

    // ==================== Scalars ====================
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    /// A protobuf wrapper around a scalar: `wrapper(int)`.
    Wrapper(Arc<CelType>),

    // ==================== Well-known Messages ====================
    /// google.protobuf.Timestamp
    Timestamp,
    /// google.protobuf.Duration
    Duration,

    // ==================== Parameterized ====================
    /// `list(T)`
    List(Arc<CelType>),
    /// `map(K, V)`
    Map(Arc<CelType>, Arc<CelType>),
    /// `type` when unparameterized, `type(T)` otherwise.
    Type(Option<Arc<CelType>>),

    // ==================== Messages ====================
    /// Protobuf message type with fully qualified name.
    Message(Arc<str>),
}

// ==================== Constructors ====================

impl CelType {
    /// `list(dyn)`
    pub fn dyn_list() -> Self {
        CelType::list(CelType::Dyn)
    }

    /// `map(dyn, dyn)`
    pub fn dyn_map() -> Self {
        CelType::map(CelType::Dyn, CelType::Dyn)
    }

    /// `map(string, dyn)`, the type of a JSON object.
    pub fn json_object() -> Self {
        CelType::map(CelType::String, CelType::Dyn)
    }

    /// Create a list type with the given element type.
    ///
    /// # Example
    /// ```
    /// use cel_eval_common::CelType;
    /// let list_of_int = CelType::list(CelType::Int);
    /// assert_eq!(list_of_int.fullname(), "list(int)");
    /// assert_eq!(list_of_int.name(), "list");
    /// ```
    pub fn list(elem: CelType) -> Self {
        CelType::List(Arc::new(elem))
    }

    /// Create a map type with the given key and value types.
    pub fn map(key: CelType, value: CelType) -> Self {
        CelType::Map(Arc::new(key), Arc::new(value))
    }

    /// The unparameterized `type` type.
    pub fn type_type() -> Self {
        CelType::Type(None)
    }

    /// Create a type value representing `type(T)`.
    ///
    /// # Example
    /// ```
    /// use cel_eval_common::CelType;
    /// let nested = CelType::type_of(CelType::type_of(CelType::Int));
    /// assert_eq!(nested.fullname(), "type(type(int))");
    /// ```
    pub fn type_of(inner: CelType) -> Self {
        CelType::Type(Some(Arc::new(inner)))
    }

    /// Create a wrapper type.
    pub fn wrapper(inner: CelType) -> Self {
        CelType::Wrapper(Arc::new(inner))
    }

    /// Create a message type with the given fully qualified name.
    pub fn message(name: &str) -> Self {
        CelType::Message(Arc::from(name))
    }
}

// ==================== Names and Identity ====================

impl CelType {
    /// The base name, used for loose equality and overload guards.
    pub fn name(&self) -> String {
        match self {
            CelType::Dyn => "dyn".to_string(),
            CelType::Null => "null_type".to_string(),
            CelType::Bool => "bool".to_string(),
            CelType::Int => "int".to_string(),
            CelType::UInt => "uint".to_string(),
            CelType::Double => "double".to_string(),
            CelType::String => "string".to_string(),
            CelType::Bytes => "bytes".to_string(),
            CelType::Wrapper(inner) => format!("wrapper({})", inner.name()),
            CelType::Timestamp => "google.protobuf.Timestamp".to_string(),
            CelType::Duration => "google.protobuf.Duration".to_string(),
            CelType::List(_) => "list".to_string(),
            CelType::Map(_, _) => "map".to_string(),
            CelType::Type(_) => "type".to_string(),
            CelType::Message(name) => name.to_string(),
        }
    }

    /// The fully parameterized name.
    pub fn fullname(&self) -> String {
        match self {
            CelType::Wrapper(inner) => format!("wrapper({})", inner.fullname()),
            CelType::List(elem) => format!("list({})", elem.fullname()),
            CelType::Map(key, value) => format!("map({}, {})", key.fullname(), value.fullname()),
            CelType::Type(Some(inner)) => format!("type({})", inner.fullname()),
            _ => self.name(),
        }
    }

    /// Loose equality: same base name.
    pub fn equals(&self, other: &CelType) -> bool {
        self.name() == other.name()
    }

    /// Strict equality: same base name and same parameterization.
    pub fn identical(&self, other: &CelType) -> bool {
        self.name() == other.name() && self.fullname() == other.fullname()
    }

    /// Orders types lexicographically by base name.
    pub fn compare(&self, other: &CelType) -> Ordering {
        self.name().cmp(&other.name())
    }

    /// Returns true if this is a numeric type (int, uint, or double).
    pub fn is_numeric(&self) -> bool {
        matches!(self, CelType::Int | CelType::UInt | CelType::Double)
    }

    /// Element type of a list, or None if not a list.
    pub fn list_elem(&self) -> Option<&CelType> {
        match self {
            CelType::List(elem) => Some(elem),
            _ => None,
        }
    }

    /// Key and value types of a map, or None if not a map.
    pub fn map_types(&self) -> Option<(&CelType, &CelType)> {
        match self {
            CelType::Map(key, val) => Some((key, val)),
            _ => None,
        }
    }
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fullname())
    }
}

/// Map a well-known protobuf message name to its CEL type.
///
/// Returns `None` for messages without built-in semantics.
pub fn wk_proto_type(full_name: &str) -> Option<CelType> {
    let ty = match full_name {
        "google.protobuf.Value" | "google.protobuf.Any" => CelType::Dyn,
        "google.protobuf.Struct" => CelType::json_object(),
        "google.protobuf.ListValue" => CelType::dyn_list(),
        "google.protobuf.NullValue" => CelType::Null,
        "google.protobuf.BoolValue" => CelType::wrapper(CelType::Bool),
        "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
            CelType::wrapper(CelType::UInt)
        }
        "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => {
            CelType::wrapper(CelType::Int)
        }
        "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
            CelType::wrapper(CelType::Double)
        }
        "google.protobuf.StringValue" => CelType::wrapper(CelType::String),
        "google.protobuf.BytesValue" => CelType::wrapper(CelType::Bytes),
        "google.protobuf.Timestamp" => CelType::Timestamp,
        "google.protobuf.Duration" => CelType::Duration,
        _ => return None,
    };
    Some(ty)
}

/// The CEL type of a protobuf message: well-known mapping or `Message(name)`.
pub fn proto_message_to_cel_type(full_name: &str) -> CelType {
    wk_proto_type(full_name).unwrap_or_else(|| CelType::message(full_name))
}
