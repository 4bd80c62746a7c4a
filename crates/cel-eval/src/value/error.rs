//! Evaluation faults: errors and unknowns.
//!
//! Faults are data. Every evaluation path returns a [`CelResult`] and merges
//! the faults of sibling sub-expressions with [`Fault::merge`]: unknowns take
//! priority over errors, errors keep the first and retain the rest.

use std::collections::BTreeSet;
use std::fmt;

use cel_eval_common::CelType;
use thiserror::Error;

/// The kind of evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    TypeMismatch,
    TypeNotFound,
    UnrecognizedAny,
    UnresolvedAttribute,
    UndeclaredReference,
    /// A value does not support index or string access.
    BadAccess,
    MapKeyConflict,
    UnboundFunction,
    NoMatchingOverload,
    DivisionByZero,
    ModuloByZero,
    Overflow,
    /// Malformed timestamp, duration or UTF-8 input.
    Parse,
    InvalidTimezone,
    /// Timestamp or duration outside its representable range.
    Range,
    IndexOutOfBounds,
    FieldNotFound,
    KeyNotFound,
    UnsupportedKeyType,
}

/// An error that occurred during evaluation of the node `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CelError {
    pub id: i64,
    pub message: String,
    pub kind: ErrorKind,
    /// Errors from sibling sub-expressions, retained for diagnostics.
    pub additional: Vec<CelError>,
}

impl CelError {
    pub fn new(id: i64, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            kind,
            additional: Vec::new(),
        }
    }

    /// Attach `other` (and everything it carries) as a sibling of this error.
    pub fn add(&mut self, mut other: CelError) {
        let nested = std::mem::take(&mut other.additional);
        self.additional.push(other);
        self.additional.extend(nested);
    }

    pub fn invalid_argument(id: i64, func: &str, issue: impl fmt::Display) -> Self {
        Self::new(
            id,
            ErrorKind::InvalidArgument,
            format!("invalid argument to function {}: {}", func, issue),
        )
    }

    pub fn unrecognized_any(id: i64, type_url: &str) -> Self {
        Self::new(
            id,
            ErrorKind::UnrecognizedAny,
            format!("unrecognized any type: {}", type_url),
        )
    }

    /// `expected` names the wanted kind, `actual` the type of the offending value.
    pub fn type_mismatch(id: i64, expected: &str, actual: &CelType) -> Self {
        Self::new(
            id,
            ErrorKind::TypeMismatch,
            format!("type mismatch: {} vs {}", expected, actual.name()),
        )
    }

    pub fn type_not_found(id: i64, type_name: &str) -> Self {
        Self::new(
            id,
            ErrorKind::TypeNotFound,
            format!("type not found: {}", type_name),
        )
    }

    pub fn unresolved_attr(id: i64) -> Self {
        Self::new(id, ErrorKind::UnresolvedAttribute, "unresolved attribute")
    }

    pub fn bad_string_bytes(id: i64, e: impl fmt::Display) -> Self {
        Self::new(
            id,
            ErrorKind::Parse,
            format!("Failed to decode bytes as string: {}", e),
        )
    }

    pub fn bad_time_str(id: i64, e: impl fmt::Display) -> Self {
        Self::new(id, ErrorKind::Parse, format!("Failed to parse timestamp: {}", e))
    }

    pub fn bad_duration_str(id: i64, e: impl fmt::Display) -> Self {
        Self::new(id, ErrorKind::Parse, format!("Failed to parse duration: {}", e))
    }

    pub fn invalid_tz(id: i64, tz: &str) -> Self {
        Self::new(
            id,
            ErrorKind::InvalidTimezone,
            format!("invalid timezone: {}", tz),
        )
    }

    pub fn bad_timestamp(id: i64) -> Self {
        Self::new(id, ErrorKind::Range, "timestamp out of range")
    }

    pub fn bad_duration(id: i64) -> Self {
        Self::new(id, ErrorKind::Range, "duration out of range")
    }

    pub fn bad_index_access(id: i64, ty: &CelType) -> Self {
        Self::new(
            id,
            ErrorKind::BadAccess,
            format!("index access not supported for {}", ty.fullname()),
        )
    }

    pub fn bad_string_access(id: i64, ty: &CelType) -> Self {
        Self::new(
            id,
            ErrorKind::BadAccess,
            format!("{} cannot be accessed by string", ty.fullname()),
        )
    }

    pub fn map_key_conflict(id: i64, key: impl fmt::Display) -> Self {
        Self::new(
            id,
            ErrorKind::MapKeyConflict,
            format!("map key conflict: {}", key),
        )
    }

    pub fn func_not_found(id: i64, func: &str) -> Self {
        Self::new(
            id,
            ErrorKind::UnboundFunction,
            format!("unbound function: {}", func),
        )
    }

    pub fn ident_not_found(id: i64, ident: &str, namespace: &str) -> Self {
        Self::new(
            id,
            ErrorKind::UndeclaredReference,
            format!(
                "undeclared reference to '{}' (in container '{}')",
                ident, namespace
            ),
        )
    }

    pub fn index_out_of_bounds(id: i64, index: impl fmt::Display, len: usize) -> Self {
        Self::new(
            id,
            ErrorKind::IndexOutOfBounds,
            format!("index {} out of bounds [0, {})", index, len),
        )
    }

    pub fn field_not_found(id: i64, name: &str, in_type: Option<&str>) -> Self {
        let message = match in_type {
            Some(t) => format!("field not found: {} in {}", name, t),
            None => format!("field not found: {}", name),
        };
        Self::new(id, ErrorKind::FieldNotFound, message)
    }

    pub fn key_not_found(id: i64) -> Self {
        Self::new(id, ErrorKind::KeyNotFound, "key not found")
    }

    pub fn unsupported_key_type(id: i64) -> Self {
        Self::new(id, ErrorKind::UnsupportedKeyType, "unsupported key type")
    }

    pub fn division_by_zero(id: i64, ty: &CelType) -> Self {
        Self::new(
            id,
            ErrorKind::DivisionByZero,
            format!("{} divide by zero", ty.name()),
        )
    }

    pub fn modulo_by_zero(id: i64, ty: &CelType) -> Self {
        Self::new(
            id,
            ErrorKind::ModuloByZero,
            format!("{} modulus by zero", ty.name()),
        )
    }

    pub fn overflow(id: i64, op: &str, ty: &CelType) -> Self {
        Self::new(
            id,
            ErrorKind::Overflow,
            format!("{} return error for overflow during {}", ty.name(), op),
        )
    }

    pub fn overload_not_found(id: i64, name: &str, types: &[CelType]) -> Self {
        let names: Vec<String> = types.iter().map(|t| t.name()).collect();
        Self::new(
            id,
            ErrorKind::NoMatchingOverload,
            format!(
                "found no matching overload for '{}' applied to '({})'",
                name,
                names.join(", ")
            ),
        )
    }

    pub fn any_empty_type_url(id: i64) -> Self {
        Self::new(
            id,
            ErrorKind::UnrecognizedAny,
            "Unpack Any failed: invalid empty type_url",
        )
    }

    pub fn any_not_in_registry(id: i64, type_url: &str) -> Self {
        Self::new(
            id,
            ErrorKind::UnrecognizedAny,
            format!("Unpack Any failed: type_url {} not in registry", type_url),
        )
    }
}

impl fmt::Display for CelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CelError {}

/// The set of expression ids whose values were not available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CelUnknown {
    pub ids: BTreeSet<i64>,
}

impl CelUnknown {
    pub fn new(id: i64) -> Self {
        Self {
            ids: BTreeSet::from([id]),
        }
    }

    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn merge(mut self, other: CelUnknown) -> Self {
        self.ids.extend(other.ids);
        self
    }
}

/// A non-value evaluation outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("{0}")]
    Error(CelError),
    #[error("unknown expressions {:?}", .0.ids)]
    Unknown(CelUnknown),
}

impl Fault {
    /// Combine two faults: unknowns win over errors, unknown ids are unioned
    /// and the first error keeps the second as a sibling.
    pub fn merge(self, other: Fault) -> Fault {
        match (self, other) {
            (Fault::Unknown(a), Fault::Unknown(b)) => Fault::Unknown(a.merge(b)),
            (Fault::Unknown(u), Fault::Error(_)) | (Fault::Error(_), Fault::Unknown(u)) => {
                Fault::Unknown(u)
            }
            (Fault::Error(mut a), Fault::Error(b)) => {
                a.add(b);
                Fault::Error(a)
            }
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Fault::Unknown(_))
    }

    /// The primary error, if this fault is an error.
    pub fn as_error(&self) -> Option<&CelError> {
        match self {
            Fault::Error(e) => Some(e),
            Fault::Unknown(_) => None,
        }
    }
}

impl From<CelError> for Fault {
    fn from(err: CelError) -> Self {
        Fault::Error(err)
    }
}

impl From<CelUnknown> for Fault {
    fn from(unknown: CelUnknown) -> Self {
        Fault::Unknown(unknown)
    }
}

/// Either a value or a fault.
pub type CelResult<T = super::CelVal> = Result<T, Fault>;

/// Merge every fault in `faults`; `None` when the iterator is empty.
pub fn merge_faults(faults: impl IntoIterator<Item = Fault>) -> Option<Fault> {
    faults.into_iter().reduce(Fault::merge)
}

/// Collect the values of `results`, or the merged fault if any failed.
pub fn coerce_to_values<T>(results: impl IntoIterator<Item = CelResult<T>>) -> CelResult<Vec<T>> {
    let mut values = Vec::new();
    let mut fault: Option<Fault> = None;
    for r in results {
        match r {
            Ok(v) => values.push(v),
            Err(f) => {
                fault = Some(match fault {
                    Some(prev) => prev.merge(f),
                    None => f,
                })
            }
        }
    }
    match fault {
        Some(f) => Err(f),
        None => Ok(values),
    }
}
