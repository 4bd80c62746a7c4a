//! Common types for the cel-eval crates: expression tree, type lattice,
//! constants, namespaces and the protobuf type registry.
//!
//! - **AST**: `Expr` and `ExprBuilder`, the input contract produced by an
//!   external parser.
//! - **Types**: `CelType` with loose (`equals`) and strict (`identical`)
//!   identity.
//! - **Values**: `CelValue` for literal constants.
//! - **Namespaces**: `Namespace` for container-relative name resolution.
//! - **Proto**: `ProtoTypeRegistry` over a `prost_reflect::DescriptorPool`.

use std::fmt;

mod ast;
pub use ast::{EntryKey, Expr, ExprBuilder, ExprKind, StructEntry};

mod namespace;
pub use namespace::Namespace;

pub mod proto_types;
pub use proto_types::{kind_to_cel_type, ProtoTypeRegistry, RegistryError};

pub mod types;
pub use types::{proto_message_to_cel_type, wk_proto_type, CelType};

// ==================== CelValue ====================

/// A CEL constant value.
///
/// These are the literals that can appear directly in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CelValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl CelValue {
    /// Get the CEL type of this value.
    pub fn cel_type(&self) -> CelType {
        match self {
            CelValue::Null => CelType::Null,
            CelValue::Bool(_) => CelType::Bool,
            CelValue::Int(_) => CelType::Int,
            CelValue::UInt(_) => CelType::UInt,
            CelValue::Double(_) => CelType::Double,
            CelValue::String(_) => CelType::String,
            CelValue::Bytes(_) => CelType::Bytes,
        }
    }
}

impl fmt::Display for CelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelValue::Null => write!(f, "null"),
            CelValue::Bool(v) => write!(f, "{}", v),
            CelValue::Int(v) => write!(f, "{}", v),
            CelValue::UInt(v) => write!(f, "{}u", v),
            CelValue::Double(v) => write!(f, "{}", v),
            CelValue::String(v) => write!(f, "\"{}\"", v),
            CelValue::Bytes(v) => write!(f, "b\"{}\"", String::from_utf8_lossy(v)),
        }
    }
}
