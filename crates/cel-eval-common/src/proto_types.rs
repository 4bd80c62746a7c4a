//! Proto type registry used by the reflection adapter and value providers.
//!
//! This module provides `ProtoTypeRegistry`, which wraps a `prost_reflect::DescriptorPool`
//! to resolve message and enum descriptors by fully qualified name, and maps
//! field descriptors onto the CEL type lattice.

use prost_reflect::prost::Message;
use prost_reflect::prost_types::{FileDescriptorProto, FileDescriptorSet};
use prost_reflect::{DescriptorPool, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor};
use thiserror::Error;

use crate::types::proto_message_to_cel_type;
use crate::CelType;

/// Errors raised while loading descriptors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to decode file descriptor set: {0}")]
    Decode(#[from] prost_reflect::prost::DecodeError),

    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),
}

/// Registry for protobuf type information.
///
/// Cloning is cheap; the underlying pool is reference counted.
#[derive(Debug, Clone)]
pub struct ProtoTypeRegistry {
    pool: DescriptorPool,
}

impl ProtoTypeRegistry {
    /// Create a registry with the well-known types pre-loaded.
    pub fn new() -> Self {
        Self {
            pool: DescriptorPool::global(),
        }
    }

    /// Create a registry from an existing descriptor pool.
    pub fn from_pool(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    /// Add a serialized `FileDescriptorSet`.
    pub fn add_file_descriptor_set(&mut self, bytes: &[u8]) -> Result<(), RegistryError> {
        let fds = FileDescriptorSet::decode(bytes)?;
        self.pool.add_file_descriptor_set(fds)?;
        Ok(())
    }

    /// Add a single file descriptor.
    pub fn add_file_descriptor_proto(
        &mut self,
        file: FileDescriptorProto,
    ) -> Result<(), RegistryError> {
        self.pool.add_file_descriptor_proto(file)?;
        Ok(())
    }

    pub fn get_message(&self, name: &str) -> Option<MessageDescriptor> {
        self.pool.get_message_by_name(name)
    }

    pub fn get_enum(&self, name: &str) -> Option<EnumDescriptor> {
        self.pool.get_enum_by_name(name)
    }

    /// Numeric value of `enum_name.value_name`.
    pub fn get_enum_value(&self, enum_name: &str, value_name: &str) -> Option<i32> {
        let enum_desc = self.get_enum(enum_name)?;
        let value = enum_desc.get_value_by_name(value_name)?;
        Some(value.number())
    }

    /// Resolve a qualified enum constant such as `pkg.Color.RED`.
    pub fn resolve_enum_constant(&self, qualified: &str) -> Option<i32> {
        let dot = qualified.rfind('.')?;
        self.get_enum_value(&qualified[..dot], &qualified[dot + 1..])
    }

    /// The CEL type of a field, honoring repeated and map cardinality.
    pub fn field_type(&self, field: &FieldDescriptor) -> CelType {
        if field.is_map() {
            if let Kind::Message(entry) = field.kind() {
                return CelType::map(
                    kind_to_cel_type(entry.map_entry_key_field().kind()),
                    kind_to_cel_type(entry.map_entry_value_field().kind()),
                );
            }
            return CelType::dyn_map();
        }
        let base = kind_to_cel_type(field.kind());
        if field.is_list() {
            CelType::list(base)
        } else {
            base
        }
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

impl Default for ProtoTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a proto kind to the CEL type of a singular field of that kind.
pub fn kind_to_cel_type(kind: Kind) -> CelType {
    match kind {
        Kind::Bool => CelType::Bool,
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 | Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            CelType::Int
        }
        Kind::Uint32 | Kind::Fixed32 | Kind::Uint64 | Kind::Fixed64 => CelType::UInt,
        Kind::Float | Kind::Double => CelType::Double,
        Kind::String => CelType::String,
        Kind::Bytes => CelType::Bytes,
        Kind::Message(msg) => proto_message_to_cel_type(msg.full_name()),
        // Enum values are ints in CEL
        Kind::Enum(_) => CelType::Int,
    }
}
