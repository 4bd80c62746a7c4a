/// `google.protobuf.NullValue`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum NullValue {
    NullValue = 0,
}

/// A value in the CEL value domain.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Value {
    #[prost(oneof = "value::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 12, 15")]
    pub kind: Option<value::Kind>,
}

pub mod value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(enumeration = "super::NullValue", tag = "1")]
        NullValue(i32),
        #[prost(bool, tag = "2")]
        BoolValue(bool),
        #[prost(int64, tag = "3")]
        Int64Value(i64),
        #[prost(uint64, tag = "4")]
        Uint64Value(u64),
        #[prost(double, tag = "5")]
        DoubleValue(f64),
        #[prost(string, tag = "6")]
        StringValue(String),
        #[prost(bytes = "vec", tag = "7")]
        BytesValue(Vec<u8>),
        #[prost(message, tag = "9")]
        EnumValue(super::EnumValue),
        #[prost(message, tag = "10")]
        ObjectValue(::prost_types::Any),
        #[prost(message, tag = "11")]
        MapValue(super::MapValue),
        #[prost(message, tag = "12")]
        ListValue(super::ListValue),
        #[prost(string, tag = "15")]
        TypeValue(String),
    }
}

/// An enum constant together with its fully qualified type.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnumValue {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(int32, tag = "2")]
    pub value: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListValue {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<Value>,
}

/// Map entries in insertion order; keys must be unique.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MapValue {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<map_value::Entry>,
}

pub mod map_value {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        #[prost(message, optional, tag = "1")]
        pub key: Option<super::Value>,
        #[prost(message, optional, tag = "2")]
        pub value: Option<super::Value>,
    }
}

impl Value {
    pub fn from_kind(kind: value::Kind) -> Self {
        Self { kind: Some(kind) }
    }
}
