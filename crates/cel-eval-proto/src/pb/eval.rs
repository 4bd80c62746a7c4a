/// The result of evaluating an expression: a value, errors or unknowns.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExprValue {
    #[prost(oneof = "expr_value::Kind", tags = "1, 2, 3")]
    pub kind: Option<expr_value::Kind>,
}

pub mod expr_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Value(super::super::Value),
        #[prost(message, tag = "2")]
        Error(super::ErrorSet),
        #[prost(message, tag = "3")]
        Unknown(super::UnknownSet),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorSet {
    #[prost(message, repeated, tag = "1")]
    pub errors: Vec<Status>,
}

/// An error with an rpc-style status code.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<::prost_types::Any>,
}

/// Ids of the expressions whose values were not available.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnknownSet {
    #[prost(int64, repeated, tag = "1")]
    pub exprs: Vec<i64>,
}
