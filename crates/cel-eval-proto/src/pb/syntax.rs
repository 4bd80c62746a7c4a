/// A parsed expression and the source positions of its nodes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParsedExpr {
    #[prost(message, optional, tag = "2")]
    pub expr: Option<Expr>,
}

/// An abstract syntax tree node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Expr {
    #[prost(int64, tag = "2")]
    pub id: i64,
    #[prost(oneof = "expr::ExprKind", tags = "3, 4, 5, 6, 7, 8, 9")]
    pub expr_kind: Option<expr::ExprKind>,
}

pub mod expr {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Ident {
        #[prost(string, tag = "1")]
        pub name: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Select {
        #[prost(message, optional, boxed, tag = "1")]
        pub operand: Option<Box<super::Expr>>,
        #[prost(string, tag = "2")]
        pub field: String,
        #[prost(bool, tag = "3")]
        pub test_only: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Call {
        #[prost(message, optional, boxed, tag = "1")]
        pub target: Option<Box<super::Expr>>,
        #[prost(string, tag = "2")]
        pub function: String,
        #[prost(message, repeated, tag = "3")]
        pub args: Vec<super::Expr>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateList {
        #[prost(message, repeated, tag = "1")]
        pub elements: Vec<super::Expr>,
        #[prost(int32, repeated, tag = "2")]
        pub optional_indices: Vec<i32>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateStruct {
        #[prost(string, tag = "1")]
        pub message_name: String,
        #[prost(message, repeated, tag = "2")]
        pub entries: Vec<create_struct::Entry>,
    }

    pub mod create_struct {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Entry {
            #[prost(int64, tag = "1")]
            pub id: i64,
            #[prost(oneof = "entry::KeyKind", tags = "2, 3")]
            pub key_kind: Option<entry::KeyKind>,
            #[prost(message, optional, tag = "4")]
            pub value: Option<super::super::Expr>,
            #[prost(bool, tag = "5")]
            pub optional_entry: bool,
        }

        pub mod entry {
            #[derive(Clone, PartialEq, ::prost::Oneof)]
            pub enum KeyKind {
                #[prost(string, tag = "2")]
                FieldKey(String),
                #[prost(message, tag = "3")]
                MapKey(super::super::super::Expr),
            }
        }
    }

    /// Macro-expanded comprehension. Decoded so it can be rejected by id.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Comprehension {
        #[prost(string, tag = "1")]
        pub iter_var: String,
        #[prost(message, optional, boxed, tag = "2")]
        pub iter_range: Option<Box<super::Expr>>,
        #[prost(string, tag = "3")]
        pub accu_var: String,
        #[prost(message, optional, boxed, tag = "4")]
        pub accu_init: Option<Box<super::Expr>>,
        #[prost(message, optional, boxed, tag = "5")]
        pub loop_condition: Option<Box<super::Expr>>,
        #[prost(message, optional, boxed, tag = "6")]
        pub loop_step: Option<Box<super::Expr>>,
        #[prost(message, optional, boxed, tag = "7")]
        pub result: Option<Box<super::Expr>>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ExprKind {
        #[prost(message, tag = "3")]
        ConstExpr(super::Constant),
        #[prost(message, tag = "4")]
        IdentExpr(Ident),
        #[prost(message, tag = "5")]
        SelectExpr(Select),
        #[prost(message, tag = "6")]
        CallExpr(Call),
        #[prost(message, tag = "7")]
        ListExpr(CreateList),
        #[prost(message, tag = "8")]
        StructExpr(CreateStruct),
        #[prost(message, tag = "9")]
        ComprehensionExpr(Comprehension),
    }
}

/// A literal.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Constant {
    #[prost(oneof = "constant::ConstantKind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9")]
    pub constant_kind: Option<constant::ConstantKind>,
}

pub mod constant {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ConstantKind {
        #[prost(enumeration = "super::super::NullValue", tag = "1")]
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
        #[prost(message, tag = "8")]
        DurationValue(::prost_types::Duration),
        #[prost(message, tag = "9")]
        TimestampValue(::prost_types::Timestamp),
    }
}
