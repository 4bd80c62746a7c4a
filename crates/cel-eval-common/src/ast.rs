//! Expression tree consumed by the planner.
//!
//! The tree mirrors the `cel.expr.Expr` wire shape after macro expansion:
//! operators are ordinary calls with synthetic function names (`_+_`, `!_`,
//! `_?_:_`, `_[_]`), and every node carries the id used for error attribution.

use crate::CelValue;

/// An expression node with its stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: i64,
    pub kind: ExprKind,
}

/// The kinds of expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value.
    Const(CelValue),
    /// Identifier, possibly dot-qualified by the parser (`.a.b`).
    Ident(String),
    /// Field selection `operand.field`; `test_only` marks a `has()` check.
    Select {
        operand: Box<Expr>,
        field: String,
        test_only: bool,
    },
    /// Function call, with a receiver for method-style calls.
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    /// List construction.
    List(Vec<Expr>),
    /// Map construction when `message_name` is empty, message construction otherwise.
    Struct {
        message_name: String,
        entries: Vec<StructEntry>,
    },
}

/// One entry of a struct or map literal.
#[derive(Debug, Clone, PartialEq)]
pub struct StructEntry {
    pub id: i64,
    pub key: EntryKey,
    pub value: Expr,
}

/// Key of a struct literal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKey {
    /// Message field name.
    Field(String),
    /// Map key expression.
    Map(Expr),
}

impl Expr {
    pub fn new(id: i64, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    /// Returns the dotted name if this node is an identifier or a chain of
    /// non-test selects rooted at an identifier (`a.b.c`).
    pub fn qualified_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::Select {
                operand,
                field,
                test_only: false,
            } => operand
                .qualified_name()
                .map(|prefix| format!("{}.{}", prefix, field)),
            _ => None,
        }
    }
}

/// Builds expression trees with auto-assigned ids.
///
/// Used by hosts and tests that assemble ASTs without a textual parser.
///
/// # Example
/// ```
/// use cel_eval_common::{ExprBuilder, CelValue};
///
/// let mut b = ExprBuilder::new();
/// let x = b.ident("x");
/// let one = b.int(1);
/// let sum = b.call("_+_", vec![x, one]);
/// assert_eq!(sum.id, 3);
/// ```
#[derive(Debug, Default)]
pub struct ExprBuilder {
    next_id: i64,
}

impl ExprBuilder {
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn node(&mut self, kind: ExprKind) -> Expr {
        let id = self.next();
        Expr::new(id, kind)
    }

    pub fn lit(&mut self, value: CelValue) -> Expr {
        self.node(ExprKind::Const(value))
    }

    pub fn null(&mut self) -> Expr {
        self.lit(CelValue::Null)
    }

    pub fn bool(&mut self, v: bool) -> Expr {
        self.lit(CelValue::Bool(v))
    }

    pub fn int(&mut self, v: i64) -> Expr {
        self.lit(CelValue::Int(v))
    }

    pub fn uint(&mut self, v: u64) -> Expr {
        self.lit(CelValue::UInt(v))
    }

    pub fn double(&mut self, v: f64) -> Expr {
        self.lit(CelValue::Double(v))
    }

    pub fn string(&mut self, v: &str) -> Expr {
        self.lit(CelValue::String(v.to_string()))
    }

    pub fn bytes(&mut self, v: &[u8]) -> Expr {
        self.lit(CelValue::Bytes(v.to_vec()))
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        self.node(ExprKind::Ident(name.to_string()))
    }

    pub fn select(&mut self, operand: Expr, field: &str) -> Expr {
        self.node(ExprKind::Select {
            operand: Box::new(operand),
            field: field.to_string(),
            test_only: false,
        })
    }

    /// `has(operand.field)`
    pub fn has(&mut self, operand: Expr, field: &str) -> Expr {
        self.node(ExprKind::Select {
            operand: Box::new(operand),
            field: field.to_string(),
            test_only: true,
        })
    }

    pub fn call(&mut self, function: &str, args: Vec<Expr>) -> Expr {
        self.node(ExprKind::Call {
            target: None,
            function: function.to_string(),
            args,
        })
    }

    pub fn member_call(&mut self, target: Expr, function: &str, args: Vec<Expr>) -> Expr {
        self.node(ExprKind::Call {
            target: Some(Box::new(target)),
            function: function.to_string(),
            args,
        })
    }

    /// `operand[index]`
    pub fn index(&mut self, operand: Expr, index: Expr) -> Expr {
        self.call("_[_]", vec![operand, index])
    }

    /// `cond ? t : f`
    pub fn ternary(&mut self, cond: Expr, t: Expr, f: Expr) -> Expr {
        self.call("_?_:_", vec![cond, t, f])
    }

    pub fn list(&mut self, elements: Vec<Expr>) -> Expr {
        self.node(ExprKind::List(elements))
    }

    pub fn map(&mut self, entries: Vec<(Expr, Expr)>) -> Expr {
        let entries = entries
            .into_iter()
            .map(|(k, v)| StructEntry {
                id: self.next(),
                key: EntryKey::Map(k),
                value: v,
            })
            .collect();
        self.node(ExprKind::Struct {
            message_name: String::new(),
            entries,
        })
    }

    pub fn message(&mut self, name: &str, fields: Vec<(&str, Expr)>) -> Expr {
        let entries = fields
            .into_iter()
            .map(|(f, v)| StructEntry {
                id: self.next(),
                key: EntryKey::Field(f.to_string()),
                value: v,
            })
            .collect();
        self.node(ExprKind::Struct {
            message_name: name.to_string(),
            entries,
        })
    }
}
