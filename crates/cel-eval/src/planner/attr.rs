//! Attributes: variable references with a chain of field and index accesses.
//!
//! `a.b.c` in container `x` is ambiguous until evaluation: it may be the
//! variable `x.a.b.c`, the field `c` of variable `x.a.b`, and so on. A
//! [`Attribute::Maybe`] keeps every reading, most qualified first, and the
//! first one the activation can resolve wins.

use std::sync::Arc;

use cel_eval_proto::operators;
use tracing::trace;

use super::Interpretable;
use crate::activation::Activation;
use crate::adapter::{CelAdapter, ValueAdapter};
use crate::provider::ValueProvider;
use crate::value::{CelError, CelResult, CelVal};

/// One step applied to a resolved value.
#[derive(Debug, Clone)]
pub enum Access {
    /// `obj.name`
    Field { id: i64, name: String },
    /// `obj[key]` with a constant key.
    Index { id: i64, key: CelVal },
    /// `obj[expr]` with a key computed at evaluation time.
    Dynamic { id: i64, key: Box<Interpretable> },
}

impl Access {
    fn apply(&self, vars: &dyn Activation, obj: CelVal) -> CelResult {
        match self {
            Access::Field { id, name } => access_field(*id, &obj, name),
            Access::Index { id, key } => access_index(*id, &obj, key),
            Access::Dynamic { id, key } => {
                let key = key.eval(vars)?;
                access_index(*id, &obj, &key)
            }
        }
    }
}

/// Read field `name`, reporting the enclosing type when it has no such field.
pub(crate) fn access_field(id: i64, obj: &CelVal, name: &str) -> CelResult {
    if let Some(result) = CelAdapter.access_by_name(id, obj, name) {
        return result;
    }
    match obj {
        CelVal::Map(_) => Err(CelError::field_not_found(id, name, None).into()),
        CelVal::Object(_) | CelVal::TypedNull(_) => {
            let type_name = obj.cel_type().name();
            Err(CelError::field_not_found(id, name, Some(&type_name)).into())
        }
        other => Err(CelError::bad_string_access(id, &other.cel_type()).into()),
    }
}

pub(crate) fn access_index(id: i64, obj: &CelVal, key: &CelVal) -> CelResult {
    match CelAdapter.access_by_index(id, obj, key) {
        Some(result) => result,
        None => Err(CelError::bad_index_access(id, &obj.cel_type()).into()),
    }
}

fn apply_accesses(vars: &dyn Activation, obj: CelVal, accesses: &[Access]) -> CelResult {
    accesses
        .iter()
        .try_fold(obj, |cur, access| access.apply(vars, cur))
}

/// A variable reference under one of several fully qualified names.
#[derive(Debug, Clone)]
pub struct AbsoluteAttr {
    names: Vec<String>,
    accesses: Vec<Access>,
}

impl AbsoluteAttr {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            accesses: Vec::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn resolve(
        &self,
        id: i64,
        vars: &dyn Activation,
        provider: &dyn ValueProvider,
    ) -> Option<CelResult> {
        for name in &self.names {
            if let Some(bound) = vars.resolve(name) {
                trace!(name = %name, "resolved variable");
                return Some(bound.and_then(|v| apply_accesses(vars, v, &self.accesses)));
            }
            // Type names and enum constants have no fields.
            if self.accesses.is_empty() {
                if let Some(ident) = provider.find_ident(id, name) {
                    return Some(ident);
                }
            }
        }
        None
    }
}

/// A value-producing reference that further accesses can be appended to.
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Identifier or qualified name, resolved against the activation.
    Maybe {
        id: i64,
        /// The identifier as written, for error messages.
        name: String,
        container: String,
        readings: Vec<AbsoluteAttr>,
        provider: Arc<dyn ValueProvider>,
    },
    /// Accesses on the result of an arbitrary expression.
    Relative {
        id: i64,
        operand: Box<Interpretable>,
        accesses: Vec<Access>,
    },
    /// `cond ? t : f`, where accesses apply to whichever branch is chosen.
    Conditional {
        id: i64,
        cond: Box<Interpretable>,
        t: Box<Attribute>,
        f: Box<Attribute>,
    },
}

impl Attribute {
    pub fn id(&self) -> i64 {
        match self {
            Attribute::Maybe { id, .. }
            | Attribute::Relative { id, .. }
            | Attribute::Conditional { id, .. } => *id,
        }
    }

    /// Append an access to every reading of this attribute.
    ///
    /// A field access on a `Maybe` attribute also adds the dotted reading:
    /// `a.b` may name a variable on its own.
    pub fn add_access(&mut self, access: Access) {
        match self {
            Attribute::Maybe { readings, .. } => {
                let mut qualified = Vec::new();
                if let Access::Field { name: field, .. } = &access {
                    for reading in readings.iter().filter(|r| r.accesses.is_empty()) {
                        qualified.extend(reading.names.iter().map(|n| format!("{}.{}", n, field)));
                    }
                }
                for reading in readings.iter_mut() {
                    reading.accesses.push(access.clone());
                }
                if !qualified.is_empty() {
                    readings.insert(0, AbsoluteAttr::new(qualified));
                }
            }
            Attribute::Relative { accesses, .. } => accesses.push(access),
            Attribute::Conditional { t, f, .. } => {
                t.add_access(access.clone());
                f.add_access(access);
            }
        }
    }

    /// Resolve to a value; `None` when no reading of a `Maybe` is bound.
    pub fn resolve(&self, vars: &dyn Activation) -> Option<CelResult> {
        match self {
            Attribute::Maybe {
                id,
                readings,
                provider,
                ..
            } => readings
                .iter()
                .find_map(|r| r.resolve(*id, vars, provider.as_ref())),
            Attribute::Relative {
                operand, accesses, ..
            } => Some(
                operand
                    .eval(vars)
                    .and_then(|v| apply_accesses(vars, v, accesses)),
            ),
            Attribute::Conditional { id, cond, t, f } => match cond.eval(vars).map(CelVal::unwrapped) {
                Ok(CelVal::Bool(true)) => Some(t.eval(vars)),
                Ok(CelVal::Bool(false)) => Some(f.eval(vars)),
                Ok(other) => Some(Err(CelError::overload_not_found(
                    *id,
                    operators::CONDITIONAL,
                    &[other.cel_type()],
                )
                .into())),
                Err(fault) => Some(Err(fault)),
            },
        }
    }

    /// Resolve, turning an unbound identifier into an error.
    pub fn eval(&self, vars: &dyn Activation) -> CelResult {
        match self.resolve(vars) {
            Some(result) => result,
            None => Err(self.unresolved().into()),
        }
    }

    fn unresolved(&self) -> CelError {
        match self {
            Attribute::Maybe {
                id,
                name,
                container,
                ..
            } => CelError::ident_not_found(*id, name, container),
            other => CelError::unresolved_attr(other.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::MapActivation;
    use crate::provider::EmptyProvider;

    fn maybe(id: i64, names: &[&str]) -> Attribute {
        Attribute::Maybe {
            id,
            name: names.last().map(|n| n.to_string()).unwrap_or_default(),
            container: String::new(),
            readings: vec![AbsoluteAttr::new(names.iter().map(|n| n.to_string()).collect())],
            provider: Arc::new(EmptyProvider),
        }
    }

    fn field(id: i64, name: &str) -> Access {
        Access::Field {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_qualified_variable_wins() {
        let mut vars = MapActivation::new();
        vars.insert("a.b", 7i64);
        vars.insert(
            "a",
            CelVal::map(1, vec![(CelVal::from("b"), CelVal::Int(1))]).unwrap(),
        );
        let mut attr = maybe(1, &["a"]);
        attr.add_access(field(2, "b"));
        assert_eq!(attr.eval(&vars).unwrap(), CelVal::Int(7));

        vars.remove("a.b");
        assert_eq!(attr.eval(&vars).unwrap(), CelVal::Int(1));
    }

    #[test]
    fn test_container_candidates_in_order() {
        let mut vars = MapActivation::new();
        vars.insert("x", 1i64);
        vars.insert("pkg.x", 2i64);
        let attr = maybe(1, &["pkg.sub.x", "pkg.x", "x"]);
        assert_eq!(attr.eval(&vars).unwrap(), CelVal::Int(2));
    }

    #[test]
    fn test_unbound_identifier() {
        let attr = Attribute::Maybe {
            id: 4,
            name: "y".to_string(),
            container: "pkg".to_string(),
            readings: vec![AbsoluteAttr::new(vec!["pkg.y".to_string(), "y".to_string()])],
            provider: Arc::new(EmptyProvider),
        };
        let err = attr.eval(&MapActivation::new()).unwrap_err();
        let err = err.as_error().unwrap();
        assert_eq!(err.id, 4);
        assert_eq!(err.message, "undeclared reference to 'y' (in container 'pkg')");
    }

    #[test]
    fn test_type_identifier_resolves_without_accesses() {
        let attr = maybe(1, &["int"]);
        assert_eq!(
            attr.eval(&MapActivation::new()).unwrap(),
            CelVal::Type(cel_eval_common::CelType::Int)
        );
    }

    #[test]
    fn test_missing_field_and_bad_receiver() {
        let mut vars = MapActivation::new();
        vars.insert("m", CelVal::map(1, vec![]).unwrap());
        vars.insert("i", 3i64);

        let mut on_map = maybe(1, &["m"]);
        on_map.add_access(field(2, "k"));
        assert_eq!(
            on_map.eval(&vars).unwrap_err().as_error().unwrap().message,
            "field not found: k"
        );

        let mut on_int = maybe(3, &["i"]);
        on_int.add_access(field(4, "k"));
        let err = on_int.eval(&vars).unwrap_err();
        assert_eq!(err.as_error().unwrap().id, 4);
    }

    #[test]
    fn test_index_on_list() {
        let mut vars = MapActivation::new();
        vars.insert("l", CelVal::list(vec![CelVal::from("a"), CelVal::from("b")]));
        let mut attr = maybe(1, &["l"]);
        attr.add_access(Access::Index {
            id: 2,
            key: CelVal::uint(1),
        });
        assert_eq!(attr.eval(&vars).unwrap(), CelVal::from("b"));
    }
}
