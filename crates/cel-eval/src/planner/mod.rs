//! Planning: compile an expression tree into an [`Interpretable`].
//!
//! Planning resolves everything that does not depend on the activation
//! up front: function candidates, container-qualified names and struct
//! types. Evaluation is then a single walk over the compiled tree.

use std::sync::Arc;

use cel_eval_common::{CelType, EntryKey, Expr, ExprKind, Namespace};
use cel_eval_proto::operators;
use thiserror::Error;
use tracing::trace;

mod attr;

pub use attr::{AbsoluteAttr, Access, Attribute};

use crate::activation::Activation;
use crate::adapter::{CelAdapter, ValueAdapter};
use crate::func::{dispatch_candidates, Function, OrderedDispatcher};
use crate::provider::ValueProvider;
use crate::value::{
    coerce_to_values, AdaptedList, AdaptedMap, CelError, CelResult, CelVal,
};

/// The expression tree cannot be planned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid expression {id}: {reason}")]
    InvalidAst { id: i64, reason: String },
}

impl PlanError {
    fn invalid(id: i64, reason: impl Into<String>) -> Self {
        PlanError::InvalidAst {
            id,
            reason: reason.into(),
        }
    }
}

/// A compiled expression node.
#[derive(Debug, Clone)]
pub enum Interpretable {
    Const {
        id: i64,
        value: CelVal,
    },
    Attr(Attribute),
    /// `has(operand.field)`
    Has {
        id: i64,
        operand: Attribute,
        field: String,
    },
    And {
        id: i64,
        lhs: Box<Interpretable>,
        rhs: Box<Interpretable>,
    },
    Or {
        id: i64,
        lhs: Box<Interpretable>,
        rhs: Box<Interpretable>,
    },
    Call {
        id: i64,
        function: String,
        /// Functions registered under `function`, highest priority first.
        candidates: Vec<Arc<Function>>,
        args: Vec<Interpretable>,
    },
    List {
        id: i64,
        elems: Vec<Interpretable>,
    },
    Map {
        id: i64,
        entries: Vec<(Interpretable, Interpretable)>,
    },
    Obj {
        id: i64,
        type_name: String,
        fields: Vec<(String, Interpretable)>,
        provider: Arc<dyn ValueProvider>,
    },
    /// Evaluates to a fixed error, e.g. a struct literal of an unknown type.
    Error(CelError),
}

impl Interpretable {
    pub fn id(&self) -> i64 {
        match self {
            Interpretable::Const { id, .. }
            | Interpretable::Has { id, .. }
            | Interpretable::And { id, .. }
            | Interpretable::Or { id, .. }
            | Interpretable::Call { id, .. }
            | Interpretable::List { id, .. }
            | Interpretable::Map { id, .. }
            | Interpretable::Obj { id, .. } => *id,
            Interpretable::Attr(attr) => attr.id(),
            Interpretable::Error(err) => err.id,
        }
    }

    pub fn eval(&self, vars: &dyn Activation) -> CelResult {
        match self {
            Interpretable::Const { value, .. } => Ok(value.clone()),
            Interpretable::Attr(attr) => attr.eval(vars),
            Interpretable::Has { id, operand, field } => {
                let obj = operand.eval(vars)?;
                Ok(CelVal::Bool(CelAdapter.is_set_by_name(*id, &obj, field)?))
            }
            Interpretable::And { id, lhs, rhs } => {
                eval_logic(*id, operators::LOGICAL_AND, false, lhs, rhs, vars)
            }
            Interpretable::Or { id, lhs, rhs } => {
                eval_logic(*id, operators::LOGICAL_OR, true, lhs, rhs, vars)
            }
            Interpretable::Call {
                id,
                function,
                candidates,
                args,
            } => {
                let args: Vec<CelResult> = args.iter().map(|a| a.eval(vars)).collect();
                dispatch_candidates(*id, function, candidates, &args)
            }
            Interpretable::List { elems, .. } => {
                let vals = coerce_to_values(elems.iter().map(|e| e.eval(vars)))?;
                let elem = common_type(vals.iter());
                Ok(CelVal::List(
                    AdaptedList::new(CelAdapter, vals).into_list(CelType::list(elem)),
                ))
            }
            Interpretable::Map { id, entries } => {
                let flat = coerce_to_values(
                    entries.iter().flat_map(|(k, v)| [k.eval(vars), v.eval(vars)]),
                )?;
                let mut flat = flat.into_iter();
                let mut entries = Vec::with_capacity(flat.len() / 2);
                while let (Some(k), Some(v)) = (flat.next(), flat.next()) {
                    entries.push((k, v));
                }
                let key = common_type(entries.iter().map(|(k, _)| k));
                let value = common_type(entries.iter().map(|(_, v)| v));
                let map = AdaptedMap::try_new(*id, CelAdapter, entries)?;
                Ok(CelVal::Map(map.into_map(CelType::map(key, value))))
            }
            Interpretable::Obj {
                id,
                type_name,
                fields,
                provider,
            } => {
                let vals = coerce_to_values(fields.iter().map(|(_, v)| v.eval(vars)))?;
                let mut built: Vec<(String, CelVal)> = Vec::with_capacity(vals.len());
                for ((name, _), val) in fields.iter().zip(vals) {
                    if built.iter().any(|(n, _)| n == name) {
                        return Err(CelError::map_key_conflict(*id, name).into());
                    }
                    built.push((name.clone(), val));
                }
                provider
                    .new_value(*id, type_name, &built)
                    .unwrap_or_else(|| Err(CelError::type_not_found(*id, type_name).into()))
            }
            Interpretable::Error(err) => Err(err.clone().into()),
        }
    }
}

/// The shared type of `vals`, or `dyn` when they differ.
fn common_type<'a>(mut vals: impl Iterator<Item = &'a CelVal>) -> CelType {
    let Some(first) = vals.next().map(CelVal::cel_type) else {
        return CelType::Dyn;
    };
    if vals.all(|v| v.cel_type().identical(&first)) {
        first
    } else {
        CelType::Dyn
    }
}

/// `&&` when `short` is false, `||` when it is true.
///
/// Either operand equal to `short` decides the result, whatever the other
/// operand is. Faults only surface when neither operand decides it.
fn eval_logic(
    id: i64,
    function: &str,
    short: bool,
    lhs: &Interpretable,
    rhs: &Interpretable,
    vars: &dyn Activation,
) -> CelResult {
    let l = lhs.eval(vars).map(CelVal::unwrapped);
    if matches!(l, Ok(CelVal::Bool(b)) if b == short) {
        return Ok(CelVal::Bool(short));
    }
    let r = rhs.eval(vars).map(CelVal::unwrapped);
    if matches!(r, Ok(CelVal::Bool(b)) if b == short) {
        return Ok(CelVal::Bool(short));
    }
    match (l, r) {
        (Ok(CelVal::Bool(_)), Ok(CelVal::Bool(_))) => Ok(CelVal::Bool(!short)),
        (Err(a), Err(b)) => Err(a.merge(b)),
        (Err(fault), _) | (_, Err(fault)) => Err(fault),
        (Ok(a), Ok(b)) => {
            Err(CelError::overload_not_found(id, function, &[a.cel_type(), b.cel_type()]).into())
        }
    }
}

/// Compiles expressions against a fixed set of functions, a value provider
/// and a container.
#[derive(Debug, Clone)]
pub struct Planner {
    dispatcher: Arc<OrderedDispatcher>,
    provider: Arc<dyn ValueProvider>,
    namespace: Namespace,
}

impl Planner {
    pub fn new(
        dispatcher: Arc<OrderedDispatcher>,
        provider: Arc<dyn ValueProvider>,
        namespace: Namespace,
    ) -> Self {
        Self {
            dispatcher,
            provider,
            namespace,
        }
    }

    pub fn plan(&self, expr: &Expr) -> Result<Interpretable, PlanError> {
        let id = expr.id;
        match &expr.kind {
            ExprKind::Const(c) => {
                trace!(id, "plan const");
                Ok(Interpretable::Const {
                    id,
                    value: CelVal::from(c),
                })
            }
            ExprKind::Ident(name) => {
                trace!(id, name = %name, "plan ident");
                Ok(Interpretable::Attr(self.maybe_attr(id, name)))
            }
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                trace!(id, field = %field, test_only, "plan select");
                let operand = self.plan(operand)?;
                let mut attr = relative_attr(operand);
                if *test_only {
                    return Ok(Interpretable::Has {
                        id,
                        operand: attr,
                        field: field.clone(),
                    });
                }
                attr.add_access(Access::Field {
                    id,
                    name: field.clone(),
                });
                Ok(Interpretable::Attr(attr))
            }
            ExprKind::Call {
                target,
                function,
                args,
            } => self.plan_call(id, target.as_deref(), operators::canonical_name(function), args),
            ExprKind::List(elems) => {
                trace!(id, len = elems.len(), "plan list");
                let elems = elems
                    .iter()
                    .map(|e| self.plan(e))
                    .collect::<Result<_, _>>()?;
                Ok(Interpretable::List { id, elems })
            }
            ExprKind::Struct {
                message_name,
                entries,
            } if message_name.is_empty() => {
                trace!(id, len = entries.len(), "plan map");
                let entries = entries
                    .iter()
                    .map(|entry| match &entry.key {
                        EntryKey::Map(key) => Ok((self.plan(key)?, self.plan(&entry.value)?)),
                        EntryKey::Field(name) => Err(PlanError::invalid(
                            entry.id,
                            format!("field key '{}' in map literal", name),
                        )),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Interpretable::Map { id, entries })
            }
            ExprKind::Struct {
                message_name,
                entries,
            } => {
                trace!(id, message = %message_name, "plan message");
                let fields = entries
                    .iter()
                    .map(|entry| match &entry.key {
                        EntryKey::Field(name) => Ok((name.clone(), self.plan(&entry.value)?)),
                        EntryKey::Map(_) => Err(PlanError::invalid(
                            entry.id,
                            format!("map key in {} literal", message_name),
                        )),
                    })
                    .collect::<Result<_, _>>()?;
                let Some(type_name) = self.resolve_type(message_name) else {
                    return Ok(Interpretable::Error(CelError::type_not_found(id, message_name)));
                };
                Ok(Interpretable::Obj {
                    id,
                    type_name,
                    fields,
                    provider: self.provider.clone(),
                })
            }
        }
    }

    fn maybe_attr(&self, id: i64, name: &str) -> Attribute {
        Attribute::Maybe {
            id,
            name: name.trim_start_matches('.').to_string(),
            container: self.namespace.name().to_string(),
            readings: vec![AbsoluteAttr::new(self.namespace.resolve_candidate_names(name))],
            provider: self.provider.clone(),
        }
    }

    fn plan_call(
        &self,
        id: i64,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> Result<Interpretable, PlanError> {
        trace!(id, function, "plan call");
        // `pkg.fn(x)` may name a namespaced function rather than a method on `pkg`.
        if let Some(qualified) = target.and_then(Expr::qualified_name) {
            let name = format!("{}.{}", qualified, function);
            for candidate in self.namespace.resolve_candidate_names(&name) {
                let candidates = self.dispatcher.candidates(&candidate);
                if !candidates.is_empty() {
                    return Ok(Interpretable::Call {
                        id,
                        function: candidate,
                        candidates,
                        args: self.plan_all(args)?,
                    });
                }
            }
        }

        let mut planned = Vec::with_capacity(args.len() + 1);
        if let Some(target) = target {
            planned.push(self.plan(target)?);
        }
        planned.extend(self.plan_all(args)?);

        match function {
            operators::LOGICAL_AND | operators::LOGICAL_OR => {
                let [lhs, rhs] = expect_args(id, function, planned)?;
                let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
                Ok(if function == operators::LOGICAL_AND {
                    Interpretable::And { id, lhs, rhs }
                } else {
                    Interpretable::Or { id, lhs, rhs }
                })
            }
            operators::CONDITIONAL => {
                let [cond, t, f] = expect_args(id, function, planned)?;
                Ok(Interpretable::Attr(Attribute::Conditional {
                    id,
                    cond: Box::new(cond),
                    t: Box::new(relative_attr(t)),
                    f: Box::new(relative_attr(f)),
                }))
            }
            operators::INDEX => {
                let [operand, index] = expect_args(id, function, planned)?;
                let mut attr = relative_attr(operand);
                attr.add_access(match index {
                    Interpretable::Const { value, .. } => Access::Index { id, key: value },
                    other => Access::Dynamic {
                        id,
                        key: Box::new(other),
                    },
                });
                Ok(Interpretable::Attr(attr))
            }
            _ => Ok(Interpretable::Call {
                id,
                function: function.to_string(),
                candidates: self.dispatcher.candidates(function),
                args: planned,
            }),
        }
    }

    fn plan_all(&self, exprs: &[Expr]) -> Result<Vec<Interpretable>, PlanError> {
        exprs.iter().map(|e| self.plan(e)).collect()
    }

    /// The first container candidate of `name` the provider knows as a type.
    fn resolve_type(&self, name: &str) -> Option<String> {
        self.namespace
            .resolve_candidate_names(name)
            .into_iter()
            .find(|candidate| self.provider.find_type(candidate).is_some())
    }
}

fn expect_args<const N: usize>(
    id: i64,
    function: &str,
    args: Vec<Interpretable>,
) -> Result<[Interpretable; N], PlanError> {
    args.try_into().map_err(|args: Vec<Interpretable>| {
        PlanError::invalid(
            id,
            format!("{} expects {} arguments, got {}", function, N, args.len()),
        )
    })
}

/// View an interpretable as an attribute that accesses can be appended to.
fn relative_attr(operand: Interpretable) -> Attribute {
    match operand {
        Interpretable::Attr(attr) => attr,
        other => Attribute::Relative {
            id: other.id(),
            operand: Box::new(other),
            accesses: Vec::new(),
        },
    }
}
