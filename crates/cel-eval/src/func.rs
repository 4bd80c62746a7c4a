//! Function registry and overload dispatch.
//!
//! A [`Function`] is a name plus an ordered list of [`Overload`]s, each
//! guarded by its parameter types. Registries are built once and then shared
//! behind an `Arc`; an [`OrderedDispatcher`] composes several of them, the
//! earlier registry taking priority.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cel_eval_common::CelType;
use thiserror::Error;
use tracing::trace;

use crate::value::{coerce_to_values, CelError, CelResult, CelVal};

/// Implementation over evaluated, unwrapped arguments.
pub type StrictImpl = Arc<dyn Fn(i64, &[CelVal]) -> CelResult + Send + Sync>;

/// Implementation over raw results, for functions that tolerate faults.
pub type ResultImpl = Arc<dyn Fn(i64, &[CelResult]) -> CelResult + Send + Sync>;

#[derive(Clone)]
enum OverloadImpl {
    Strict(StrictImpl),
    Result(ResultImpl),
}

/// One type-guarded implementation of a function.
#[derive(Clone)]
pub struct Overload {
    /// The overload id (e.g. `add_int64`).
    pub id: String,
    /// Parameter types, receiver first. `dyn` accepts anything; other types
    /// match by base name, so `list` accepts `list(int)`.
    pub params: Vec<CelType>,
    implementation: OverloadImpl,
}

impl Overload {
    pub fn strict(
        id: impl Into<String>,
        params: Vec<CelType>,
        f: impl Fn(i64, &[CelVal]) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            params,
            implementation: OverloadImpl::Strict(Arc::new(f)),
        }
    }

    pub fn unary(
        id: impl Into<String>,
        param: CelType,
        f: impl Fn(i64, &CelVal) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self::strict(id, vec![param], move |id, args| f(id, &args[0]))
    }

    pub fn binary(
        id: impl Into<String>,
        lhs: CelType,
        rhs: CelType,
        f: impl Fn(i64, &CelVal, &CelVal) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self::strict(id, vec![lhs, rhs], move |id, args| f(id, &args[0], &args[1]))
    }

    /// An overload that sees errors and unknowns in its arguments instead of
    /// having them propagated first. Guarded by arity only.
    pub fn non_strict(
        id: impl Into<String>,
        arity: usize,
        f: impl Fn(i64, &[CelResult]) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            params: vec![CelType::Dyn; arity],
            implementation: OverloadImpl::Result(Arc::new(f)),
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self.implementation, OverloadImpl::Strict(_))
    }

    /// Whether this overload accepts arguments of these runtime types.
    pub fn accepts(&self, args: &[CelVal]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(p, a)| *p == CelType::Dyn || p.equals(&a.cel_type()))
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("strict", &self.is_strict())
            .finish()
    }
}

/// A function with all its overloads.
#[derive(Debug, Clone, Default)]
pub struct Function {
    pub name: String,
    pub overloads: Vec<Overload>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    pub fn with_overload(mut self, overload: Overload) -> Self {
        self.overloads.push(overload);
        self
    }

    pub fn find_overload(&self, id: &str) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.id == id)
    }

    /// Call the first overload that accepts `args`; `None` when none does.
    ///
    /// Strict overloads only run once every argument is a value: otherwise the
    /// merged fault of the arguments is the result.
    pub fn dispatch(&self, id: i64, args: &[CelResult]) -> Option<CelResult> {
        let mut values: Option<Vec<CelVal>> = None;
        for overload in &self.overloads {
            match &overload.implementation {
                OverloadImpl::Result(f) => {
                    if overload.params.len() == args.len() {
                        trace!(function = %self.name, overload = %overload.id, "dispatch");
                        return Some(f(id, args));
                    }
                }
                OverloadImpl::Strict(f) => {
                    if values.is_none() {
                        match coerce_to_values(args.iter().cloned()) {
                            Ok(vals) => values = Some(vals.into_iter().map(CelVal::unwrapped).collect()),
                            Err(fault) => return Some(Err(fault)),
                        }
                    }
                    let vals = values.as_deref().unwrap_or_default();
                    if overload.accepts(vals) {
                        trace!(function = %self.name, overload = %overload.id, "dispatch");
                        return Some(f(id, vals));
                    }
                }
            }
        }
        None
    }
}

/// Errors raised while assembling registries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FuncError {
    #[error("function {0} already registered")]
    DuplicateFunction(String),

    #[error("overload {overload} of {function} already registered")]
    DuplicateOverload { function: String, overload: String },
}

/// Anything that can look up functions by name.
pub trait Dispatcher: fmt::Debug + Send + Sync {
    fn find(&self, name: &str) -> Option<Arc<Function>>;
}

/// Functions by name, with an optional parent consulted on a miss.
#[derive(Debug, Clone, Default)]
pub struct FuncRegistry {
    functions: HashMap<String, Arc<Function>>,
    parent: Option<Arc<FuncRegistry>>,
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<FuncRegistry>) -> Self {
        Self {
            functions: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Register a function. Names are unique within a registry, as are the
    /// overload ids of a function.
    pub fn add(&mut self, function: Function) -> Result<(), FuncError> {
        if self.functions.contains_key(&function.name) {
            return Err(FuncError::DuplicateFunction(function.name));
        }
        for (i, overload) in function.overloads.iter().enumerate() {
            if function.overloads[..i].iter().any(|o| o.id == overload.id) {
                return Err(FuncError::DuplicateOverload {
                    function: function.name.clone(),
                    overload: overload.id.clone(),
                });
            }
        }
        self.functions.insert(function.name.clone(), Arc::new(function));
        Ok(())
    }

    /// Register a function known not to collide with an existing name.
    pub(crate) fn insert(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), Arc::new(function));
    }

    pub fn add_all(&mut self, functions: impl IntoIterator<Item = Function>) -> Result<(), FuncError> {
        functions.into_iter().try_for_each(|f| self.add(f))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Dispatcher for FuncRegistry {
    fn find(&self, name: &str) -> Option<Arc<Function>> {
        self.functions
            .get(name)
            .cloned()
            .or_else(|| self.parent.as_ref().and_then(|p| p.find(name)))
    }
}

/// Dispatchers consulted in order.
#[derive(Debug, Clone, Default)]
pub struct OrderedDispatcher {
    dispatchers: Vec<Arc<dyn Dispatcher>>,
}

impl OrderedDispatcher {
    pub fn new(dispatchers: Vec<Arc<dyn Dispatcher>>) -> Self {
        Self { dispatchers }
    }

    /// Add a dispatcher with the lowest priority.
    pub fn add(&mut self, dispatcher: Arc<dyn Dispatcher>) {
        self.dispatchers.push(dispatcher);
    }

    /// Add a dispatcher with the highest priority.
    pub fn add_first(&mut self, dispatcher: Arc<dyn Dispatcher>) {
        self.dispatchers.insert(0, dispatcher);
    }

    /// Every function named `name`, highest priority first.
    pub fn candidates(&self, name: &str) -> Vec<Arc<Function>> {
        self.dispatchers.iter().filter_map(|d| d.find(name)).collect()
    }

    pub fn dispatch(&self, id: i64, name: &str, args: &[CelResult]) -> CelResult {
        dispatch_candidates(id, name, &self.candidates(name), args)
    }
}

/// Call the first candidate with an overload accepting `args`.
pub fn dispatch_candidates(
    id: i64,
    name: &str,
    candidates: &[Arc<Function>],
    args: &[CelResult],
) -> CelResult {
    for function in candidates {
        if let Some(result) = function.dispatch(id, args) {
            return result;
        }
    }
    let vals = coerce_to_values(args.iter().cloned())?;
    let types: Vec<CelType> = vals.iter().map(|v| v.clone().unwrapped().cel_type()).collect();
    Err(CelError::overload_not_found(id, name, &types).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{CelUnknown, Fault};

    fn double() -> Function {
        Function::new("double")
            .with_overload(Overload::unary("double_int", CelType::Int, |_, v| {
                Ok(CelVal::Int(v.as_int().unwrap_or_default() * 2))
            }))
            .with_overload(Overload::unary("double_string", CelType::String, |_, v| {
                Ok(CelVal::from(format!("{0}{0}", v.as_str().unwrap_or_default())))
            }))
    }

    #[test]
    fn test_guard_selects_overload() {
        let f = double();
        assert_eq!(f.dispatch(1, &[Ok(CelVal::Int(4))]), Some(Ok(CelVal::Int(8))));
        assert_eq!(f.dispatch(1, &[Ok(CelVal::from("ab"))]), Some(Ok(CelVal::from("abab"))));
        assert_eq!(f.dispatch(1, &[Ok(CelVal::Bool(true))]), None);
    }

    #[test]
    fn test_strict_args_propagate_faults() {
        let f = double();
        let unknown: Fault = CelUnknown::new(3).into();
        let err: Fault = CelError::unresolved_attr(2).into();
        assert_eq!(
            f.dispatch(1, &[Err(err.clone())]),
            Some(Err(err))
        );
        assert_eq!(f.dispatch(1, &[Err(unknown.clone())]), Some(Err(unknown)));
    }

    #[test]
    fn test_non_strict_sees_faults() {
        let f = Function::new("@not_strictly_false").with_overload(Overload::non_strict(
            "not_strictly_false",
            1,
            |_, args| Ok(CelVal::Bool(!matches!(args[0], Ok(CelVal::Bool(false))))),
        ));
        let err: Fault = CelError::unresolved_attr(2).into();
        assert_eq!(f.dispatch(1, &[Err(err)]), Some(Ok(CelVal::Bool(true))));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut reg = FuncRegistry::new();
        reg.add(double()).unwrap();
        assert_eq!(
            reg.add(double()),
            Err(FuncError::DuplicateFunction("double".into()))
        );
        let dup = Function::new("f")
            .with_overload(Overload::unary("o", CelType::Int, |_, v| Ok(v.clone())))
            .with_overload(Overload::unary("o", CelType::Int, |_, v| Ok(v.clone())));
        assert!(matches!(reg.add(dup), Err(FuncError::DuplicateOverload { .. })));
    }

    #[test]
    fn test_parent_lookup() {
        let mut parent = FuncRegistry::new();
        parent.add(double()).unwrap();
        let child = FuncRegistry::with_parent(Arc::new(parent));
        assert!(child.contains("double"));
        assert!(child.is_empty());
    }

    #[test]
    fn test_first_registry_wins_and_falls_through() {
        let mut base = FuncRegistry::new();
        base.add(double()).unwrap();
        let mut host = FuncRegistry::new();
        host.add(Function::new("double").with_overload(Overload::unary(
            "double_int_host",
            CelType::Int,
            |_, _| Ok(CelVal::Int(0)),
        )))
        .unwrap();

        let mut dispatcher = OrderedDispatcher::new(vec![Arc::new(base)]);
        dispatcher.add_first(Arc::new(host));
        assert_eq!(dispatcher.dispatch(1, "double", &[Ok(CelVal::Int(5))]), Ok(CelVal::Int(0)));
        // No string overload in the host registry: falls through.
        assert_eq!(
            dispatcher.dispatch(1, "double", &[Ok(CelVal::from("x"))]),
            Ok(CelVal::from("xx"))
        );
    }

    #[test]
    fn test_overload_not_found_names_types() {
        let dispatcher = OrderedDispatcher::default();
        let err = dispatcher
            .dispatch(9, "missing", &[Ok(CelVal::Int(1)), Ok(CelVal::list(vec![]))])
            .unwrap_err();
        let err = err.as_error().unwrap();
        assert_eq!(err.id, 9);
        assert_eq!(err.message, "found no matching overload for 'missing' applied to '(int, list)'");
    }

    #[test]
    fn test_wrapped_args_match_scalar_params() {
        let f = double();
        let wrapped = CelVal::Wrapped(crate::value::Wrapper::Int(2));
        assert_eq!(f.dispatch(1, &[Ok(wrapped)]), Some(Ok(CelVal::Int(4))));
    }
}
