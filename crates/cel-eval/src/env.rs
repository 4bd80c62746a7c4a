//! The evaluation environment: parse, plan and evaluate against a set of
//! variable bindings.
//!
//! `CelEnv` owns the bindings, the function dispatcher, the proto type
//! registry and the container. Plans are immutable and can be evaluated many
//! times, against the environment's own bindings or a caller's activation.
//!
//! # Example
//!
//! ```
//! use cel_eval::{CelEnv, CelVal};
//! use cel_eval_common::ExprBuilder;
//!
//! let mut env = CelEnv::new();
//! env.set("x", 41i64);
//!
//! let mut b = ExprBuilder::new();
//! let x = b.ident("x");
//! let one = b.int(1);
//! let expr = b.call("_+_", vec![x, one]);
//!
//! let plan = env.plan(&expr).unwrap();
//! assert_eq!(env.eval(&plan), Ok(CelVal::Int(42)));
//! ```

use std::fmt;
use std::sync::Arc;

use cel_eval_common::{Expr, Namespace, ProtoTypeRegistry};
use cel_eval_proto::{from_parsed_expr, ConversionError, ParsedExpr};
use prost_reflect::DynamicMessage;
use serde_json::Value as Json;
use thiserror::Error;
use tracing::debug;

use crate::activation::{Activation, MapActivation};
use crate::adapter::{NativeAdapter, ProtoAdapter, ProtoProvider, ValueAdapter, WireAdapter};
use crate::func::{Dispatcher, FuncRegistry, OrderedDispatcher};
use crate::planner::{Interpretable, PlanError, Planner};
use crate::stdlib::standard_registry;
use crate::value::{CelResult, CelVal, Fault};

/// Turns source text into an expression tree. The grammar lives outside this
/// crate; hosts plug a parser in with [`CelEnv::with_parser`].
pub trait Parser: Send + Sync {
    fn parse(&self, source: &str) -> Result<Expr, String>;
}

impl<F> Parser for F
where
    F: Fn(&str) -> Result<Expr, String> + Send + Sync,
{
    fn parse(&self, source: &str) -> Result<Expr, String> {
        self(source)
    }
}

/// Host-level failures. Evaluation errors are never reported here; they are
/// values inside the returned [`CelResult`].
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("no parser configured")]
    NoParser,

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// A value to bind, in any representation the environment can adapt.
#[derive(Debug, Clone)]
pub enum Binding {
    /// An already-adapted value.
    Cel(CelVal),
    /// An already-adapted result; binding an error or unknown is allowed.
    Result(CelResult),
    /// A JSON-like host value, read through the native adapter.
    Json(Json),
    /// A protobuf message, read through the proto adapter.
    Message(DynamicMessage),
    /// A `cel.expr.Value`, read through the wire adapter.
    Wire(cel_eval_proto::Value),
}

macro_rules! cel_binding {
    ($($t:ty),*) => {
        $(impl From<$t> for Binding {
            fn from(v: $t) -> Self {
                Binding::Cel(CelVal::from(v))
            }
        })*
    };
}

cel_binding!(bool, i64, u64, f64, &str, String);

impl From<CelVal> for Binding {
    fn from(v: CelVal) -> Self {
        Binding::Cel(v)
    }
}

impl From<CelResult> for Binding {
    fn from(r: CelResult) -> Self {
        Binding::Result(r)
    }
}

impl From<Json> for Binding {
    fn from(v: Json) -> Self {
        Binding::Json(v)
    }
}

impl From<DynamicMessage> for Binding {
    fn from(m: DynamicMessage) -> Self {
        Binding::Message(m)
    }
}

impl From<cel_eval_proto::Value> for Binding {
    fn from(v: cel_eval_proto::Value) -> Self {
        Binding::Wire(v)
    }
}

/// Parser, planner and variable bindings.
pub struct CelEnv {
    vars: MapActivation,
    namespace: Namespace,
    registry: ProtoTypeRegistry,
    dispatcher: OrderedDispatcher,
    parser: Option<Arc<dyn Parser>>,
}

impl fmt::Debug for CelEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CelEnv")
            .field("vars", &self.vars)
            .field("namespace", &self.namespace)
            .field("dispatcher", &self.dispatcher)
            .field("parser", &self.parser.is_some())
            .finish()
    }
}

impl Default for CelEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl CelEnv {
    /// An environment with the standard library, the well-known proto types
    /// and the root container.
    pub fn new() -> Self {
        let standard: Arc<dyn Dispatcher> = standard_registry();
        Self {
            vars: MapActivation::new(),
            namespace: Namespace::root(),
            registry: ProtoTypeRegistry::new(),
            dispatcher: OrderedDispatcher::new(vec![standard]),
            parser: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.set_container(container);
        self
    }

    pub fn with_proto_registry(mut self, registry: ProtoTypeRegistry) -> Self {
        self.set_proto_registry(registry);
        self
    }

    pub fn with_functions(mut self, functions: Arc<FuncRegistry>) -> Self {
        self.add_funcs(functions);
        self
    }

    pub fn with_parser(mut self, parser: impl Parser + 'static) -> Self {
        self.set_parser(parser);
        self
    }

    pub fn set_container(&mut self, container: impl Into<String>) {
        self.namespace = Namespace::new(container);
        debug!(container = %self.namespace.name(), "container set");
    }

    pub fn set_proto_registry(&mut self, registry: ProtoTypeRegistry) {
        self.registry = registry;
        debug!("proto registry replaced");
    }

    /// Add functions consulted after every registry already present, so
    /// the standard library keeps priority for names both define.
    pub fn add_funcs(&mut self, functions: Arc<dyn Dispatcher>) {
        debug!("functions appended");
        self.dispatcher.add(functions);
    }

    /// Add functions consulted before every registry already present.
    pub fn override_funcs(&mut self, functions: Arc<dyn Dispatcher>) {
        debug!("functions prepended");
        self.dispatcher.add_first(functions);
    }

    pub fn set_parser(&mut self, parser: impl Parser + 'static) {
        self.parser = Some(Arc::new(parser));
    }

    pub fn container(&self) -> &str {
        self.namespace.name()
    }

    pub fn proto_registry(&self) -> &ProtoTypeRegistry {
        &self.registry
    }

    fn proto_adapter(&self) -> ProtoAdapter {
        ProtoAdapter::new(self.registry.clone())
    }

    /// Bind `name`, adapting the value from its host representation.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Binding>) {
        let name = name.into();
        let result = match value.into() {
            Binding::Cel(v) => Ok(v),
            Binding::Result(r) => r,
            Binding::Json(json) => NativeAdapter.to_cel(0, &json),
            Binding::Message(msg) => self.proto_adapter().message_to_cel(0, &msg),
            Binding::Wire(v) => WireAdapter::with_proto(self.proto_adapter()).to_cel(0, &v),
        };
        debug!(name = %name, ok = result.is_ok(), "binding set");
        self.vars.insert_result(name, result);
    }

    /// Drop the binding for `name`, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<CelResult> {
        debug!(name = %name, "binding removed");
        self.vars.remove(name)
    }

    pub fn bindings(&self) -> &MapActivation {
        &self.vars
    }

    pub fn parse(&self, source: &str) -> Result<Expr, EnvError> {
        let parser = self.parser.as_ref().ok_or(EnvError::NoParser)?;
        parser.parse(source).map_err(EnvError::Parse)
    }

    /// The planner for the current functions, registry and container.
    pub fn planner(&self) -> Planner {
        let provider = Arc::new(ProtoProvider::new(self.proto_adapter()));
        Planner::new(Arc::new(self.dispatcher.clone()), provider, self.namespace.clone())
    }

    pub fn plan(&self, expr: &Expr) -> Result<Interpretable, EnvError> {
        debug!(id = expr.id, container = %self.namespace.name(), "planning");
        Ok(self.planner().plan(expr)?)
    }

    /// Plan a `cel.expr.ParsedExpr` produced by another CEL implementation.
    pub fn plan_parsed(&self, parsed: &ParsedExpr) -> Result<Interpretable, EnvError> {
        self.plan(&from_parsed_expr(parsed)?)
    }

    /// Evaluate against this environment's bindings.
    pub fn eval(&self, plan: &Interpretable) -> CelResult {
        plan.eval(&self.vars)
    }

    /// Evaluate against a caller-supplied activation.
    pub fn eval_with(&self, plan: &Interpretable, vars: &dyn Activation) -> CelResult {
        plan.eval(vars)
    }

    /// Parse, plan and evaluate.
    pub fn run(&self, source: &str) -> Result<CelResult, EnvError> {
        let expr = self.parse(source)?;
        let plan = self.plan(&expr)?;
        Ok(self.eval(&plan))
    }

    /// [`run`](Self::run), handing the value back as JSON. Values with no
    /// JSON form become errors.
    pub fn run_json(&self, source: &str) -> Result<Result<Json, Fault>, EnvError> {
        Ok(self.run(source)?.and_then(|v| NativeAdapter.from_cel(0, &v)))
    }
}
