//! cel-eval: an evaluation engine for the Common Expression Language.
//!
//! Expressions arrive as a [`cel_eval_common::Expr`] tree produced by an
//! external parser (or decoded from a `cel.expr.ParsedExpr`), are compiled by
//! the [`Planner`] into an [`Interpretable`] and evaluated against an
//! [`Activation`] to a [`CelResult`].
//!
//! # Quick Start
//!
//! ```
//! use cel_eval::{CelEnv, CelVal};
//! use cel_eval_common::ExprBuilder;
//! use serde_json::json;
//!
//! let mut env = CelEnv::new();
//! env.set("user", json!({"age": 30}));
//!
//! let mut b = ExprBuilder::new();
//! let user = b.ident("user");
//! let age = b.select(user, "age");
//! let limit = b.int(18);
//! let expr = b.call("_>=_", vec![age, limit]);
//!
//! let plan = env.plan(&expr).unwrap();
//! assert_eq!(env.eval(&plan), Ok(CelVal::Bool(true)));
//! ```
//!
//! # Architecture
//!
//! - **Values** ([`value`]): `CelVal`, timestamps, durations, lazily adapted
//!   containers, and errors as data (`CelError`, `CelUnknown`).
//! - **Adapters** ([`adapter`]): one per host representation (CEL, JSON,
//!   protobuf reflection, `cel.expr` wire values).
//! - **Functions** ([`func`], [`stdlib`], [`ext`]): overloads guarded by
//!   runtime types, composed through an ordered dispatcher.
//! - **Planner** ([`planner`]): name resolution, short-circuit logic,
//!   attribute chains.
//! - **Environment** ([`CelEnv`]): bindings and the parse, plan, eval
//!   pipeline.

pub mod activation;
pub mod adapter;
mod env;
pub mod ext;
pub mod func;
pub mod planner;
pub mod provider;
pub mod stdlib;
pub mod value;

pub use activation::{Activation, EmptyActivation, HierarchicalActivation, MapActivation};
pub use adapter::{CelAdapter, NativeAdapter, ProtoAdapter, ProtoProvider, ValueAdapter, WireAdapter};
pub use env::{Binding, CelEnv, EnvError, Parser};
pub use func::{Dispatcher, FuncError, FuncRegistry, Function, OrderedDispatcher, Overload};
pub use planner::{Interpretable, PlanError, Planner};
pub use provider::{EmptyProvider, ValueProvider};
pub use stdlib::{standard_functions, standard_registry};
pub use value::{CelError, CelList, CelMap, CelObject, CelResult, CelUnknown, CelVal, Duration, ErrorKind, Fault, Timestamp};
