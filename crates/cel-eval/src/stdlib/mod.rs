//! The standard function library: operators, casts, string predicates and
//! time accessors.
//!
//! Every function here is an ordinary registry entry, so hosts can shadow any
//! of them by registering a function of the same name in a higher-priority
//! registry.

use std::sync::{Arc, OnceLock};

use cel_eval_common::CelType;

use crate::func::{FuncRegistry, Function};
use crate::value::{CelError, CelVal, Fault};

mod cast;
mod logic;
mod math;
mod time;

/// Every standard function, one entry per name.
pub fn standard_functions() -> Vec<Function> {
    let mut functions = logic::functions();
    functions.extend(math::functions());
    functions.extend(cast::functions());
    functions.extend(time::functions());
    functions
}

/// The shared standard registry.
pub fn standard_registry() -> Arc<FuncRegistry> {
    static REGISTRY: OnceLock<Arc<FuncRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            let mut registry = FuncRegistry::new();
            for function in standard_functions() {
                registry.insert(function);
            }
            Arc::new(registry)
        })
        .clone()
}

/// The arguments passed the overload guard but not the implementation's own
/// pattern; reported like any other dispatch miss.
pub(crate) fn no_overload(id: i64, function: &str, args: &[&CelVal]) -> Fault {
    let types: Vec<CelType> = args.iter().map(|a| a.cel_type()).collect();
    CelError::overload_not_found(id, function, &types).into()
}
