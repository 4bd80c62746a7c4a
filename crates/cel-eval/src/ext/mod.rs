//! Opt-in function libraries beyond the standard set.
//!
//! ```ignore
//! let env = CelEnv::new().with_functions(cel_eval::ext::strings_registry());
//! ```

use std::sync::Arc;

use crate::func::FuncRegistry;

pub mod strings;

/// A registry holding the strings extension.
pub fn strings_registry() -> Arc<FuncRegistry> {
    let mut registry = FuncRegistry::new();
    for function in strings::functions() {
        registry.insert(function);
    }
    Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::Dispatcher;

    #[test]
    fn test_strings_registry() {
        let registry = strings_registry();
        assert_eq!(registry.len(), strings::functions().len());
        assert!(registry.find("strings.quote").is_some());
        assert!(registry.find("_+_").is_none());
    }
}
