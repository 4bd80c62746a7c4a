//! Canonical function names for CEL operators.
//!
//! Parsers lower operators to calls with these names, and the planner and
//! standard library dispatch on them.

pub const ADD: &str = "_+_";
pub const SUBTRACT: &str = "_-_";
pub const MULTIPLY: &str = "_*_";
pub const DIVIDE: &str = "_/_";
pub const MODULO: &str = "_%_";
pub const NEGATE: &str = "-_";
pub const NOT: &str = "!_";
pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";

pub const EQUALS: &str = "_==_";
pub const NOT_EQUALS: &str = "_!=_";
pub const LESS: &str = "_<_";
pub const LESS_EQUALS: &str = "_<=_";
pub const GREATER: &str = "_>_";
pub const GREATER_EQUALS: &str = "_>=_";
pub const IN: &str = "@in";

pub const LOGICAL_AND: &str = "_&&_";
pub const LOGICAL_OR: &str = "_||_";
pub const CONDITIONAL: &str = "_?_:_";
pub const INDEX: &str = "_[_]";

/// Legacy spellings still emitted by some parsers.
pub const OLD_IN: &str = "_in_";
pub const OLD_NOT_STRICTLY_FALSE: &str = "__not_strictly_false__";

/// Returns true if `function` is an operator the planner evaluates itself
/// rather than dispatching through the function registry.
pub fn is_special_form(function: &str) -> bool {
    matches!(function, LOGICAL_AND | LOGICAL_OR | CONDITIONAL | INDEX)
}

/// Normalize legacy operator spellings to their canonical names.
pub fn canonical_name(function: &str) -> &str {
    match function {
        OLD_IN => IN,
        OLD_NOT_STRICTLY_FALSE => NOT_STRICTLY_FALSE,
        other => other,
    }
}

/// Human-readable symbol for an operator, used in diagnostics.
pub fn display_symbol(function: &str) -> Option<&'static str> {
    let sym = match function {
        ADD => "+",
        SUBTRACT | NEGATE => "-",
        MULTIPLY => "*",
        DIVIDE => "/",
        MODULO => "%",
        NOT => "!",
        EQUALS => "==",
        NOT_EQUALS => "!=",
        LESS => "<",
        LESS_EQUALS => "<=",
        GREATER => ">",
        GREATER_EQUALS => ">=",
        IN | OLD_IN => "in",
        LOGICAL_AND => "&&",
        LOGICAL_OR => "||",
        _ => return None,
    };
    Some(sym)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_forms() {
        assert!(is_special_form("_&&_"));
        assert!(is_special_form("_?_:_"));
        assert!(!is_special_form("_+_"));
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("_in_"), "@in");
        assert_eq!(canonical_name("__not_strictly_false__"), "@not_strictly_false");
        assert_eq!(canonical_name("size"), "size");
    }

    #[test]
    fn test_display_symbol() {
        assert_eq!(display_symbol("_<=_"), Some("<="));
        assert_eq!(display_symbol("size"), None);
    }
}
