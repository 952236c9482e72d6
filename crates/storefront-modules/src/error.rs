//! # Module Error Types
//!
//! Registry misuse and module warm-up failures.
//!
//! The safe accessor never produces these; only the strict accessor and
//! `register_module` do.

use thiserror::Error;

use crate::module::ModuleName;

/// Result type alias for registry operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Registry and module lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// A strict accessor was used outside any registry provider scope.
    #[error("{accessor} must be used within a module registry provider scope")]
    MissingProvider { accessor: &'static str },

    /// A module's `initialize` failed.
    #[error("Module '{name}' failed to initialize: {reason}")]
    InitializationFailed { name: ModuleName, reason: String },
}

impl ModuleError {
    /// Returns true for programmer faults (as opposed to runtime failures).
    pub fn is_misuse(&self) -> bool {
        matches!(self, ModuleError::MissingProvider { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ModuleError::MissingProvider {
            accessor: "use_module_registry",
        };
        assert_eq!(
            err.to_string(),
            "use_module_registry must be used within a module registry provider scope"
        );
        assert!(err.is_misuse());

        let err = ModuleError::InitializationFailed {
            name: ModuleName::Cart,
            reason: "connection error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Module 'cart' failed to initialize: connection error"
        );
        assert!(!err.is_misuse());
    }
}
