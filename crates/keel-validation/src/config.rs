//! Options controlling how objects treat keys they do not declare.

// ============================================================================
// Unknown Key Handling
// ============================================================================

/// How an object schema treats keys that are not among its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Drop unknown keys from the output (default)
    #[default]
    Strip,
    /// Keep unknown keys in the output untouched
    Passthrough,
    /// Reject the object, reporting every unknown key
    Strict,
}

// ============================================================================
// Top-level Parse Mode
// ============================================================================

/// Mode applied to the top-level object of a parse.
///
/// Nested objects keep their own [`UnknownKeys`] policy either way. Schemas
/// whose root is not an object are parsed the same in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectMode {
    /// Unknown top-level keys are carried into the output
    #[default]
    Passthrough,
    /// Unknown top-level keys fail the parse
    Strict,
}

impl ObjectMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Passthrough
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }

    pub(crate) fn root_policy(&self) -> UnknownKeys {
        match self {
            Self::Passthrough => UnknownKeys::Passthrough,
            Self::Strict => UnknownKeys::Strict,
        }
    }
}
