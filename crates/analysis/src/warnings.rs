//! Diagnostic warnings attached to rules or to the analysis as a whole.
//!
//! The kind set is closed: message text is informational only and every
//! machine-consumable detail lives in the structured fields.

use crate::model::RuleId;

/// Closed warning taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Structural pseudo-class in the selector.
    StructuralDynamic,
    /// Container-size dependency with no registered container ancestor.
    MissingContainer,
    /// Portal target could not be resolved to a rule.
    PortalMissing,
    /// A token chain reached a missing token; a fallback was used if present.
    UnresolvedToken,
    /// A referenced token was never defined and no fallback was given.
    UndefinedToken,
    /// A math function mixes absolute and runtime operands.
    MixedOperands,
    /// A token chain references itself.
    TokenCycle,
    /// Anomalous dependency chain (effective-parent cycle and similar).
    DepWarning,
}

impl WarningKind {
    /// Stable machine name for the summary output.
    pub fn name(self) -> &'static str {
        match self {
            Self::StructuralDynamic => "STRUCTURAL_DYNAMIC",
            Self::MissingContainer => "MISSING_CONTAINER",
            Self::PortalMissing => "PORTAL_MISSING",
            Self::UnresolvedToken => "UNRESOLVED_TOKEN",
            Self::UndefinedToken => "UNDEFINED_TOKEN",
            Self::MixedOperands => "MIXED_OPERANDS",
            Self::TokenCycle => "TOKEN_CYCLE",
            Self::DepWarning => "DEP_WARNING",
        }
    }
}

/// One warning record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub node: Option<RuleId>,
    pub message: String,
    pub token_name: Option<String>,
    pub referenced_token: Option<String>,
    pub property: Option<String>,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node: None,
            message: message.into(),
            token_name: None,
            referenced_token: None,
            property: None,
        }
    }
}
