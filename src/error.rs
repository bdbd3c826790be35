//! Error types for simgate.
//!
//! All errors in simgate are strongly typed using thiserror.
//! Every failure mode of the session boundary maps onto one of these
//! variants so the host can always turn it into a visible state or a log line.

use thiserror::Error;

fn offset_suffix(offset: &Option<usize>) -> String {
    offset.map(|o| format!(" at offset {o}")).unwrap_or_default()
}

fn join_fields(fields: &[&'static str]) -> String {
    fields.join(", ")
}

/// Errors raised by the expression evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The formula could not be tokenized, parsed, or bound to variables.
    #[error("Malformed expression{}: {reason}", offset_suffix(.offset))]
    MalformedExpression {
        reason: String,
        offset: Option<usize>,
    },

    /// The formula parsed but could not produce a finite number.
    #[error("Evaluation error: {reason}")]
    EvaluationError {
        reason: String,
    },
}

impl ExprError {
    pub(crate) fn malformed(reason: impl Into<String>, offset: Option<usize>) -> Self {
        Self::MalformedExpression {
            reason: reason.into(),
            offset,
        }
    }

    pub(crate) fn evaluation(reason: impl Into<String>) -> Self {
        Self::EvaluationError {
            reason: reason.into(),
        }
    }

    /// Returns true if the formula text itself is at fault.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedExpression { .. })
    }
}

/// Validation errors for configuration and user input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is not a number: '{input}'")]
    NotANumber {
        field: &'static str,
        input: String,
    },

    #[error("Field '{field}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid time string '{input}': {reason}")]
    InvalidTimeString {
        input: String,
        reason: String,
    },

    #[error("Formula '{name}' is invalid: {source}")]
    InvalidFormula {
        name: &'static str,
        #[source]
        source: ExprError,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Unknown body: {name}")]
    UnknownBody {
        name: String,
    },

    #[error("Input '{field}' could not be resolved")]
    Unresolved {
        field: &'static str,
    },
}

/// Errors reported by host collaborators (world snapshot/restore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("World snapshot failed: {reason}")]
    SnapshotFailed {
        reason: String,
    },

    #[error("World restore failed: {reason}")]
    RestoreFailed {
        reason: String,
    },

    #[error("World restore was abandoned before completion")]
    RestoreAbandoned,

    #[error("Snapshot deletion failed: {reason}")]
    DeleteFailed {
        reason: String,
    },
}

/// Errors from the resource ledger and the purchase flow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Purchase amount must be finite and positive, got {amount}")]
    InvalidAmount {
        amount: f64,
    },

    #[error("Insufficient funds for purchase costing {cost}")]
    InsufficientFunds {
        cost: f64,
    },

    #[error("Purchase price could not be computed: {0}")]
    Pricing(#[from] ExprError),

    #[error("Purchases are unavailable while a restore is pending")]
    Unavailable,
}

/// Errors raised at the session boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("No vessel selected")]
    NoVesselSelected,

    #[error("Invalid orbital parameters: {}", join_fields(.fields))]
    InvalidOrbitalParameters {
        fields: Vec<&'static str>,
    },

    #[error("Simulation cost is indeterminate")]
    ComplexityIndeterminate,

    #[error("Failed to spawn vessel at {body}")]
    SpawnFailure {
        body: String,
    },

    #[error("Snapshot/restore failure: {0}")]
    SnapshotOrRestoreFailure(#[from] HostError),

    #[error("No simulation session is active")]
    NoActiveSession,
}

impl SessionError {
    /// Returns true if the activation was refused before touching the world.
    #[must_use]
    pub const fn is_activation_refusal(&self) -> bool {
        matches!(
            self,
            Self::NoVesselSelected
                | Self::InvalidOrbitalParameters { .. }
                | Self::ComplexityIndeterminate
        )
    }
}

/// Top-level error type for simgate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SimError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a session error.
    #[must_use]
    pub const fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    /// Returns true if the user can correct the input and try again.
    ///
    /// Snapshot and restore failures are never recoverable: an unrestored
    /// world must be looked at by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Expr(_) | Self::Validation(_) | Self::Ledger(_) => true,
            Self::Session(e) => !matches!(e, SessionError::SnapshotOrRestoreFailure(_)),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for simgate operations.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_with_offset() {
        let err = ExprError::malformed("unexpected ')'", Some(4));
        let msg = format!("{err}");
        assert!(msg.contains("offset 4"));
        assert!(msg.contains("unexpected ')'"));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_malformed_without_offset() {
        let err = ExprError::malformed("unknown variable 'X'", None);
        let msg = format!("{err}");
        assert!(!msg.contains("offset"));
        assert!(msg.contains("'X'"));
    }

    #[test]
    fn test_evaluation_error() {
        let err = ExprError::evaluation("division by zero");
        assert!(!err.is_malformed());
        assert!(format!("{err}").contains("division by zero"));
    }

    #[test]
    fn test_invalid_orbital_parameters_lists_fields() {
        let err = SessionError::InvalidOrbitalParameters {
            fields: vec!["apoapsis", "inclination"],
        };
        let msg = format!("{err}");
        assert!(msg.contains("apoapsis, inclination"));
        assert!(err.is_activation_refusal());
    }

    #[test]
    fn test_sim_error_from_session() {
        let err: SimError = SessionError::NoVesselSelected.into();
        assert!(err.is_session());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_snapshot_failure_not_recoverable() {
        let err: SimError = SessionError::from(HostError::RestoreAbandoned).into();
        assert!(!err.is_recoverable());
        assert!(!SessionError::from(HostError::RestoreAbandoned).is_activation_refusal());
    }

    #[test]
    fn test_ledger_pricing_from_expr() {
        let err: LedgerError = ExprError::evaluation("overflow").into();
        assert!(format!("{err}").contains("overflow"));
        let top: SimError = err.into();
        assert!(top.is_recoverable());
    }

    #[test]
    fn test_internal() {
        let err = SimError::internal("unexpected state");
        assert!(!err.is_recoverable());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
