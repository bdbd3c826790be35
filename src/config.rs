//! Formula configuration.
//!
//! Five named formulas drive the whole gate: one complexity formula per
//! simulation kind, the per-unit purchase price, and the trivial limit. The
//! variable names each formula may use are a stable external schema:
//!
//! | Formula | Variables |
//! |---------|-----------|
//! | `complexity_*` | `L M KM A S m C dT SMA PM T` |
//! | `purchase_cost` | `N R` |
//! | `trivial_limit` | `VAB SPH LP RW RD MC TS AC AD` |

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::expr::Evaluator;
use crate::formula::Formula;
use crate::scenario::SimulationKind;
use crate::time::Calendar;

/// Configured formulas, one per concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaSet {
    /// Complexity for [`SimulationKind::Default`] (and any unrecognized kind).
    pub complexity_default: Formula,
    /// Complexity for [`SimulationKind::Orbital`].
    pub complexity_orbital: Formula,
    /// Complexity for [`SimulationKind::Landed`].
    pub complexity_landed: Formula,
    /// Price of one budget unit.
    pub purchase_cost: Formula,
    /// Complexity below which sessions are not metered.
    pub trivial_limit: Formula,
}

impl Default for FormulaSet {
    fn default() -> Self {
        Self {
            complexity_default: Formula::new("10"),
            complexity_orbital: Formula::new("10"),
            complexity_landed: Formula::new("10"),
            purchase_cost: Formula::new("100"),
            trivial_limit: Formula::new("10"),
        }
    }
}

impl FormulaSet {
    /// Complexity formula for a kind.
    #[must_use]
    pub const fn complexity_for(&self, kind: SimulationKind) -> &Formula {
        match kind {
            SimulationKind::Orbital => &self.complexity_orbital,
            SimulationKind::Landed => &self.complexity_landed,
            SimulationKind::Default => &self.complexity_default,
        }
    }

    /// Named view over all formulas, for validation and diagnostics.
    #[must_use]
    pub fn named(&self) -> [(&'static str, &Formula); 5] {
        [
            ("complexity_default", &self.complexity_default),
            ("complexity_orbital", &self.complexity_orbital),
            ("complexity_landed", &self.complexity_landed),
            ("purchase_cost", &self.purchase_cost),
            ("trivial_limit", &self.trivial_limit),
        ]
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Formulas.
    pub formulas: FormulaSet,
    /// Calendar for time strings.
    pub calendar: Calendar,
}

impl SimConfig {
    /// Parses configuration JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Parses configuration JSON, falling back to defaults on any error.
    #[must_use]
    pub fn from_json_or_default(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse simulation config; using defaults");
                Self::default()
            }
        }
    }

    /// Serializes configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, ValidationError> {
        serde_json::to_string_pretty(self).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Checks that every formula parses and the calendar is usable.
    ///
    /// Parses go through `evaluator`, so a validated config is also warm in
    /// its cache.
    pub fn validate(&self, evaluator: &Evaluator) -> Result<(), ValidationError> {
        for (name, formula) in self.formulas.named() {
            evaluator
                .compile(formula)
                .map_err(|source| ValidationError::InvalidFormula { name, source })?;
        }

        let cal = self.calendar;
        if !(cal.day_seconds.is_finite() && cal.day_seconds > 0.0) {
            return Err(ValidationError::InvalidConfig {
                reason: "calendar.day_seconds must be > 0".to_string(),
            });
        }
        if !(cal.year_seconds.is_finite() && cal.year_seconds >= cal.day_seconds) {
            return Err(ValidationError::InvalidConfig {
                reason: "calendar.year_seconds must be >= day_seconds".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        config.validate(&Evaluator::new()).unwrap();
        assert_eq!(config.formulas.purchase_cost.text(), "100");
        assert_eq!(config.formulas.complexity_default.text(), "10");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SimConfig::from_json(
            r#"{ "formulas": { "complexity_orbital": "L * M / KM" } }"#,
        )
        .unwrap();
        assert_eq!(config.formulas.complexity_orbital.text(), "L * M / KM");
        assert_eq!(config.formulas.complexity_landed.text(), "10");
        assert_eq!(config.calendar, Calendar::default());
    }

    #[test]
    fn malformed_json_falls_back() {
        let config = SimConfig::from_json_or_default("{ not json");
        assert_eq!(config, SimConfig::default());
        assert!(SimConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn validate_names_the_broken_formula() {
        let mut config = SimConfig::default();
        config.formulas.trivial_limit = Formula::new("VAB +");
        let err = config.validate(&Evaluator::new()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidFormula { name: "trivial_limit", .. }
        ));
    }

    #[test]
    fn validate_checks_calendar() {
        let mut config = SimConfig::default();
        config.calendar.day_seconds = 0.0;
        assert!(config.validate(&Evaluator::new()).is_err());
    }

    #[test]
    fn kind_dispatch() {
        let formulas = FormulaSet {
            complexity_default: Formula::new("1"),
            complexity_orbital: Formula::new("2"),
            complexity_landed: Formula::new("3"),
            ..FormulaSet::default()
        };
        assert_eq!(formulas.complexity_for(SimulationKind::Default).text(), "1");
        assert_eq!(formulas.complexity_for(SimulationKind::Orbital).text(), "2");
        assert_eq!(formulas.complexity_for(SimulationKind::Landed).text(), "3");
    }

    #[test]
    fn json_round_trip_keeps_formula_text() {
        let config = SimConfig::default();
        let back = SimConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
