//! Complexity model: the budget consumption rate of a scenario.
//!
//! The rate comes from one of three configured formulas, chosen by simulation
//! kind, evaluated over these variables:
//!
//! | Name | Meaning |
//! |------|---------|
//! | `L`  | simulated duration, seconds |
//! | `M`  | selected body mass |
//! | `KM` | home body mass |
//! | `A`  | 1 if the selected body has an atmosphere |
//! | `S`  | 1 if the selected body is a moon |
//! | `m`  | vessel mass |
//! | `C`  | vessel cost |
//! | `dT` | target time minus now |
//! | `SMA`| orbit ratio of the ultimate parent to the home body, `>= 1` |
//! | `PM` | ultimate parent mass |
//! | `T`  | kind tag |
//!
//! Any failure yields [`INDETERMINATE`] rather than an error.

use std::sync::Arc;

use crate::body::BodyCatalog;
use crate::config::SimConfig;
use crate::error::{SessionError, SimResult, ValidationError};
use crate::expr::Evaluator;
use crate::host::VesselProvider;
use crate::scenario::ScenarioParameters;
use crate::variables::VariableSet;

/// Rate reported when the cost cannot be determined.
pub const INDETERMINATE: f64 = -1.0;

/// A computed rate and the variables it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityResult {
    rate: f64,
    variables: VariableSet,
}

impl ComplexityResult {
    fn indeterminate(variables: VariableSet) -> Self {
        Self {
            rate: INDETERMINATE,
            variables,
        }
    }

    /// Budget units per simulated second, or [`INDETERMINATE`].
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Variables used, for diagnostics.
    #[must_use]
    pub const fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Returns true if the simulation cannot be started at this rate.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.rate < 0.0
    }
}

/// Computes complexity from scenario parameters.
#[derive(Debug, Clone)]
pub struct ComplexityModel {
    config: Arc<SimConfig>,
    evaluator: Arc<Evaluator>,
    bodies: Arc<BodyCatalog>,
}

impl ComplexityModel {
    /// Creates a model.
    #[must_use]
    pub const fn new(
        config: Arc<SimConfig>,
        evaluator: Arc<Evaluator>,
        bodies: Arc<BodyCatalog>,
    ) -> Self {
        Self {
            config,
            evaluator,
            bodies,
        }
    }

    /// Builds the formula variables for `params`.
    pub fn variables(
        &self,
        params: &ScenarioParameters,
        vessels: &dyn VesselProvider,
        now_ut: f64,
    ) -> SimResult<VariableSet> {
        let vessel = params.vessel().ok_or(SessionError::NoVesselSelected)?;
        let mass = vessel_value(vessels.mass(vessel), "m")?;
        let cost = vessel_value(vessels.cost(vessel), "C")?;

        let bodies = &*self.bodies;
        let body_id = params.body_or_home(bodies);
        let unknown = || ValidationError::UnknownBody {
            name: body_id.to_string(),
        };
        let body = bodies.get(body_id).ok_or_else(unknown)?;
        let home = bodies.get(bodies.home()).ok_or_else(unknown)?;
        let parent = bodies
            .ultimate_parent(body_id)
            .and_then(|id| bodies.get(id))
            .ok_or_else(unknown)?;
        let orbit_ratio = bodies.orbit_ratio(body_id).ok_or_else(unknown)?;

        let mut vars = VariableSet::new();
        vars.insert("L", params.duration());
        vars.insert("M", body.mass);
        vars.insert("KM", home.mass);
        vars.insert_flag("A", body.atmosphere);
        vars.insert_flag("S", bodies.is_satellite(body_id));
        vars.insert("m", mass);
        vars.insert("C", cost);
        vars.insert("dT", params.target_ut(now_ut) - now_ut);
        vars.insert("SMA", orbit_ratio);
        vars.insert("PM", parent.mass);
        vars.insert("T", f64::from(params.kind().tag()));
        Ok(vars)
    }

    /// Computes the rate, failing closed to [`INDETERMINATE`].
    #[must_use]
    pub fn compute(
        &self,
        params: &ScenarioParameters,
        vessels: &dyn VesselProvider,
        now_ut: f64,
    ) -> ComplexityResult {
        let vars = match self.variables(params, vessels, now_ut) {
            Ok(vars) => vars,
            Err(e) => {
                tracing::warn!(error = %e, kind = %params.kind(), "Complexity inputs unavailable");
                return ComplexityResult::indeterminate(VariableSet::new());
            }
        };

        let formula = self.config.formulas.complexity_for(params.kind());
        match self.evaluator.evaluate(formula, &vars) {
            Ok(rate) => {
                tracing::debug!(
                    rate,
                    kind = %params.kind(),
                    formula = %formula.id(),
                    "Complexity computed"
                );
                ComplexityResult { rate, variables: vars }
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = %params.kind(), "Complexity formula failed");
                ComplexityResult::indeterminate(vars)
            }
        }
    }
}

fn vessel_value(value: Option<f64>, field: &'static str) -> Result<f64, ValidationError> {
    value
        .filter(|v| v.is_finite())
        .ok_or(ValidationError::Unresolved { field })
}
