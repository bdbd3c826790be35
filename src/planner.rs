//! Configuration session: the state behind a "configure simulation" surface.
//!
//! Owns the scenario being edited and the trivial limit for the lifetime of
//! the surface, answers "can this start, and what will it cost", and hands a
//! frozen copy of the parameters to the session machine on activation.

use std::sync::Arc;

use crate::body::BodyCatalog;
use crate::complexity::{ComplexityModel, ComplexityResult};
use crate::config::SimConfig;
use crate::expr::Evaluator;
use crate::host::VesselProvider;
use crate::ledger::{is_metered, FacilityLevels, TrivialLimit};
use crate::scenario::ScenarioParameters;

/// What the surface shows before the user starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// Computed rate.
    pub complexity: ComplexityResult,
    /// Trivial limit in effect.
    pub trivial_limit: f64,
    /// Whether the session would consume budget.
    pub metered: bool,
    /// Budget for the full duration, 0 when unmetered. `None` when the rate
    /// is indeterminate.
    pub estimated_cost: Option<f64>,
    /// Flagged fields that matter for the chosen kind.
    pub invalid_fields: Vec<&'static str>,
    /// Whether a vessel with parts is selected.
    pub has_vessel: bool,
}

impl Preview {
    /// Returns true if activation would not be refused up front.
    #[must_use]
    pub fn can_start(&self) -> bool {
        self.has_vessel && self.invalid_fields.is_empty() && !self.complexity.is_indeterminate()
    }
}

/// Everything the session machine needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationRequest {
    /// Frozen parameters.
    pub params: ScenarioParameters,
    /// Trivial limit resolved for this configuration session.
    pub trivial_limit: f64,
}

/// One open configuration surface.
#[derive(Debug)]
pub struct ConfigSession {
    params: ScenarioParameters,
    facilities: FacilityLevels,
    trivial: TrivialLimit,
    config: Arc<SimConfig>,
    evaluator: Arc<Evaluator>,
    model: ComplexityModel,
}

impl ConfigSession {
    /// Opens a surface with default parameters.
    #[must_use]
    pub fn open(
        config: Arc<SimConfig>,
        evaluator: Arc<Evaluator>,
        bodies: Arc<BodyCatalog>,
        facilities: FacilityLevels,
    ) -> Self {
        let model = ComplexityModel::new(Arc::clone(&config), Arc::clone(&evaluator), bodies);
        Self {
            params: ScenarioParameters::new(config.calendar),
            facilities,
            trivial: TrivialLimit::new(),
            config,
            evaluator,
            model,
        }
    }

    /// Parameters being edited.
    #[must_use]
    pub const fn params(&self) -> &ScenarioParameters {
        &self.params
    }

    /// Mutable access for the surface's setters.
    pub fn params_mut(&mut self) -> &mut ScenarioParameters {
        &mut self.params
    }

    /// Trivial limit, evaluated on first use and cached for this surface.
    pub fn trivial_limit(&mut self) -> f64 {
        self.trivial
            .resolve(&self.evaluator, &self.config.formulas.trivial_limit, &self.facilities)
    }

    /// Computes the current rate and derived figures.
    pub fn preview(&mut self, vessels: &dyn VesselProvider, now_ut: f64) -> Preview {
        let trivial_limit = self.trivial_limit();
        let complexity = self.model.compute(&self.params, vessels, now_ut);
        let metered = is_metered(complexity.rate(), trivial_limit);
        let estimated_cost = if complexity.is_indeterminate() {
            None
        } else if metered {
            Some(complexity.rate() * self.params.duration())
        } else {
            Some(0.0)
        };
        Preview {
            complexity,
            trivial_limit,
            metered,
            estimated_cost,
            invalid_fields: self.params.invalid_fields(),
            has_vessel: self.params.vessel().is_some_and(|v| !v.is_empty()),
        }
    }

    /// Freezes the parameters for activation.
    pub fn activation_request(&mut self) -> ActivationRequest {
        ActivationRequest {
            trivial_limit: self.trivial_limit(),
            params: self.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;
    use crate::scenario::{SimulationKind, VesselHandle};

    struct Priced;

    impl VesselProvider for Priced {
        fn mass(&self, _: &VesselHandle) -> Option<f64> {
            Some(5.0)
        }

        fn cost(&self, _: &VesselHandle) -> Option<f64> {
            Some(1000.0)
        }
    }

    fn open(default_formula: &str, trivial: &str) -> ConfigSession {
        let mut config = SimConfig::default();
        config.formulas.complexity_default = Formula::new(default_formula);
        config.formulas.trivial_limit = Formula::new(trivial);
        ConfigSession::open(
            Arc::new(config),
            Arc::new(Evaluator::new()),
            Arc::new(BodyCatalog::stock()),
            FacilityLevels::uniform(1.0),
        )
    }

    #[test]
    fn no_vessel_cannot_start() {
        let mut session = open("10", "5");
        let preview = session.preview(&Priced, 0.0);
        assert!(!preview.has_vessel);
        assert!(!preview.can_start());
        assert_eq!(preview.estimated_cost, None);
    }

    #[test]
    fn metered_preview_estimates_cost() {
        let mut session = open("m * 2", "5");
        session.params_mut().set_vessel(Some(VesselHandle::new("ship", 3)));
        session.params_mut().set_duration(60.0);
        let preview = session.preview(&Priced, 0.0);
        assert!(preview.can_start());
        assert!(preview.metered);
        assert_eq!(preview.estimated_cost, Some(600.0));
    }

    #[test]
    fn trivial_session_is_free() {
        let mut session = open("m", "VAB * 10");
        session.params_mut().set_vessel(Some(VesselHandle::new("ship", 3)));
        let preview = session.preview(&Priced, 0.0);
        assert_eq!(preview.trivial_limit, 10.0);
        assert!(!preview.metered);
        assert_eq!(preview.estimated_cost, Some(0.0));
    }

    #[test]
    fn invalid_fields_block_start() {
        let mut session = open("10", "0");
        session.params_mut().set_vessel(Some(VesselHandle::new("ship", 3)));
        session.params_mut().set_kind(SimulationKind::Landed);
        session.params_mut().set_latitude("north");
        let preview = session.preview(&Priced, 0.0);
        assert_eq!(preview.invalid_fields, vec!["latitude"]);
        assert!(!preview.can_start());
    }

    #[test]
    fn request_carries_cached_limit() {
        let mut session = open("10", "VAB + 1");
        let request = session.activation_request();
        assert_eq!(request.trivial_limit, 2.0);
        assert_eq!(request.params, *session.params());
    }
}
