//! # simgate - metered simulation sessions
//!
//! simgate gates an expensive, time-accelerated simulation behind a budget
//! that depletes while the simulation runs and can be topped up by purchase.
//! The consumption rate comes from a user-configurable formula over the
//! scenario's physical parameters.
//!
//! ## Core Concepts
//!
//! - **Formula**: a small arithmetic expression over named variables
//! - **Complexity**: budget units consumed per simulated second
//! - **Ledger**: the persisted remaining budget
//! - **Session**: one activation-to-deactivation lifecycle, bracketed by a
//!   world snapshot and restore
//! - **Trivial limit**: complexity below which sessions run for free
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use simgate::{
//!     BodyCatalog, ConfigSession, Evaluator, FacilityLevels, Ledger, SessionMachine, SimConfig,
//! };
//!
//! let config = Arc::new(SimConfig::from_json_or_default(&json));
//! let evaluator = Arc::new(Evaluator::new());
//! config.validate(&evaluator)?;
//! let bodies = Arc::new(BodyCatalog::stock());
//!
//! let levels = FacilityLevels::uniform(1.0);
//! let mut surface =
//!     ConfigSession::open(config.clone(), evaluator.clone(), bodies.clone(), levels);
//! surface.params_mut().set_vessel(Some(vessel));
//! surface.params_mut().set_duration_str("15m")?;
//!
//! let mut machine = SessionMachine::new(config, evaluator, bodies, Ledger::new(100.0), host);
//! machine.activate(surface.activation_request())?;
//! // every frame:
//! machine.tick(ut);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Formula evaluation
pub mod error;
pub mod expr;
pub mod formula;
pub mod variables;

// Scenario model
pub mod body;
pub mod complexity;
pub mod config;
pub mod orbit;
pub mod scenario;
pub mod time;

// Budget and lifecycle
pub mod host;
pub mod ledger;
pub mod planner;
pub mod session;

pub use body::{BodyCatalog, BodyId, CelestialBody};
pub use complexity::{ComplexityModel, ComplexityResult, INDETERMINATE};
pub use config::{FormulaSet, SimConfig};
pub use error::{
    ExprError, HostError, LedgerError, SessionError, SimError, SimResult, ValidationError,
};
pub use expr::{evaluate, Evaluator, Expression};
pub use formula::{Formula, FormulaId};
pub use host::{
    restore_channel, EditorContext, EditorFacility, EntityId, FundsProvider, RestoreCompletion,
    RestorePoll, RestoreTarget, RestoreTicket, SessionHost, SnapshotHandle, Spawner, VesselProvider,
    WorldHost,
};
pub use ledger::{
    Facility, FacilityLevels, FacilityUpgrade, GameMode, Ledger, LedgerCheckpoint, PurchaseReceipt,
    TrivialLimit,
};
pub use orbit::{
    FieldOutcome, InsertionState, LandedSite, OrbitInsertion, OrbitalElements, Placement,
    StartPoint,
};
pub use planner::{ActivationRequest, ConfigSession, Preview};
pub use scenario::{CrewHandle, Field, ScenarioParameters, SimulationKind, VesselHandle};
pub use session::{Session, SessionId, SessionMachine, SessionState, TickOutcome};
pub use time::{Calendar, TimeReading};
pub use variables::VariableSet;
