//! Simulation sessions.
//!
//! A [`Session`] is one activation-to-deactivation lifecycle. The
//! [`SessionMachine`] owns at most one of them and drives it from the host's
//! periodic callback:
//!
//! ```text
//! Idle --activate--> Activating --> Active <--> Exhausted
//!                                     |            |
//!                                     +--deactivate+--> Deactivating --> Idle
//! ```

mod machine;

pub use machine::SessionMachine;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::complexity::ComplexityResult;
use crate::error::HostError;
use crate::host::{EditorContext, EntityId, SnapshotHandle};
use crate::orbit::InsertionState;
use crate::scenario::ScenarioParameters;

/// Stable identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally visible machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Inside `activate`.
    Activating,
    /// Running.
    Active,
    /// Running but out of budget; waiting for a purchase or a stop.
    Exhausted,
    /// Waiting for the world restore to finish.
    Deactivating,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing is running.
    Idle,
    /// Budget was consumed.
    Running {
        /// Budget left.
        remaining: f64,
    },
    /// The session runs below the trivial limit.
    Unmetered,
    /// Out of budget; the host should show the blocking prompt.
    Exhausted {
        /// Budget left, zero or negative.
        remaining: f64,
    },
    /// The restore has not completed yet.
    Restoring,
    /// The restore completed and the machine is idle.
    Restored,
    /// The restore failed or was abandoned; the machine is idle.
    RestoreFailed(HostError),
}

/// An active simulation.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    params: ScenarioParameters,
    complexity: ComplexityResult,
    metered: bool,
    trivial_limit: f64,
    activated_at: DateTime<Utc>,
    activation_ut: f64,
    last_tick_ut: f64,
    editor_context: EditorContext,
    snapshot: Option<SnapshotHandle>,
    insertion: Option<InsertionState>,
    spawned: Option<EntityId>,
}

impl Session {
    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Parameters as they were at activation.
    #[must_use]
    pub const fn params(&self) -> &ScenarioParameters {
        &self.params
    }

    /// Complexity computed at activation.
    #[must_use]
    pub const fn complexity(&self) -> &ComplexityResult {
        &self.complexity
    }

    /// Budget units consumed per simulated second.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.complexity.rate()
    }

    /// Whether the session consumes budget.
    #[must_use]
    pub const fn is_metered(&self) -> bool {
        self.metered
    }

    /// Trivial limit the metering decision was made against.
    #[must_use]
    pub const fn trivial_limit(&self) -> f64 {
        self.trivial_limit
    }

    /// Wall-clock activation time.
    #[must_use]
    pub const fn activated_at(&self) -> DateTime<Utc> {
        self.activated_at
    }

    /// Universal time the session started at.
    #[must_use]
    pub const fn activation_ut(&self) -> f64 {
        self.activation_ut
    }

    /// Universal time of the last tick.
    #[must_use]
    pub const fn last_tick_ut(&self) -> f64 {
        self.last_tick_ut
    }

    /// Simulated seconds since activation, as of the last tick.
    #[must_use]
    pub fn elapsed_ut(&self) -> f64 {
        self.last_tick_ut - self.activation_ut
    }

    /// Editor state before activation.
    #[must_use]
    pub const fn editor_context(&self) -> &EditorContext {
        &self.editor_context
    }

    /// Returns true while the session still owns its world snapshot.
    #[must_use]
    pub const fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Placement handed to the spawner, if the kind spawns.
    #[must_use]
    pub const fn insertion(&self) -> Option<&InsertionState> {
        self.insertion.as_ref()
    }

    /// Spawned entity, if the spawn succeeded.
    #[must_use]
    pub const fn spawned(&self) -> Option<EntityId> {
        self.spawned
    }
}
