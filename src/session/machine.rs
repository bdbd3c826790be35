//! The session state machine.

use std::mem;
use std::sync::Arc;

use chrono::Utc;

use crate::body::BodyCatalog;
use crate::complexity::ComplexityModel;
use crate::config::SimConfig;
use crate::error::{HostError, LedgerError, SessionError};
use crate::expr::Evaluator;
use crate::host::{
    EditorContext, FundsProvider, RestorePoll, RestoreTarget, RestoreTicket, SessionHost,
    SnapshotHandle,
};
use crate::ledger::{is_metered, purchase_with_funds, Ledger, PurchaseReceipt};
use crate::planner::ActivationRequest;

use super::{Session, SessionId, SessionState, TickOutcome};

#[derive(Debug)]
struct PendingRestore {
    ticket: RestoreTicket,
    snapshot: SnapshotHandle,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Activating,
    Active { exhausted: bool },
    Deactivating(PendingRestore),
}

/// Drives one session at a time against a host.
///
/// All calls are expected from the host's periodic callback. The ledger is
/// owned here and survives sessions; persist it through [`Self::ledger`].
///
/// Dropping the machine mid-session leaves the world snapshot in place.
/// [`Self::recover_orphaned_snapshot`] cleans it up on the next start.
#[derive(Debug)]
pub struct SessionMachine<H: SessionHost> {
    config: Arc<SimConfig>,
    evaluator: Arc<Evaluator>,
    bodies: Arc<BodyCatalog>,
    model: ComplexityModel,
    ledger: Ledger,
    host: H,
    phase: Phase,
    session: Option<Session>,
    last_failure: Option<SessionError>,
}

impl<H: SessionHost> SessionMachine<H> {
    /// Creates an idle machine.
    pub fn new(
        config: Arc<SimConfig>,
        evaluator: Arc<Evaluator>,
        bodies: Arc<BodyCatalog>,
        ledger: Ledger,
        host: H,
    ) -> Self {
        let model = ComplexityModel::new(
            Arc::clone(&config),
            Arc::clone(&evaluator),
            Arc::clone(&bodies),
        );
        Self {
            config,
            evaluator,
            bodies,
            model,
            ledger,
            host,
            phase: Phase::Idle,
            session: None,
            last_failure: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Activating => SessionState::Activating,
            Phase::Active { exhausted: false } => SessionState::Active,
            Phase::Active { exhausted: true } => SessionState::Exhausted,
            Phase::Deactivating(_) => SessionState::Deactivating,
        }
    }

    /// The running session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The most recent failure that could not be returned directly.
    #[must_use]
    pub const fn last_failure(&self) -> Option<&SessionError> {
        self.last_failure.as_ref()
    }

    /// Takes and clears the most recent failure.
    pub fn take_failure(&mut self) -> Option<SessionError> {
        self.last_failure.take()
    }

    /// The budget ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Mutable ledger access for the persistence layer.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// The host.
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Starts a session.
    ///
    /// While a session exists this is a no-op returning it.
    pub fn activate(&mut self, request: ActivationRequest) -> Result<&Session, SessionError> {
        if matches!(self.phase, Phase::Idle) {
            self.start(request)?;
        } else {
            tracing::debug!(state = ?self.state(), "Activate ignored: session already exists");
        }
        self.session.as_ref().ok_or(SessionError::NoActiveSession)
    }

    fn start(&mut self, request: ActivationRequest) -> Result<(), SessionError> {
        let ActivationRequest { params, trivial_limit } = request;

        let Some(vessel) = params.vessel().filter(|v| !v.is_empty()).cloned() else {
            tracing::warn!("Activation refused: no vessel selected");
            return Err(SessionError::NoVesselSelected);
        };
        let fields = params.invalid_fields();
        if !fields.is_empty() {
            tracing::warn!(?fields, "Activation refused: invalid orbital parameters");
            return Err(SessionError::InvalidOrbitalParameters { fields });
        }

        let now = self.host.universal_time();
        let complexity = self.model.compute(&params, &self.host, now);
        if complexity.is_indeterminate() {
            tracing::warn!(kind = %params.kind(), "Activation refused: cost indeterminate");
            return Err(SessionError::ComplexityIndeterminate);
        }
        let target_ut = params.target_ut(now);
        let insertion = params.insertion_state(&self.bodies, target_ut).map_err(|e| {
            tracing::warn!(error = %e, "Activation refused: body unavailable");
            SessionError::InvalidOrbitalParameters { fields: vec!["body"] }
        })?;
        let metered = is_metered(complexity.rate(), trivial_limit);

        self.phase = Phase::Activating;
        let editor_context = self.host.editor_context();
        let snapshot = match self.host.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "World snapshot failed; activation aborted");
                self.phase = Phase::Idle;
                return Err(e.into());
            }
        };
        self.host.set_input_locks(true);
        self.host.set_universal_time(target_ut);

        let id = SessionId::new();
        tracing::info!(
            session = %id,
            kind = %params.kind(),
            rate = complexity.rate(),
            metered,
            trivial_limit,
            target_ut,
            "Simulation activated"
        );

        let spawned = match insertion.as_ref() {
            None => {
                self.host.launch(&vessel, params.crew());
                Ok(None)
            }
            Some(state) => match self.host.spawn(state, &vessel, params.crew()) {
                Some(entity) => Ok(Some(entity)),
                None => Err(self
                    .bodies
                    .get(state.body)
                    .map_or_else(|| state.body.to_string(), |b| b.name.clone())),
            },
        };

        self.install(Session {
            id,
            params,
            complexity,
            metered,
            trivial_limit,
            activated_at: Utc::now(),
            activation_ut: target_ut,
            last_tick_ut: target_ut,
            editor_context,
            snapshot: Some(snapshot),
            insertion,
            spawned: spawned.as_ref().ok().copied().flatten(),
        });

        if let Err(body) = spawned {
            tracing::error!(session = %id, %body, "Vessel spawn failed; returning to editor");
            self.begin_deactivate(true);
            return Err(SessionError::SpawnFailure { body });
        }
        Ok(())
    }

    fn install(&mut self, session: Session) {
        self.session = Some(session);
        self.phase = Phase::Active { exhausted: false };
    }

    /// Advances the session to universal time `now`.
    pub fn tick(&mut self, now: f64) -> TickOutcome {
        match self.phase {
            Phase::Idle | Phase::Activating => TickOutcome::Idle,
            Phase::Deactivating(_) => self.poll_restore(),
            Phase::Active { exhausted } => self.tick_active(now, exhausted),
        }
    }

    /// Every metered tick is charged, including ticks spent at the exhausted
    /// prompt.
    fn tick_active(&mut self, now: f64, exhausted: bool) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            tracing::warn!("Active phase without a session; resetting to idle");
            self.phase = Phase::Idle;
            return TickOutcome::Idle;
        };

        let mut elapsed = now - session.last_tick_ut;
        if elapsed < 0.0 {
            tracing::debug!(
                session = %session.id,
                elapsed,
                "Universal time went backwards; not refunding"
            );
            elapsed = 0.0;
        }
        session.last_tick_ut = now;

        if !session.metered {
            return TickOutcome::Unmetered;
        }

        let remaining = self.ledger.tick(elapsed, session.rate());
        tracing::debug!(session = %session.id, elapsed, remaining, "Session tick");
        let now_exhausted = self.ledger.is_exhausted();
        if now_exhausted && !exhausted {
            tracing::info!(session = %session.id, remaining, "Budget exhausted");
        } else if exhausted && !now_exhausted {
            tracing::info!(session = %session.id, remaining, "Budget restored; resuming");
        }
        self.phase = Phase::Active {
            exhausted: now_exhausted,
        };
        if now_exhausted {
            return TickOutcome::Exhausted { remaining };
        }
        TickOutcome::Running { remaining }
    }

    /// Stops the session and restores the world.
    ///
    /// With `return_to_original` the user lands back in the editor they came
    /// from; otherwise the restore happens in place. Does nothing unless a
    /// session is running. The restore completes on a later tick.
    pub fn deactivate(&mut self, return_to_original: bool) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Active { .. }) {
            tracing::debug!(state = ?self.state(), "Deactivate ignored: no running session");
            return Ok(());
        }
        match self.begin_deactivate(return_to_original) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Schedules the restore. Returns the failure if scheduling did not work,
    /// after cleaning up.
    fn begin_deactivate(&mut self, return_to_original: bool) -> Option<SessionError> {
        self.host.set_input_locks(false);

        let Some(session) = self.session.as_mut() else {
            self.phase = Phase::Idle;
            return None;
        };
        let id = session.id;
        let Some(snapshot) = session.snapshot.take() else {
            tracing::warn!(session = %id, "Session has no snapshot to restore");
            self.session = None;
            self.phase = Phase::Idle;
            return None;
        };

        let target = if return_to_original {
            let context = &session.editor_context;
            RestoreTarget::Editor(EditorContext {
                facility: context.return_facility(),
                ship: context.ship.clone(),
            })
        } else {
            RestoreTarget::InPlace
        };

        match self.host.schedule_restore(&snapshot, target) {
            Ok(ticket) => {
                tracing::info!(session = %id, return_to_original, "Simulation deactivating");
                self.phase = Phase::Deactivating(PendingRestore { ticket, snapshot });
                None
            }
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Could not schedule world restore");
                self.discard_snapshot(snapshot);
                self.session = None;
                self.phase = Phase::Idle;
                let failure = SessionError::from(e);
                self.last_failure = Some(failure.clone());
                Some(failure)
            }
        }
    }

    fn poll_restore(&mut self) -> TickOutcome {
        let result = match &self.phase {
            Phase::Deactivating(pending) => match pending.ticket.poll() {
                RestorePoll::Pending => return TickOutcome::Restoring,
                RestorePoll::Done(result) => result,
            },
            _ => return TickOutcome::Idle,
        };
        let Phase::Deactivating(pending) = mem::replace(&mut self.phase, Phase::Idle) else {
            return TickOutcome::Idle;
        };
        self.finish_restore(pending.snapshot, result)
    }

    fn finish_restore(
        &mut self,
        snapshot: SnapshotHandle,
        result: Result<(), HostError>,
    ) -> TickOutcome {
        self.discard_snapshot(snapshot);
        let session = self.session.take().map(|s| s.id);
        self.phase = Phase::Idle;
        match result {
            Ok(()) => {
                tracing::info!(session = ?session, "World restored");
                TickOutcome::Restored
            }
            Err(e) => {
                tracing::error!(session = ?session, error = %e, "World restore failed");
                self.last_failure = Some(SessionError::from(e.clone()));
                TickOutcome::RestoreFailed(e)
            }
        }
    }

    fn discard_snapshot(&mut self, snapshot: SnapshotHandle) {
        let id = snapshot.id();
        if let Err(e) = self.host.delete_snapshot(snapshot) {
            tracing::error!(snapshot = %id, error = %e, "Snapshot deletion failed");
        }
    }

    /// Buys budget with player funds.
    ///
    /// Refused while a restore is pending. An exhausted session resumes on
    /// the next tick if the budget still covers the time charged since the
    /// last one.
    pub fn purchase(
        &mut self,
        amount: f64,
        funds: &mut dyn FundsProvider,
    ) -> Result<PurchaseReceipt, LedgerError> {
        if matches!(self.phase, Phase::Deactivating(_)) {
            return Err(LedgerError::Unavailable);
        }
        purchase_with_funds(&mut self.ledger, &self.evaluator, &self.config, amount, funds)
    }

    /// Restores and deletes a snapshot left behind by an earlier run.
    ///
    /// Call at startup, outside a flight. Returns true if a restore was
    /// scheduled; it completes through [`Self::tick`].
    pub fn recover_orphaned_snapshot(&mut self) -> Result<bool, SessionError> {
        if !matches!(self.phase, Phase::Idle) {
            return Ok(false);
        }
        let Some(snapshot) = self.host.pending_snapshot() else {
            return Ok(false);
        };
        tracing::warn!(
            snapshot = %snapshot,
            "Found snapshot from an interrupted session; restoring"
        );
        self.host.set_input_locks(false);
        match self.host.schedule_restore(&snapshot, RestoreTarget::InPlace) {
            Ok(ticket) => {
                self.phase = Phase::Deactivating(PendingRestore { ticket, snapshot });
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not schedule orphan restore");
                self.discard_snapshot(snapshot);
                Err(e.into())
            }
        }
    }
}
