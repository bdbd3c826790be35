//! Host collaborator interfaces.
//!
//! The core never touches the world directly. It asks the host to snapshot,
//! restore, spawn and price things through the traits here, and the host
//! reports a deferred restore back through a one-shot channel.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HostError;
use crate::orbit::InsertionState;
use crate::scenario::{CrewHandle, VesselHandle};

/// Handle to a world snapshot.
///
/// Not `Clone`: deleting the snapshot consumes the handle, so a snapshot can
/// be deleted at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SnapshotHandle(Uuid);

impl SnapshotHandle {
    /// Creates a handle with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an id the host already has.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a spawned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Creates a new random entity id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Editor building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorFacility {
    /// Not in an editor.
    #[default]
    None,
    /// Vehicle Assembly Building.
    Vab,
    /// Space Plane Hangar.
    Sph,
}

/// The editor state active before a session started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorContext {
    /// Facility the user was in.
    pub facility: EditorFacility,
    /// Serialized ship under construction.
    pub ship: Option<String>,
}

impl EditorContext {
    /// Facility to return to. The VAB when none was recorded.
    #[must_use]
    pub const fn return_facility(&self) -> EditorFacility {
        match self.facility {
            EditorFacility::None => EditorFacility::Vab,
            other => other,
        }
    }
}

/// Where a restore should leave the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreTarget {
    /// Back in the editor with this context.
    Editor(EditorContext),
    /// In whatever scene is current.
    InPlace,
}

/// Creates a one-shot restore completion pair.
///
/// The host keeps the [`RestoreCompletion`] and fires it once the restore has
/// run; the session polls the [`RestoreTicket`].
#[must_use]
pub fn restore_channel() -> (RestoreCompletion, RestoreTicket) {
    let (tx, rx) = bounded(1);
    (RestoreCompletion { tx }, RestoreTicket { rx })
}

/// Sending half of a restore completion.
#[derive(Debug)]
pub struct RestoreCompletion {
    tx: Sender<Result<(), HostError>>,
}

impl RestoreCompletion {
    /// Reports the outcome. Dropping without calling this abandons the restore.
    pub fn complete(self, result: Result<(), HostError>) {
        // The ticket may already be gone if the session was torn down.
        let _ = self.tx.send(result);
    }
}

/// State of a scheduled restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorePoll {
    /// Still running.
    Pending,
    /// Finished, successfully or not.
    Done(Result<(), HostError>),
}

/// Receiving half of a restore completion.
#[derive(Debug)]
pub struct RestoreTicket {
    rx: Receiver<Result<(), HostError>>,
}

impl RestoreTicket {
    /// Checks for completion without blocking.
    #[must_use]
    pub fn poll(&self) -> RestorePoll {
        match self.rx.try_recv() {
            Ok(result) => RestorePoll::Done(result),
            Err(TryRecvError::Empty) => RestorePoll::Pending,
            Err(TryRecvError::Disconnected) => RestorePoll::Done(Err(HostError::RestoreAbandoned)),
        }
    }

    /// Waits up to `timeout` for completion.
    pub fn wait_timeout(&self, timeout: Duration) -> RestorePoll {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => RestorePoll::Done(result),
            Err(RecvTimeoutError::Timeout) => RestorePoll::Pending,
            Err(RecvTimeoutError::Disconnected) => {
                RestorePoll::Done(Err(HostError::RestoreAbandoned))
            }
        }
    }
}

/// Reads vessel properties.
pub trait VesselProvider {
    /// Total mass in tonnes, if it can be determined.
    fn mass(&self, vessel: &VesselHandle) -> Option<f64>;

    /// Total monetary cost, if it can be determined.
    fn cost(&self, vessel: &VesselHandle) -> Option<f64>;
}

/// Player funds.
pub trait FundsProvider {
    /// Returns true if `cost` can be paid.
    fn has_funds(&self, cost: f64) -> bool;

    /// Takes `cost` from the player.
    fn deduct(&mut self, cost: f64);
}

/// World state operations.
pub trait WorldHost {
    /// Saves the current world.
    fn snapshot(&mut self) -> Result<SnapshotHandle, HostError>;

    /// Schedules a restore of `snapshot`, to run after the current frame.
    fn schedule_restore(
        &mut self,
        snapshot: &SnapshotHandle,
        target: RestoreTarget,
    ) -> Result<RestoreTicket, HostError>;

    /// Removes a snapshot.
    fn delete_snapshot(&mut self, snapshot: SnapshotHandle) -> Result<(), HostError>;

    /// A snapshot left behind by an earlier run, if any.
    fn pending_snapshot(&mut self) -> Option<SnapshotHandle>;

    /// Current universal time.
    fn universal_time(&self) -> f64;

    /// Jumps universal time.
    fn set_universal_time(&mut self, ut: f64);

    /// Editor state right now.
    fn editor_context(&self) -> EditorContext;

    /// Engages or releases the quicksave and quickload locks.
    fn set_input_locks(&mut self, engaged: bool);
}

/// Places vessels into the world.
pub trait Spawner {
    /// Spawns `vessel` at `insertion`. `None` means the spawn failed.
    fn spawn(
        &mut self,
        insertion: &InsertionState,
        vessel: &VesselHandle,
        crew: Option<&CrewHandle>,
    ) -> Option<EntityId>;

    /// Starts a regular launch.
    fn launch(&mut self, vessel: &VesselHandle, crew: Option<&CrewHandle>);
}

/// Everything a session needs from its host.
pub trait SessionHost: WorldHost + Spawner + VesselProvider {}

impl<T: WorldHost + Spawner + VesselProvider> SessionHost for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_delivered_once() {
        let (completion, ticket) = restore_channel();
        assert_eq!(ticket.poll(), RestorePoll::Pending);
        completion.complete(Ok(()));
        assert_eq!(ticket.poll(), RestorePoll::Done(Ok(())));
        // Sender is gone now; a second poll reports abandonment.
        assert_eq!(ticket.poll(), RestorePoll::Done(Err(HostError::RestoreAbandoned)));
    }

    #[test]
    fn dropped_completion_is_abandoned() {
        let (completion, ticket) = restore_channel();
        drop(completion);
        assert_eq!(ticket.poll(), RestorePoll::Done(Err(HostError::RestoreAbandoned)));
    }

    #[test]
    fn failure_is_passed_through() {
        let (completion, ticket) = restore_channel();
        completion.complete(Err(HostError::RestoreFailed {
            reason: "corrupt save".into(),
        }));
        assert!(matches!(
            ticket.wait_timeout(Duration::from_millis(10)),
            RestorePoll::Done(Err(HostError::RestoreFailed { .. }))
        ));
    }

    #[test]
    fn wait_times_out_while_pending() {
        let (_completion, ticket) = restore_channel();
        assert_eq!(ticket.wait_timeout(Duration::from_millis(1)), RestorePoll::Pending);
    }

    #[test]
    fn editor_defaults_to_vab() {
        assert_eq!(EditorContext::default().return_facility(), EditorFacility::Vab);
        let sph = EditorContext {
            facility: EditorFacility::Sph,
            ship: None,
        };
        assert_eq!(sph.return_facility(), EditorFacility::Sph);
    }

    #[test]
    fn snapshot_handles_are_unique() {
        assert_ne!(SnapshotHandle::new().id(), SnapshotHandle::new().id());
    }
}
