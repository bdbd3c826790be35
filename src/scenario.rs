//! Scenario parameters: everything the user configures before a simulation.
//!
//! The presentation layer writes fields through string setters. Each setter
//! reports a [`FieldOutcome`] and records whether the field is currently
//! valid; activation refuses to start while any field relevant to the chosen
//! kind is flagged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::body::{BodyCatalog, BodyId};
use crate::error::ValidationError;
use crate::orbit::{
    FieldOutcome, InsertionState, LandedSite, OrbitalElements, Placement, StartPoint,
};
use crate::time::{normalize_duration, Calendar, TimeReading};

/// Default simulated duration: fifteen minutes.
pub const DEFAULT_DURATION: f64 = 900.0;

/// Kind of simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationKind {
    /// Regular launch from the pad or runway.
    #[default]
    Default,
    /// Spawned in orbit.
    Orbital,
    /// Spawned on a surface.
    Landed,
}

impl SimulationKind {
    /// Numeric tag exposed to formulas as `T`.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::Orbital => 1,
            Self::Landed => 2,
        }
    }

    /// Maps a tag back to a kind. Unknown tags are [`SimulationKind::Default`].
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Orbital,
            2 => Self::Landed,
            _ => Self::Default,
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Orbital => write!(f, "orbital"),
            Self::Landed => write!(f, "landed"),
        }
    }
}

/// The vessel under construction, as the host identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselHandle {
    /// Host identifier.
    pub id: String,
    /// Number of parts.
    pub part_count: usize,
}

impl VesselHandle {
    /// Creates a handle.
    pub fn new(id: impl Into<String>, part_count: usize) -> Self {
        Self {
            id: id.into(),
            part_count,
        }
    }

    /// Returns true if the vessel has no parts.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.part_count == 0
    }
}

/// Opaque crew manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrewHandle(pub String);

/// Fields that carry a validity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Field {
    Apoapsis,
    Periapsis,
    Inclination,
    Lan,
    ArgPeriapsis,
    MeanAnomaly,
    Latitude,
    Longitude,
}

impl Field {
    const COUNT: usize = 8;

    /// Fields checked for an orbital simulation.
    pub const ORBITAL: [Self; 6] = [
        Self::Apoapsis,
        Self::Periapsis,
        Self::Inclination,
        Self::Lan,
        Self::ArgPeriapsis,
        Self::MeanAnomaly,
    ];

    /// Fields checked for a landed simulation.
    pub const LANDED: [Self; 2] = [Self::Latitude, Self::Longitude];

    /// Name used in error reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Apoapsis => "apoapsis",
            Self::Periapsis => "periapsis",
            Self::Inclination => "inclination",
            Self::Lan => "lan",
            Self::ArgPeriapsis => "arg_periapsis",
            Self::MeanAnomaly => "mean_anomaly",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldChecks {
    invalid: [bool; Field::COUNT],
}

impl Default for FieldChecks {
    fn default() -> Self {
        Self {
            invalid: [false; Field::COUNT],
        }
    }
}

impl FieldChecks {
    fn record(&mut self, field: Field, outcome: FieldOutcome) -> FieldOutcome {
        self.invalid[field.index()] = !outcome.is_valid();
        outcome
    }

    const fn is_invalid(&self, field: Field) -> bool {
        self.invalid[field.index()]
    }
}

fn parse_number(input: &str) -> Option<f64> {
    input.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// User-configured parameters for one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioParameters {
    kind: SimulationKind,
    body: Option<BodyId>,
    duration: f64,
    target_ut: Option<f64>,
    relative_time: bool,
    orbit: OrbitalElements,
    site: LandedSite,
    vessel: Option<VesselHandle>,
    crew: Option<CrewHandle>,
    checks: FieldChecks,
    apoapsis_request: Option<f64>,
    periapsis_request: Option<f64>,
    calendar: Calendar,
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self::new(Calendar::default())
    }
}

impl ScenarioParameters {
    /// Creates parameters with defaults, reading time strings with `calendar`.
    #[must_use]
    pub fn new(calendar: Calendar) -> Self {
        Self {
            kind: SimulationKind::Default,
            body: None,
            duration: DEFAULT_DURATION,
            target_ut: None,
            relative_time: false,
            orbit: OrbitalElements::default(),
            site: LandedSite::default(),
            vessel: None,
            crew: None,
            checks: FieldChecks::default(),
            apoapsis_request: None,
            periapsis_request: None,
            calendar,
        }
    }

    /// Simulation kind.
    #[must_use]
    pub const fn kind(&self) -> SimulationKind {
        self.kind
    }

    /// Sets the simulation kind.
    pub fn set_kind(&mut self, kind: SimulationKind) {
        self.kind = kind;
    }

    /// Selected body, if one was chosen.
    #[must_use]
    pub const fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// Selected body, or the catalog's home body when none is set.
    #[must_use]
    pub fn body_or_home(&self, catalog: &BodyCatalog) -> BodyId {
        self.body.unwrap_or_else(|| catalog.home())
    }

    /// Selects a body. `None` means the home body.
    pub fn select_body(&mut self, body: Option<BodyId>) {
        self.body = body;
    }

    /// Simulated duration, seconds.
    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    /// Sets the duration in seconds; non-positive means unbounded.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = normalize_duration(seconds);
    }

    /// Parses and sets the duration. On error the duration is unchanged.
    pub fn set_duration_str(&mut self, input: &str) -> Result<f64, ValidationError> {
        let seconds = self.calendar.parse_duration(input)?;
        self.duration = seconds;
        Ok(seconds)
    }

    /// Target universal time, or `now` when none is set.
    #[must_use]
    pub fn target_ut(&self, now: f64) -> f64 {
        self.target_ut.unwrap_or(now)
    }

    /// Whether the target time was entered relative to now.
    #[must_use]
    pub const fn relative_time(&self) -> bool {
        self.relative_time
    }

    /// Fixes the target time.
    pub fn set_target_ut(&mut self, ut: Option<f64>) {
        self.target_ut = ut;
    }

    /// Parses and sets the target time.
    ///
    /// A relative time is a span added to `now`; an absolute one is a
    /// calendar date.
    pub fn set_time_str(
        &mut self,
        input: &str,
        relative: bool,
        now: f64,
    ) -> Result<f64, ValidationError> {
        let ut = if relative {
            now + self.calendar.parse(input, TimeReading::Span)?
        } else {
            self.calendar.parse(input, TimeReading::Date)?
        };
        self.relative_time = relative;
        self.target_ut = Some(ut);
        Ok(ut)
    }

    /// Orbital elements.
    #[must_use]
    pub const fn orbit(&self) -> &OrbitalElements {
        &self.orbit
    }

    /// Landed site.
    #[must_use]
    pub const fn site(&self) -> &LandedSite {
        &self.site
    }

    /// Apoapsis in kilometres, as displayed.
    #[must_use]
    pub fn apoapsis_km(&self) -> f64 {
        self.orbit.apoapsis() / 1000.0
    }

    /// Periapsis in kilometres, as displayed.
    #[must_use]
    pub fn periapsis_km(&self) -> f64 {
        self.orbit.periapsis() / 1000.0
    }

    /// Sets the apoapsis from a kilometre string. Outcome values are metres.
    ///
    /// A periapsis that was clamped earlier is re-applied afterwards, so
    /// raising the apoapsis clears a periapsis flag once the requested value
    /// fits.
    pub fn set_apoapsis_km(&mut self, input: &str) -> FieldOutcome {
        self.apoapsis_request = parse_number(input).map(|km| km * 1000.0);
        let outcome = self.apply_apoapsis();
        if self.checks.is_invalid(Field::Periapsis) {
            self.apply_periapsis();
        }
        outcome
    }

    /// Sets the periapsis from a kilometre string. Outcome values are metres.
    ///
    /// A clamped apoapsis is re-applied afterwards.
    pub fn set_periapsis_km(&mut self, input: &str) -> FieldOutcome {
        self.periapsis_request = parse_number(input).map(|km| km * 1000.0);
        let outcome = self.apply_periapsis();
        if self.checks.is_invalid(Field::Apoapsis) {
            self.apply_apoapsis();
        }
        outcome
    }

    fn apply_apoapsis(&mut self) -> FieldOutcome {
        let outcome = self
            .apoapsis_request
            .map_or(FieldOutcome::Rejected, |m| self.orbit.set_apoapsis(m));
        self.checks.record(Field::Apoapsis, outcome)
    }

    fn apply_periapsis(&mut self) -> FieldOutcome {
        let outcome = self
            .periapsis_request
            .map_or(FieldOutcome::Rejected, |m| self.orbit.set_periapsis(m));
        self.checks.record(Field::Periapsis, outcome)
    }

    /// Sets the inclination from a degree string.
    pub fn set_inclination_deg(&mut self, input: &str) -> FieldOutcome {
        let outcome =
            parse_number(input).map_or(FieldOutcome::Rejected, |v| self.orbit.set_inclination(v));
        self.checks.record(Field::Inclination, outcome)
    }

    /// Sets the longitude of the ascending node from a degree string.
    pub fn set_lan_deg(&mut self, input: &str) -> FieldOutcome {
        let outcome = parse_number(input).map_or(FieldOutcome::Rejected, |v| self.orbit.set_lan(v));
        self.checks.record(Field::Lan, outcome)
    }

    /// Sets the argument of periapsis from a degree string.
    pub fn set_arg_periapsis_deg(&mut self, input: &str) -> FieldOutcome {
        let outcome =
            parse_number(input).map_or(FieldOutcome::Rejected, |v| self.orbit.set_arg_periapsis(v));
        self.checks.record(Field::ArgPeriapsis, outcome)
    }

    /// Sets the mean anomaly at epoch from a radian string.
    pub fn set_mean_anomaly_rad(&mut self, input: &str) -> FieldOutcome {
        let outcome =
            parse_number(input).map_or(FieldOutcome::Rejected, |v| self.orbit.set_mean_anomaly(v));
        self.checks.record(Field::MeanAnomaly, outcome)
    }

    /// Chooses where on the orbit the vessel starts.
    pub fn set_start_point(&mut self, start: StartPoint) {
        self.orbit.set_start_point(start);
        self.checks.record(Field::MeanAnomaly, FieldOutcome::Accepted(start.mean_anomaly()));
    }

    /// Sets the landing latitude from a degree string.
    pub fn set_latitude(&mut self, input: &str) -> FieldOutcome {
        let outcome =
            parse_number(input).map_or(FieldOutcome::Rejected, |v| self.site.set_latitude(v));
        self.checks.record(Field::Latitude, outcome)
    }

    /// Sets the landing longitude from a degree string.
    pub fn set_longitude(&mut self, input: &str) -> FieldOutcome {
        let outcome =
            parse_number(input).map_or(FieldOutcome::Rejected, |v| self.site.set_longitude(v));
        self.checks.record(Field::Longitude, outcome)
    }

    /// Returns true if the field's last write was rejected or clamped.
    #[must_use]
    pub const fn is_invalid(&self, field: Field) -> bool {
        self.checks.is_invalid(field)
    }

    /// Names of flagged fields that matter for the current kind.
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let relevant: &[Field] = match self.kind {
            SimulationKind::Orbital => &Field::ORBITAL,
            SimulationKind::Landed => &Field::LANDED,
            SimulationKind::Default => &[],
        };
        relevant
            .iter()
            .filter(|f| self.checks.is_invalid(**f))
            .map(|f| f.name())
            .collect()
    }

    /// The selected vessel.
    #[must_use]
    pub const fn vessel(&self) -> Option<&VesselHandle> {
        self.vessel.as_ref()
    }

    /// Selects the vessel.
    pub fn set_vessel(&mut self, vessel: Option<VesselHandle>) {
        self.vessel = vessel;
    }

    /// The crew manifest.
    #[must_use]
    pub const fn crew(&self) -> Option<&CrewHandle> {
        self.crew.as_ref()
    }

    /// Sets the crew manifest.
    pub fn set_crew(&mut self, crew: Option<CrewHandle>) {
        self.crew = crew;
    }

    /// Derives the insertion state for the current kind.
    ///
    /// Returns `Ok(None)` for [`SimulationKind::Default`], which launches
    /// normally instead of spawning.
    pub fn insertion_state(
        &self,
        catalog: &BodyCatalog,
        epoch_ut: f64,
    ) -> Result<Option<InsertionState>, ValidationError> {
        let body_id = self.body_or_home(catalog);
        let body = || {
            catalog.get(body_id).ok_or_else(|| ValidationError::UnknownBody {
                name: body_id.to_string(),
            })
        };

        let placement = match self.kind {
            SimulationKind::Default => return Ok(None),
            SimulationKind::Orbital => Placement::Orbiting(self.orbit.insertion(body()?.radius)),
            SimulationKind::Landed => {
                body()?;
                Placement::Landed {
                    latitude: self.site.latitude(),
                    longitude: self.site.longitude(),
                }
            }
        };
        Ok(Some(InsertionState {
            body: body_id,
            epoch_ut,
            placement,
        }))
    }
}
