//! Orbital parameter validation and insertion-state derivation.
//!
//! Altitudes are metres above the body's surface. Every write goes through a
//! setter that reports a [`FieldOutcome`]; setters never fail past this
//! boundary and never leave the elements in a state that breaks
//! `apoapsis >= periapsis > 0`.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::body::BodyId;

/// Smallest altitude an orbit may have, in metres.
pub const MIN_ALTITUDE: f64 = 1.0;

/// Default apoapsis and periapsis, in metres.
pub const DEFAULT_ALTITUDE: f64 = 75_000.0;

/// Result of writing one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldOutcome {
    /// Stored as given (angles after normalization).
    Accepted(f64),
    /// Stored after clamping; the field is flagged invalid.
    Clamped {
        /// Value that was asked for.
        requested: f64,
        /// Value that was stored.
        applied: f64,
    },
    /// Not stored; the previous value stays and the field is flagged invalid.
    Rejected,
}

impl FieldOutcome {
    /// Returns true if the field holds exactly what was asked for.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The stored value, if any was stored.
    #[must_use]
    pub const fn applied(&self) -> Option<f64> {
        match *self {
            Self::Accepted(v) | Self::Clamped { applied: v, .. } => Some(v),
            Self::Rejected => None,
        }
    }

    fn of(requested: f64, applied: f64) -> Self {
        if requested.to_bits() == applied.to_bits() {
            Self::Accepted(applied)
        } else {
            Self::Clamped { requested, applied }
        }
    }
}

/// Where on the orbit the vessel starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPoint {
    /// Mean anomaly 0.
    #[default]
    Periapsis,
    /// Mean anomaly π.
    Apoapsis,
}

impl StartPoint {
    /// Mean anomaly at epoch for this start point, in radians.
    #[must_use]
    pub const fn mean_anomaly(self) -> f64 {
        match self {
            Self::Periapsis => 0.0,
            Self::Apoapsis => PI,
        }
    }
}

/// Wraps an angle in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to the modulus for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wraps an angle in radians into `[0, 2π)`.
#[must_use]
pub fn normalize_radians(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Wraps a longitude in degrees into `[-180, 180)`.
#[must_use]
pub fn normalize_longitude(degrees: f64) -> f64 {
    normalize_degrees(degrees + 180.0) - 180.0
}

/// Six classical elements plus the start point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    apoapsis: f64,
    periapsis: f64,
    inclination: f64,
    lan: f64,
    arg_periapsis: f64,
    mean_anomaly: f64,
    start_point: StartPoint,
}

impl Default for OrbitalElements {
    fn default() -> Self {
        Self {
            apoapsis: DEFAULT_ALTITUDE,
            periapsis: DEFAULT_ALTITUDE,
            inclination: 0.0,
            lan: 0.0,
            arg_periapsis: 0.0,
            mean_anomaly: 0.0,
            start_point: StartPoint::Periapsis,
        }
    }
}

impl OrbitalElements {
    /// Apoapsis altitude, metres.
    #[must_use]
    pub const fn apoapsis(&self) -> f64 {
        self.apoapsis
    }

    /// Periapsis altitude, metres.
    #[must_use]
    pub const fn periapsis(&self) -> f64 {
        self.periapsis
    }

    /// Inclination, degrees in `[0, 360)`.
    #[must_use]
    pub const fn inclination(&self) -> f64 {
        self.inclination
    }

    /// Longitude of the ascending node, degrees.
    #[must_use]
    pub const fn lan(&self) -> f64 {
        self.lan
    }

    /// Argument of periapsis, degrees in `[0, 360)`.
    #[must_use]
    pub const fn arg_periapsis(&self) -> f64 {
        self.arg_periapsis
    }

    /// Mean anomaly at epoch, radians in `[0, 2π)`.
    #[must_use]
    pub const fn mean_anomaly(&self) -> f64 {
        self.mean_anomaly
    }

    /// Start point last chosen.
    #[must_use]
    pub const fn start_point(&self) -> StartPoint {
        self.start_point
    }

    /// Sets the apoapsis.
    ///
    /// A value below the periapsis is raised to it, then a non-positive
    /// result is raised to [`MIN_ALTITUDE`].
    pub fn set_apoapsis(&mut self, value: f64) -> FieldOutcome {
        if !value.is_finite() {
            return FieldOutcome::Rejected;
        }
        let mut applied = value;
        if applied < self.periapsis {
            applied = self.periapsis;
        }
        if applied <= 0.0 {
            applied = MIN_ALTITUDE;
        }
        self.apoapsis = applied;
        FieldOutcome::of(value, applied)
    }

    /// Sets the periapsis.
    ///
    /// A non-positive value is raised to [`MIN_ALTITUDE`], then a result above
    /// the apoapsis is lowered to it.
    pub fn set_periapsis(&mut self, value: f64) -> FieldOutcome {
        if !value.is_finite() {
            return FieldOutcome::Rejected;
        }
        let mut applied = value;
        if applied <= 0.0 {
            applied = MIN_ALTITUDE;
        }
        if applied > self.apoapsis {
            applied = self.apoapsis;
        }
        self.periapsis = applied;
        FieldOutcome::of(value, applied)
    }

    /// Sets the inclination in degrees.
    pub fn set_inclination(&mut self, degrees: f64) -> FieldOutcome {
        if !degrees.is_finite() {
            return FieldOutcome::Rejected;
        }
        self.inclination = normalize_degrees(degrees);
        FieldOutcome::Accepted(self.inclination)
    }

    /// Sets the longitude of the ascending node in degrees. Stored as given.
    pub fn set_lan(&mut self, degrees: f64) -> FieldOutcome {
        if !degrees.is_finite() {
            return FieldOutcome::Rejected;
        }
        self.lan = degrees;
        FieldOutcome::Accepted(degrees)
    }

    /// Sets the argument of periapsis in degrees.
    pub fn set_arg_periapsis(&mut self, degrees: f64) -> FieldOutcome {
        if !degrees.is_finite() {
            return FieldOutcome::Rejected;
        }
        self.arg_periapsis = normalize_degrees(degrees);
        FieldOutcome::Accepted(self.arg_periapsis)
    }

    /// Sets the mean anomaly at epoch in radians.
    pub fn set_mean_anomaly(&mut self, radians: f64) -> FieldOutcome {
        if !radians.is_finite() {
            return FieldOutcome::Rejected;
        }
        self.mean_anomaly = normalize_radians(radians);
        FieldOutcome::Accepted(self.mean_anomaly)
    }

    /// Chooses the start point and moves the mean anomaly to match it.
    pub fn set_start_point(&mut self, start: StartPoint) {
        self.start_point = start;
        self.mean_anomaly = start.mean_anomaly();
    }

    /// Eccentricity around a body of the given radius.
    #[must_use]
    pub fn eccentricity(&self, body_radius: f64) -> f64 {
        (self.apoapsis - self.periapsis) / (self.apoapsis + self.periapsis + 2.0 * body_radius)
    }

    /// Semi-major axis around a body of the given radius, metres.
    #[must_use]
    pub fn semi_major_axis(&self, body_radius: f64) -> f64 {
        (self.periapsis + self.apoapsis + 2.0 * body_radius) / 2.0
    }

    /// Derives the orbiting insertion for a body of the given radius.
    #[must_use]
    pub fn insertion(&self, body_radius: f64) -> OrbitInsertion {
        OrbitInsertion {
            semi_major_axis: self.semi_major_axis(body_radius),
            eccentricity: self.eccentricity(body_radius),
            inclination: self.inclination,
            lan: self.lan,
            arg_periapsis: self.arg_periapsis,
            mean_anomaly_at_epoch: self.mean_anomaly,
            altitude: self.periapsis,
        }
    }
}

/// A surface position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandedSite {
    latitude: f64,
    longitude: f64,
}

impl LandedSite {
    /// Latitude, degrees in `[-90, 90]`.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude, degrees in `[-180, 180)`.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Sets the latitude. Values outside `[-90, 90]` are rejected.
    pub fn set_latitude(&mut self, degrees: f64) -> FieldOutcome {
        if !degrees.is_finite() || !(-90.0..=90.0).contains(&degrees) {
            return FieldOutcome::Rejected;
        }
        self.latitude = degrees;
        FieldOutcome::Accepted(degrees)
    }

    /// Sets the longitude, wrapping into `[-180, 180)`.
    pub fn set_longitude(&mut self, degrees: f64) -> FieldOutcome {
        if !degrees.is_finite() {
            return FieldOutcome::Rejected;
        }
        self.longitude = normalize_longitude(degrees);
        FieldOutcome::Accepted(self.longitude)
    }
}

/// Orbit handed to the spawner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitInsertion {
    /// Semi-major axis, metres from the body's centre.
    pub semi_major_axis: f64,
    /// Eccentricity.
    pub eccentricity: f64,
    /// Inclination, degrees.
    pub inclination: f64,
    /// Longitude of the ascending node, degrees.
    pub lan: f64,
    /// Argument of periapsis, degrees.
    pub arg_periapsis: f64,
    /// Mean anomaly at epoch, radians.
    pub mean_anomaly_at_epoch: f64,
    /// Periapsis altitude, metres.
    pub altitude: f64,
}

/// Orbiting or landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// In orbit.
    Orbiting(OrbitInsertion),
    /// On the surface.
    Landed {
        /// Degrees.
        latitude: f64,
        /// Degrees.
        longitude: f64,
    },
}

/// Everything the spawner needs to place a vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionState {
    /// Body the vessel is placed at.
    pub body: BodyId,
    /// Universal time of the orbit epoch.
    pub epoch_ut: f64,
    /// Placement.
    pub placement: Placement,
}

impl InsertionState {
    /// Returns true for a landed placement.
    #[must_use]
    pub const fn is_landed(&self) -> bool {
        matches!(self.placement, Placement::Landed { .. })
    }
}
