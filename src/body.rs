//! Reference bodies: the physical data the complexity model and the
//! insertion calculator read.
//!
//! Bodies form a tree rooted at the star. The catalog is plain data; the host
//! fills it from its own planetarium, or uses [`BodyCatalog::stock`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Index of a body within its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(pub usize);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// A celestial body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelestialBody {
    /// Display name.
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
    /// Mean radius in metres.
    pub radius: f64,
    /// Whether the body has an atmosphere.
    #[serde(default)]
    pub atmosphere: bool,
    /// Body this one orbits. `None` only for the star.
    #[serde(default)]
    pub parent: Option<BodyId>,
    /// Semi-major axis of the body's own orbit, in metres.
    #[serde(default)]
    pub semi_major_axis: Option<f64>,
}

/// An indexed set of bodies with a designated star and home body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyCatalog {
    bodies: Vec<CelestialBody>,
    star: BodyId,
    home: BodyId,
}

impl BodyCatalog {
    /// Builds a catalog and checks that every parent link resolves and that
    /// the home body orbits something.
    pub fn new(
        bodies: Vec<CelestialBody>,
        star: BodyId,
        home: BodyId,
    ) -> Result<Self, ValidationError> {
        let catalog = Self { bodies, star, home };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidConfig { reason };

        if self.get(self.star).is_none() {
            return Err(invalid(format!("star {} is not in the catalog", self.star)));
        }
        let Some(home) = self.get(self.home) else {
            return Err(invalid(format!("home {} is not in the catalog", self.home)));
        };
        if home.parent.is_none() {
            return Err(invalid(format!("home body '{}' has no parent", home.name)));
        }

        for (idx, body) in self.bodies.iter().enumerate() {
            match body.parent {
                Some(parent) if self.get(parent).is_none() => {
                    return Err(invalid(format!(
                        "body '{}' references missing parent {parent}",
                        body.name
                    )));
                }
                None if BodyId(idx) != self.star => {
                    return Err(invalid(format!("body '{}' has no parent", body.name)));
                }
                _ => {}
            }
        }

        // Every chain must reach the star; rejects cycles.
        for idx in 0..self.bodies.len() {
            if self.ultimate_parent(BodyId(idx)).is_none() {
                return Err(invalid(format!(
                    "body '{}' does not descend from the star",
                    self.bodies[idx].name
                )));
            }
        }
        Ok(())
    }

    /// Looks up a body.
    #[must_use]
    pub fn get(&self, id: BodyId) -> Option<&CelestialBody> {
        self.bodies.get(id.0)
    }

    /// Finds a body by exact name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<BodyId> {
        self.bodies.iter().position(|b| b.name == name).map(BodyId)
    }

    /// Like [`find`](Self::find) but reports the missing name.
    pub fn require(&self, name: &str) -> Result<BodyId, ValidationError> {
        self.find(name).ok_or_else(|| ValidationError::UnknownBody {
            name: name.to_string(),
        })
    }

    /// The star at the root of the tree.
    #[must_use]
    pub const fn star(&self) -> BodyId {
        self.star
    }

    /// The home body.
    #[must_use]
    pub const fn home(&self) -> BodyId {
        self.home
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Returns true if the catalog has no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Iterates bodies with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &CelestialBody)> {
        self.bodies.iter().enumerate().map(|(i, b)| (BodyId(i), b))
    }

    /// Returns true if the body is a moon: neither the star nor a direct
    /// child of the star.
    #[must_use]
    pub fn is_satellite(&self, id: BodyId) -> bool {
        id != self.star && self.get(id).and_then(|b| b.parent) != Some(self.star)
    }

    /// The ancestor of `id` that orbits the star directly.
    ///
    /// The star is its own ultimate parent. Returns `None` for unknown ids or
    /// chains that never reach the star.
    #[must_use]
    pub fn ultimate_parent(&self, id: BodyId) -> Option<BodyId> {
        if id == self.star {
            return Some(id);
        }
        let mut current = id;
        for _ in 0..=self.bodies.len() {
            let parent = self.get(current)?.parent?;
            if parent == self.star {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    /// Ratio between the ultimate parent's orbit and the home body's,
    /// always `>= 1`.
    ///
    /// The star has no orbit and yields 1.
    #[must_use]
    pub fn orbit_ratio(&self, id: BodyId) -> Option<f64> {
        let parent = self.get(self.ultimate_parent(id)?)?;
        let home_sma = self.get(self.home)?.semi_major_axis;
        Some(match (parent.semi_major_axis, home_sma) {
            (Some(a), Some(b)) if a > 0.0 && b > 0.0 => a.max(b) / a.min(b),
            _ => 1.0,
        })
    }

    /// The stock planetary system: a star, its planets and their moons.
    #[must_use]
    pub fn stock() -> Self {
        fn body(
            name: &str,
            mass: f64,
            radius: f64,
            atmosphere: bool,
            parent: Option<usize>,
            semi_major_axis: Option<f64>,
        ) -> CelestialBody {
            CelestialBody {
                name: name.to_string(),
                mass,
                radius,
                atmosphere,
                parent: parent.map(BodyId),
                semi_major_axis,
            }
        }

        let bodies = vec![
            body("Kerbol", 1.756_545_9e28, 261_600_000.0, true, None, None),
            body("Moho", 2.526_331_4e21, 250_000.0, false, Some(0), Some(5_263_138_304.0)),
            body("Eve", 1.224_398e23, 700_000.0, true, Some(0), Some(9_832_684_544.0)),
            body("Gilly", 1.242_036_3e17, 13_000.0, false, Some(2), Some(31_500_000.0)),
            body("Kerbin", 5.291_515_8e22, 600_000.0, true, Some(0), Some(13_599_840_256.0)),
            body("Mun", 9.759_906_6e20, 200_000.0, false, Some(4), Some(12_000_000.0)),
            body("Minmus", 2.645_758e19, 60_000.0, false, Some(4), Some(47_000_000.0)),
            body("Duna", 4.515_427e21, 320_000.0, true, Some(0), Some(20_726_155_264.0)),
            body("Ike", 2.782_161_5e20, 130_000.0, false, Some(7), Some(3_200_000.0)),
            body("Jool", 4.233_212_7e24, 6_000_000.0, true, Some(0), Some(68_773_560_320.0)),
            body("Laythe", 2.939_731_1e22, 500_000.0, true, Some(9), Some(27_184_000.0)),
        ];

        Self {
            bodies,
            star: BodyId(0),
            home: BodyId(4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_catalog_is_valid() {
        let stock = BodyCatalog::stock();
        stock.validate().unwrap();
        assert_eq!(stock.get(stock.home()).unwrap().name, "Kerbin");
        assert_eq!(stock.get(stock.star()).unwrap().name, "Kerbol");
    }

    #[test]
    fn satellites() {
        let stock = BodyCatalog::stock();
        assert!(stock.is_satellite(stock.require("Mun").unwrap()));
        assert!(stock.is_satellite(stock.require("Laythe").unwrap()));
        assert!(!stock.is_satellite(stock.require("Kerbin").unwrap()));
        assert!(!stock.is_satellite(stock.star()));
    }

    #[test]
    fn ultimate_parent_walks_to_planet() {
        let stock = BodyCatalog::stock();
        let laythe = stock.require("Laythe").unwrap();
        let jool = stock.require("Jool").unwrap();
        assert_eq!(stock.ultimate_parent(laythe), Some(jool));
        assert_eq!(stock.ultimate_parent(jool), Some(jool));
        assert_eq!(stock.ultimate_parent(stock.star()), Some(stock.star()));
    }

    #[test]
    fn orbit_ratio_is_never_below_one() {
        let stock = BodyCatalog::stock();
        for (id, _) in stock.iter() {
            assert!(stock.orbit_ratio(id).unwrap() >= 1.0);
        }
        let mun = stock.require("Mun").unwrap();
        assert_eq!(stock.orbit_ratio(mun), Some(1.0));

        let moho = stock.require("Moho").unwrap();
        let expected = 13_599_840_256.0 / 5_263_138_304.0;
        assert!((stock.orbit_ratio(moho).unwrap() - expected).abs() < 1e-12);
        assert_eq!(stock.orbit_ratio(stock.star()), Some(1.0));
    }

    #[test]
    fn rejects_dangling_parent() {
        let bodies = vec![
            CelestialBody {
                name: "Sun".into(),
                mass: 1.0,
                radius: 1.0,
                atmosphere: false,
                parent: None,
                semi_major_axis: None,
            },
            CelestialBody {
                name: "Home".into(),
                mass: 1.0,
                radius: 1.0,
                atmosphere: false,
                parent: Some(BodyId(7)),
                semi_major_axis: Some(1.0),
            },
        ];
        assert!(BodyCatalog::new(bodies, BodyId(0), BodyId(1)).is_err());
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let stock = BodyCatalog::stock();
        let json = serde_json::to_string(&stock).unwrap();
        let back: BodyCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stock);
    }
}
