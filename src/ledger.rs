//! The resource ledger.
//!
//! The ledger holds the remaining budget. Sessions deplete it over simulated
//! time; purchases top it up. Depletion may take it below zero, which is how
//! exhaustion is signalled. Only `remaining_budget` is persisted.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{ExprError, LedgerError, ValidationError};
use crate::expr::Evaluator;
use crate::formula::Formula;
use crate::host::FundsProvider;
use crate::variables::VariableSet;

/// Persisted ledger record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerCheckpoint {
    /// Remaining budget units.
    pub remaining_budget: f64,
}

impl LedgerCheckpoint {
    /// Serializes to JSON.
    pub fn to_json(&self) -> Result<String, ValidationError> {
        serde_json::to_string(self).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Parses from JSON.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let checkpoint: Self =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
                reason: e.to_string(),
            })?;
        if !checkpoint.remaining_budget.is_finite() {
            return Err(ValidationError::InvalidConfig {
                reason: "remaining_budget is not finite".to_string(),
            });
        }
        Ok(checkpoint)
    }
}

/// Remaining budget plus in-memory totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    remaining: f64,
    purchased: f64,
    spent: f64,
}

impl Ledger {
    /// Creates a ledger holding `remaining` units.
    #[must_use]
    pub const fn new(remaining: f64) -> Self {
        Self {
            remaining,
            purchased: 0.0,
            spent: 0.0,
        }
    }

    /// Remaining budget units.
    #[must_use]
    pub const fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Overwrites the remaining budget, as loaded by persistence.
    pub fn set_remaining(&mut self, remaining: f64) {
        if remaining.is_finite() {
            self.remaining = remaining;
        } else {
            tracing::warn!(remaining, "Ignoring non-finite ledger value");
        }
    }

    /// Units purchased since this ledger was created.
    #[must_use]
    pub const fn total_purchased(&self) -> f64 {
        self.purchased
    }

    /// Money spent on purchases since this ledger was created.
    #[must_use]
    pub const fn total_spent(&self) -> f64 {
        self.spent
    }

    /// Returns true once the budget is used up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Subtracts `elapsed * rate` and returns the new remaining budget.
    pub fn tick(&mut self, elapsed: f64, rate: f64) -> f64 {
        let used = elapsed * rate;
        if used.is_finite() {
            self.remaining -= used;
        } else {
            tracing::warn!(elapsed, rate, "Ignoring non-finite ledger tick");
        }
        self.remaining
    }

    /// Adds `amount` units bought for `cost` and returns the new remaining
    /// budget. Funds are not checked here.
    pub fn purchase(&mut self, amount: f64, cost: f64) -> Result<f64, LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.remaining += amount;
        self.purchased += amount;
        if cost.is_finite() {
            self.spent += cost;
        }
        tracing::info!(amount, cost, remaining = self.remaining, "Budget purchased");
        Ok(self.remaining)
    }

    /// Persisted state.
    #[must_use]
    pub const fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            remaining_budget: self.remaining,
        }
    }

    /// Loads persisted state.
    pub fn restore_checkpoint(&mut self, checkpoint: LedgerCheckpoint) {
        self.set_remaining(checkpoint.remaining_budget);
    }

    /// Loads persisted state from JSON. On error the current value is kept.
    pub fn load_json(&mut self, json: &str) -> Result<(), ValidationError> {
        match LedgerCheckpoint::from_json(json) {
            Ok(checkpoint) => {
                self.restore_checkpoint(checkpoint);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    remaining = self.remaining,
                    "Ledger checkpoint unreadable; keeping current budget"
                );
                Err(e)
            }
        }
    }
}

/// Price of `amount` units given the current `remaining` budget.
///
/// The formula sees `N` (units) and `R` (remaining) and yields a price per
/// unit; the total is that price times `N`.
pub fn quote_purchase(
    evaluator: &Evaluator,
    formula: &Formula,
    amount: f64,
    remaining: f64,
) -> Result<f64, LedgerError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::InvalidAmount { amount });
    }
    let vars = VariableSet::new().with("N", amount).with("R", remaining);
    let unit_price = evaluator.evaluate(formula, &vars)?;
    let total = unit_price * amount;
    if unit_price < 0.0 || !total.is_finite() {
        return Err(ExprError::evaluation(format!("price {total} is not a valid cost")).into());
    }
    Ok(total)
}

/// A completed purchase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurchaseReceipt {
    /// Units bought.
    pub amount: f64,
    /// Money paid.
    pub cost: f64,
    /// Remaining budget afterwards.
    pub remaining: f64,
}

/// Prices, pays for, and records a purchase.
pub fn purchase_with_funds(
    ledger: &mut Ledger,
    evaluator: &Evaluator,
    config: &SimConfig,
    amount: f64,
    funds: &mut dyn FundsProvider,
) -> Result<PurchaseReceipt, LedgerError> {
    let cost = quote_purchase(
        evaluator,
        &config.formulas.purchase_cost,
        amount,
        ledger.remaining(),
    )?;
    if !funds.has_funds(cost) {
        tracing::warn!(amount, cost, "Purchase refused: insufficient funds");
        return Err(LedgerError::InsufficientFunds { cost });
    }
    funds.deduct(cost);
    let remaining = ledger.purchase(amount, cost)?;
    Ok(PurchaseReceipt {
        amount,
        cost,
        remaining,
    })
}

/// Space centre facility, as seen by the trivial-limit formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facility {
    /// Vehicle Assembly Building (`VAB`).
    Vab,
    /// Space Plane Hangar (`SPH`).
    Sph,
    /// Launch pad (`LP`).
    LaunchPad,
    /// Runway (`RW`).
    Runway,
    /// Research and development (`RD`).
    ResearchAndDevelopment,
    /// Mission control (`MC`).
    MissionControl,
    /// Tracking station (`TS`).
    TrackingStation,
    /// Astronaut complex (`AC`).
    AstronautComplex,
    /// Administration (`AD`).
    Administration,
}

impl Facility {
    /// All facilities, in variable order.
    pub const ALL: [Self; 9] = [
        Self::Vab,
        Self::Sph,
        Self::LaunchPad,
        Self::Runway,
        Self::ResearchAndDevelopment,
        Self::MissionControl,
        Self::TrackingStation,
        Self::AstronautComplex,
        Self::Administration,
    ];

    /// Formula variable name.
    #[must_use]
    pub const fn variable(self) -> &'static str {
        match self {
            Self::Vab => "VAB",
            Self::Sph => "SPH",
            Self::LaunchPad => "LP",
            Self::Runway => "RW",
            Self::ResearchAndDevelopment => "RD",
            Self::MissionControl => "MC",
            Self::TrackingStation => "TS",
            Self::AstronautComplex => "AC",
            Self::Administration => "AD",
        }
    }
}

/// Game mode, which decides how facility levels are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GameMode {
    /// Facilities are upgraded over time.
    #[default]
    Career,
    /// Every facility is fully upgraded.
    Sandbox,
}

/// A facility's upgrade state as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacilityUpgrade {
    /// Number of upgrade levels.
    pub level_count: u32,
    /// Current level in `[0, 1]`.
    pub normalized: f64,
}

impl FacilityUpgrade {
    /// Integer level: truncated `count * normalized` in career, the count in
    /// sandbox.
    #[must_use]
    pub fn level(self, mode: GameMode) -> f64 {
        match mode {
            GameMode::Career => (f64::from(self.level_count) * self.normalized).trunc(),
            GameMode::Sandbox => f64::from(self.level_count),
        }
    }
}

/// Levels of all facilities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FacilityLevels {
    levels: [f64; 9],
}

impl FacilityLevels {
    /// Every facility at `level`.
    #[must_use]
    pub const fn uniform(level: f64) -> Self {
        Self { levels: [level; 9] }
    }

    /// Reads each facility from the host.
    pub fn from_host(mode: GameMode, mut read: impl FnMut(Facility) -> FacilityUpgrade) -> Self {
        let mut levels = [0.0; 9];
        for (slot, facility) in levels.iter_mut().zip(Facility::ALL) {
            *slot = read(facility).level(mode);
        }
        Self { levels }
    }

    /// Level of one facility.
    #[must_use]
    pub fn get(&self, facility: Facility) -> f64 {
        self.levels[facility as usize]
    }

    /// Sets one facility's level.
    pub fn set(&mut self, facility: Facility, level: f64) {
        self.levels[facility as usize] = level;
    }

    /// Variables for the trivial-limit formula.
    #[must_use]
    pub fn to_variables(&self) -> VariableSet {
        Facility::ALL
            .iter()
            .map(|f| (f.variable(), self.get(*f)))
            .collect()
    }
}

/// Trivial limit, computed once per configuration session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrivialLimit {
    cached: Option<f64>,
}

impl TrivialLimit {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { cached: None }
    }

    /// The limit, evaluating the formula on first use.
    ///
    /// Falls back to 0 (meter everything) if the formula fails.
    pub fn resolve(
        &mut self,
        evaluator: &Evaluator,
        formula: &Formula,
        facilities: &FacilityLevels,
    ) -> f64 {
        if let Some(limit) = self.cached {
            return limit;
        }
        let limit = match evaluator.evaluate(formula, &facilities.to_variables()) {
            Ok(limit) => limit,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    formula = %formula.id(),
                    "Trivial limit failed; metering everything"
                );
                0.0
            }
        };
        self.cached = Some(limit);
        limit
    }

    /// Cached value, if resolved.
    #[must_use]
    pub const fn cached(&self) -> Option<f64> {
        self.cached
    }

    /// Forgets the cached value.
    pub fn reset(&mut self) {
        self.cached = None;
    }
}

/// Returns true if a session at `rate` consumes budget under `limit`.
#[must_use]
pub fn is_metered(rate: f64, limit: f64) -> bool {
    rate >= limit
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wallet {
        balance: f64,
        deducted: f64,
    }

    impl FundsProvider for Wallet {
        fn has_funds(&self, cost: f64) -> bool {
            self.balance >= cost
        }

        fn deduct(&mut self, cost: f64) {
            self.balance -= cost;
            self.deducted += cost;
        }
    }

    #[test]
    fn tick_depletes_past_zero() {
        let mut ledger = Ledger::new(10.0);
        assert_eq!(ledger.tick(6.0, 2.0), -2.0);
        assert!(ledger.is_exhausted());
    }

    #[test]
    fn split_ticks_match_single_tick() {
        let mut whole = Ledger::new(100.0);
        whole.tick(8.0, 2.5);
        let mut split = Ledger::new(100.0);
        split.tick(3.0, 2.5);
        split.tick(5.0, 2.5);
        assert_eq!(whole.remaining(), split.remaining());
    }

    #[test]
    fn exhaustion_boundary() {
        for (value, exhausted) in [(-1.0, true), (0.0, true), (1e-9, false), (1.0, false)] {
            assert_eq!(Ledger::new(value).is_exhausted(), exhausted, "value {value}");
        }
    }

    #[test]
    fn non_finite_tick_is_ignored() {
        let mut ledger = Ledger::new(5.0);
        ledger.tick(f64::NAN, 1.0);
        ledger.tick(1.0, f64::INFINITY);
        assert_eq!(ledger.remaining(), 5.0);
    }

    #[test]
    fn purchase_requires_positive_amount() {
        let mut ledger = Ledger::new(0.0);
        assert!(matches!(ledger.purchase(0.0, 0.0), Err(LedgerError::InvalidAmount { .. })));
        assert!(matches!(ledger.purchase(-3.0, 0.0), Err(LedgerError::InvalidAmount { .. })));
        assert!(ledger.purchase(f64::NAN, 0.0).is_err());
        assert_eq!(ledger.purchase(2.0, 200.0).unwrap(), 2.0);
        assert_eq!(ledger.total_purchased(), 2.0);
        assert_eq!(ledger.total_spent(), 200.0);
    }

    #[test]
    fn funded_purchase() {
        let evaluator = Evaluator::new();
        let config = SimConfig::default();
        let mut ledger = Ledger::new(1.5);
        let mut wallet = Wallet {
            balance: 10_000.0,
            deducted: 0.0,
        };
        let receipt =
            purchase_with_funds(&mut ledger, &evaluator, &config, 5.0, &mut wallet).unwrap();
        assert_eq!(receipt.cost, 500.0);
        assert_eq!(ledger.remaining(), 6.5);
        assert_eq!(wallet.deducted, 500.0);
        assert_eq!(wallet.balance, 9_500.0);
    }

    #[test]
    fn unfunded_purchase_changes_nothing() {
        let evaluator = Evaluator::new();
        let config = SimConfig::default();
        let mut ledger = Ledger::new(1.0);
        let mut wallet = Wallet {
            balance: 10.0,
            deducted: 0.0,
        };
        let err =
            purchase_with_funds(&mut ledger, &evaluator, &config, 5.0, &mut wallet).unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds { cost: 500.0 });
        assert_eq!(ledger.remaining(), 1.0);
        assert_eq!(wallet.deducted, 0.0);
    }

    #[test]
    fn price_formula_sees_amount_and_remaining() {
        let evaluator = Evaluator::new();
        let formula = Formula::new("100 + R");
        assert_eq!(quote_purchase(&evaluator, &formula, 2.0, 50.0).unwrap(), 300.0);

        let bulk = Formula::new("max(10, 100 - N)");
        assert_eq!(quote_purchase(&evaluator, &bulk, 95.0, 0.0).unwrap(), 950.0);

        let broken = Formula::new("N +");
        assert!(matches!(
            quote_purchase(&evaluator, &broken, 1.0, 0.0),
            Err(LedgerError::Pricing(_))
        ));
        assert!(quote_purchase(&evaluator, &Formula::new("-1"), 1.0, 0.0).is_err());
    }

    #[test]
    fn checkpoint_json() {
        let mut ledger = Ledger::new(42.5);
        let json = ledger.checkpoint().to_json().unwrap();
        assert!(json.contains("remaining_budget"));

        ledger.set_remaining(0.0);
        ledger.load_json(&json).unwrap();
        assert_eq!(ledger.remaining(), 42.5);

        assert!(ledger.load_json("{ \"remaining\": 1 }").is_err());
        assert!(ledger.load_json("garbage").is_err());
        assert_eq!(ledger.remaining(), 42.5);
    }

    #[test]
    fn facility_levels_by_mode() {
        let upgrade = FacilityUpgrade {
            level_count: 3,
            normalized: 0.5,
        };
        assert_eq!(upgrade.level(GameMode::Career), 1.0);
        assert_eq!(upgrade.level(GameMode::Sandbox), 3.0);

        let levels = FacilityLevels::from_host(GameMode::Career, |f| FacilityUpgrade {
            level_count: 2,
            normalized: if f == Facility::Vab { 1.0 } else { 0.0 },
        });
        assert_eq!(levels.get(Facility::Vab), 2.0);
        assert_eq!(levels.get(Facility::Runway), 0.0);
    }

    #[test]
    fn trivial_limit_is_cached_and_fails_to_zero() {
        let evaluator = Evaluator::new();
        let mut levels = FacilityLevels::uniform(1.0);
        levels.set(Facility::Vab, 3.0);

        let mut limit = TrivialLimit::new();
        let formula = Formula::new("VAB * 5 + AD");
        assert_eq!(limit.resolve(&evaluator, &formula, &levels), 16.0);
        // Cached: a different formula is not consulted until reset.
        assert_eq!(limit.resolve(&evaluator, &Formula::new("0"), &levels), 16.0);

        limit.reset();
        assert_eq!(limit.resolve(&evaluator, &Formula::new("XYZ"), &levels), 0.0);
        assert_eq!(limit.cached(), Some(0.0));
    }

    #[test]
    fn metering_is_strictly_below_limit() {
        assert!(!is_metered(9.99, 10.0));
        assert!(is_metered(10.0, 10.0));
        assert!(is_metered(10.0, 0.0));
    }
}
