//! Staking reward estimates for the calculator.

use serde::Serialize;

/// Annual yield assumed when the caller has no better figure.
pub const DEFAULT_APY: f64 = 0.15;

/// Restaking every 4 hours.
pub const COMPOUNDS_PER_DAY: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardEstimator {
    pub apy: f64,
    pub compounding: bool,
}

impl Default for RewardEstimator {
    fn default() -> Self {
        RewardEstimator {
            apy: DEFAULT_APY,
            compounding: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardEstimate {
    pub daily: f64,
    pub monthly: f64,
    pub yearly: f64,
}

impl RewardEstimate {
    /// Same estimate priced in fiat.
    pub fn priced(&self, price: f64) -> RewardEstimate {
        RewardEstimate {
            daily: self.daily * price,
            monthly: self.monthly * price,
            yearly: self.yearly * price,
        }
    }
}

impl RewardEstimator {
    pub fn new(apy: f64, compounding: bool) -> Self {
        RewardEstimator { apy, compounding }
    }

    /// Reward earned on `principal` after `days`.
    pub fn reward(&self, principal: f64, days: u32) -> f64 {
        let daily_rate = self.apy / 365.0;
        if self.compounding {
            let per_compound = daily_rate / COMPOUNDS_PER_DAY as f64;
            let compounds = f64::from(COMPOUNDS_PER_DAY) * f64::from(days);
            principal * (1.0 + per_compound).powf(compounds) - principal
        } else {
            principal * daily_rate * f64::from(days)
        }
    }

    pub fn estimate(&self, principal: f64) -> RewardEstimate {
        RewardEstimate {
            daily: self.reward(principal, 1),
            monthly: self.reward(principal, 30),
            yearly: self.reward(principal, 365),
        }
    }
}
