//! Relay chains the staking UI supports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::conviction::Conviction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Polkadot,
    Kusama,
}

impl Network {
    pub fn token_symbol(&self) -> &'static str {
        match self {
            Self::Polkadot => "DOT",
            Self::Kusama => "KSM",
        }
    }

    /// SS58 address prefix accounts are displayed with.
    pub fn ss58_prefix(&self) -> u16 {
        match self {
            Self::Polkadot => 0,
            Self::Kusama => 2,
        }
    }

    pub fn token_decimals(&self) -> u32 {
        match self {
            Self::Polkadot => 10,
            Self::Kusama => 12,
        }
    }

    /// Smallest units (planck) per whole token.
    pub fn planck_per_token(&self) -> u128 {
        10u128.pow(self.token_decimals())
    }

    /// Convert a whole-token amount to planck, truncating below one planck.
    /// Negative and non-finite amounts yield zero.
    pub fn to_planck(&self, tokens: f64) -> u128 {
        if !tokens.is_finite() || tokens <= 0.0 {
            return 0;
        }
        (tokens * self.planck_per_token() as f64) as u128
    }

    pub fn from_planck(&self, planck: u128) -> f64 {
        planck as f64 / self.planck_per_token() as f64
    }

    /// Conviction the delegation form starts with.
    pub fn default_conviction(&self) -> Conviction {
        match self {
            Self::Polkadot => Conviction::Locked3x,
            Self::Kusama => Conviction::Locked1x,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polkadot => f.write_str("Polkadot"),
            Self::Kusama => f.write_str("Kusama"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polkadot" | "dot" => Ok(Self::Polkadot),
            "kusama" | "ksm" => Ok(Self::Kusama),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
