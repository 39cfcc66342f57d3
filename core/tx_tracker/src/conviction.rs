//! Conviction voting for governance delegation.
//!
//! Locking the delegated balance for longer multiplies its voting power:
//!
//! | Level      | Votes | Lock periods | Days |
//! |------------|-------|--------------|------|
//! | `None`     | 0.1x  | 0            | 0    |
//! | `Locked1x` | 1x    | 1            | 7    |
//! | `Locked2x` | 2x    | 2            | 14   |
//! | `Locked3x` | 3x    | 4            | 28   |
//! | `Locked4x` | 4x    | 8            | 56   |
//! | `Locked5x` | 5x    | 16           | 112  |
//! | `Locked6x` | 6x    | 32           | 224  |

use serde::{Deserialize, Serialize};

/// Length of one lock period in days.
pub const LOCK_PERIOD_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Conviction {
    None,
    Locked1x,
    Locked2x,
    Locked3x,
    Locked4x,
    Locked5x,
    Locked6x,
}

impl Conviction {
    pub const ALL: [Conviction; 7] = [
        Self::None,
        Self::Locked1x,
        Self::Locked2x,
        Self::Locked3x,
        Self::Locked4x,
        Self::Locked5x,
        Self::Locked6x,
    ];

    /// Level by slider position, `0..=6`.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn lock_periods(&self) -> u32 {
        match self {
            Self::None => 0,
            other => 1 << (other.index() - 1),
        }
    }

    pub fn lock_days(&self) -> u32 {
        self.lock_periods() * LOCK_PERIOD_DAYS
    }

    /// Vote multiplier in tenths (`None` is 1, i.e. 0.1x).
    pub fn multiplier_tenths(&self) -> u128 {
        match self {
            Self::None => 1,
            other => other.index() as u128 * 10,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier_tenths() as f64 / 10.0
    }

    pub fn label(&self) -> String {
        match self {
            Self::None => "0.1x".to_string(),
            other => format!("{}x", other.index()),
        }
    }

    /// Votes carried by `amount` delegated at this conviction.
    pub fn effective_votes(&self, amount: u128) -> u128 {
        amount.saturating_mul(self.multiplier_tenths()) / 10
    }
}
