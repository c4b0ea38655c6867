//! Named timeout tiers

use crate::config::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fixed, ordered set of time budgets for remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeoutTier {
    Short,
    Medium,
    Long,
    ExtraLong,
}

impl TimeoutTier {
    pub const ALL: [TimeoutTier; 4] = [
        TimeoutTier::Short,
        TimeoutTier::Medium,
        TimeoutTier::Long,
        TimeoutTier::ExtraLong,
    ];

    /// Settings key holding this tier's budget in milliseconds
    pub fn setting_key(&self) -> &'static str {
        match self {
            TimeoutTier::Short => "read_timeout_s",
            TimeoutTier::Medium => "read_timeout_m",
            TimeoutTier::Long => "read_timeout_l",
            TimeoutTier::ExtraLong => "read_timeout_xl",
        }
    }

    fn default_budget(&self) -> Duration {
        match self {
            TimeoutTier::Short => Duration::from_secs(30),
            TimeoutTier::Medium => Duration::from_secs(120),
            TimeoutTier::Long => Duration::from_secs(15 * 60),
            TimeoutTier::ExtraLong => Duration::from_secs(60 * 60),
        }
    }
}

impl fmt::Display for TimeoutTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeoutTier::Short => "S",
            TimeoutTier::Medium => "M",
            TimeoutTier::Long => "L",
            TimeoutTier::ExtraLong => "XL",
        };
        f.write_str(name)
    }
}

/// Resolved budgets for every tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTiers {
    budgets: [Duration; 4],
}

impl TimeoutTiers {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut budgets = [Duration::ZERO; 4];
        for (slot, tier) in budgets.iter_mut().zip(TimeoutTier::ALL) {
            *slot = settings
                .get_duration_ms(tier.setting_key())
                .filter(|budget| !budget.is_zero())
                .unwrap_or_else(|| tier.default_budget());
        }
        Self { budgets }
    }

    /// Same budget for every tier
    pub fn uniform(budget: Duration) -> Self {
        Self {
            budgets: [budget; 4],
        }
    }

    pub fn get(&self, tier: TimeoutTier) -> Duration {
        self.budgets[tier as usize]
    }
}

impl Default for TimeoutTiers {
    fn default() -> Self {
        Self {
            budgets: TimeoutTier::ALL.map(|tier| tier.default_budget()),
        }
    }
}
