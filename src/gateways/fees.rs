use crate::domain::charge::ChargeType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRule {
    pub fixed_minor: i64,
    pub percent_bps: i64,
    pub min_minor: i64,
    pub max_minor: i64,
}

impl FeeRule {
    pub fn apply(&self, amount_minor: i64) -> i64 {
        if amount_minor <= 0 {
            return 0;
        }
        let variable = amount_minor * self.percent_bps / 10_000;
        let fee = (self.fixed_minor + variable).clamp(self.min_minor, self.max_minor.max(self.min_minor));
        fee.min(amount_minor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub instant: FeeRule,
    pub scheduled: FeeRule,
}

impl FeeSchedule {
    pub fn inter_default() -> Self {
        Self {
            instant: FeeRule {
                fixed_minor: 0,
                percent_bps: 99,
                min_minor: 50,
                max_minor: 500,
            },
            scheduled: FeeRule {
                fixed_minor: 150,
                percent_bps: 0,
                min_minor: 150,
                max_minor: 150,
            },
        }
    }

    pub fn free() -> Self {
        let zero = FeeRule {
            fixed_minor: 0,
            percent_bps: 0,
            min_minor: 0,
            max_minor: 0,
        };
        Self {
            instant: zero.clone(),
            scheduled: zero,
        }
    }

    pub fn fee(&self, amount_minor: i64, charge_type: ChargeType) -> i64 {
        match charge_type {
            ChargeType::Instant => self.instant.apply(amount_minor),
            ChargeType::Scheduled => self.scheduled.apply(amount_minor),
        }
    }
}
