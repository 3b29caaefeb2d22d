use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{InstallmentId, InstallmentStatus};

/// an installment (cuota) as seen by the mora engine
///
/// Only `accrued_penalty` and `last_accrual_calculation_date` are written by
/// the engine; everything else belongs to the sales schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub face_value: Money,
    /// capital paid so far
    pub amount_paid: Money,
    pub due_date: NaiveDate,
    pub accrued_penalty: Money,
    pub last_accrual_calculation_date: Option<NaiveDate>,
    pub status: InstallmentStatus,
    /// part of collected payments allocated to penalty
    #[serde(default)]
    pub penalty_collected: Money,
}

impl Installment {
    pub fn new(id: InstallmentId, face_value: Money, due_date: NaiveDate) -> Self {
        Self {
            id,
            face_value,
            amount_paid: Money::ZERO,
            due_date,
            accrued_penalty: Money::ZERO,
            last_accrual_calculation_date: None,
            status: InstallmentStatus::Pending,
            penalty_collected: Money::ZERO,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_paid() && as_of > self.due_date
    }

    /// whole days since the due date, zero when not yet due
    pub fn days_past_due(&self, as_of: NaiveDate) -> u32 {
        let days = (as_of - self.due_date).num_days();
        u32::try_from(days.max(0)).unwrap_or(u32::MAX)
    }

    /// days past due minus the grace period, never negative
    pub fn days_late(&self, as_of: NaiveDate, grace_period_days: u32) -> u32 {
        self.days_past_due(as_of).saturating_sub(grace_period_days)
    }

    /// upper bound on accrued penalty for a cap given in percent of face value
    pub fn penalty_cap(&self, max_penalty_percent: Decimal) -> Money {
        self.face_value.percentage(max_penalty_percent)
    }

    /// accrued penalty not yet collected
    pub fn outstanding_penalty(&self) -> Money {
        self.accrued_penalty.saturating_sub(self.penalty_collected)
    }

    pub fn outstanding_capital(&self) -> Money {
        self.face_value.saturating_sub(self.amount_paid)
    }
}
