pub mod calculator;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{InstallmentId, PenaltyReason};

pub use calculator::{calculate, AccrualCalculator};

/// outcome of evaluating one installment; never persisted by itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyResult {
    pub installment_id: InstallmentId,
    pub as_of: NaiveDate,
    /// total penalty owed as of `as_of`, already capped and rounded
    pub penalty_amount: Money,
    /// penalty stored on the installment before this evaluation
    pub previous_penalty: Money,
    pub penalty_cap: Money,
    pub days_late: u32,
    /// started 30-day blocks charged, monthly mode only
    pub months_charged: Option<u32>,
    pub effective_rate_used: Rate,
    pub was_capped: bool,
    pub reason: PenaltyReason,
}

impl PenaltyResult {
    /// growth over the stored penalty, zero if it would shrink
    pub fn additional_penalty(&self) -> Money {
        self.penalty_amount.saturating_sub(self.previous_penalty)
    }

    /// whether persisting this result would change the installment
    pub fn increases_penalty(&self) -> bool {
        !self.reason.is_skip() && self.penalty_amount > self.previous_penalty
    }
}
