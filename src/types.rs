use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for an installment (cuota)
pub type InstallmentId = Uuid;

/// installment payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    /// nothing paid yet
    Pending,
    /// some capital paid, balance remaining
    PartiallyPaid,
    /// fully settled, penalty frozen
    Paid,
}

/// which rate and period unit the calculator uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationMode {
    /// daily rate times days late
    Daily,
    /// monthly rate times started 30-day blocks
    Monthly,
}

/// why a penalty result has the value it has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyReason {
    /// accrual switched off in configuration
    Disabled,
    /// installment settled, existing penalty returned unchanged
    AlreadyPaid,
    /// not due yet or still inside the grace period
    WithinGraceOrNotDue,
    /// penalty computed from days late
    Accrued,
}

impl PenaltyReason {
    /// reasons the mass runner never writes for
    pub fn is_skip(&self) -> bool {
        !matches!(self, PenaltyReason::Accrued)
    }
}
