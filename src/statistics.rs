use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::Money;
use crate::errors::Result;
use crate::installment::Installment;
use crate::repository::InstallmentRepository;

/// portfolio-wide mora snapshot for dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MoraStatistics {
    pub total_installments_with_penalty: u32,
    pub total_accrued_penalty: Money,
    /// accrued but not yet collected
    pub total_unpaid_penalty: Money,
    pub average_penalty_per_installment: Money,
}

impl MoraStatistics {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// read-only aggregation over installments carrying penalty
#[derive(Debug, Clone)]
pub struct MoraStatisticsAggregator {
    minor_units: u32,
}

impl Default for MoraStatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MoraStatisticsAggregator {
    pub fn new() -> Self {
        Self { minor_units: 2 }
    }

    pub fn with_minor_units(minor_units: u32) -> Self {
        Self { minor_units }
    }

    pub async fn compute_statistics(
        &self,
        repository: &dyn InstallmentRepository,
    ) -> Result<MoraStatistics> {
        let installments = repository.find_with_penalty_greater_than_zero().await?;
        Ok(self.summarize(&installments))
    }

    /// summarize an already-fetched set; records without penalty are ignored
    pub fn summarize(&self, installments: &[Installment]) -> MoraStatistics {
        let with_penalty: Vec<&Installment> = installments
            .iter()
            .filter(|i| i.accrued_penalty.is_positive())
            .collect();

        let count = with_penalty.len() as u32;
        let total_accrued: Money = with_penalty.iter().map(|i| i.accrued_penalty).sum();
        let total_unpaid: Money = with_penalty.iter().map(|i| i.outstanding_penalty()).sum();

        let average = if count == 0 {
            Money::ZERO
        } else {
            Money::from_decimal(total_accrued.as_decimal() / Decimal::from(count))
                .round_to_minor(self.minor_units)
        };

        debug!(
            installments = count,
            accrued = %total_accrued,
            unpaid = %total_unpaid,
            "mora statistics computed"
        );

        MoraStatistics {
            total_installments_with_penalty: count,
            total_accrued_penalty: total_accrued,
            total_unpaid_penalty: total_unpaid,
            average_penalty_per_installment: average,
        }
    }
}
