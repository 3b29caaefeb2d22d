use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accrual::AccrualCalculator;
use crate::config::{ConfigurationStore, RateConfiguration};
use crate::decimal::Money;
use crate::errors::{MoraError, Result};
use crate::events::{EventStore, MoraEvent};
use crate::installment::Installment;
use crate::repository::InstallmentRepository;
use crate::types::InstallmentId;

/// shared flag checked between installments
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// an installment skipped because its write failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentFailure {
    pub installment_id: InstallmentId,
    pub message: String,
}

/// summary of one accrual run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualRunReport {
    pub as_of: NaiveDate,
    pub total_installments_evaluated: u32,
    pub installments_updated: u32,
    /// paid, within grace, disabled, unchanged, or failed writes
    pub installments_skipped: u32,
    pub total_penalty_accrued_this_run: Money,
    pub failures: Vec<InstallmentFailure>,
    pub cancelled: bool,
}

impl AccrualRunReport {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            total_installments_evaluated: 0,
            installments_updated: 0,
            installments_skipped: 0,
            total_penalty_accrued_this_run: Money::ZERO,
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// combine partial reports of the same run
    pub fn merge(mut self, other: AccrualRunReport) -> Self {
        self.total_installments_evaluated += other.total_installments_evaluated;
        self.installments_updated += other.installments_updated;
        self.installments_skipped += other.installments_skipped;
        self.total_penalty_accrued_this_run += other.total_penalty_accrued_this_run;
        self.failures.extend(other.failures);
        self.cancelled |= other.cancelled;
        self
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn record_skip(&mut self) {
        self.total_installments_evaluated += 1;
        self.installments_skipped += 1;
    }

    fn record_update(&mut self, delta: Money) {
        self.total_installments_evaluated += 1;
        self.installments_updated += 1;
        self.total_penalty_accrued_this_run += delta;
    }
}

/// applies the calculator across every overdue installment
pub struct MassAccrualRunner {
    calculator: AccrualCalculator,
    pub events: EventStore,
}

impl MassAccrualRunner {
    pub fn new(config: RateConfiguration) -> Self {
        Self {
            calculator: AccrualCalculator::new(config),
            events: EventStore::new(),
        }
    }

    /// load and validate the configuration first; failures abort with no report
    pub async fn from_store(store: &dyn ConfigurationStore) -> Result<Self> {
        let config = RateConfiguration::load(store).await?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &RateConfiguration {
        &self.calculator.config
    }

    pub async fn run_for_all_overdue(
        &mut self,
        as_of: NaiveDate,
        repository: &dyn InstallmentRepository,
    ) -> Result<AccrualRunReport> {
        self.run_for_all_overdue_cancellable(as_of, repository, &CancellationFlag::new())
            .await
    }

    pub async fn run_for_all_overdue_cancellable(
        &mut self,
        as_of: NaiveDate,
        repository: &dyn InstallmentRepository,
        cancel: &CancellationFlag,
    ) -> Result<AccrualRunReport> {
        let installments = repository.find_overdue_unpaid(as_of).await.map_err(|e| match e {
            fetch @ MoraError::RepositoryFetchFailed { .. } => fetch,
            other => MoraError::RepositoryFetchFailed {
                message: other.to_string(),
            },
        })?;

        info!(
            as_of = %as_of,
            installments = installments.len(),
            enabled = self.config().enabled,
            "mora accrual run start"
        );
        self.events.emit(MoraEvent::AccrualRunStarted {
            as_of,
            installments_fetched: installments.len(),
        });

        let mut report = AccrualRunReport::new(as_of);
        for installment in &installments {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.accrue_one(installment, as_of, repository, &mut report)
                .await;
        }

        if report.cancelled {
            warn!(
                as_of = %as_of,
                evaluated = report.total_installments_evaluated,
                "mora accrual run cancelled"
            );
            self.events.emit(MoraEvent::AccrualRunCancelled {
                as_of,
                installments_evaluated: report.total_installments_evaluated,
            });
        } else {
            info!(
                as_of = %as_of,
                updated = report.installments_updated,
                skipped = report.installments_skipped,
                failed = report.failures.len(),
                accrued = %report.total_penalty_accrued_this_run,
                "mora accrual run complete"
            );
            self.events.emit(MoraEvent::AccrualRunCompleted {
                as_of,
                installments_updated: report.installments_updated,
                installments_skipped: report.installments_skipped,
                total_penalty_accrued: report.total_penalty_accrued_this_run,
            });
        }

        Ok(report)
    }

    async fn accrue_one(
        &mut self,
        installment: &Installment,
        as_of: NaiveDate,
        repository: &dyn InstallmentRepository,
        report: &mut AccrualRunReport,
    ) {
        let result = self.calculator.calculate(installment, as_of);

        if result.reason.is_skip() {
            debug!(installment = %installment.id, reason = ?result.reason, "skipped");
            report.record_skip();
            return;
        }

        // never lower a stored penalty; equal means already processed or at cap
        if !result.increases_penalty() {
            debug!(
                installment = %installment.id,
                penalty = %result.penalty_amount,
                stored = %installment.accrued_penalty,
                "penalty unchanged"
            );
            report.record_skip();
            return;
        }

        match repository
            .update_penalty(installment.id, result.penalty_amount, as_of)
            .await
        {
            Ok(()) => {
                report.record_update(result.additional_penalty());
                self.events.emit(MoraEvent::PenaltyAccrued {
                    installment_id: installment.id,
                    previous_penalty: result.previous_penalty,
                    new_penalty: result.penalty_amount,
                    days_late: result.days_late,
                    was_capped: result.was_capped,
                    as_of,
                });
            }
            Err(e) => {
                warn!(installment = %installment.id, error = %e, "penalty update failed");
                report.record_skip();
                report.failures.push(InstallmentFailure {
                    installment_id: installment.id,
                    message: e.to_string(),
                });
                self.events.emit(MoraEvent::PenaltyUpdateFailed {
                    installment_id: installment.id,
                    message: e.to_string(),
                    as_of,
                });
            }
        }
    }
}
