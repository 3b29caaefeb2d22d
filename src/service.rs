use std::sync::Arc;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::accrual::{AccrualCalculator, PenaltyResult};
use crate::config::{ConfigurationStore, RateConfiguration};
use crate::errors::{MoraError, Result};
use crate::events::{EventStore, MoraEvent};
use crate::installment::Installment;
use crate::repository::InstallmentRepository;
use crate::runner::{AccrualRunReport, CancellationFlag, MassAccrualRunner};
use crate::statistics::{MoraStatistics, MoraStatisticsAggregator};
use crate::types::InstallmentId;

/// newest audit events kept by a service between drains
pub const MAX_RETAINED_EVENTS: usize = 10_000;

/// entry point for the administrative dashboard and reports
///
/// Every operation loads a fresh configuration snapshot and evaluates as of
/// the provider's current date. Audit events accumulate until drained with
/// [`MoraService::take_events`]; past [`MAX_RETAINED_EVENTS`] the oldest are
/// dropped.
pub struct MoraService {
    config_store: Arc<dyn ConfigurationStore>,
    repository: Arc<dyn InstallmentRepository>,
    time: SafeTimeProvider,
    events: Mutex<EventStore>,
}

impl MoraService {
    pub fn new(
        config_store: Arc<dyn ConfigurationStore>,
        repository: Arc<dyn InstallmentRepository>,
        time: SafeTimeProvider,
    ) -> Self {
        Self {
            config_store,
            repository,
            time,
            events: Mutex::new(EventStore::bounded(MAX_RETAINED_EVENTS)),
        }
    }

    /// evaluation date
    pub fn today(&self) -> NaiveDate {
        self.time.now().date_naive()
    }

    /// preview the penalty for one installment without persisting
    #[instrument(name = "mora.calculate_single", skip(self), err)]
    pub async fn calculate_single(&self, installment_id: InstallmentId) -> Result<PenaltyResult> {
        let config = self.load_config().await?;
        let installment = self.fetch_installment(installment_id).await?;
        Ok(AccrualCalculator::new(config).calculate(&installment, self.today()))
    }

    /// calculate and persist the penalty for one installment
    #[instrument(name = "mora.apply_single", skip(self), err)]
    pub async fn apply_single(&self, installment_id: InstallmentId) -> Result<PenaltyResult> {
        let config = self.load_config().await?;
        let installment = self.fetch_installment(installment_id).await?;
        let as_of = self.today();
        let result = AccrualCalculator::new(config).calculate(&installment, as_of);

        if !result.increases_penalty() {
            return Ok(result);
        }

        if let Err(e) = self
            .repository
            .update_penalty(installment_id, result.penalty_amount, as_of)
            .await
        {
            let message = e.to_string();
            self.events.lock().emit(MoraEvent::PenaltyUpdateFailed {
                installment_id,
                message: message.clone(),
                as_of,
            });
            return Err(match e {
                failed @ MoraError::InstallmentUpdateFailed { .. } => failed,
                _ => MoraError::InstallmentUpdateFailed {
                    installment_id,
                    message,
                },
            });
        }

        info!(
            installment = %installment_id,
            penalty = %result.penalty_amount,
            "penalty applied"
        );
        self.events.lock().emit(MoraEvent::PenaltyAccrued {
            installment_id,
            previous_penalty: result.previous_penalty,
            new_penalty: result.penalty_amount,
            days_late: result.days_late,
            was_capped: result.was_capped,
            as_of,
        });
        Ok(result)
    }

    #[instrument(name = "mora.run_mass_accrual", skip(self), err)]
    pub async fn run_mass_accrual(&self) -> Result<AccrualRunReport> {
        self.run_mass_accrual_cancellable(&CancellationFlag::new())
            .await
    }

    /// mass run that stops between installments once `cancel` is set
    #[instrument(name = "mora.run_mass_accrual_cancellable", skip(self, cancel), err)]
    pub async fn run_mass_accrual_cancellable(
        &self,
        cancel: &CancellationFlag,
    ) -> Result<AccrualRunReport> {
        let config = self.load_config().await?;
        let mut runner = MassAccrualRunner::new(config);
        let outcome = runner
            .run_for_all_overdue_cancellable(self.today(), self.repository.as_ref(), cancel)
            .await;
        self.events.lock().extend(runner.events.take_events());
        outcome
    }

    /// averages round to the configured minor units, or two when no valid
    /// configuration is available
    #[instrument(name = "mora.get_statistics", skip(self), err)]
    pub async fn get_statistics(&self) -> Result<MoraStatistics> {
        let aggregator = match RateConfiguration::load(self.config_store.as_ref()).await {
            Ok(config) => MoraStatisticsAggregator::with_minor_units(config.currency_minor_units),
            Err(e) => {
                warn!(error = %e, "mora configuration unavailable, statistics use two minor units");
                MoraStatisticsAggregator::new()
            }
        };
        aggregator.compute_statistics(self.repository.as_ref()).await
    }

    /// copy of the events recorded so far
    pub fn events(&self) -> Vec<MoraEvent> {
        self.events.lock().events().to_vec()
    }

    pub fn take_events(&self) -> Vec<MoraEvent> {
        self.events.lock().take_events()
    }

    async fn load_config(&self) -> Result<RateConfiguration> {
        match RateConfiguration::load(self.config_store.as_ref()).await {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(error = %e, "mora configuration rejected, nothing accrued");
                self.events.lock().emit(MoraEvent::ConfigurationRejected {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn fetch_installment(&self, installment_id: InstallmentId) -> Result<Installment> {
        self.repository
            .find_by_id(installment_id)
            .await?
            .ok_or(MoraError::InstallmentNotFound { installment_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigurationStore;
    use crate::decimal::Money;
    use crate::repository::InMemoryInstallmentRepository;
    use crate::types::PenaltyReason;
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn setup(
        config: RateConfiguration,
        installments: Vec<Installment>,
    ) -> (MoraService, Arc<InMemoryInstallmentRepository>, Arc<StaticConfigurationStore>, SafeTimeProvider) {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
        ));
        let repo = Arc::new(InMemoryInstallmentRepository::with_installments(installments));
        let store = Arc::new(StaticConfigurationStore::new(config));
        let service = MoraService::new(store.clone(), repo.clone(), time.clone());
        (service, repo, store, time)
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[tokio::test]
    async fn test_calculate_single_does_not_persist() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(750_000), due());
        let (service, repo, _, time) = setup(RateConfiguration::daily(dec!(0.05), 3), vec![cuota.clone()]);
        time.test_control().unwrap().advance(Duration::days(33));

        let preview = service.calculate_single(cuota.id).await.unwrap();
        assert_eq!(preview.penalty_amount, Money::from_major(11_250));
        assert_eq!(repo.get(cuota.id).unwrap().accrued_penalty, Money::ZERO);
    }

    #[tokio::test]
    async fn test_apply_single_persists() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(750_000), due());
        let (service, repo, _, time) = setup(RateConfiguration::daily(dec!(0.05), 3), vec![cuota.clone()]);
        time.test_control().unwrap().advance(Duration::days(33));

        let applied = service.apply_single(cuota.id).await.unwrap();
        let stored = repo.get(cuota.id).unwrap();
        assert_eq!(stored.accrued_penalty, applied.penalty_amount);
        assert_eq!(stored.last_accrual_calculation_date, Some(service.today()));
        assert!(matches!(service.events().last(), Some(MoraEvent::PenaltyAccrued { .. })));
    }

    #[tokio::test]
    async fn test_apply_single_update_failure_propagates() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(1_000), due());
        let (service, repo, _, time) = setup(RateConfiguration::default(), vec![cuota.clone()]);
        repo.fail_updates_for(cuota.id);
        time.test_control().unwrap().advance(Duration::days(40));

        let err = service.apply_single(cuota.id).await.unwrap_err();
        assert!(matches!(err, MoraError::InstallmentUpdateFailed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_installment() {
        let (service, _, _, _) = setup(RateConfiguration::default(), vec![]);
        let missing = Uuid::new_v4();

        let err = service.calculate_single(missing).await.unwrap_err();
        assert_eq!(err, MoraError::InstallmentNotFound { installment_id: missing });
    }

    #[tokio::test]
    async fn test_invalid_configuration_aborts_run() {
        let mut bad = RateConfiguration::default();
        bad.daily_rate_percent = dec!(-1);
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(1_000), due());
        let (service, repo, _, time) = setup(bad, vec![cuota.clone()]);
        time.test_control().unwrap().advance(Duration::days(40));

        let err = service.run_mass_accrual().await.unwrap_err();
        assert!(matches!(err, MoraError::InvalidConfiguration { .. }));
        assert_eq!(repo.get(cuota.id).unwrap().accrued_penalty, Money::ZERO);
        assert!(matches!(service.events()[0], MoraEvent::ConfigurationRejected { .. }));
    }

    #[tokio::test]
    async fn test_statistics_round_to_configured_minor_units() {
        let mut first = Installment::new(Uuid::new_v4(), Money::from_major(10_000), due());
        first.accrued_penalty = Money::from_major(100);
        let mut second = Installment::new(Uuid::new_v4(), Money::from_major(10_000), due());
        second.accrued_penalty = Money::from_major(103);

        let mut pesos = RateConfiguration::default();
        pesos.currency_minor_units = 0;
        let (service, _, store, _) = setup(pesos, vec![first, second]);

        // 101.5 rounds half to even
        let stats = service.get_statistics().await.unwrap();
        assert_eq!(stats.average_penalty_per_installment, Money::from_major(102));

        let mut invalid = RateConfiguration::default();
        invalid.daily_rate_percent = dec!(-1);
        store.replace(invalid);
        let stats = service.get_statistics().await.unwrap();
        assert_eq!(stats.average_penalty_per_installment, Money::from_str_exact("101.50").unwrap());
    }

    #[tokio::test]
    async fn test_events_drain() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(1_000), due());
        let (service, _, _, time) = setup(RateConfiguration::default(), vec![cuota]);
        time.test_control().unwrap().advance(Duration::days(40));

        service.run_mass_accrual().await.unwrap();
        assert_eq!(service.take_events().len(), 3);
        assert!(service.events().is_empty());
    }

    #[tokio::test]
    async fn test_config_change_applies_on_next_run() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(100_000), due());
        let (service, repo, store, time) = setup(RateConfiguration::disabled(), vec![cuota.clone()]);
        time.test_control().unwrap().advance(Duration::days(13));

        let preview = service.calculate_single(cuota.id).await.unwrap();
        assert_eq!(preview.reason, PenaltyReason::Disabled);
        let report = service.run_mass_accrual().await.unwrap();
        assert_eq!(report.installments_updated, 0);

        store.replace(RateConfiguration::daily(dec!(0.05), 3));
        let report = service.run_mass_accrual().await.unwrap();
        assert_eq!(report.installments_updated, 1);
        // 100_000 * 0.05% * 10
        assert_eq!(repo.get(cuota.id).unwrap().accrued_penalty, Money::from_major(500));

        let stats = service.get_statistics().await.unwrap();
        assert_eq!(stats.total_installments_with_penalty, 1);
        assert_eq!(stats.total_accrued_penalty, Money::from_major(500));
    }
}
