use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::decimal::Money;
use crate::errors::{MoraError, Result};
use crate::installment::Installment;
use crate::types::InstallmentId;

/// storage of installments, owned by the sales schedule
///
/// `update_penalty` is a conditional write: both fields of one installment
/// change atomically, and only while the stored record is unpaid and its
/// `accrued_penalty` is below `new_penalty`. Otherwise it returns
/// `InstallmentUpdateFailed` and leaves the record untouched.
#[async_trait]
pub trait InstallmentRepository: Send + Sync {
    /// unpaid installments with `due_date < as_of`, fresh on every call
    async fn find_overdue_unpaid(&self, as_of: NaiveDate) -> Result<Vec<Installment>>;

    /// installments whose accrued penalty is above zero
    async fn find_with_penalty_greater_than_zero(&self) -> Result<Vec<Installment>>;

    async fn find_by_id(&self, id: InstallmentId) -> Result<Option<Installment>>;

    async fn update_penalty(
        &self,
        id: InstallmentId,
        new_penalty: Money,
        calculation_date: NaiveDate,
    ) -> Result<()>;
}

/// in-memory repository with failure injection for the error paths
#[derive(Debug, Default)]
pub struct InMemoryInstallmentRepository {
    installments: RwLock<HashMap<InstallmentId, Installment>>,
    failing_updates: RwLock<HashSet<InstallmentId>>,
    unavailable: RwLock<bool>,
}

impl InMemoryInstallmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installments(installments: impl IntoIterator<Item = Installment>) -> Self {
        let repo = Self::new();
        for installment in installments {
            repo.insert(installment);
        }
        repo
    }

    /// insert or replace a record
    pub fn insert(&self, installment: Installment) {
        self.installments.write().insert(installment.id, installment);
    }

    pub fn get(&self, id: InstallmentId) -> Option<Installment> {
        self.installments.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.installments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.read().is_empty()
    }

    /// make every `update_penalty` for `id` fail
    pub fn fail_updates_for(&self, id: InstallmentId) {
        self.failing_updates.write().insert(id);
    }

    /// simulate the backing store being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    fn ensure_available(&self) -> Result<()> {
        if *self.unavailable.read() {
            return Err(MoraError::RepositoryFetchFailed {
                message: "installment store unreachable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InstallmentRepository for InMemoryInstallmentRepository {
    async fn find_overdue_unpaid(&self, as_of: NaiveDate) -> Result<Vec<Installment>> {
        self.ensure_available()?;
        Ok(self
            .installments
            .read()
            .values()
            .filter(|i| !i.is_paid() && i.due_date < as_of)
            .cloned()
            .collect())
    }

    async fn find_with_penalty_greater_than_zero(&self) -> Result<Vec<Installment>> {
        self.ensure_available()?;
        Ok(self
            .installments
            .read()
            .values()
            .filter(|i| i.accrued_penalty.is_positive())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: InstallmentId) -> Result<Option<Installment>> {
        self.ensure_available()?;
        Ok(self.get(id))
    }

    async fn update_penalty(
        &self,
        id: InstallmentId,
        new_penalty: Money,
        calculation_date: NaiveDate,
    ) -> Result<()> {
        if *self.unavailable.read() || self.failing_updates.read().contains(&id) {
            return Err(MoraError::InstallmentUpdateFailed {
                installment_id: id,
                message: "write rejected by store".to_string(),
            });
        }

        let mut installments = self.installments.write();
        let installment = installments
            .get_mut(&id)
            .ok_or(MoraError::InstallmentNotFound { installment_id: id })?;

        // the stored record may have moved on since the caller's snapshot
        if installment.is_paid() {
            return Err(MoraError::InstallmentUpdateFailed {
                installment_id: id,
                message: "installment already paid".to_string(),
            });
        }
        if new_penalty <= installment.accrued_penalty {
            return Err(MoraError::InstallmentUpdateFailed {
                installment_id: id,
                message: format!(
                    "stored penalty {} is not below {}",
                    installment.accrued_penalty, new_penalty
                ),
            });
        }

        installment.accrued_penalty = new_penalty;
        installment.last_accrual_calculation_date = Some(calculation_date);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstallmentStatus;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_overdue_filter_excludes_paid_and_future() {
        let overdue = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 1, 1));
        let future = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 6, 1));
        let due_today = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 3, 1));
        let mut paid = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 1, 1));
        paid.status = InstallmentStatus::Paid;

        let repo = InMemoryInstallmentRepository::with_installments(vec![
            overdue.clone(),
            future,
            due_today,
            paid,
        ]);

        let found = repo.find_overdue_unpaid(date(2024, 3, 1)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, overdue.id);
    }

    #[tokio::test]
    async fn test_update_penalty_writes_both_fields() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 1, 1));
        let repo = InMemoryInstallmentRepository::with_installments(vec![cuota.clone()]);

        repo.update_penalty(cuota.id, Money::from_major(7), date(2024, 2, 1))
            .await
            .unwrap();

        let stored = repo.get(cuota.id).unwrap();
        assert_eq!(stored.accrued_penalty, Money::from_major(7));
        assert_eq!(stored.last_accrual_calculation_date, Some(date(2024, 2, 1)));

        let with_penalty = repo.find_with_penalty_greater_than_zero().await.unwrap();
        assert_eq!(with_penalty.len(), 1);
    }

    #[tokio::test]
    async fn test_update_refused_for_paid_or_lower_penalty() {
        let mut cuota = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 1, 1));
        cuota.accrued_penalty = Money::from_major(10);
        let repo = InMemoryInstallmentRepository::with_installments(vec![cuota.clone()]);

        for stale in [Money::from_major(10), Money::from_major(4)] {
            let err = repo
                .update_penalty(cuota.id, stale, date(2024, 2, 1))
                .await
                .unwrap_err();
            assert!(matches!(err, MoraError::InstallmentUpdateFailed { .. }));
        }

        let mut settled = cuota.clone();
        settled.status = InstallmentStatus::Paid;
        repo.insert(settled);
        let err = repo
            .update_penalty(cuota.id, Money::from_major(50), date(2024, 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, MoraError::InstallmentUpdateFailed { .. }));

        let stored = repo.get(cuota.id).unwrap();
        assert_eq!(stored.accrued_penalty, Money::from_major(10));
        assert_eq!(stored.last_accrual_calculation_date, None);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let cuota = Installment::new(Uuid::new_v4(), Money::from_major(100), date(2024, 1, 1));
        let repo = InMemoryInstallmentRepository::with_installments(vec![cuota.clone()]);

        repo.fail_updates_for(cuota.id);
        let err = repo
            .update_penalty(cuota.id, Money::ONE, date(2024, 2, 1))
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(repo.get(cuota.id).unwrap().accrued_penalty, Money::ZERO);

        repo.set_unavailable(true);
        let err = repo.find_overdue_unpaid(date(2024, 2, 1)).await.unwrap_err();
        assert!(matches!(err, MoraError::RepositoryFetchFailed { .. }));
        assert!(err.is_fatal());
    }
}
