use chrono::NaiveDate;
use rust_decimal::RoundingStrategy;

use crate::accrual::PenaltyResult;
use crate::config::{RateConfiguration, DAYS_PER_MONTH};
use crate::decimal::{Money, Rate};
use crate::installment::Installment;
use crate::types::{CalculationMode, PenaltyReason};

/// pure penalty calculator bound to one configuration snapshot
#[derive(Debug, Clone)]
pub struct AccrualCalculator {
    pub config: RateConfiguration,
}

impl AccrualCalculator {
    pub fn new(config: RateConfiguration) -> Self {
        Self { config }
    }

    /// total penalty owed on `installment` as of `as_of`
    pub fn calculate(&self, installment: &Installment, as_of: NaiveDate) -> PenaltyResult {
        let config = &self.config;
        let penalty_cap = installment.penalty_cap(config.max_penalty_percent_of_installment);

        let mut result = PenaltyResult {
            installment_id: installment.id,
            as_of,
            penalty_amount: Money::ZERO,
            previous_penalty: installment.accrued_penalty,
            penalty_cap,
            days_late: 0,
            months_charged: None,
            effective_rate_used: Rate::ZERO,
            was_capped: false,
            reason: PenaltyReason::Disabled,
        };

        if !config.enabled {
            return result;
        }

        if installment.is_paid() {
            result.penalty_amount = installment.accrued_penalty;
            result.reason = PenaltyReason::AlreadyPaid;
            return result;
        }

        let days_late = installment.days_late(as_of, config.grace_period_days);
        if days_late == 0 {
            result.reason = PenaltyReason::WithinGraceOrNotDue;
            return result;
        }

        let (raw_penalty, months_charged) = self.raw_penalty(installment.face_value, days_late);
        let was_capped = raw_penalty > penalty_cap;

        // rounding only here, and never above the cap
        let cap_floor = Money::from_decimal(
            penalty_cap
                .as_decimal()
                .round_dp_with_strategy(config.currency_minor_units, RoundingStrategy::ToZero),
        );
        let penalty_amount = raw_penalty
            .min(penalty_cap)
            .round_to_minor(config.currency_minor_units)
            .min(cap_floor);

        result.penalty_amount = penalty_amount;
        result.days_late = days_late;
        result.months_charged = months_charged;
        result.effective_rate_used = config.effective_rate();
        result.was_capped = was_capped;
        result.reason = PenaltyReason::Accrued;
        result
    }

    /// uncapped, unrounded penalty for a number of grace-adjusted days late
    pub fn raw_penalty(&self, face_value: Money, days_late: u32) -> (Money, Option<u32>) {
        match self.config.calculation_mode {
            CalculationMode::Daily => {
                (face_value.apply_rate(self.config.effective_daily_rate(), days_late), None)
            }
            CalculationMode::Monthly => {
                let months = days_late.div_ceil(DAYS_PER_MONTH);
                (
                    face_value.apply_rate(self.config.effective_monthly_rate(), months),
                    Some(months),
                )
            }
        }
    }
}

/// calculate with a borrowed configuration
pub fn calculate(
    installment: &Installment,
    config: &RateConfiguration,
    as_of: NaiveDate,
) -> PenaltyResult {
    AccrualCalculator::new(config.clone()).calculate(installment, as_of)
}
