use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{MoraError, Result};
use crate::types::CalculationMode;

/// days per month used to turn the legal monthly ceiling into a daily one
pub const DAYS_PER_MONTH: u32 = 30;

/// highest minor-unit scale accepted for rounding
pub const MAX_MINOR_UNITS: u32 = 8;

fn default_minor_units() -> u32 {
    2
}

/// mora accrual policy, treated as a snapshot for the duration of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfiguration {
    /// master switch
    pub enabled: bool,
    /// percent per day late (0.05 means 0.05%)
    pub daily_rate_percent: Decimal,
    /// percent per month late
    pub monthly_rate_percent: Decimal,
    /// days after the due date with no penalty
    pub grace_period_days: u32,
    pub calculation_mode: CalculationMode,
    /// accrued penalty never exceeds this percent of face value
    pub max_penalty_percent_of_installment: Decimal,
    /// legal (usury) ceiling on the monthly-equivalent rate
    pub max_legal_monthly_rate_percent: Decimal,
    /// decimal places of the currency minor unit
    #[serde(default = "default_minor_units")]
    pub currency_minor_units: u32,
}

impl Default for RateConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_rate_percent: dec!(0.05),
            monthly_rate_percent: dec!(1.5),
            grace_period_days: 3,
            calculation_mode: CalculationMode::Daily,
            max_penalty_percent_of_installment: dec!(200),
            max_legal_monthly_rate_percent: dec!(3.0),
            currency_minor_units: default_minor_units(),
        }
    }
}

impl RateConfiguration {
    /// daily-mode configuration
    pub fn daily(daily_rate_percent: Decimal, grace_period_days: u32) -> Self {
        Self {
            daily_rate_percent,
            grace_period_days,
            calculation_mode: CalculationMode::Daily,
            ..Self::default()
        }
    }

    /// monthly-mode configuration
    pub fn monthly(
        monthly_rate_percent: Decimal,
        max_legal_monthly_rate_percent: Decimal,
        grace_period_days: u32,
    ) -> Self {
        Self {
            monthly_rate_percent,
            max_legal_monthly_rate_percent,
            grace_period_days,
            calculation_mode: CalculationMode::Monthly,
            ..Self::default()
        }
    }

    /// accrual switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// fetch from a store and validate; nothing partially valid is ever returned
    pub async fn load(store: &dyn ConfigurationStore) -> Result<Self> {
        let config = match store.get_mora_configuration().await {
            Ok(config) => config,
            Err(err @ MoraError::ConfigurationUnavailable { .. })
            | Err(err @ MoraError::InvalidConfiguration { .. }) => return Err(err),
            Err(other) => {
                return Err(MoraError::ConfigurationUnavailable {
                    message: other.to_string(),
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("daily_rate_percent", self.daily_rate_percent),
            ("monthly_rate_percent", self.monthly_rate_percent),
            (
                "max_penalty_percent_of_installment",
                self.max_penalty_percent_of_installment,
            ),
            (
                "max_legal_monthly_rate_percent",
                self.max_legal_monthly_rate_percent,
            ),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(MoraError::InvalidConfiguration {
                    field: field.to_string(),
                    message: format!("must be >= 0, got {}", value),
                });
            }
        }

        if self.currency_minor_units > MAX_MINOR_UNITS {
            return Err(MoraError::InvalidConfiguration {
                field: "currency_minor_units".to_string(),
                message: format!(
                    "must be <= {}, got {}",
                    MAX_MINOR_UNITS, self.currency_minor_units
                ),
            });
        }

        Ok(())
    }

    /// min(monthly rate, legal ceiling)
    pub fn effective_monthly_rate(&self) -> Rate {
        Rate::from_percent(
            self.monthly_rate_percent
                .min(self.max_legal_monthly_rate_percent),
        )
    }

    /// min(daily rate, legal ceiling / 30)
    pub fn effective_daily_rate(&self) -> Rate {
        let legal_daily = self.max_legal_monthly_rate_percent / Decimal::from(DAYS_PER_MONTH);
        Rate::from_percent(self.daily_rate_percent.min(legal_daily))
    }

    /// effective rate for the configured mode
    pub fn effective_rate(&self) -> Rate {
        match self.calculation_mode {
            CalculationMode::Daily => self.effective_daily_rate(),
            CalculationMode::Monthly => self.effective_monthly_rate(),
        }
    }

    /// parse and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RateConfiguration =
            serde_json::from_str(json).map_err(|e| MoraError::InvalidConfiguration {
                field: "json".to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// source of the current mora settings
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn get_mora_configuration(&self) -> Result<RateConfiguration>;
}

/// in-memory store; `replace` takes effect on the next load
#[derive(Debug, Default)]
pub struct StaticConfigurationStore {
    config: RwLock<RateConfiguration>,
}

impl StaticConfigurationStore {
    pub fn new(config: RateConfiguration) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn replace(&self, config: RateConfiguration) {
        *self.config.write() = config;
    }

    pub fn current(&self) -> RateConfiguration {
        self.config.read().clone()
    }
}

#[async_trait]
impl ConfigurationStore for StaticConfigurationStore {
    async fn get_mora_configuration(&self) -> Result<RateConfiguration> {
        Ok(self.current())
    }
}

/// reads the settings from a json file on every load
#[derive(Debug, Clone)]
pub struct JsonFileConfigurationStore {
    path: PathBuf,
}

impl JsonFileConfigurationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigurationStore for JsonFileConfigurationStore {
    async fn get_mora_configuration(&self) -> Result<RateConfiguration> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| MoraError::ConfigurationUnavailable {
                message: format!("{}: {}", self.path.display(), e),
            })?;
        RateConfiguration::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreachableStore;

    #[async_trait]
    impl ConfigurationStore for UnreachableStore {
        async fn get_mora_configuration(&self) -> Result<RateConfiguration> {
            Err(MoraError::ConfigurationUnavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_legal_ceiling_caps_monthly_rate() {
        let config = RateConfiguration::monthly(dec!(5.0), dec!(3.0), 0);
        assert_eq!(config.effective_monthly_rate(), Rate::from_percent(dec!(3.0)));

        let config = RateConfiguration::monthly(dec!(1.5), dec!(3.0), 0);
        assert_eq!(config.effective_monthly_rate(), Rate::from_percent(dec!(1.5)));
    }

    #[test]
    fn test_legal_ceiling_caps_daily_rate() {
        let mut config = RateConfiguration::daily(dec!(0.5), 0);
        config.max_legal_monthly_rate_percent = dec!(3.0);
        assert_eq!(config.effective_daily_rate(), Rate::from_percent(dec!(0.1)));
        assert_eq!(config.effective_rate(), config.effective_daily_rate());
    }

    #[test]
    fn test_validation_rejects_negative_values() {
        let mut config = RateConfiguration::default();
        config.monthly_rate_percent = dec!(-1);

        match config.validate() {
            Err(MoraError::InvalidConfiguration { field, .. }) => {
                assert_eq!(field, "monthly_rate_percent");
            }
            other => panic!("expected invalid configuration, got {:?}", other),
        }

        let mut config = RateConfiguration::default();
        config.currency_minor_units = 12;
        assert!(config.validate().is_err());

        assert!(RateConfiguration::default().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_and_minor_unit_default() {
        let json = r#"{
            "enabled": true,
            "daily_rate_percent": "0.05",
            "monthly_rate_percent": "1.5",
            "grace_period_days": 3,
            "calculation_mode": "MONTHLY",
            "max_penalty_percent_of_installment": 200,
            "max_legal_monthly_rate_percent": 3
        }"#;
        let config = RateConfiguration::from_json(json).unwrap();
        assert_eq!(config.calculation_mode, CalculationMode::Monthly);
        assert_eq!(config.currency_minor_units, 2);
        assert_eq!(config.daily_rate_percent, dec!(0.05));

        let back = RateConfiguration::from_json(&config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_json_with_invalid_values_is_rejected() {
        let json = r#"{
            "enabled": true,
            "daily_rate_percent": -0.05,
            "monthly_rate_percent": 1.5,
            "grace_period_days": 3,
            "calculation_mode": "DAILY",
            "max_penalty_percent_of_installment": 200,
            "max_legal_monthly_rate_percent": 3
        }"#;
        assert!(matches!(
            RateConfiguration::from_json(json),
            Err(MoraError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_from_static_store_sees_replacement() {
        let store = StaticConfigurationStore::new(RateConfiguration::default());
        let first = RateConfiguration::load(&store).await.unwrap();
        assert!(first.enabled);

        store.replace(RateConfiguration::disabled());
        let second = RateConfiguration::load(&store).await.unwrap();
        assert!(!second.enabled);
        // the earlier snapshot is unaffected
        assert!(first.enabled);
    }

    #[tokio::test]
    async fn test_load_fails_safe() {
        let err = RateConfiguration::load(&UnreachableStore).await.unwrap_err();
        assert!(matches!(err, MoraError::ConfigurationUnavailable { .. }));

        let mut bad = RateConfiguration::default();
        bad.max_penalty_percent_of_installment = dec!(-5);
        let store = StaticConfigurationStore::new(bad);
        let err = RateConfiguration::load(&store).await.unwrap_err();
        assert!(matches!(err, MoraError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mora.json");

        let missing = JsonFileConfigurationStore::new(&path);
        assert!(matches!(
            RateConfiguration::load(&missing).await,
            Err(MoraError::ConfigurationUnavailable { .. })
        ));

        let config = RateConfiguration::monthly(dec!(2), dec!(3), 5);
        std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();
        let store = JsonFileConfigurationStore::new(&path);
        assert_eq!(RateConfiguration::load(&store).await.unwrap(), config);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RateConfiguration::load(&store).await,
            Err(MoraError::InvalidConfiguration { .. })
        ));
    }
}
