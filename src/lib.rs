pub mod accrual;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod installment;
pub mod repository;
pub mod runner;
pub mod service;
pub mod statistics;
pub mod types;

// re-export key types
pub use accrual::{AccrualCalculator, PenaltyResult};
pub use config::{
    ConfigurationStore, JsonFileConfigurationStore, RateConfiguration, StaticConfigurationStore,
};
pub use decimal::{Money, Rate};
pub use errors::{MoraError, Result};
pub use events::{EventStore, MoraEvent};
pub use installment::Installment;
pub use repository::{InMemoryInstallmentRepository, InstallmentRepository};
pub use runner::{AccrualRunReport, CancellationFlag, InstallmentFailure, MassAccrualRunner};
pub use service::MoraService;
pub use statistics::{MoraStatistics, MoraStatisticsAggregator};
pub use types::{CalculationMode, InstallmentId, InstallmentStatus, PenaltyReason};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
