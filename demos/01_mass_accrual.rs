/// mass accrual - run the engine over a small portfolio and summarize it
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use mora_engine::{
    Installment, InMemoryInstallmentRepository, InstallmentStatus, Money, MoraService,
    RateConfiguration, SafeTimeProvider, StaticConfigurationStore, TimeSource, Uuid,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== mass accrual example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    ));
    let today = time.now().date_naive();

    // a lot sold in installments, some of them late
    let mut installments = Vec::new();
    for (months_ago, face) in [(3, 450_000), (2, 450_000), (1, 450_000), (0, 450_000)] {
        let due = today - Duration::days(30 * months_ago);
        installments.push(Installment::new(Uuid::new_v4(), Money::from_major(face), due));
    }
    let mut settled = Installment::new(Uuid::new_v4(), Money::from_major(450_000), today - Duration::days(120));
    settled.status = InstallmentStatus::Paid;
    installments.push(settled);

    let repo = Arc::new(InMemoryInstallmentRepository::with_installments(installments));
    let store = Arc::new(StaticConfigurationStore::new(RateConfiguration::default()));
    let service = MoraService::new(store, repo, time);

    let report = service.run_mass_accrual().await?;
    println!("run report:\n{}\n", report.to_json_pretty()?);

    // running again on the same day writes nothing
    let rerun = service.run_mass_accrual().await?;
    println!("second run updated {} installments\n", rerun.installments_updated);

    let stats = service.get_statistics().await?;
    println!("statistics:\n{}", stats.to_json_pretty()?);

    println!("\nevents recorded: {}", service.events().len());

    Ok(())
}
