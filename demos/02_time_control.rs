/// time control - watch a penalty grow day by day, then freeze at the cap
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use mora_engine::{
    Decimal, Installment, InMemoryInstallmentRepository, Money, MoraService, RateConfiguration,
    SafeTimeProvider, StaticConfigurationStore, TimeSource, Uuid,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== time control example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let cuota = Installment::new(Uuid::new_v4(), Money::from_major(100_000), time.now().date_naive());
    let id = cuota.id;

    // 1.5% per started month, legal ceiling 3%, capped at 10% of face value
    let mut config = RateConfiguration::monthly(Decimal::new(15, 1), Decimal::new(3, 0), 5);
    config.max_penalty_percent_of_installment = Decimal::new(10, 0);

    let repo = Arc::new(InMemoryInstallmentRepository::with_installments(vec![cuota]));
    let store = Arc::new(StaticConfigurationStore::new(config));
    let service = MoraService::new(store, repo, time.clone());

    println!("due date: {}", time.now().format("%Y-%m-%d"));

    for _ in 0..10 {
        controller.advance(Duration::days(30));
        let result = service.apply_single(id).await?;
        println!(
            "{}: {} days late, {:?} months, penalty {}{}",
            time.now().format("%Y-%m-%d"),
            result.days_late,
            result.months_charged,
            result.penalty_amount,
            if result.was_capped { " (capped)" } else { "" }
        );
    }

    Ok(())
}
