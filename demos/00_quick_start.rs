/// quick start - preview the mora on one overdue installment
use chrono::NaiveDate;
use mora_engine::{AccrualCalculator, Decimal, Installment, Money, RateConfiguration, Uuid};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 0.05% per day after 3 days of grace
    let config = RateConfiguration::daily(Decimal::new(5, 2), 3);

    let due = NaiveDate::from_ymd_opt(2024, 1, 10).ok_or("bad date")?;
    let cuota = Installment::new(Uuid::new_v4(), Money::from_major(750_000), due);

    let as_of = NaiveDate::from_ymd_opt(2024, 2, 12).ok_or("bad date")?;
    let result = AccrualCalculator::new(config).calculate(&cuota, as_of);

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
