//! # Seed Data Generator
//!
//! Populates a development database with one demo venue.
//!
//! ## Usage
//! ```bash
//! # Seed 40 bookings (default)
//! DATABASE_URL=postgres://localhost/bookon_dev cargo run -p bookon-db --bin seed
//!
//! # Seed a custom amount
//! cargo run -p bookon-db --bin seed -- --count 200 --db postgres://localhost/bookon_dev
//! ```
//!
//! ## Generated Data
//! - A fee config (10% franchise fee, VAT inclusive, 50p admin fee)
//! - Bookings across every payment method: card (paid or pending), TFC
//!   (pending, part paid, paid), credit and free
//! - A £50 admin credit per parent so credit checkouts succeed

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use std::env;
use tracing::{info, warn};

use bookon_core::booking::NewBooking;
use bookon_core::fees::{FeeConfig, FranchiseFee};
use bookon_core::tfc::TfcAction;
use bookon_core::{Money, PaymentMethod, Rate, VatMode};
use bookon_db::{Database, DbConfig};

/// Demo venue.
const BUSINESS_ID: &str = "00000000-0000-4000-8000-000000000001";

/// Seed actor written to the audit log.
const ACTOR: &str = "seed";

/// Activities: (id, price in pence).
const ACTIVITIES: &[(&str, i64)] = &[
    ("00000000-0000-4000-8000-0000000000a1", 2_500), // Holiday club, full day
    ("00000000-0000-4000-8000-0000000000a2", 1_200), // After-school club
    ("00000000-0000-4000-8000-0000000000a3", 850),   // Breakfast club
    ("00000000-0000-4000-8000-0000000000a4", 0),     // Open day
];

const PARENTS: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bookon_db=debug".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/bookon_dev".to_string());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    database_url = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("BookOn Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of bookings to generate (default: 40)");
                println!("  -d, --db <URL>     PostgreSQL URL (default: $DATABASE_URL)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&database_url))
        .await
        .context("connecting to database")?;
    info!(count, "Connected, migrations applied");

    if db.fee_configs().current(BUSINESS_ID).await?.is_some() {
        warn!("Demo venue already seeded, skipping");
        return Ok(());
    }

    let config = FeeConfig::new(
        BUSINESS_ID,
        FranchiseFee::Percent(Rate::from_bps(1_000)),
        VatMode::Inclusive,
        Money::from_pence(50),
    )
    .effective_from(Utc::now() - Duration::days(30));
    db.fee_configs().insert(&config, ACTOR).await?;

    let parents: Vec<String> = (0..PARENTS)
        .map(|n| format!("00000000-0000-4000-8000-0000000001{:02x}", n))
        .collect();
    for parent in &parents {
        db.credits()
            .grant(parent, Money::from_pence(5_000), None, ACTOR)
            .await?;
    }

    let start = std::time::Instant::now();
    let first_day = Utc::now().date_naive() + Duration::days(7);
    let mut generated = 0;

    for n in 0..count {
        let (activity_id, price) = ACTIVITIES[n % ACTIVITIES.len()];
        let method = if price == 0 {
            PaymentMethod::Free
        } else {
            [PaymentMethod::Card, PaymentMethod::Tfc, PaymentMethod::Credit][n % 3]
        };

        let input = NewBooking {
            business_account_id: BUSINESS_ID.to_string(),
            activity_id: activity_id.to_string(),
            child_id: format!("00000000-0000-4000-8000-{:012x}", 0x1000 + n),
            parent_id: parents[n % PARENTS].clone(),
            date: session_date(first_day, n),
            amount: Money::from_pence(price),
            payment_method: method,
        };

        let checkout = match db.bookings().create(input, ACTOR).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(n, error = %e, "Skipping booking");
                continue;
            }
        };
        generated += 1;

        match (method, n % 4) {
            (PaymentMethod::Card, 0 | 1) => {
                db.bookings().confirm_paid(&checkout.booking.id, ACTOR).await?;
            }
            (PaymentMethod::Tfc, 1) => {
                if let Some(tfc) = &checkout.tfc {
                    db.tfc()
                        .apply(&tfc.id, &TfcAction::MarkPaid, ACTOR, None)
                        .await?;
                }
            }
            (PaymentMethod::Tfc, 2) => {
                if let Some(tfc) = &checkout.tfc {
                    let action = TfcAction::MarkPartPaid { amount: price / 2 };
                    db.tfc().apply(&tfc.id, &action, ACTOR, None).await?;
                }
            }
            _ => {}
        }
    }

    info!(
        generated,
        elapsed = ?start.elapsed(),
        "Seed complete"
    );
    Ok(())
}

/// Spreads sessions over the next four weeks, weekdays only.
fn session_date(first_day: NaiveDate, n: usize) -> NaiveDate {
    use chrono::Datelike;
    let mut date = first_day + Duration::days((n % 28) as i64);
    while date.weekday().number_from_monday() > 5 {
        date += Duration::days(1);
    }
    date
}
