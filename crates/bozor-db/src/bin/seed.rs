//! # Seed Data Generator
//!
//! Fills a development database with stock items, debtors and markets.
//!
//! ## Usage
//! ```bash
//! cargo run -p bozor-db --bin seed
//! cargo run -p bozor-db --bin seed -- --db ./data/bozor.db
//! ```

use std::env;

use anyhow::Context;
use bozor_core::validation::{validate_name, validate_non_negative_amount, validate_quantity};
use bozor_core::{Debtor, Market, Money, StockItem};
use bozor_db::{Database, DbConfig};
use chrono::Utc;
use uuid::Uuid;

/// (name, unit, price in minor units, quantity)
const STOCK: &[(&str, &str, i64, i64)] = &[
    ("Olma", "kg", 12_000, 250),
    ("Nok", "kg", 18_000, 120),
    ("Uzum", "kg", 22_000, 90),
    ("Kartoshka", "kg", 6_000, 800),
    ("Piyoz", "kg", 4_500, 600),
    ("Sabzi", "kg", 5_000, 700),
    ("Pomidor", "kg", 14_000, 200),
    ("Bodring", "kg", 9_000, 180),
    ("Guruch", "kg", 16_000, 400),
    ("Non", "dona", 4_000, 150),
    ("Sut", "litr", 11_000, 60),
    ("Tuxum", "dona", 1_500, 900),
];

const DEBTORS: &[(&str, &str)] = &[
    ("Akmal aka", "+998 90 123 45 67"),
    ("Dilnoza opa", "+998 91 234 56 78"),
    ("Sardor", "+998 93 345 67 89"),
];

const MARKETS: &[&str] = &["Chorsu", "Oloy", "Yunusobod"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./bozor_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bozor Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bozor_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Bozor Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {}", db_path))?;
    println!("✓ Connected, migrations applied");

    let mut conn = db.pool().acquire().await.context("acquiring connection")?;

    let existing = db.stock().list(&mut conn).await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} stock items", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }
    drop(conn);

    check_seed_data()?;

    let now = Utc::now();
    let mut tx = db.begin().await?;

    for (name, unit, price, quantity) in STOCK {
        let item = StockItem {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            unit_price: Money::from_minor(*price),
            unit: unit.to_string(),
            quantity: *quantity,
            description: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        db.stock()
            .insert(&mut tx, &item)
            .await
            .with_context(|| format!("inserting stock item {}", name))?;
    }
    println!("✓ {} stock items", STOCK.len());

    for (name, contact) in DEBTORS {
        let debtor = Debtor {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            contact_info: Some(contact.to_string()),
            current_debt: Money::zero(),
            debt_items: Vec::new(),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        db.debtors()
            .insert(&mut tx, &debtor)
            .await
            .with_context(|| format!("inserting debtor {}", name))?;
    }
    println!("✓ {} debtors", DEBTORS.len());

    for name in MARKETS {
        let market = Market {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        db.markets()
            .insert(&mut tx, &market)
            .await
            .with_context(|| format!("inserting market {}", name))?;
    }
    println!("✓ {} markets", MARKETS.len());

    tx.commit().await.context("committing seed data")?;

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

/// Runs the seed rows through the same checks requests get.
fn check_seed_data() -> anyhow::Result<()> {
    for (name, unit, price, quantity) in STOCK {
        validate_name("name", name).with_context(|| format!("stock item {:?}", name))?;
        validate_name("unit", unit).with_context(|| format!("unit of {}", name))?;
        validate_non_negative_amount("unitPrice", Money::from_minor(*price))
            .with_context(|| format!("price of {}", name))?;
        validate_quantity(*quantity).with_context(|| format!("quantity of {}", name))?;
    }
    for (name, _) in DEBTORS {
        validate_name("name", name).with_context(|| format!("debtor {:?}", name))?;
    }
    for name in MARKETS {
        validate_name("name", name).with_context(|| format!("market {:?}", name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_data_passes_validation() {
        check_seed_data().unwrap();
    }
}
