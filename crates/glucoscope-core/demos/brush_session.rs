//! Example: A Brushing Session
//!
//! This example loads a meal table (or builds a small one in memory), then
//! replays a few dashboard gestures and prints the chart data after each.
//!
//! Run with: `cargo run --example brush_session -- [CONFIG.toml]`
//!
//! Set `RUST_LOG=glucoscope_core=debug` to see each filter change logged.

use std::env;

use anyhow::Context;
use glucoscope_core::{MealDashboard, Measure};
use glucoscope_store::Dataset;
use glucoscope_types::MealRecord;
use tracing_subscriber::EnvFilter;

fn sample_dataset() -> Dataset {
    let meal = |person: &str, minute: f64, carb: f64, protein: f64, fat: f64, delta: f64| {
        MealRecord {
            minute_in_day: minute,
            total_carb: carb,
            protein,
            total_fat: fat,
            calorie: 4.0 * (carb + protein) + 9.0 * fat,
            delta_glucose: delta,
            ..MealRecord::new(person)
        }
    };
    Dataset::from_parts(
        vec![
            meal("A", 465.0, 42.0, 12.0, 8.0, 35.0),
            meal("A", 750.0, 18.0, 20.0, 9.0, -4.0),
            meal("A", 1140.0, 75.0, 30.0, 22.0, 61.0),
            meal("B", 480.0, 12.0, 5.0, 3.0, 40.0),
            meal("B", 780.0, 22.0, 8.0, 6.0, 55.0),
            meal("C", 1170.0, 5.0, 2.0, 1.0, 10.0),
        ],
        Vec::new(),
    )
}

fn print_state(title: &str, dashboard: &MealDashboard) -> anyhow::Result<()> {
    println!("{}", title);
    println!("  Selected meals: {}", dashboard.selected_count()?);

    print!("  Carbohydrate bins:");
    for (bin, count) in dashboard.histogram(Measure::Carbohydrate)?.populated_buckets() {
        print!(" {}g:{}", bin, count);
    }
    println!();

    for (measure, share) in dashboard.macro_shares()? {
        println!("  {:<13} {:>5.1}%", measure.to_string(), share * 100.0);
    }

    let stats = &dashboard.glucose()?.stats;
    println!(
        "  ΔGlucose:     mean {:.1} ± {:.1} mg/dL over {} meals",
        stats.mean, stats.std_dev, stats.count
    );
    println!();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut dashboard = match env::args().nth(1) {
        Some(path) => MealDashboard::open_config(&path)
            .with_context(|| format!("Failed to open dashboard from {}", path))?,
        None => MealDashboard::with_defaults(sample_dataset())?,
    };

    dashboard.subscribe(|event, cube| {
        println!(
            "[event] {} -> {} of {} meals selected",
            serde_json::to_string(event).unwrap_or_default(),
            cube.selected_count(),
            cube.len()
        );
    });

    print_state("All meals", &dashboard)?;

    let persons = dashboard.persons();
    if let Some(first) = persons.first() {
        dashboard.select_person(Some(first.as_str()))?;
        print_state(&format!("Person {}", first), &dashboard)?;
    }

    dashboard.brush(Measure::Carbohydrate, 10.0, 50.0)?;
    print_state("Carbohydrate 10-50g", &dashboard)?;

    dashboard.brush_scatter(0.0, 100.0, 30.0, 100.0)?;
    print_state("Glucose rise over 30 mg/dL", &dashboard)?;

    dashboard.reset();
    print_state("Reset", &dashboard)?;

    Ok(())
}
