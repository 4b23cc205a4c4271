//! Pipeline driver: load a transaction CSV, segment customers, report
//! elasticities and a demand forecast, and optionally write the
//! segment-enriched table back out.

use anyhow::Result;
use clap::Parser;
use demandlens::{
    apply_segments, estimate, estimate_cross, forecast, maximize_revenue, segment, Args,
    CrossPolicy, Error, Frequency, PriceBandPolicy, TransactionTable,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    run_pipeline(&args)
}

fn run_pipeline(args: &Args) -> Result<()> {
    println!("=== Demand Analytics Pipeline ===\n");
    let start_time = Instant::now();

    // Step 1: Load the transaction table
    let load_start = Instant::now();
    let mut table = TransactionTable::from_csv(&args.input)?;
    println!("✓ Loaded {} transactions from {}", table.len(), args.input);
    if args.verbose {
        println!("  Load time: {:.2}s", load_start.elapsed().as_secs_f64());
        println!("  Categories: {}", table.categories().len());
    }
    if table.is_empty() {
        anyhow::bail!("no usable transactions in {}", args.input);
    }

    // Step 2: Customer segmentation
    println!("\n=== Customer Segmentation ===");
    match segment(&table, args.clusters, args.seed) {
        Ok(segmentation) => {
            apply_segments(&mut table, &segmentation.assignments());
            println!(
                "✓ {} customers clustered into {} segments (inertia {:.2})",
                segmentation.customer_ids.len(),
                segmentation.num_clusters,
                segmentation.inertia
            );
            for summary in segmentation.summaries() {
                println!(
                    "  [{}] {:<16} {:>6} customers | avg R {:>6.1}d F {:>5.1} M {:>10.2}",
                    summary.segment,
                    summary.name,
                    summary.customers,
                    summary.avg_recency,
                    summary.avg_frequency,
                    summary.avg_monetary
                );
            }
        }
        Err(Error::InsufficientData { needed, actual, .. }) => {
            println!("⚠ Not enough distinct customers to segment ({actual} < {needed}); continuing without segments");
        }
        Err(e) => return Err(e.into()),
    }

    // Step 3: Own-price elasticity and price recommendation
    println!("\n=== Price Elasticity ===");
    let filter = args.category_filter();
    report_elasticity(&table, filter, args.steps)?;
    if filter.is_none() && args.verbose {
        // Per-category batch: insufficient-data categories are skipped, not fatal.
        let mut skipped = 0;
        for category in table.categories() {
            match estimate(&table, Some(category.as_str()))? {
                Some(model) => {
                    println!("  {:<30} elasticity {:>6.2}", category, model.elasticity())
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            println!("  ({skipped} categories had too little data for a model)");
        }
    }

    // Step 4: Cross-price elasticity
    if let Some((demand_cat, price_cat)) = args.parse_cross_pair()? {
        println!("\n=== Cross-Price Elasticity ===");
        match estimate_cross(&table, demand_cat, price_cat)? {
            Some(score) => {
                let relation = CrossPolicy::default().classify(score);
                println!(
                    "✓ {demand_cat} demand vs {price_cat} price: {score:.2} ({relation})"
                );
            }
            None => println!(
                "⚠ No reliable cross-price score for {demand_cat} vs {price_cat} (same category or too few overlapping weeks)"
            ),
        }
    }

    // Step 5: Demand forecast
    println!("\n=== Demand Forecast ===");
    let freq: Frequency = args.freq.parse()?;
    match forecast(&table, args.horizon, freq, filter)? {
        Some((model, rows)) => {
            println!(
                "✓ Forecast over {} rows ({} future periods, residual σ {:.2})",
                rows.len(),
                args.horizon,
                model.sigma
            );
            if let Some(last) = rows.last() {
                println!(
                    "  {}: {:.2} [{:.2}, {:.2}]",
                    last.date, last.predicted, last.lower, last.upper
                );
            }
        }
        None => println!("⚠ Not enough daily history for a forecast"),
    }

    // Step 6: Persist the enriched table
    if let Some(output) = &args.output {
        table.write_csv(output)?;
        println!("\n✓ Segment-enriched table written to {output}");
    }

    println!(
        "\n=== Pipeline complete in {:.2}s ===",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn report_elasticity(table: &TransactionTable, filter: Option<&str>, steps: usize) -> Result<()> {
    let slice = filter.unwrap_or("all products");
    match estimate(table, filter)? {
        Some(model) => {
            println!("✓ {slice}: elasticity {:.2}", model.elasticity());
            match PriceBandPolicy::default().realistic_range(&table.prices(filter)) {
                Some((low, high)) => match maximize_revenue(&model, low, high, steps)? {
                    Some(best) => println!(
                        "  Revenue-maximizing price in [{low:.2}, {high:.2}]: {:.2} (projected revenue {:.2})",
                        best.price, best.revenue
                    ),
                    None => println!("  ⚠ Model unstable across [{low:.2}, {high:.2}], no recommendation"),
                },
                None => println!("  ⚠ No realistic price range available for {slice}"),
            }
        }
        None => println!("⚠ {slice}: not enough unique price points for an elasticity model"),
    }
    Ok(())
}
