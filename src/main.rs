//! CohortForge: click and view event cohort analysis
//!
//! This is the main entrypoint that orchestrates table loading, feature
//! extraction, clustering, reporting and export.

use anyhow::{Context, Result};
use clap::Parser;
use cohortforge::{export_artifacts, load_table, report, run_pipeline, Args};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    setup_logging(&args.log_level);

    if args.verbose {
        println!("CohortForge - Click & View Event Cohort Analysis");
        println!("================================================\n");
    }

    run_full_pipeline(&args)
}

/// Initialise the global `tracing` subscriber; `RUST_LOG` wins over the flag.
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Run full clustering pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Cohort Clustering Pipeline ===\n");

    let start_time = Instant::now();
    let config = args.pipeline_config();

    // Step 1: Load tables
    if args.verbose {
        println!("Step 1: Loading event tables");
        println!("  Click events: {}", args.clicks.display());
        println!("  View events: {}", args.views.display());
    }

    let click_df = load_table(&args.clicks)
        .with_context(|| format!("Failed to load click events from {}", args.clicks.display()))?;
    let view_df = load_table(&args.views)
        .with_context(|| format!("Failed to load view events from {}", args.views.display()))?;

    println!(
        "✓ Tables loaded: {} click rows, {} view rows",
        click_df.height(),
        view_df.height()
    );

    // Step 2: Features and clustering
    if args.verbose {
        println!("\nStep 2: Building features and fitting K-Means");
        println!("  Number of clusters: {}", config.clustering.n_clusters);
        println!("  Random seed: {}", config.clustering.random_state);
        println!("  Initializations: {}", config.clustering.n_init);
        println!("  Max iterations: {}", config.clustering.max_iters);
        println!("  Tolerance: {}", config.clustering.tolerance);
    }

    let model_start = Instant::now();
    let result = run_pipeline(&click_df, &view_df, &config)?;
    let model_time = model_start.elapsed();

    let (rows, cols) = result.clustered.shape();
    println!("✓ Feature table shape: ({}, {})", rows, cols);
    println!("✓ Clustering complete");
    if args.verbose {
        println!("  Pipeline time: {:.2}s", model_time.as_secs_f64());
    }

    // Step 3: Report
    report::print_cluster_statistics(&result)?;

    // Step 4: Export
    let written = export_artifacts(&result, &args.output_dir, &config.id_column)
        .with_context(|| format!("Failed to write results to {}", args.output_dir.display()))?;

    println!("\n✓ Results exported");
    for path in &written {
        println!("  {}", path.display());
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}
