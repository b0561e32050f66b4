use catalog_stress::{
    Config, OperationGenerator, RunOutcome, RunPolicy, TrinoProvider, run_with_probe,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Every catalog answered and stayed reachable
const EXIT_SUCCESS: i32 = 0;
/// Some catalog was unreachable, or nothing ran
const EXIT_FAILURE: i32 = 1;
/// Malformed configuration or a harness contract violation
const EXIT_CONTRACT: i32 = 2;

fn print_probe(outcome: &RunOutcome) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!(" CONNECTIVITY PROBE: {:?}", outcome.policy);
    println!("═══════════════════════════════════════════════════════════════");
    for probe in &outcome.probe.outcomes {
        match &probe.error {
            None => println!("   {:20} OK ({:.2}s)", probe.catalog, probe.duration_s),
            Some(e) => println!("   {:20} FAILED: {}", probe.catalog, e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_stress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(EXIT_CONTRACT);
        }
    };
    info!(
        "Loaded configuration: trino={}:{}, catalogs={}, tier={}, scenarios={}",
        config.trino.host,
        config.trino.port,
        config.catalogs.join(","),
        config.workload.tier.name(),
        config.workload.scenarios.len()
    );

    // Prometheus scrape listener (must be installed before any metric is recorded)
    if let Some(addr) = config.run.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let provider = Arc::new(TrinoProvider::new(config.run.connect_timeout));
    let generator = OperationGenerator::new(
        config.workload.table.clone(),
        config.run.seed,
        Utc::now().date_naive(),
    );

    let outcome = match run_with_probe(
        provider,
        config.targets(),
        generator,
        config.scheduler_options(),
        &config.plan(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) if e.is_contract_violation() => {
            error!("Run aborted: {}", e);
            process::exit(EXIT_CONTRACT);
        }
        Err(e) => return Err(e.into()),
    };

    print_probe(&outcome);
    match &outcome.run {
        Some(run) => println!("{}", run.render()),
        None if outcome.policy == RunPolicy::Abort => {
            println!();
            println!(" OVERALL: FAIL (no catalog reachable)");
            println!("═══════════════════════════════════════════════════════════════");
        }
        None => {}
    }

    if let Some(path) = &config.run.report_json {
        outcome.write_json(path)?;
        info!("JSON report written to {:?}", path);
    }

    process::exit(if outcome.success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    });
}
