//! Feeder sag entry point: CLI wiring and config-driven engine construction.

use std::io;
use std::process;

use tracing::{error, info, warn};

use feeder_sag::cli::{self, CliOptions};
use feeder_sag::config::FeederConfig;
use feeder_sag::io::export::export_csv;

fn load_config(cli: &CliOptions) -> Result<FeederConfig, String> {
    // --scheme takes priority, then --preset, then the highway_1a default
    let loaded = if let Some(path) = &cli.scheme {
        FeederConfig::from_toml_file(path)
    } else if let Some(name) = &cli.preset {
        FeederConfig::from_preset(name)
    } else {
        Ok(FeederConfig::baseline())
    };
    loaded.map_err(|e| e.to_string())
}

fn run(cli: &CliOptions) -> Result<(), String> {
    let mut config = load_config(cli)?;
    if let Some(direction) = cli.direction {
        config.simulation.direction = direction;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        return Err(format!("{} configuration error(s)", errors.len()));
    }
    for w in config.warnings() {
        warn!("{w}");
    }

    let engine = config.build_engine().map_err(|e| e.to_string())?;
    let direction = config.direction(config.simulation.direction);
    info!(
        scheme = %config.scheme.name,
        direction = direction.label(),
        "starting march"
    );
    let outcome = engine.run(direction).map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome.report)
            .map_err(|e| format!("failed to serialize report: {e}"))?;
        println!("{json}");
    } else {
        for r in &outcome.records {
            println!("{r}");
        }
        println!("\n{}", outcome.report);
    }

    if let Some(path) = &cli.trace_out {
        export_csv(&outcome.records, path)
            .map_err(|e| format!("failed to write CSV: {e}"))?;
        info!("trace written to {}", path.display());
    }
    Ok(())
}

fn main() {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = match cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
