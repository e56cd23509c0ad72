use std::env;
use std::path::PathBuf;

use crate::config::DirectionKind;

pub struct CliOptions {
    pub scheme: Option<PathBuf>,
    pub preset: Option<String>,
    pub direction: Option<DirectionKind>,
    pub trace_out: Option<PathBuf>,
    pub json: bool,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut scheme = None;
    let mut preset = None;
    let mut direction = None;
    let mut trace_out = None;
    let mut json = false;

    while i < args.len() {
        match args[i].as_str() {
            "--scheme" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --scheme (expected a TOML file path)",
                )?;
                if scheme.replace(PathBuf::from(path)).is_some() {
                    return Err("--scheme provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(
                    i,
                    "missing value for --preset (expected a preset name)",
                )?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--direction" => {
                i += 1;
                let value = args.next_or_err(
                    i,
                    "missing value for --direction (expected forward or backward)",
                )?;
                let kind = DirectionKind::parse(value).ok_or_else(|| {
                    format!("invalid --direction \"{value}\" (expected forward or backward)")
                })?;
                if direction.replace(kind).is_some() {
                    return Err("--direction provided more than once".to_string());
                }
            }
            "--trace-out" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --trace-out (expected a file path)")?;
                if trace_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--trace-out provided more than once".to_string());
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if scheme.is_some() && preset.is_some() {
        return Err(
            "arguments `--scheme` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(CliOptions {
        scheme,
        preset,
        direction,
        trace_out,
        json,
    })
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("feeder-sag: voltage sag and loss along a radial street-lighting feeder");
    eprintln!();
    eprintln!("Usage:");
    eprintln!(
        "  feeder-sag [--scheme <path> | --preset <name>] [--direction forward|backward] \
         [--trace-out <path>] [--json]"
    );
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scheme <path>          Load the feeder from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (highway_1a, urban_2, urban_3, highway_1a_mv)");
    eprintln!("  --direction <dir>        Override simulation.direction");
    eprintln!("  --trace-out <path>       Export the per-pole trace to CSV");
    eprintln!("  --json                   Print the run report as JSON instead of text");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scheme or --preset is given, the highway_1a preset is used.");
}
