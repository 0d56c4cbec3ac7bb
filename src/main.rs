//! Prosumer simulator entry point: CLI wiring, config loading and reporting.

use std::path::Path;
use std::process;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use prosumer_sim::config::ScenarioConfig;
use prosumer_sim::sim::{RunReport, Simulation};

/// Parsed CLI arguments.
#[derive(Default)]
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    agents_override: Option<usize>,
    steps_override: Option<usize>,
    difficulty_override: Option<usize>,
}

fn print_help() {
    eprintln!("prosumer-sim — energy community trading simulator");
    eprintln!();
    eprintln!("Usage: prosumer-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>     Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>       Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>          Override random seed");
    eprintln!("  --agents <n>          Override community size");
    eprintln!("  --steps <n>           Override number of steps");
    eprintln!("  --difficulty <n>      Override ledger proof-of-work difficulty");
    eprintln!("  --help                Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

/// Returns the value following flag `args[*i]`, advancing `i`.
fn flag_value<'a>(args: &'a [String], i: &mut usize) -> &'a str {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires an argument");
            process::exit(1);
        }
    }
}

fn parse_number<T: FromStr>(flag: &str, raw: &str) -> T {
    raw.parse().unwrap_or_else(|_| {
        eprintln!("error: {flag} value \"{raw}\" is not a valid number");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => cli.scenario_path = Some(flag_value(&args, &mut i).to_string()),
            "--preset" => cli.preset = Some(flag_value(&args, &mut i).to_string()),
            "--seed" => cli.seed_override = Some(parse_number("--seed", flag_value(&args, &mut i))),
            "--agents" => {
                cli.agents_override = Some(parse_number("--agents", flag_value(&args, &mut i)));
            }
            "--steps" => {
                cli.steps_override = Some(parse_number("--steps", flag_value(&args, &mut i)));
            }
            "--difficulty" => {
                cli.difficulty_override =
                    Some(parse_number("--difficulty", flag_value(&args, &mut i)));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = parse_args();
    init_tracing();

    // --scenario takes priority, then --preset, then baseline
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(agents) = cli.agents_override {
        scenario.simulation.agents = agents;
    }
    if let Some(steps) = cli.steps_override {
        scenario.simulation.steps = steps;
    }
    if let Some(difficulty) = cli.difficulty_override {
        scenario.ledger.difficulty = difficulty;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let output = Simulation::new(&scenario)
        .and_then(Simulation::run)
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        });

    for stats in &output.history {
        println!("{stats}");
    }

    let report = RunReport::from_history(&output.history);
    println!("\n{report}");

    println!("\n{}", output.ledger.summary());
    println!("Chain valid:       {}", output.ledger.is_valid());
}
