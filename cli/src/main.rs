mod demo;

use std::env;

use anyhow::{Context, Result, bail};
use paycloak_benchmark::{BenchmarkResult, compute_benchmark};
use paycloak_config::PaycloakConfig;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "benchmark" => {
            if let Err(e) = benchmark(&args[2..]) {
                eprintln!("❌ Error computing benchmark: {:#}", e);
                std::process::exit(1);
            }
        }
        "demo" => {
            let config = parse_demo_args(&args[2..]);
            if let Err(e) = demo::run_demo(config, PaycloakConfig::global()).await {
                eprintln!("❌ Error running demo: {:#}", e);
                std::process::exit(1);
            }
        }
        "config" => {
            let action = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            if let Err(e) = config(action) {
                eprintln!("❌ Error: {:#}", e);
                std::process::exit(1);
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Paycloak CLI - Confidential Salary Records");
    println!();
    println!("USAGE:");
    println!("  paycloak <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("  benchmark <salary> <years> [--json]   Market benchmark for a disclosed salary");
    println!("  demo [options]                        Submit, verify and benchmark one record in memory");
    println!("  config [show|sample]                  Print the effective or a sample config");
    println!("  help                                  Show this help message");
    println!();
    println!("DEMO OPTIONS:");
    println!("  --label <title>            Position title (default: Senior Engineer)");
    println!("  --salary <amount>          Salary to encrypt (default: 120000)");
    println!("  --industry <name>          Industry (default: Technology)");
    println!("  --experience <years>       Years of experience (default: 10)");
    println!("  --json                     Print a JSON report");
    println!();
    println!("EXAMPLES:");
    println!("  paycloak benchmark 120000 10");
    println!("  paycloak demo --salary 50000 --experience 10");
    println!("  paycloak config sample > paycloak.toml");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  PAYCLOAK_CONFIG              Config file path");
    println!("  PAYCLOAK_CONTRACT_ADDRESS    Record contract address");
    println!("  PAYCLOAK_ADDRESS             Caller address for the demo");
    println!("  RUST_LOG                     Log level (debug/info/warn/error)");
}

fn parse_demo_args(args: &[String]) -> demo::DemoConfig {
    let mut config = demo::DemoConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--label" => {
                if let Some(v) = args.get(i + 1) {
                    config.label = v.clone();
                    i += 1;
                }
            }
            "--salary" => {
                if let Some(v) = args.get(i + 1) {
                    config.salary = v.clone();
                    i += 1;
                }
            }
            "--industry" => {
                if let Some(v) = args.get(i + 1) {
                    config.industry = v.clone();
                    i += 1;
                }
            }
            "--experience" => {
                if let Some(v) = args.get(i + 1) {
                    config.experience = v.clone();
                    i += 1;
                }
            }
            "--json" => {
                config.json = true;
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn benchmark(args: &[String]) -> Result<()> {
    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let [salary, experience] = positional.as_slice() else {
        bail!("Usage: benchmark <salary> <experience-years> [--json]");
    };

    let salary: u64 = salary
        .parse()
        .with_context(|| format!("Salary must be a non-negative integer, got {salary:?}"))?;
    let experience: u32 = experience
        .parse()
        .with_context(|| format!("Experience must be a non-negative integer, got {experience:?}"))?;

    let result = compute_benchmark(salary, experience);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_benchmark(&result);
    }
    Ok(())
}

fn print_benchmark(result: &BenchmarkResult) {
    println!(" Market benchmark");
    println!("   percentile:       {}", result.percentile);
    println!("   industry average: {}", result.industry_average);
    println!("   position:         {}", result.market_position);
    println!("   recommendation:   {}", result.recommendation);
}

fn config(action: &str) -> Result<()> {
    match action {
        "sample" => {
            print!("{}", PaycloakConfig::generate_sample());
        }
        "show" => {
            let config = PaycloakConfig::load()?;
            print!("{}", config.to_toml()?);
        }
        other => bail!("Unknown config action: {other} (expected show or sample)"),
    }
    Ok(())
}
