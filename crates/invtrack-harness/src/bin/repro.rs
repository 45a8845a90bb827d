//! invtrack-repro — run the registry-churn stress workload and print a
//! JSON report.
//!
//! Exits non-zero if any iteration deviated from the expected two
//! notifications per insert+delete pair.

use std::env;
use std::process::ExitCode;

use invtrack_harness::{StressConfig, run_stress};

fn print_help() {
    let help = "\
invtrack-repro — invalidation-tracker concurrency stress runner

USAGE:
    cargo run -p invtrack-harness --bin invtrack-repro -- [OPTIONS]

OPTIONS:
    --concurrency <N>     Registry-churn threads (default: 4; 0 removes the race)
    --iterations <N>      Checked insert+delete iterations (default: 500)
    -h, --help            Show this help
";
    println!("{help}");
}

fn parse_args(args: &[String]) -> Result<StressConfig, String> {
    let mut config = StressConfig::default();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--concurrency" => {
                index += 1;
                if index >= args.len() {
                    return Err("--concurrency requires a value".to_owned());
                }
                config.concurrency = args[index]
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --concurrency value: {}", args[index]))?;
            }
            "--iterations" => {
                index += 1;
                if index >= args.len() {
                    return Err("--iterations requires a value".to_owned());
                }
                config.check_iterations = args[index]
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --iterations value: {}", args[index]))?;
            }
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            unknown => return Err(format!("unknown option: {unknown}")),
        }
        index += 1;
    }

    Ok(config)
}

fn run(args: &[String]) -> Result<bool, String> {
    let config = parse_args(args)?;
    let report = run_stress(config).map_err(|err| format!("stress run failed: {err}"))?;

    let json = serde_json::to_string_pretty(&report)
        .map_err(|err| format!("report serialization failed: {err}"))?;
    println!("{json}");
    eprintln!("{}", report.triage_line());
    Ok(report.passed())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(message) => {
            if message.is_empty() {
                // --help already printed.
                return ExitCode::SUCCESS;
            }
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
