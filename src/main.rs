//! Home energy simulator entry point: CLI wiring, status and 24-hour simulation.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use synapse_home::config::Settings;
use synapse_home::io::export::export_csv;
use synapse_home::predictor::{
    DaylightMasked, HouseholdModel, ProfilePredictor, SyntheticPredictor,
};
use synapse_home::pricing::PriceTable;
use synapse_home::sim::engine::{current_hour, parse_timestamp, simulate};
use synapse_home::sim::kpi::KpiReport;
use synapse_home::sim::types::OperatingMode;
use synapse_home::status::status_at;

/// Price schedule used when `--prices` is not given.
const DEFAULT_PRICES_PATH: &str = "data/tou_pricing.json";
/// Seed for the synthetic predictor when `--seed` is not given.
const DEFAULT_SEED: u64 = 42;

/// Parsed CLI arguments.
struct CliArgs {
    settings_path: Option<PathBuf>,
    prices_path: PathBuf,
    profile_path: Option<PathBuf>,
    seed: u64,
    mode: Option<OperatingMode>,
    start: Option<NaiveDateTime>,
    status: bool,
    telemetry_out: Option<PathBuf>,
    json: bool,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("synapse-home - home energy management simulator");
    eprintln!();
    eprintln!("Usage: synapse-home [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --settings <path>        Load settings from a TOML file");
    eprintln!("  --prices <path>          TOU price schedule JSON (default: {DEFAULT_PRICES_PATH})");
    eprintln!("  --profile <path>         CSV hour-of-day profile (hour,solar_kw,wind_kw,demand_kw)");
    eprintln!("  --seed <u64>             Seed for the synthetic predictor (default: {DEFAULT_SEED})");
    eprintln!("  --mode <name>            Override the operating mode");
    eprintln!("  --start <time>           First hour, YYYY-MM-DDTHH:MM (default: current hour)");
    eprintln!("  --status                 Print a status snapshot instead of simulating");
    eprintln!("  --telemetry-out <path>   Export the hourly trace to CSV");
    eprintln!("  --json                   Print results as JSON");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start the REST API server");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Logging goes to stderr; set RUST_LOG (e.g. RUST_LOG=debug) to change verbosity.");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn value_for<'a>(args: &'a [String], i: usize, flag: &str, expected: &str) -> &'a str {
    args.get(i)
        .map(String::as_str)
        .unwrap_or_else(|| fail(format!("{flag} requires {expected}")))
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        settings_path: None,
        prices_path: PathBuf::from(DEFAULT_PRICES_PATH),
        profile_path: None,
        seed: DEFAULT_SEED,
        mode: None,
        start: None,
        status: false,
        telemetry_out: None,
        json: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--settings" => {
                i += 1;
                cli.settings_path = Some(value_for(&args, i, "--settings", "a path argument").into());
            }
            "--prices" => {
                i += 1;
                cli.prices_path = value_for(&args, i, "--prices", "a path argument").into();
            }
            "--profile" => {
                i += 1;
                cli.profile_path = Some(value_for(&args, i, "--profile", "a path argument").into());
            }
            "--seed" => {
                i += 1;
                let raw = value_for(&args, i, "--seed", "a u64 argument");
                cli.seed = raw
                    .parse()
                    .unwrap_or_else(|_| fail(format!("--seed value \"{raw}\" is not a valid u64")));
            }
            "--mode" => {
                i += 1;
                let raw = value_for(&args, i, "--mode", "a mode name");
                cli.mode = Some(
                    raw.parse()
                        .unwrap_or_else(|e: String| fail(format!("--mode {e}"))),
                );
            }
            "--start" => {
                i += 1;
                let raw = value_for(&args, i, "--start", "a YYYY-MM-DDTHH:MM argument");
                cli.start = Some(parse_timestamp(raw).unwrap_or_else(|e| {
                    fail(format!("--start value \"{raw}\" is not YYYY-MM-DDTHH:MM: {e}"))
                }));
            }
            "--status" => cli.status = true,
            "--telemetry-out" => {
                i += 1;
                cli.telemetry_out =
                    Some(value_for(&args, i, "--telemetry-out", "a path argument").into());
            }
            "--json" => cli.json = true,
            #[cfg(feature = "api")]
            "--serve" => cli.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let raw = value_for(&args, i, "--port", "a u16 argument");
                cli.port = raw
                    .parse()
                    .unwrap_or_else(|_| fail(format!("--port value \"{raw}\" is not a valid u16")));
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
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &CliArgs) -> Settings {
    let mut settings = match &cli.settings_path {
        Some(path) => Settings::from_toml_file(path).unwrap_or_else(|errors| {
            for e in &errors {
                eprintln!("{e}");
            }
            process::exit(1);
        }),
        None => Settings::default(),
    };

    if let Some(mode) = cli.mode {
        settings.operating_mode = mode;
    }

    let errors = settings.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    settings
}

fn load_predictor(cli: &CliArgs) -> HouseholdModel {
    match &cli.profile_path {
        Some(path) => HouseholdModel::Profile(
            ProfilePredictor::from_csv_path(path).unwrap_or_else(|e| fail(e)),
        ),
        None => HouseholdModel::Synthetic(SyntheticPredictor::new(cli.seed)),
    }
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(format!("failed to encode JSON: {e}")),
    }
}

fn main() {
    init_tracing();
    let cli = parse_args();

    let settings = load_settings(&cli);
    let prices = PriceTable::from_path(&cli.prices_path);
    let predictor = load_predictor(&cli);
    let start = cli.start.unwrap_or_else(current_hour);

    if cli.status {
        print_json(&status_at(start, &predictor, &prices, &settings));
    } else {
        let trace = simulate(
            start,
            DaylightMasked::new(&predictor, settings.daylight()),
            &prices,
            settings.battery_state(),
            &settings,
        );

        if cli.json {
            print_json(&trace);
        } else {
            for r in &trace.hourly_results {
                println!("{r}");
            }
            println!("\n{}", trace.summary);
            let kpi = KpiReport::from_trace(&trace, settings.battery_capacity_kwh);
            println!("\n{kpi}");
        }

        if let Some(path) = &cli.telemetry_out {
            if let Err(e) = export_csv(&trace, path) {
                fail(format!("failed to write CSV: {e}"));
            }
            tracing::info!(path = %path.display(), "trace written");
        }
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let mut state = synapse_home::api::AppState::new(settings, prices, predictor);
        if let Some(path) = &cli.settings_path {
            state = state.with_settings_path(path);
        }
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new()
            .unwrap_or_else(|e| fail(format!("failed to create tokio runtime: {e}")));
        if let Err(e) = rt.block_on(synapse_home::api::serve(Arc::new(state), addr)) {
            fail(format!("server error: {e}"));
        }
    }
}
