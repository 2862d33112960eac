use std::process::ExitCode;

use eigenray_sim::config::{presets, ScenarioConfig};
use eigenray_sim::io::{write_eigenrays_file, write_proploss_file};
use eigenray_sim::sim::RayCensus;
use eigenray_sim::{Proploss, Result, Scenario};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: eigenray-sim [PRESET | SCENARIO.json] [--json OUT.json] [--csv OUT.csv]\n\
                     presets: eigenray_basic (default), eigenray_concave";

struct Args {
    scenario: String,
    json: Option<String>,
    csv: Option<String>,
}

fn parse_args() -> std::result::Result<Args, String> {
    let mut args = Args { scenario: "eigenray_basic".into(), json: None, csv: None };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--json" => args.json = Some(it.next().ok_or("--json needs a path")?),
            "--csv" => args.csv = Some(it.next().ok_or("--csv needs a path")?),
            "-h" | "--help" => return Err(USAGE.into()),
            _ if arg.starts_with('-') => return Err(format!("unknown option {arg}\n{USAGE}")),
            _ => args.scenario = arg,
        }
    }
    Ok(args)
}

fn load(name: &str) -> Result<ScenarioConfig> {
    if let Some(cfg) = presets::by_name(name) {
        return Ok(cfg);
    }
    let text = std::fs::read_to_string(name)
        .map_err(|e| eigenray_sim::PropagationError::Scenario(format!("{name}: {e}")))?;
    ScenarioConfig::from_json(&text)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let scenario = match load(&args.scenario).and_then(|cfg| cfg.build()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "cannot set up scenario");
            return ExitCode::FAILURE;
        }
    };

    let mut census = RayCensus::new();
    let proploss = match scenario.run_with(&mut census) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "propagation failed");
            return ExitCode::FAILURE;
        }
    };

    print_report(&scenario, &proploss, &census);

    if let Some(path) = &args.json {
        if let Err(e) = write_proploss_file(path, &scenario.name, &proploss) {
            tracing::error!(error = %e, path = %path, "cannot write report");
            return ExitCode::FAILURE;
        }
    }
    if let Some(path) = &args.csv {
        let rays: Vec<_> = proploss.targets().iter().flat_map(|(r, c, _)| proploss.eigenrays(r, c).unwrap_or_default().to_vec()).collect();
        if let Err(e) = write_eigenrays_file(path, &rays, 0) {
            tracing::error!(error = %e, path = %path, "cannot write eigenray table");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn print_report(scenario: &Scenario, proploss: &Proploss, census: &RayCensus) {
    let (n_de, n_az) = scenario.fan.shape();

    println!();
    println!("====================================================================");
    println!("  EIGENRAY PROPAGATION: {}", scenario.name);
    println!("====================================================================");
    println!();
    println!("  Source        {}", scenario.source);
    println!("  Fan           {} DE x {} AZ rays", n_de, n_az);
    println!("  Frequencies   {:?} Hz", scenario.fan.frequencies());
    println!(
        "  Time step     {} s, {} steps to {} s",
        scenario.config.time_step,
        scenario.config.step_count(),
        scenario.config.max_time
    );
    if let Some(c) = census.last() {
        println!(
            "  Final layer   {} alive, {} diverged, {} past a caustic",
            c.alive, c.diverged, c.caustic
        );
    }
    println!();

    for (row, col, pos) in proploss.targets().iter() {
        println!("  Target ({row}, {col})  {pos}");
        println!("  ──────────────────────────────────────────────────────────────────");
        println!(
            "  {:>10}  {:>8}  {:>8}  {:>9}  {:>7}  {:>9}  {:>7}  {:>3} {:>3} {:>3}",
            "time (s)", "TL (dB)", "phase", "s_de", "s_az", "t_de", "t_az", "srf", "btm", "cst"
        );
        for r in proploss.eigenrays(row, col).unwrap_or_default() {
            println!(
                "  {:>10.6}  {:>8.2}  {:>8.4}  {:>9.4}  {:>7.2}  {:>9.4}  {:>7.2}  {:>3} {:>3} {:>3}",
                r.time,
                r.intensity[0],
                r.phase[0],
                r.source_de,
                r.source_az,
                r.target_de,
                r.target_az,
                r.surface,
                r.bottom,
                r.caustic
            );
        }
        if let Some(total) = proploss.total(row, col) {
            for (f, tl) in scenario.fan.frequencies().iter().zip(&total.intensity) {
                println!("  Total loss at {:>8.1} Hz: {:>7.2} dB ({} arrivals)", f, tl, total.arrivals);
            }
        }
        println!();
    }
    println!("====================================================================");
    println!();
}
