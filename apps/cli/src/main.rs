#![deny(warnings)]

//! Headless CLI: run a herd projection and print a summary or JSON.

use anyhow::{anyhow, bail, Context, Result};
use herd_core::SimParams;
use herd_econ::ViewConfig;
use herd_runtime::{BreakEven, Projection, Report, ScenarioFile};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct Args {
    scenario: Option<String>,
    units: Option<u32>,
    years: Option<u32>,
    /// Year, zero-based month, day.
    start: Option<(i32, u32, u32)>,
    view: Option<String>,
    unit: Option<u32>,
    year: Option<i32>,
    json: bool,
    version: bool,
    help: bool,
}

impl Args {
    /// Command-line values win over the scenario file.
    fn apply(&self, params: &mut SimParams) {
        if let Some(units) = self.units {
            params.units_count = units;
        }
        if let Some(years) = self.years {
            params.simulation_years = years;
        }
        if let Some((year, month, day)) = self.start {
            params.start_year = year;
            params.start_month = month;
            params.start_day = day;
        }
    }
}

fn value<T>(flag: &str, it: &mut impl Iterator<Item = String>) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = it.next().with_context(|| format!("{flag} needs a value"))?;
    raw.parse()
        .map_err(|e| anyhow!("invalid value `{raw}` for {flag}: {e}"))
}

/// `YYYY-MM-DD` with a one-based month; the day is checked with the other params.
fn parse_start(raw: &str) -> Result<(i32, u32, u32)> {
    let parts: Vec<&str> = raw.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        bail!("start date `{raw}` is not YYYY-MM-DD");
    };
    let year: i32 = year.parse().with_context(|| format!("bad year in `{raw}`"))?;
    let month: u32 = month.parse().with_context(|| format!("bad month in `{raw}`"))?;
    let day: u32 = day.parse().with_context(|| format!("bad day in `{raw}`"))?;
    if !(1..=12).contains(&month) {
        bail!("month {month} in `{raw}` is not between 1 and 12");
    }
    Ok((year, month - 1, day))
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = Some(value("--scenario", &mut it)?),
            "--units" => args.units = Some(value("--units", &mut it)?),
            "--years" => args.years = Some(value("--years", &mut it)?),
            "--start" => {
                let raw: String = value("--start", &mut it)?;
                args.start = Some(parse_start(&raw)?);
            }
            "--view" => args.view = Some(value("--view", &mut it)?),
            "--unit" => args.unit = Some(value("--unit", &mut it)?),
            "--year" => args.year = Some(value("--year", &mut it)?),
            "--json" => args.json = true,
            "--version" => args.version = true,
            "-h" | "--help" => args.help = true,
            other => bail!("unknown argument `{other}` (see --help)"),
        }
    }
    Ok(args)
}

fn usage() -> String {
    let views: Vec<String> = ViewConfig::presets().into_iter().map(|v| v.name).collect();
    format!(
        "usage: herd [--scenario FILE] [--units N] [--years N] [--start YYYY-MM-DD]\n            \
         [--view NAME] [--unit N] [--year YYYY] [--json] [--version]\n\
         views: {}",
        views.join(", ")
    )
}

fn money(d: Decimal) -> String {
    d.round_dp(2).normalize().to_string()
}

fn or_all<T: ToString>(selected: Option<T>) -> String {
    selected.map_or_else(|| "all".to_string(), |v| v.to_string())
}

fn describe_break_even(be: Option<&BreakEven>) -> String {
    match be {
        Some(be) => format!(
            "{} (month {}, {}) | total value: {}",
            be.at,
            be.month_index + 1,
            be.date,
            money(be.total_value)
        ),
        None => "not reached".to_string(),
    }
}

fn print_summary(projection: &Projection, report: &Report) {
    let params = &projection.params;
    println!(
        "Herd OK | units: {} | start: {} | years: {} | animals: {} | investment: {}",
        params.units_count,
        params.start(),
        params.simulation_years,
        projection.animals.len(),
        money(projection.initial_investment)
    );
    println!(
        "Break-even | {}",
        describe_break_even(projection.break_even.as_ref())
    );
    println!(
        "View {} ({} prices) | unit: {} | year: {} | members: {} | investment: {}",
        report.view,
        report.valuation_table,
        or_all(report.selected_unit),
        or_all(report.selected_year),
        report.members,
        money(report.investment)
    );
    for y in &report.yearly {
        print!(
            "KPI {} | animals: {} ({} producing) | revenue: {} | CPF: {} | net: {}",
            y.year,
            y.total_animals,
            y.producing_animals,
            money(y.annual_revenue),
            money(y.annual_welfare_cost),
            money(y.net_annual_revenue)
        );
        println!(
            " | cumulative net: {} | assets: {} | total: {} | recovery: {}% {:?}",
            money(y.cumulative_net_revenue),
            money(y.year_end_asset_value),
            money(y.total_value),
            y.recovery_percent,
            y.recovery_tier
        );
    }
    for v in &report.valuation {
        let held: Vec<String> = v
            .brackets
            .iter()
            .filter(|b| b.count > 0)
            .map(|b| format!("{} x{}", b.label, b.count))
            .collect();
        println!(
            "Valuation {} | {} animals | {} | {}",
            v.at,
            v.animal_count,
            money(v.total_value),
            held.join(", ")
        );
    }
    for l in &report.lineages {
        println!(
            "Lineage {} | members: {} | investment: {} | break-even: {}",
            l.label,
            l.members,
            money(l.investment),
            describe_break_even(l.break_even.as_ref())
        );
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    params: &'a SimParams,
    initial_investment: Decimal,
    break_even: Option<&'a BreakEven>,
    report: &'a Report,
}

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{}", usage());
        return Ok(());
    }
    if args.version {
        println!(
            "herd {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }
    info!(scenario = ?args.scenario, view = ?args.view, "starting CLI");

    let mut scenario = match &args.scenario {
        Some(path) => {
            let loaded = ScenarioFile::load(path);
            loaded.with_context(|| format!("loading scenario {path}"))?
        }
        None => ScenarioFile::default(),
    };
    args.apply(&mut scenario.params);
    let projection = scenario.run()?;

    let view = args
        .view
        .clone()
        .unwrap_or_else(|| projection.config.view.name.clone());
    let report = projection.report(&view, args.year, args.unit)?;

    if args.json {
        let out = JsonOutput {
            params: &projection.params,
            initial_investment: projection.initial_investment,
            break_even: projection.break_even.as_ref(),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&projection, &report);
    }
    Ok(())
}
