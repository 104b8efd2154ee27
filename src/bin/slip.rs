use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use slipwise::kelly::kelly_for_portfolio;
use slipwise::{
    EngineConfig, InvestmentRecord, MatchProfile, ParseOutcome, PortfolioProfile, SlipParser,
    StakePlan, combine_atomic_match_profiles,
};

const VALUE_FLAGS: &[&str] = &["--teams", "--record", "--bankroll", "--min-stake"];

#[derive(Serialize)]
struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    parse: Option<ParseOutcome>,
    record: InvestmentRecord,
    profiles: Vec<MatchProfile>,
    portfolio: PortfolioProfile,
    kelly_fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stake: Option<StakePlan>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut config = EngineConfig::from_env();
    if let Some(path) = flag_value(&args, "--teams") {
        config.team_directory = Some(PathBuf::from(path));
    }
    let bankroll = parse_f64_flag(&args, "--bankroll")?;
    let min_stake = parse_f64_flag(&args, "--min-stake")?.unwrap_or(1.0);

    let (parse, record) = match flag_value(&args, "--record") {
        Some(path) => (None, InvestmentRecord::load(&PathBuf::from(path))?),
        None => {
            let text = input_text(&args)?;
            let parser = SlipParser::from_config(config.clone());
            let outcome = parser.parse(&text);
            let record = InvestmentRecord::from_outcome(&outcome);
            (Some(outcome), record)
        }
    };

    let profiles = record.profiles();
    let portfolio = combine_atomic_match_profiles(&profiles);
    let kelly_fraction = kelly_for_portfolio(&portfolio, config.kelly_max_fraction);
    let stake = bankroll
        .map(|b| StakePlan::recommend(kelly_fraction, b, config.kelly_multiplier, min_stake));

    let report = Report {
        parse,
        record,
        profiles,
        portfolio,
        kelly_fraction,
        stake,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim());
            }
        }
    }
    None
}

fn parse_f64_flag(args: &[String], name: &str) -> Result<Option<f64>> {
    let Some(raw) = flag_value(args, name) else {
        return Ok(None);
    };
    let value: f64 = raw
        .parse()
        .with_context(|| format!("{name} expects a number, got {raw:?}"))?;
    if !value.is_finite() || value < 0.0 {
        bail!("{name} must be a non-negative number");
    }
    Ok(Some(value))
}

/// Positional arguments joined by spaces, or stdin when there are none.
fn input_text(args: &[String]) -> Result<String> {
    let mut words = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        words.push(arg.as_str());
    }
    if !words.is_empty() {
        return Ok(words.join(" "));
    }

    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("read slip text from stdin")?;
    if buf.trim().is_empty() {
        bail!("no slip text given; pass it as arguments or on stdin");
    }
    Ok(buf)
}
