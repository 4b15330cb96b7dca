//! `eb sim`: deterministic convergence campaigns.
//!
//! Runs many simulated clients against one in-memory board and checks they
//! all end up showing the same posts, whatever the push network did.

use std::io::Write;
use std::ops::Range;
use std::process;

use anyhow::Result;
use clap::Args;
use emoboard_sim::campaign::{CampaignConfig, format_violation, replay_seed, run_campaign};
use emoboard_sim::network::FaultConfig;
use serde::Serialize;

use super::CmdContext;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `eb sim`.
#[derive(Args, Debug)]
pub struct SimArgs {
    /// Seed range to run, `START..END` (end exclusive).
    #[arg(long, default_value = "0..100", value_parser = parse_seed_range)]
    pub seeds: Range<u64>,

    /// Replay one seed with its full trace instead of running a campaign.
    #[arg(long, conflicts_with = "seeds")]
    pub replay: Option<u64>,

    /// Number of simulated clients.
    #[arg(long, default_value = "4")]
    pub clients: usize,

    /// Rounds per seed.
    #[arg(long, default_value = "20")]
    pub rounds: u64,

    /// Chance per round that a client posts, in percent.
    #[arg(long, default_value = "40")]
    pub add_rate: u8,

    /// Push loss rate in percent. Clients recover with a final reload.
    #[arg(long, default_value = "0")]
    pub drop: u8,

    /// Push duplication rate in percent.
    #[arg(long, default_value = "10")]
    pub duplicate: u8,

    /// Delivery reorder rate in percent.
    #[arg(long, default_value = "20")]
    pub reorder: u8,

    /// Malformed push rate in percent.
    #[arg(long, default_value = "5")]
    pub malformed: u8,

    /// Maximum delivery delay in rounds.
    #[arg(long, default_value = "2")]
    pub max_delay: u8,
}

fn parse_seed_range(raw: &str) -> Result<Range<u64>, String> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{raw}'"))?;
    let start: u64 = start.trim().parse().map_err(|e| format!("bad start: {e}"))?;
    let end: u64 = end.trim().parse().map_err(|e| format!("bad end: {e}"))?;
    if end <= start {
        return Err(format!("empty seed range {start}..{end}"));
    }
    Ok(start..end)
}

impl SimArgs {
    fn campaign_config(&self) -> CampaignConfig {
        CampaignConfig {
            seed_range: self.replay.map_or_else(|| self.seeds.clone(), |seed| seed..seed + 1),
            client_count: self.clients,
            rounds: self.rounds,
            add_rate_percent: self.add_rate,
            feed_limit: emoboard_core::feed::DEFAULT_FEED_LIMIT,
            fault: FaultConfig {
                max_delay_rounds: self.max_delay,
                drop_rate_percent: self.drop,
                duplicate_rate_percent: self.duplicate,
                reorder_rate_percent: self.reorder,
                malformed_rate_percent: self.malformed,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RunOutput {
    seeds_run: usize,
    seeds_passed: usize,
    seeds_failed: usize,
    first_failure: Option<u64>,
    interesting_states_reached: usize,
    all_passed: bool,
    failures: Vec<FailureOutput>,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    seed: u64,
    violations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    seed: u64,
    clients: usize,
    rows: usize,
    trace_events: usize,
    merged: usize,
    duplicates_ignored: usize,
    malformed_dropped: usize,
    oracle_passed: bool,
    violations: Vec<String>,
    interesting_state_reached: bool,
}

/// Execute `eb sim`.
pub fn run_sim(args: &SimArgs, ctx: &CmdContext) -> Result<()> {
    let config = args.campaign_config();
    let passed = match args.replay {
        Some(seed) => replay(seed, &config, ctx.output)?,
        None => campaign(&config, args, ctx.output)?,
    };

    // Exit code 1 on any failure for CI integration
    if !passed {
        process::exit(1);
    }
    Ok(())
}

fn campaign(config: &CampaignConfig, args: &SimArgs, mode: OutputMode) -> Result<bool> {
    let report = run_campaign(config)?;
    let out = RunOutput {
        seeds_run: report.seeds_run,
        seeds_passed: report.seeds_passed,
        seeds_failed: report.failures.len(),
        first_failure: report.first_failure,
        interesting_states_reached: report.interesting_states_reached,
        all_passed: report.all_passed(),
        failures: report
            .failures
            .iter()
            .map(|f| FailureOutput {
                seed: f.seed,
                violations: f.violations.clone(),
            })
            .collect(),
    };

    render_mode(
        mode,
        &out,
        |o, w| {
            writeln!(
                w,
                "campaign seeds_run={} clients={} rounds={}",
                o.seeds_run, args.clients, args.rounds
            )?;
            writeln!(
                w,
                "results passed={} failed={} interesting_states={} all_passed={}",
                o.seeds_passed, o.seeds_failed, o.interesting_states_reached, o.all_passed
            )?;
            for failure in o.failures.iter().take(5) {
                writeln!(
                    w,
                    "failure seed={} violations={}",
                    failure.seed,
                    failure.violations.len()
                )?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, "Simulation Campaign")?;
            pretty_kv(w, "Seeds", o.seeds_run.to_string())?;
            pretty_kv(w, "Clients", args.clients.to_string())?;
            pretty_kv(w, "Rounds", args.rounds.to_string())?;
            pretty_kv(
                w,
                "Results",
                format!(
                    "{} passed / {} failed ({} interesting states)",
                    o.seeds_passed, o.seeds_failed, o.interesting_states_reached
                ),
            )?;
            let Some(first) = o.first_failure else {
                return pretty_kv(w, "Status", "all seeds passed");
            };
            pretty_kv(w, "Status", format!("{} failures", o.seeds_failed))?;
            writeln!(w)?;
            pretty_section(w, "Failure Samples")?;
            for failure in o.failures.iter().take(5) {
                writeln!(w, "seed {}", failure.seed)?;
                for violation in &failure.violations {
                    writeln!(w, "  - {violation}")?;
                }
            }
            writeln!(w)?;
            pretty_kv(w, "Replay", format!("eb sim --replay {first}"))
        },
    )?;
    Ok(out.all_passed)
}

fn replay(seed: u64, config: &CampaignConfig, mode: OutputMode) -> Result<bool> {
    let trace = replay_seed(seed, config)?;
    let stats = trace.result.stats;
    let out = ReplayOutput {
        seed,
        clients: trace.result.clients.len(),
        rows: trace.result.table_ids.len(),
        trace_events: trace.result.trace.len(),
        merged: stats.merged,
        duplicates_ignored: stats.duplicates_ignored,
        malformed_dropped: stats.malformed_dropped,
        oracle_passed: trace.oracle.passed,
        violations: trace.oracle.violations.iter().map(format_violation).collect(),
        interesting_state_reached: trace.result.interesting_state_reached,
    };

    render_mode(
        mode,
        &out,
        |o, w| {
            writeln!(
                w,
                "replay seed={} clients={} rows={} trace_events={} oracle_passed={}",
                o.seed, o.clients, o.rows, o.trace_events, o.oracle_passed
            )?;
            for violation in &o.violations {
                writeln!(w, "violation={violation}")?;
            }
            for client in &trace.result.clients {
                writeln!(
                    w,
                    "client id={} joined={} feed={} own={}",
                    client.id,
                    client.joined_round.map_or_else(|| "-".to_string(), |r| r.to_string()),
                    client.emotion_ids.len(),
                    client.own_ids.len()
                )?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, &format!("Replay Seed {}", o.seed))?;
            pretty_kv(w, "Clients", o.clients.to_string())?;
            pretty_kv(w, "Rows", o.rows.to_string())?;
            pretty_kv(w, "Trace", o.trace_events.to_string())?;
            pretty_kv(
                w,
                "Merges",
                format!(
                    "{} merged, {} duplicates ignored, {} malformed dropped",
                    o.merged, o.duplicates_ignored, o.malformed_dropped
                ),
            )?;
            pretty_kv(w, "Interesting", o.interesting_state_reached.to_string())?;
            pretty_kv(w, "Oracle", o.oracle_passed.to_string())?;
            for violation in &o.violations {
                writeln!(w, "  - {violation}")?;
            }
            Ok(())
        },
    )?;
    Ok(out.oracle_passed)
}
