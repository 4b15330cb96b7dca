//! Seed sweeps.
//!
//! A campaign runs the same board scenario under every seed in a range and
//! reports which seeds broke an oracle check, so a failure can be replayed
//! exactly with [`replay_seed`].

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::network::FaultConfig;
use crate::oracle::{ConvergenceOracle, InvariantViolation, OracleResult};
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Scenario parameters shared by every seed, plus the seed range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub seed_range: Range<u64>,
    pub client_count: usize,
    pub rounds: u64,
    pub add_rate_percent: u8,
    pub feed_limit: usize,
    pub fault: FaultConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            client_count: sim.client_count,
            rounds: sim.rounds,
            add_rate_percent: sim.add_rate_percent,
            feed_limit: sim.feed_limit,
            fault: sim.fault,
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub const fn for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            client_count: self.client_count,
            rounds: self.rounds,
            add_rate_percent: self.add_rate_percent,
            feed_limit: self.feed_limit,
            fault: self.fault,
        }
    }

    /// # Errors
    ///
    /// Fails on an empty seed range or a scenario that
    /// [`SimulationConfig::validate`] rejects.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("empty seed range {:?}", self.seed_range);
        }
        self.for_seed(self.seed_range.start).validate()
    }
}

/// A failing seed and what the oracle said about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// Lowest failing seed; the one to replay first.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds that saw both a duplicated and a reordered delivery.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One seed replayed with its full trace.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

/// Run every seed in `config.seed_range`.
///
/// # Errors
///
/// Invalid configuration, or a simulation that could not run at all. Oracle
/// failures are not errors; they land in the report.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut failures = Vec::new();
    let mut interesting = 0;
    for seed in config.seed_range.clone() {
        let DetailedTrace { result, oracle } = replay_seed(seed, config)?;
        interesting += usize::from(result.interesting_state_reached);
        if !oracle.passed {
            warn!(seed, violations = oracle.violations.len(), "seed failed");
            failures.push(SeedFailure {
                seed,
                violations: oracle.violations.iter().map(format_violation).collect(),
            });
        }
    }

    let seeds_run = config.seed_range.clone().count();
    Ok(CampaignReport {
        seeds_run,
        seeds_passed: seeds_run - failures.len(),
        first_failure: failures.first().map(|f| f.seed),
        failures,
        interesting_states_reached: interesting,
    })
}

/// Run one seed and keep its trace.
///
/// # Errors
///
/// Same as [`run_campaign`].
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let mut simulator = Simulator::new(config.for_seed(seed))?;
    let result = simulator.run()?;
    let oracle = ConvergenceOracle::check_all(&result);
    Ok(DetailedTrace { result, oracle })
}

/// One-line description, prefixed with the violation kind.
#[must_use]
pub fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::Convergence {
            client,
            missing,
            extra,
        } => format!(
            "Convergence: client {client} diverges from the table \
             (missing={missing:?}, extra={extra:?})"
        ),
        InvariantViolation::DuplicateEntry { client, id } => {
            format!("DuplicateEntry: client {client} lists {id} more than once")
        }
        InvariantViolation::OwnWriteMissing { client, id } => {
            format!("OwnWriteMissing: client {client} posted {id} but does not show it")
        }
        InvariantViolation::Idempotence {
            client,
            before,
            after,
        } => format!(
            "Idempotence: redelivery changed client {client} \
             (before={} entries, after={} entries)",
            before.len(),
            after.len()
        ),
        InvariantViolation::SurfacedError { client, message } => {
            format!("SurfacedError: client {client} shows \"{message}\"")
        }
    }
}
