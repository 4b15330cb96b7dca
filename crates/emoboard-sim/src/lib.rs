//! emoboard-sim library.
//!
//! Runs several real [`emoboard_core::FeedSession`]s against one shared
//! in-memory table. Push events reach each client through a
//! [`network::SimulatedNetwork`] that delays, duplicates, reorders and
//! corrupts them; the [`oracle`] then checks every client converged on the
//! table's contents.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod client;
pub mod network;
pub mod oracle;
pub mod rng;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use emoboard_core::backend::{EmotionBackend, MemoryBackend, Poll, Subscription};
use emoboard_core::feed::MergeOutcome;
use emoboard_core::{Category, PushEvent};

use crate::client::{ClientId, ClientState, SimulatedClient};
use crate::network::{FaultConfig, NetworkMessage, SimulatedNetwork};
use crate::rng::DeterministicRng;

/// Parameters for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub client_count: usize,
    pub rounds: u64,
    /// Chance per round that a joined client posts.
    pub add_rate_percent: u8,
    /// Rows each client asks for on load.
    pub feed_limit: usize,
    pub fault: FaultConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            client_count: 4,
            rounds: 20,
            add_rate_percent: 40,
            feed_limit: emoboard_core::feed::DEFAULT_FEED_LIMIT,
            fault: FaultConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error if a parameter is out of range, or if the run could
    /// write more rows than a single load returns.
    pub fn validate(&self) -> Result<()> {
        if self.client_count == 0 {
            bail!("client_count must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        if self.add_rate_percent > 100 {
            bail!("add_rate_percent must be <= 100");
        }
        let max_rows = u64::try_from(self.client_count)
            .ok()
            .and_then(|clients| clients.checked_mul(self.rounds));
        let limit = u64::try_from(self.feed_limit).unwrap_or(u64::MAX);
        match max_rows {
            Some(rows) if rows <= limit => Ok(()),
            _ => bail!(
                "client_count * rounds must not exceed feed_limit ({})",
                self.feed_limit
            ),
        }
    }
}

/// One step of a run, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Joined { round: u64, client: ClientId, loaded: usize },
    Added { round: u64, client: ClientId, id: String },
    Sent {
        round: u64,
        to: ClientId,
        dropped: bool,
        duplicated: bool,
        delay: u8,
    },
    Delivered { round: u64, to: ClientId, outcome: String },
    Malformed { round: u64 },
    Reordered { round: u64, count: usize },
    Reloaded { client: ClientId, loaded: usize },
}

/// Fault and merge counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub adds: usize,
    pub sends: usize,
    pub dropped: usize,
    pub duplicated: usize,
    pub reordered_ticks: usize,
    pub malformed: usize,
    pub merged: usize,
    pub duplicates_ignored: usize,
    pub malformed_dropped: usize,
}

impl SimulationStats {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Merged => self.merged += 1,
            MergeOutcome::Duplicate => self.duplicates_ignored += 1,
            MergeOutcome::Dropped => self.malformed_dropped += 1,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub config: SimulationConfig,
    /// Client feeds after all in-flight pushes were delivered.
    pub clients: Vec<ClientState>,
    /// The same feeds after every table row was pushed to every client again.
    pub after_redelivery: Vec<ClientState>,
    /// Every row in the table, in insert order.
    pub table_ids: Vec<String>,
    pub stats: SimulationStats,
    pub trace: Vec<TraceEvent>,
    /// Whether the run hit both a duplicated and a reordered delivery.
    pub interesting_state_reached: bool,
}

const PHRASES: [&str; 8] = [
    "cannot sleep again",
    "first warm day",
    "everything feels far away",
    "they finally called back",
    "stuck in traffic for hours",
    "exam tomorrow",
    "small win today",
    "nobody noticed",
];

/// Drives one deterministic run.
#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    table: MemoryBackend,
    network: SimulatedNetwork,
    clients: Vec<SimulatedClient>,
    stats: SimulationStats,
    trace: Vec<TraceEvent>,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = DeterministicRng::new(config.seed);
        let table = MemoryBackend::with_logical_clock();
        let clients = (0..config.client_count)
            .map(|id| {
                let salt = u64::try_from(id).unwrap_or(u64::MAX);
                SimulatedClient::new(id, table.clone(), rng.fork(salt), config.feed_limit)
            })
            .collect();
        Ok(Self {
            config,
            rng,
            table,
            network: SimulatedNetwork::new(config.fault),
            clients,
            stats: SimulationStats::default(),
            trace: Vec::new(),
        })
    }

    /// Round at which each client starts listening. Client 0 is there from
    /// the start; the rest join during the first half of the run.
    fn join_schedule(&mut self) -> Vec<u64> {
        let window = (self.config.rounds / 2).max(1);
        (0..self.clients.len())
            .map(|id| if id == 0 { 0 } else { self.rng.next_bounded(window) })
            .collect()
    }

    /// Run every round, flush the network, then redeliver the whole table.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend call fails. The in-memory table never
    /// fails unless a fault is scripted on it, so an error here is a bug.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let hub = self
            .table
            .subscribe()
            .context("subscribing to the simulated table")?;
        let schedule = self.join_schedule();

        for round in 0..self.config.rounds {
            let joining: Vec<ClientId> = schedule
                .iter()
                .enumerate()
                .filter(|&(id, &at)| at == round && !self.clients[id].joined())
                .map(|(id, _)| id)
                .collect();
            for &id in &joining {
                self.clients[id].join(round);
            }

            self.post_round(round)?;
            if self.rng.hit_rate_percent(self.config.fault.malformed_rate_percent) {
                self.table.push_raw(json!({ "id": format!("garbage-{round}"), "x": "?" }));
                self.stats.malformed += 1;
                self.trace.push(TraceEvent::Malformed { round });
            }
            self.fan_out(&hub, round);

            // Joiners load after this round's pushes are queued, so a row is
            // either in the load or on its way.
            for id in joining {
                let loaded = self.clients[id]
                    .load()
                    .with_context(|| format!("client {id} initial load"))?;
                self.trace.push(TraceEvent::Joined {
                    round,
                    client: id,
                    loaded,
                });
            }

            let outcome = self.network.deliver_ready(round, &mut self.rng);
            self.apply(outcome, round);
        }

        self.fan_out(&hub, self.config.rounds);
        let outcome = self.network.flush(&mut self.rng);
        self.apply(outcome, self.config.rounds);

        if self.config.fault.drop_rate_percent > 0 {
            for client in &mut self.clients {
                let loaded = client
                    .load()
                    .with_context(|| format!("client {} recovery load", client.id()))?;
                self.trace.push(TraceEvent::Reloaded {
                    client: client.id(),
                    loaded,
                });
            }
        }
        hub.unsubscribe();

        let clients: Vec<ClientState> =
            self.clients.iter().map(SimulatedClient::snapshot).collect();
        let rows = self.table.rows();
        for client in &mut self.clients {
            client.redeliver(&rows);
        }
        let after_redelivery = self.clients.iter().map(SimulatedClient::snapshot).collect();

        let interesting_state_reached =
            self.stats.duplicated > 0 && self.stats.reordered_ticks > 0;
        info!(
            seed = self.config.seed,
            rows = rows.len(),
            merged = self.stats.merged,
            interesting = interesting_state_reached,
            "simulation complete"
        );

        Ok(SimulationResult {
            config: self.config,
            clients,
            after_redelivery,
            table_ids: rows.into_iter().map(|row| row.id).collect(),
            stats: self.stats,
            trace: std::mem::take(&mut self.trace),
            interesting_state_reached,
        })
    }

    fn post_round(&mut self, round: u64) -> Result<()> {
        for id in 0..self.clients.len() {
            if !self.clients[id].joined() {
                continue;
            }
            if !self.rng.hit_rate_percent(self.config.add_rate_percent) {
                continue;
            }
            let text = format!("{} #{round}", PHRASES[self.rng.next_index(PHRASES.len())]);
            let category = Category::ALL[self.rng.next_index(Category::ALL.len())];
            let emotion = self.clients[id]
                .add(&text, category)
                .with_context(|| format!("client {id} add in round {round}"))?;
            self.stats.adds += 1;
            self.trace.push(TraceEvent::Added {
                round,
                client: id,
                id: emotion.id,
            });
        }
        Ok(())
    }

    /// Forward every table notification to each joined client.
    fn fan_out(&mut self, hub: &Subscription, round: u64) {
        let mut events: Vec<PushEvent> = Vec::new();
        while let Poll::Event(event) = hub.poll() {
            events.push(event);
        }
        for event in events {
            for id in 0..self.clients.len() {
                if !self.clients[id].joined() {
                    continue;
                }
                let message = NetworkMessage {
                    to: id,
                    event: event.clone(),
                };
                let sent = self.network.send(message, round, &mut self.rng);
                self.stats.sends += 1;
                self.stats.dropped += usize::from(sent.dropped);
                self.stats.duplicated += usize::from(sent.duplicated);
                self.trace.push(TraceEvent::Sent {
                    round,
                    to: id,
                    dropped: sent.dropped,
                    duplicated: sent.duplicated,
                    delay: sent.delay_rounds,
                });
            }
        }
    }

    fn apply(&mut self, outcome: network::DeliverOutcome, round: u64) {
        if outcome.reordered {
            self.stats.reordered_ticks += 1;
            self.trace.push(TraceEvent::Reordered {
                round,
                count: outcome.delivered.len(),
            });
        }
        for message in outcome.delivered {
            let to = message.to;
            let merged = self.clients[to].deliver(message.event);
            debug!(round, to, ?merged, "delivered push");
            self.stats.record(merged);
            self.trace.push(TraceEvent::Delivered {
                round,
                to,
                outcome: format!("{merged:?}").to_lowercase(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationConfig, Simulator};
    use crate::network::FaultConfig;

    #[test]
    fn config_must_fit_in_one_load() {
        let config = SimulationConfig {
            client_count: 11,
            rounds: 10,
            feed_limit: 100,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(
            SimulationConfig {
                client_count: 0,
                ..SimulationConfig::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn same_seed_same_result() {
        let config = SimulationConfig {
            seed: 42,
            ..SimulationConfig::default()
        };
        let a = Simulator::new(config).unwrap().run().unwrap();
        let b = Simulator::new(config).unwrap().run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn quiet_network_converges_on_table() {
        let config = SimulationConfig {
            seed: 9,
            add_rate_percent: 100,
            fault: FaultConfig {
                max_delay_rounds: 0,
                drop_rate_percent: 0,
                duplicate_rate_percent: 0,
                reorder_rate_percent: 0,
                malformed_rate_percent: 0,
            },
            ..SimulationConfig::default()
        };
        let result = Simulator::new(config).unwrap().run().unwrap();
        assert!(!result.table_ids.is_empty());
        assert_eq!(result.stats.adds, result.table_ids.len());
        for client in &result.clients {
            let mut ids = client.emotion_ids.clone();
            ids.sort();
            let mut table = result.table_ids.clone();
            table.sort();
            assert_eq!(ids, table, "client {}", client.id);
        }
    }

    #[test]
    fn malformed_pushes_are_dropped_not_merged() {
        let config = SimulationConfig {
            seed: 5,
            fault: FaultConfig {
                malformed_rate_percent: 100,
                ..FaultConfig::default()
            },
            ..SimulationConfig::default()
        };
        let result = Simulator::new(config).unwrap().run().unwrap();
        assert_eq!(result.stats.malformed, 20);
        assert!(result.stats.malformed_dropped > 0);
        for client in &result.clients {
            assert!(client.emotion_ids.iter().all(|id| !id.starts_with("garbage")));
        }
    }
}
