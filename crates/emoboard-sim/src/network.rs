use serde::{Deserialize, Serialize};

use emoboard_core::PushEvent;

use crate::client::ClientId;
use crate::rng::DeterministicRng;

/// Fault injection configuration for push delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Maximum delivery delay in rounds.
    pub max_delay_rounds: u8,
    /// Percentage of pushes lost in transit. Clients recover by reloading.
    pub drop_rate_percent: u8,
    /// Percentage of pushes delivered twice.
    pub duplicate_rate_percent: u8,
    /// Percentage chance of reversing the ready queue at each tick.
    pub reorder_rate_percent: u8,
    /// Percentage chance per round of broadcasting a malformed payload.
    pub malformed_rate_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 2,
            drop_rate_percent: 0,
            duplicate_rate_percent: 10,
            reorder_rate_percent: 20,
            malformed_rate_percent: 5,
        }
    }
}

/// A push event addressed to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMessage {
    pub to: ClientId,
    pub event: PushEvent,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingMessage {
    deliver_at_round: u64,
    message: NetworkMessage,
}

/// Result of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub dropped: bool,
    pub duplicated: bool,
    pub delay_rounds: u8,
}

/// Messages delivered in one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverOutcome {
    pub delivered: Vec<NetworkMessage>,
    /// Whether delivery order was reversed.
    pub reordered: bool,
}

/// Deterministic fault-injecting push channel between the table and clients.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedNetwork {
    pending: Vec<PendingMessage>,
    fault: FaultConfig,
}

impl SimulatedNetwork {
    #[must_use]
    pub const fn new(fault: FaultConfig) -> Self {
        Self {
            pending: Vec::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault_config(&self) -> FaultConfig {
        self.fault
    }

    /// Number of queued in-flight messages.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue a message, applying drop, delay and duplication faults.
    pub fn send(
        &mut self,
        message: NetworkMessage,
        round: u64,
        rng: &mut DeterministicRng,
    ) -> SendOutcome {
        if rng.hit_rate_percent(self.fault.drop_rate_percent) {
            return SendOutcome {
                dropped: true,
                duplicated: false,
                delay_rounds: 0,
            };
        }

        let delay_bound = u64::from(self.fault.max_delay_rounds).saturating_add(1);
        let delay =
            u8::try_from(rng.next_bounded(delay_bound)).unwrap_or(self.fault.max_delay_rounds);
        let deliver_at_round = round.saturating_add(u64::from(delay));

        let duplicated = rng.hit_rate_percent(self.fault.duplicate_rate_percent);
        if duplicated {
            // The copy may trail the original by a round.
            let lag = rng.next_bounded(2);
            self.pending.push(PendingMessage {
                deliver_at_round: deliver_at_round.saturating_add(lag),
                message: message.clone(),
            });
        }
        self.pending.push(PendingMessage {
            deliver_at_round,
            message,
        });

        SendOutcome {
            dropped: false,
            duplicated,
            delay_rounds: delay,
        }
    }

    /// Deliver every message whose round has arrived, in send order unless
    /// the reorder fault fires.
    pub fn deliver_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> DeliverOutcome {
        let (ready, future): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.deliver_at_round <= round);
        self.pending = future;

        let mut delivered: Vec<NetworkMessage> =
            ready.into_iter().map(|pending| pending.message).collect();
        let reordered =
            delivered.len() > 1 && rng.hit_rate_percent(self.fault.reorder_rate_percent);
        if reordered {
            delivered.reverse();
        }

        DeliverOutcome {
            delivered,
            reordered,
        }
    }

    /// Deliver everything still in flight, regardless of its round.
    pub fn flush(&mut self, rng: &mut DeterministicRng) -> DeliverOutcome {
        self.deliver_ready(u64::MAX, rng)
    }
}
