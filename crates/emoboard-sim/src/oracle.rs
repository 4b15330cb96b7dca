use std::collections::BTreeSet;

use crate::SimulationResult;
use crate::client::{ClientId, ClientState};

// ── Result types ──────────────────────────────────────────────────────────────

/// Outcome of one invariant check, or of [`ConvergenceOracle::check_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

/// Diagnostic for a single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A joined client's feed does not hold exactly the table's rows.
    Convergence {
        client: ClientId,
        /// Table rows the client never received.
        missing: Vec<String>,
        /// Ids the client shows that are not in the table.
        extra: Vec<String>,
    },

    /// The same id appears more than once in one feed.
    DuplicateEntry { client: ClientId, id: String },

    /// A client's own successful post is not in its feed.
    OwnWriteMissing { client: ClientId, id: String },

    /// Pushing already-known rows changed a feed.
    Idempotence {
        client: ClientId,
        before: Vec<String>,
        after: Vec<String>,
    },

    /// A client is showing an error after a fault-free backend run.
    SurfacedError { client: ClientId, message: String },
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Checks a finished run for feed convergence.
///
/// # Invariants checked
///
/// 1. **Convergence** (`check_convergence`): every joined client holds the
///    table's id set.
/// 2. **Uniqueness** (`check_uniqueness`): no feed lists an id twice.
/// 3. **Own writes** (`check_own_writes`): a client sees what it posted.
/// 4. **Idempotence** (`check_idempotence`): redelivering rows is a no-op.
/// 5. **Quiet errors** (`check_no_errors`): push faults never surface as an
///    error.
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    #[must_use]
    pub fn check_convergence(clients: &[ClientState], table_ids: &[String]) -> OracleResult {
        let table: BTreeSet<&String> = table_ids.iter().collect();
        let violations = clients
            .iter()
            .filter(|client| client.joined_round.is_some())
            .filter_map(|client| {
                let feed: BTreeSet<&String> = client.emotion_ids.iter().collect();
                if feed == table {
                    return None;
                }
                Some(InvariantViolation::Convergence {
                    client: client.id,
                    missing: table.difference(&feed).map(|id| (*id).clone()).collect(),
                    extra: feed.difference(&table).map(|id| (*id).clone()).collect(),
                })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_uniqueness(clients: &[ClientState]) -> OracleResult {
        let mut violations = Vec::new();
        for client in clients {
            let mut seen = BTreeSet::new();
            for id in &client.emotion_ids {
                if !seen.insert(id) {
                    violations.push(InvariantViolation::DuplicateEntry {
                        client: client.id,
                        id: id.clone(),
                    });
                }
            }
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_own_writes(clients: &[ClientState]) -> OracleResult {
        let violations = clients
            .iter()
            .flat_map(|client| {
                client
                    .own_ids
                    .iter()
                    .filter(|id| !client.emotion_ids.contains(id))
                    .map(|id| InvariantViolation::OwnWriteMissing {
                        client: client.id,
                        id: id.clone(),
                    })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    /// Compare feeds before and after every row was pushed again.
    ///
    /// Order matters here: a duplicate push must not move an entry either.
    #[must_use]
    pub fn check_idempotence(before: &[ClientState], after: &[ClientState]) -> OracleResult {
        let violations = before
            .iter()
            .zip(after)
            .filter(|(b, a)| b.joined_round.is_some() && b.emotion_ids != a.emotion_ids)
            .map(|(b, a)| InvariantViolation::Idempotence {
                client: b.id,
                before: b.emotion_ids.clone(),
                after: a.emotion_ids.clone(),
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_no_errors(clients: &[ClientState]) -> OracleResult {
        let violations = clients
            .iter()
            .filter_map(|client| {
                client
                    .error
                    .as_ref()
                    .map(|message| InvariantViolation::SurfacedError {
                        client: client.id,
                        message: message.clone(),
                    })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    /// Run every check against a finished run.
    #[must_use]
    pub fn check_all(result: &SimulationResult) -> OracleResult {
        OracleResult::pass()
            .merge(Self::check_convergence(&result.clients, &result.table_ids))
            .merge(Self::check_uniqueness(&result.clients))
            .merge(Self::check_own_writes(&result.clients))
            .merge(Self::check_idempotence(
                &result.clients,
                &result.after_redelivery,
            ))
            .merge(Self::check_no_errors(&result.clients))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConvergenceOracle, InvariantViolation};
    use crate::client::ClientState;

    fn state(id: usize, ids: &[&str]) -> ClientState {
        ClientState {
            id,
            joined_round: Some(0),
            emotion_ids: ids.iter().map(ToString::to_string).collect(),
            own_ids: Vec::new(),
            error: None,
        }
    }

    fn table(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn order_does_not_matter_for_convergence() {
        let clients = [state(0, &["a", "b"]), state(1, &["b", "a"])];
        assert!(ConvergenceOracle::check_convergence(&clients, &table(&["a", "b"])).passed);
    }

    #[test]
    fn missing_and_extra_ids_are_reported() {
        let clients = [state(0, &["a", "z"])];
        let result = ConvergenceOracle::check_convergence(&clients, &table(&["a", "b"]));
        assert_eq!(
            result.violations,
            vec![InvariantViolation::Convergence {
                client: 0,
                missing: vec!["b".to_string()],
                extra: vec!["z".to_string()],
            }]
        );
    }

    #[test]
    fn clients_that_never_joined_are_skipped() {
        let mut idle = state(0, &[]);
        idle.joined_round = None;
        assert!(ConvergenceOracle::check_convergence(&[idle], &table(&["a"])).passed);
    }

    #[test]
    fn duplicates_and_missing_own_writes_fail() {
        let mut client = state(3, &["a", "a"]);
        client.own_ids = vec!["c".to_string()];
        assert!(!ConvergenceOracle::check_uniqueness(&[client.clone()]).passed);
        assert_eq!(
            ConvergenceOracle::check_own_writes(&[client]).violations,
            vec![InvariantViolation::OwnWriteMissing {
                client: 3,
                id: "c".to_string(),
            }]
        );
    }

    #[test]
    fn reordering_on_redelivery_breaks_idempotence() {
        let before = [state(0, &["a", "b"])];
        let after = [state(0, &["b", "a"])];
        assert!(!ConvergenceOracle::check_idempotence(&before, &after).passed);
        assert!(ConvergenceOracle::check_idempotence(&before, &before).passed);
    }

    #[test]
    fn surfaced_errors_fail() {
        let mut client = state(1, &[]);
        client.error = Some("Subscription failed: change stream closed".to_string());
        assert!(!ConvergenceOracle::check_no_errors(&[client]).passed);
    }
}
