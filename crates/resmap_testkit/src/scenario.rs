//! JSON scenarios for the transactional index.
//!
//! A scenario is a named list of steps. Each step calls one index
//! operation and may state what it expects back:
//!
//! ```json
//! {
//!   "name": "rollback",
//!   "steps": [
//!     { "op": "add", "tx": "t1", "resource": "a", "root": "a", "object": "ocfl-1" },
//!     { "op": "get", "tx": "t1", "resource": "a", "expect": { "root": "a", "object": "ocfl-1" } },
//!     { "op": "rollback", "tx": "t1" },
//!     { "op": "get", "resource": "a", "expect": null }
//!   ]
//! }
//! ```
//!
//! An `expect` of `null` on a `get` means `MappingNotFound`; leaving it out
//! skips the check.

use resmap_core::{Mapping, ObjectIndex, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named sequence of index operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name, used in failure messages.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Steps, run in order against one index.
    pub steps: Vec<Step>,
}

/// The mapping a step expects, in JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedMapping {
    /// Expected root resource id.
    pub root: String,
    /// Expected storage object id.
    pub object: String,
}

impl ExpectedMapping {
    fn matches(&self, mapping: &Mapping) -> bool {
        mapping.root_resource_id().as_str() == self.root
            && mapping.storage_object_id().as_str() == self.object
    }
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// `add_mapping`.
    Add {
        /// Transaction id; absent for direct mode.
        #[serde(default)]
        tx: Option<String>,
        /// Resource being mapped.
        resource: String,
        /// Root of its group.
        root: String,
        /// Storage object holding the group.
        object: String,
    },
    /// `get_mapping`.
    Get {
        /// Transaction id; absent for direct mode.
        #[serde(default)]
        tx: Option<String>,
        /// Resource to look up.
        resource: String,
        /// `Some(None)` expects not-found, `None` skips the check.
        #[serde(default, with = "expect_field", skip_serializing_if = "Option::is_none")]
        expect: Option<Option<ExpectedMapping>>,
    },
    /// `remove_mapping`.
    Remove {
        /// Transaction id; absent for direct mode.
        #[serde(default)]
        tx: Option<String>,
        /// Resource to remove.
        resource: String,
    },
    /// `commit`.
    Commit {
        /// Transaction to commit.
        tx: String,
    },
    /// `rollback`.
    Rollback {
        /// Transaction to roll back.
        tx: String,
    },
    /// `reset`.
    Reset,
}

/// Distinguishes a missing `expect` from `"expect": null`.
mod expect_field {
    use super::ExpectedMapping;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(
        value: &Option<Option<ExpectedMapping>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<ExpectedMapping>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<ExpectedMapping>::deserialize(deserializer).map(Some)
    }
}

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFailure {
    /// Scenario name.
    pub scenario: String,
    /// Zero-based index of the failing step.
    pub step: usize,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scenario '{}' step {}: {}",
            self.scenario, self.step, self.message
        )
    }
}

impl std::error::Error for ScenarioFailure {}

impl Scenario {
    /// Parses a scenario from JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes the scenario as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Runs every step against `index`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first step whose call errored or whose result did not
    /// match its expectation.
    pub fn run(&self, index: &ObjectIndex) -> Result<(), ScenarioFailure> {
        for (i, step) in self.steps.iter().enumerate() {
            self.run_step(index, step).map_err(|message| ScenarioFailure {
                scenario: self.name.clone(),
                step: i,
                message,
            })?;
        }
        Ok(())
    }

    fn run_step(&self, index: &ObjectIndex, step: &Step) -> Result<(), String> {
        let tx_of = |tx: &Option<String>| tx.as_deref().map(TransactionId::new);

        match step {
            Step::Add {
                tx,
                resource,
                root,
                object,
            } => {
                let tx = tx_of(tx);
                index
                    .add_mapping(tx.as_ref(), resource.as_str(), root.as_str(), object.as_str())
                    .map(|_| ())
                    .map_err(|e| format!("add {resource} failed: {e}"))
            }
            Step::Get {
                tx,
                resource,
                expect,
            } => {
                let tx = tx_of(tx);
                let result = index.get_mapping(tx.as_ref(), resource.as_str());
                match (expect, result) {
                    (None, Ok(_)) => Ok(()),
                    (None, Err(e)) if e.is_not_found() => Ok(()),
                    (Some(None), Err(e)) if e.is_not_found() => Ok(()),
                    (Some(Some(expected)), Ok(mapping)) if expected.matches(&mapping) => Ok(()),
                    (Some(None), Ok(mapping)) => {
                        Err(format!("expected {resource} to be absent, got {mapping:?}"))
                    }
                    (Some(Some(expected)), Ok(mapping)) => Err(format!(
                        "expected {resource} -> {{{}, {}}}, got {mapping:?}",
                        expected.root, expected.object
                    )),
                    (_, Err(e)) => Err(format!("get {resource} failed: {e}")),
                }
            }
            Step::Remove { tx, resource } => {
                let tx = tx_of(tx);
                index
                    .remove_mapping(tx.as_ref(), resource.as_str())
                    .map_err(|e| format!("remove {resource} failed: {e}"))
            }
            Step::Commit { tx } => index
                .commit(&TransactionId::new(tx.as_str()))
                .map(|_| ())
                .map_err(|e| format!("commit {tx} failed: {e}")),
            Step::Rollback { tx } => {
                index.rollback(&TransactionId::new(tx.as_str()));
                Ok(())
            }
            Step::Reset => index.reset().map_err(|e| format!("reset failed: {e}")),
        }
    }
}

/// Scenarios bundled with the testkit.
pub fn builtin_scenarios() -> Vec<Scenario> {
    [
        include_str!("../scenarios/grouped_commit.json"),
        include_str!("../scenarios/staged_removal.json"),
        include_str!("../scenarios/rollback.json"),
        include_str!("../scenarios/isolation.json"),
    ]
    .iter()
    .map(|json| Scenario::from_json(json).expect("Bundled scenario is valid JSON"))
    .collect()
}
