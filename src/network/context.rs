// src/network/context.rs
use crate::network::peer::PeerId;
use crate::utils::to_kebab_ascii;
use serde::{Deserialize, Serialize};

/// Declared network partition a peer belongs to. Two peers share a partition
/// when their canonical codes are equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkContext {
    pub name: String,
    /// Canonical machine-safe code (kebab-case). If None, derive from name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl NetworkContext {
    /// Constructor deriving the code from the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name_str = name.into();
        let code = Some(to_kebab_ascii(&name_str));
        Self {
            name: name_str,
            code,
        }
    }

    /// Constructor with explicit code.
    pub fn with_code(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Some(code.into()),
        }
    }

    /// Return the canonical code string (kebab). If code is None, derive from name.
    pub fn canonical_code(&self) -> String {
        self.code
            .clone()
            .unwrap_or_else(|| to_kebab_ascii(&self.name))
    }

    pub fn matches(&self, other: &NetworkContext) -> bool {
        self.canonical_code() == other.canonical_code()
    }
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            code: Some("default".to_string()),
        }
    }
}

/// Decides whether two contexts must be kept apart. Relation exports drop any
/// edge touching a context separated from the export target.
pub trait SeparationRule: Send + Sync {
    fn is_separated(&self, a: &NetworkContext, b: &NetworkContext) -> bool;
}

/// Default rule: separated exactly when the canonical codes differ.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextMatchRule;

impl SeparationRule for ContextMatchRule {
    fn is_separated(&self, a: &NetworkContext, b: &NetworkContext) -> bool {
        !a.matches(b)
    }
}

/// Lookup capability resolving a peer id to its declared context. Relation
/// edges carry ids only; export filtering needs the contexts behind them.
pub trait ContextDirectory {
    fn context_of(&self, id: &PeerId) -> Option<NetworkContext>;
}
