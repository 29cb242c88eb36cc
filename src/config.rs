use crate::constants::{DEFAULT_POOL_CAPACITY, DEFAULT_POOL_WORKERS};
use crate::errors::OverlayError;
use crate::network::context::NetworkContext;
use crate::network::peer::PeerDescriptor;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Node identity / state directory configuration
    pub node: Option<NodeConfig>,
    /// Delivery pool sizing (observer hook workers)
    pub delivery: Option<DeliveryConfig>,
    /// Logging / events configuration
    pub logging: Option<LoggingConfig>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            node: Some(NodeConfig::default()),
            delivery: Some(DeliveryConfig::default()),
            logging: None,
        }
    }
}

impl OverlayConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &str) -> Result<Self, OverlayError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Descriptor for the local peer, resolving the node id on the way.
    pub fn local_descriptor(&self) -> PeerDescriptor {
        self.node.clone().unwrap_or_default().descriptor()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Worker task count for the shared delivery pool
    pub pool_workers: Option<usize>,
    /// Bounded job queue capacity before hooks get dropped
    pub pool_capacity: Option<usize>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            pool_workers: Some(DEFAULT_POOL_WORKERS),
            pool_capacity: Some(DEFAULT_POOL_CAPACITY),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Path to JSON line event log (rotated). If unset, defaults to logs/overlay_events.jsonl
    pub json_path: Option<String>,
    /// Max size in bytes before rotation (default 5MB)
    pub json_max_bytes: Option<usize>,
    /// Number of rotated files to retain (default 3)
    pub json_rotate: Option<u32>,
    /// Disable console sink (default false)
    pub disable_console: Option<bool>,
    /// Minimum level printed to the console: trace | debug | info | warn | error
    pub console_min_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Explicit node ID (highest precedence if provided)
    pub id: Option<String>,
    /// Host name or address advertised to other peers (default: localhost)
    pub host: Option<String>,
    /// Network context name the local peer declares (default: "default")
    pub context: Option<String>,
    /// Directory for persisted runtime state (node_id file etc.)
    pub state_dir: Option<String>,
    /// Filename inside state_dir that will store generated node id (default: node_id)
    pub id_file: Option<String>,
    /// Allow ephemeral (in-memory) UUID if no persistence possible
    pub allow_ephemeral: Option<bool>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            host: None,
            context: None,
            state_dir: Some("data".to_string()),
            id_file: Some("node_id".to_string()),
            allow_ephemeral: Some(true),
        }
    }
}

impl NodeConfig {
    /// Resolve or generate a stable node id. Order:
    /// 1. Explicit id in config
    /// 2. Persisted file in state_dir/id_file
    /// 3. Generate UUID v4, persist (if possible)
    /// 4. Ephemeral UUID (if allowed)
    pub fn resolve_node_id(&self) -> String {
        // Helper to log warning without depending on events module (avoid cycle)
        fn warn(msg: &str) {
            eprintln!("⚠️ {}", msg);
        }

        // 1. Explicit
        if let Some(id) = &self.id {
            if Self::valid_id(id) {
                return id.clone();
            }
            warn("Invalid characters in configured node.id; falling back to persisted/generated");
        }

        // 2. File
        let state_dir = self.state_dir.clone().unwrap_or_else(|| "data".into());
        let id_file_name = self.id_file.clone().unwrap_or_else(|| "node_id".into());
        let path = std::path::Path::new(&state_dir).join(&id_file_name);
        if let Ok(contents) = std::fs::read_to_string(&path) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() && Self::valid_id(trimmed) {
                return trimmed.to_string();
            }
            warn("Persisted node_id file invalid or empty; regenerating");
        }

        // 3. Generate + persist
        let new_id = uuid::Uuid::new_v4().to_string();
        if std::fs::create_dir_all(&state_dir).is_ok() {
            let tmp = path.with_extension("tmp");
            if std::fs::write(&tmp, &new_id).is_ok() && std::fs::rename(&tmp, &path).is_ok() {
                return new_id;
            }
        }

        // 4. Ephemeral
        if self.allow_ephemeral.unwrap_or(true) {
            warn("Using ephemeral node id (not persisted)");
            return new_id; // reuse generated UUID
        }
        // Last resort fallback string
        "unknown-node".to_string()
    }

    fn valid_id(id: &str) -> bool {
        id.len() <= 128
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    /// Build the local peer descriptor from this node section.
    pub fn descriptor(&self) -> PeerDescriptor {
        let id = self.resolve_node_id();
        let host = self.host.clone().unwrap_or_else(|| "localhost".into());
        let mut descriptor = PeerDescriptor::new(id, host);
        if let Some(name) = &self.context {
            descriptor = descriptor.with_context(NetworkContext::new(name.clone()));
        }
        descriptor
    }
}
