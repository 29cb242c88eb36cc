use serde::Serialize;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMeta {
    pub ts: SystemTime,
    pub level: LogLevel,
    pub corr_id: Option<String>,
    pub session_id: String,
    pub component: &'static str,
    pub suppress_console: bool,
}

/// Connection-layer event (dial, attach, frame errors, teardown).
#[derive(Debug, Clone, Serialize)]
pub struct TransportEvent {
    pub meta: EventMeta,
    pub action: String,
    pub peer: Option<String>,
    pub detail: Option<String>,
}

/// Relation-graph event (edge updates, merges, offline transitions, exports).
#[derive(Debug, Clone, Serialize)]
pub struct TopologyEvent {
    pub meta: EventMeta,
    pub action: String,
    pub owner: Option<String>,
    pub other: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub meta: EventMeta,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Transport(TransportEvent),
    Topology(TopologyEvent),
    System(SystemEvent),
}

impl LogEvent {
    pub fn meta(&self) -> &EventMeta {
        match self {
            LogEvent::Transport(e) => &e.meta,
            LogEvent::Topology(e) => &e.meta,
            LogEvent::System(e) => &e.meta,
        }
    }
}
