use crate::events::{
    dispatcher,
    model::{LogEvent, LogLevel, TopologyEvent, TransportEvent},
};

/// Emit a structured connection-layer event.
pub(crate) fn emit_transport_event(
    component: &'static str,
    level: LogLevel,
    action: &str,
    peer: Option<String>,
    detail: Option<String>,
) {
    let mut meta = dispatcher::meta(component, level);
    meta.corr_id = Some(dispatcher::correlation_id());
    dispatcher::emit(LogEvent::Transport(TransportEvent {
        meta,
        action: action.to_string(),
        peer,
        detail,
    }));
}

/// Emit a structured relation-graph event.
pub(crate) fn emit_topology_event(
    component: &'static str,
    level: LogLevel,
    action: &str,
    owner: Option<String>,
    other: Option<String>,
    detail: Option<String>,
) {
    let mut meta = dispatcher::meta(component, level);
    meta.corr_id = Some(dispatcher::correlation_id());
    dispatcher::emit(LogEvent::Topology(TopologyEvent {
        meta,
        action: action.to_string(),
        owner,
        other,
        detail,
    }));
}
