#[macro_export]
macro_rules! emit_system_event {
    ($action:expr) => {
        $crate::emit_system_event!($action, None)
    };
    ($action:expr, $detail:expr) => {{
        use $crate::events::{dispatcher, model::*};
        let mut meta = dispatcher::meta("system", LogLevel::Info);
        meta.corr_id = Some(dispatcher::correlation_id());
        let evt = SystemEvent {
            meta,
            action: $action.to_string(),
            detail: $detail,
        };
        dispatcher::emit(LogEvent::System(evt));
    }};
}
