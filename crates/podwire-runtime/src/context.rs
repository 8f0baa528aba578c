//! Per-invocation logging context.

use podwire_common::types::ContainerId;
use tracing::Span;
use uuid::Uuid;

/// Identity of one plugin invocation, carried by every log line it emits.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    event_uuid: Uuid,
    span: Span,
}

impl InvocationContext {
    /// Opens a context for `command` on `container_id`.
    #[must_use]
    pub fn new(command: &str, container_id: &ContainerId) -> Self {
        let event_uuid = Uuid::new_v4();
        let span = tracing::info_span!(
            "invocation",
            event_uuid = %event_uuid,
            container_id = %container_id,
            command,
        );
        Self { event_uuid, span }
    }

    /// Unique id of this invocation.
    #[must_use]
    pub const fn event_uuid(&self) -> Uuid {
        self.event_uuid
    }

    /// Runs `f` inside the invocation span.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }
}
