use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder};
use tracing::debug;

use super::lifecycle::Mutation;

pub const REASON_STARTED: &str = "RecordingStarted";
pub const REASON_STOPPED: &str = "RecordingStopped";
pub const REASON_ARCHIVED: &str = "RecordingArchived";
pub const REASON_BACKEND_ERROR: &str = "BackendError";

/// Event reason, action and note for a backend mutation.
pub fn describe(
    m: &Mutation,
    recording: &str,
) -> (&'static str, &'static str, String) {
    match m {
        Mutation::Started => (
            REASON_STARTED,
            "Start",
            format!("Started continuous recording {}", recording),
        ),
        Mutation::Dumped { seconds } => (
            REASON_STARTED,
            "Dump",
            format!("Started {}s recording {}", seconds, recording),
        ),
        Mutation::Stopped => (
            REASON_STOPPED,
            "Stop",
            format!("Requested stop of recording {}", recording),
        ),
        Mutation::Saved { filename } => (
            REASON_ARCHIVED,
            "Save",
            format!("Archived recording {} as {}", recording, filename),
        ),
    }
}

pub async fn emit_event(
    recorder: Option<&Recorder>,
    reference: &ObjectReference,
    type_: EventType,
    reason: &str,
    action: &str,
    note: Option<String>,
) {
    let Some(recorder) = recorder else {
        return;
    };
    if let Err(e) = recorder
        .publish(
            &Event {
                type_,
                reason: reason.into(),
                note,
                action: action.into(),
                secondary: None,
            },
            reference,
        )
        .await
    {
        debug!(error = %e, reason, "event publish failed");
    }
}
