use serde_json::{Value as JsonValue, json};
use tracing::{debug, trace};

use crate::crd::RecordingStatus;

pub fn should_patch_status(
    current: Option<&RecordingStatus>,
    desired: &RecordingStatus,
) -> bool {
    match current {
        None => {
            debug!("should_patch_status: no current status, patching");
            true
        }
        Some(cur) if cur != desired => {
            debug!(
                current = %serde_json::to_string(cur).unwrap_or_default(),
                desired = %serde_json::to_string(desired).unwrap_or_default(),
                "should_patch_status: status differs, patching"
            );
            true
        }
        Some(_) => {
            trace!("should_patch_status: status identical, skipping patch");
            false
        }
    }
}

/// Merge patch body for the status subresource.
pub fn status_patch(status: &RecordingStatus) -> JsonValue {
    json!({ "status": status })
}
