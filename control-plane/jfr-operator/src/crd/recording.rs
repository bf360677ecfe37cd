use std::fmt;
use std::str::FromStr;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration_secs;

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default,
)]
#[kube(
    group = "rhjmc.redhat.com",
    version = "v1alpha2",
    kind = "Recording",
    plural = "recordings",
    namespaced,
    status = "RecordingStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Download","type":"string","jsonPath":".status.downloadURL"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSpec {
    /// Recording name as known to the JVM / backend
    pub name: String,
    /// Ordered `typeId:option=value` event settings
    #[serde(default)]
    pub event_options: Vec<String>,
    /// Length of the recording (e.g. "30s", "5m"); zero or absent records
    /// continuously until stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Desired state; only STOPPED has an effect once running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RecordingState>,
    /// Archive the recording in the backend once it has stopped
    #[serde(default)]
    pub archive: bool,
    /// FlightRecorder (same namespace) that knows how to reach the JVM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_recorder: Option<FlightRecorderRef>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct FlightRecorderRef {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RecordingState>,
    /// RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(
        rename = "downloadURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
    #[serde(
        rename = "reportURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub report_url: Option<String>,
}

/// Recording lifecycle as tracked by the backend. Variants are ordered so a
/// later state compares greater than an earlier one.
#[derive(
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Debug,
    JsonSchema,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Created => "CREATED",
            RecordingState::Running => "RUNNING",
            RecordingState::Stopping => "STOPPING",
            RecordingState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown recording state {0:?}")]
pub struct UnknownState(pub String);

impl FromStr for RecordingState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(RecordingState::Created),
            "RUNNING" => Ok(RecordingState::Running),
            "STOPPING" => Ok(RecordingState::Stopping),
            "STOPPED" => Ok(RecordingState::Stopped),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

impl RecordingSpec {
    /// Requested length in seconds; `Ok(0)` means continuous.
    pub fn duration_secs(&self) -> Result<u64, String> {
        match self.duration.as_deref().map(str::trim) {
            None | Some("") => Ok(0),
            Some(d) => parse_duration_secs(d)
                .ok_or_else(|| format!("invalid duration {:?}", d)),
        }
    }

    pub fn wants_stopped(&self) -> bool {
        self.state == Some(RecordingState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn crd_metadata() {
        let crd = Recording::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("recordings.rhjmc.redhat.com")
        );
        assert_eq!(crd.spec.group, "rhjmc.redhat.com");
        assert_eq!(crd.spec.versions[0].name, "v1alpha2");
    }

    #[test]
    fn status_uses_url_field_names() {
        let status = RecordingStatus {
            state: Some(RecordingState::Stopped),
            start_time: None,
            duration: Some("30s".into()),
            download_url: Some("https://b/api/v1/recordings/x.jfr".into()),
            report_url: None,
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(
            v,
            json!({
                "state": "STOPPED",
                "duration": "30s",
                "downloadURL": "https://b/api/v1/recordings/x.jfr"
            })
        );
    }

    #[test]
    fn spec_deserializes_from_manifest_fields() {
        let spec: RecordingSpec = serde_json::from_value(json!({
            "name": "test-recording",
            "eventOptions": ["jdk.socketRead:enabled=true"],
            "duration": "30s",
            "state": "STOPPED",
            "archive": true,
            "flightRecorder": {"name": "jmx-app"}
        }))
        .unwrap();
        assert_eq!(spec.duration_secs(), Ok(30));
        assert!(spec.wants_stopped());
        assert!(spec.archive);
        assert_eq!(spec.flight_recorder.unwrap().name, "jmx-app");
    }

    #[test]
    fn states_parse_strictly_and_are_ordered() {
        assert_eq!("RUNNING".parse(), Ok(RecordingState::Running));
        assert_eq!(
            "running".parse::<RecordingState>(),
            Err(UnknownState("running".into()))
        );
        assert!(RecordingState::Created < RecordingState::Running);
        assert!(RecordingState::Stopping < RecordingState::Stopped);
    }

    #[test]
    fn missing_or_zero_duration_is_continuous() {
        let mut spec = RecordingSpec::default();
        assert_eq!(spec.duration_secs(), Ok(0));
        spec.duration = Some("0s".into());
        assert_eq!(spec.duration_secs(), Ok(0));
        spec.duration = Some("soon".into());
        assert!(spec.duration_secs().is_err());
    }
}
