use std::collections::BTreeMap;

use jfr_client::{EventInfo, OptionDescriptor};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default,
)]
#[kube(
    group = "rhjmc.redhat.com",
    version = "v1alpha2",
    kind = "FlightRecorder",
    plural = "flightrecorders",
    namespaced,
    status = "FlightRecorderStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecorderSpec {
    /// Labels selecting the Recordings that belong to this recorder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_selector: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecorderStatus {
    /// Service fronting the target JVM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ServiceRef>,
    /// JMX port on the target Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Event types the target JVM can record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventType>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct ServiceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub type_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, EventOption>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub default_value: String,
}

impl From<&OptionDescriptor> for EventOption {
    fn from(o: &OptionDescriptor) -> Self {
        Self {
            name: o.name.clone(),
            description: o.description.clone(),
            default_value: o.default_value.clone(),
        }
    }
}

impl From<&EventInfo> for EventType {
    fn from(e: &EventInfo) -> Self {
        Self {
            type_id: e.type_id.clone(),
            name: e.name.clone(),
            description: e.description.clone(),
            category: e.category.clone(),
            options: e
                .options
                .iter()
                .map(|(k, v)| (k.clone(), EventOption::from(v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn crd_metadata() {
        let crd = FlightRecorder::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("flightrecorders.rhjmc.redhat.com")
        );
        assert_eq!(crd.spec.names.kind, "FlightRecorder");
    }

    #[test]
    fn event_info_maps_to_status_event_type() {
        let info = EventInfo {
            type_id: "jdk.SocketRead".into(),
            name: "Socket Read".into(),
            description: String::new(),
            category: vec!["Java Application".into()],
            options: [(
                "enabled".to_string(),
                OptionDescriptor {
                    name: "Enabled".into(),
                    description: "Record event".into(),
                    default_value: "false".into(),
                },
            )]
            .into_iter()
            .collect(),
        };
        let ev = EventType::from(&info);
        assert_eq!(ev.type_id, "jdk.SocketRead");
        assert_eq!(ev.options["enabled"].default_value, "false");
        let v = serde_json::to_value(&ev).unwrap();
        assert!(v.get("description").is_none());
        assert_eq!(v["typeId"], "jdk.SocketRead");
    }
}
