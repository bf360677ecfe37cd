use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ClientError;

// Everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn escape_segment(s: &str) -> String {
    utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

/// JVM management endpoint addressed by targeted commands (`host:port`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// IPv6 literals are bracketed so the port stays unambiguous.
    pub fn new(host: &str, port: u16) -> Self {
        if host.contains(':') && !host.starts_with('[') {
            Self(format!("[{}]:{}", host, port))
        } else {
            Self(format!("{}:{}", host, port))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Single path segment form used in `/api/v1/targets/{target}`.
    pub fn escaped(&self) -> String {
        escape_segment(&self.0)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request envelope; one per backend call, tagged with a correlation id.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    pub id: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

/// Reply envelope correlated to a [`CommandMessage`]. Negative status is an
/// application error whose payload carries the backend's message.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseMessage {
    pub id: String,
    pub command_name: String,
    pub status: i32,
    pub payload: Payload,
}

impl ResponseMessage {
    /// Build the reply for `request` from a raw HTTP exchange. Bodies that
    /// already use the `{id, commandName, status, payload}` envelope are
    /// unwrapped; anything else is taken as the bare payload.
    pub fn from_http(
        request: &CommandMessage,
        http_status: StatusCode,
        body: String,
    ) -> Result<Self, ClientError> {
        if !http_status.is_success() {
            return Ok(Self {
                id: request.id.clone(),
                command_name: request.command.clone(),
                status: -i32::from(http_status.as_u16()),
                payload: Payload::Text(body.trim().to_string()),
            });
        }
        let value = match serde_json::from_str::<Value>(&body) {
            Ok(v) => v,
            Err(_) => {
                return Ok(Self {
                    id: request.id.clone(),
                    command_name: request.command.clone(),
                    status: 0,
                    payload: Payload::Text(body.trim().to_string()),
                });
            }
        };
        let envelope = value.as_object().and_then(|o| {
            let status = o.get("status")?.as_i64()?;
            let payload = o.get("payload")?.clone();
            let id = o.get("id").and_then(|v| v.as_str()).map(str::to_string);
            Some((status, payload, id))
        });
        match envelope {
            Some((status, payload, id)) => {
                if let Some(ref id) = id {
                    if id != &request.id {
                        return Err(ClientError::Protocol {
                            command: request.command.clone(),
                            reason: format!(
                                "correlation id mismatch: sent {}, got {}",
                                request.id, id
                            ),
                            raw: body,
                        });
                    }
                }
                let payload = match payload {
                    Value::String(s) => Payload::Text(s),
                    other => Payload::Json(other),
                };
                Ok(Self {
                    id: id.unwrap_or_else(|| request.id.clone()),
                    command_name: request.command.clone(),
                    status: status.clamp(i32::MIN as i64, i32::MAX as i64)
                        as i32,
                    payload,
                })
            }
            None => Ok(Self {
                id: request.id.clone(),
                command_name: request.command.clone(),
                status: 0,
                payload: Payload::Json(value),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status >= 0
    }

    fn into_success(self) -> Result<Self, ClientError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match self.payload {
            Payload::Text(s) => s,
            Payload::Json(v) => v.to_string(),
        };
        Err(ClientError::Application {
            command: self.command_name,
            request_id: self.id,
            status: self.status,
            message,
        })
    }

    /// Success with no interesting payload (start, dump, stop, delete).
    pub fn into_unit(self) -> Result<(), ClientError> {
        self.into_success().map(|_| ())
    }

    /// Plain-text result, e.g. the archive name returned by `save`.
    pub fn into_text(self) -> Result<String, ClientError> {
        Ok(match self.into_success()?.payload {
            Payload::Text(s) => s,
            Payload::Json(Value::String(s)) => s,
            Payload::Json(other) => other.to_string(),
        })
    }

    /// Structured result; a body of the wrong shape is a protocol error with
    /// the raw content attached.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let resp = self.into_success()?;
        match resp.payload {
            Payload::Json(v) => {
                serde_json::from_value::<T>(v.clone()).map_err(|e| {
                    ClientError::Protocol {
                        command: resp.command_name,
                        reason: e.to_string(),
                        raw: v.to_string(),
                    }
                })
            }
            Payload::Text(raw) => Err(ClientError::Protocol {
                command: resp.command_name,
                reason: "expected a JSON body".into(),
                raw,
            }),
        }
    }
}

/// A recording as reported by the backend for one target.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDescriptor {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub state: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub start_time: i64,
    /// Milliseconds; zero for continuous recordings.
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub continuous: bool,
    #[serde(default)]
    pub to_disk: bool,
    #[serde(default)]
    pub max_size: i64,
    #[serde(default)]
    pub max_age: i64,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub report_url: String,
}

/// Archived recording held by the backend itself.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecording {
    pub name: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub report_url: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub type_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, OptionDescriptor>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptionDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(id: &str) -> CommandMessage {
        CommandMessage {
            id: id.into(),
            command: "list".into(),
            target_id: Some("10.0.0.7:9091".into()),
            args: vec![],
        }
    }

    #[test]
    fn target_escapes_colon_but_keeps_dots() {
        let t = Target::new("10.0.0.7", 9091);
        assert_eq!(t.as_str(), "10.0.0.7:9091");
        assert_eq!(t.escaped(), "10.0.0.7%3A9091");
        let dns = Target::new("app.ns.svc", 9091);
        assert_eq!(dns.escaped(), "app.ns.svc%3A9091");
    }

    #[test]
    fn target_brackets_ipv6_hosts() {
        let t = Target::new("fd00:10:96::a", 9091);
        assert_eq!(t.as_str(), "[fd00:10:96::a]:9091");
        assert_eq!(t.escaped(), "%5Bfd00%3A10%3A96%3A%3Aa%5D%3A9091");
        let already = Target::new("[fd00::1]", 9091);
        assert_eq!(already.as_str(), "[fd00::1]:9091");
    }

    #[test]
    fn non_success_http_becomes_negative_status() {
        let r = ResponseMessage::from_http(
            &req("3"),
            StatusCode::CONFLICT,
            "Recording with name \"foo\" already exists\n".into(),
        )
        .unwrap();
        assert_eq!(r.status, -409);
        match r.into_text() {
            Err(ClientError::Application {
                status,
                message,
                request_id,
                ..
            }) => {
                assert_eq!(status, -409);
                assert_eq!(request_id, "3");
                assert_eq!(
                    message,
                    "Recording with name \"foo\" already exists"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn envelope_with_negative_status_is_application_error() {
        let body = json!({
            "id": "9", "commandName": "dump", "status": -1,
            "payload": "Recording with name \"x\" already exists"
        })
        .to_string();
        let r = ResponseMessage::from_http(&req("9"), StatusCode::OK, body)
            .unwrap();
        assert!(!r.is_success());
        let err = r.into_json::<Vec<RecordingDescriptor>>().unwrap_err();
        assert!(matches!(err, ClientError::Application { status: -1, .. }));
    }

    #[test]
    fn envelope_with_foreign_id_is_rejected() {
        let body =
            json!({"id": "8", "status": 0, "payload": []}).to_string();
        let err = ResponseMessage::from_http(&req("9"), StatusCode::OK, body)
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));
    }

    #[test]
    fn text_body_where_json_expected_is_protocol_error() {
        let r = ResponseMessage::from_http(
            &req("1"),
            StatusCode::OK,
            "<html>proxy</html>".into(),
        )
        .unwrap();
        match r.into_json::<Vec<SavedRecording>>() {
            Err(ClientError::Protocol { raw, .. }) => {
                assert_eq!(raw, "<html>proxy</html>")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn json_string_body_is_read_as_text() {
        let r = ResponseMessage::from_http(
            &req("1"),
            StatusCode::OK,
            "\"saved-test-recording.jfr\"".into(),
        )
        .unwrap();
        assert_eq!(r.into_text().unwrap(), "saved-test-recording.jfr");
    }

    #[test]
    fn descriptor_decodes_backend_json() {
        let body = json!([{
            "id": 1, "name": "test-recording", "state": "RUNNING",
            "startTime": 1_600_000_000_000i64, "duration": 30000,
            "continuous": false, "toDisk": true, "maxSize": 0, "maxAge": 0,
            "downloadUrl": "https://b/api/v1/recordings/test-recording.jfr",
            "reportUrl": "https://b/api/v1/reports/test-recording.jfr"
        }])
        .to_string();
        let list: Vec<RecordingDescriptor> =
            ResponseMessage::from_http(&req("1"), StatusCode::OK, body)
                .unwrap()
                .into_json()
                .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].state, "RUNNING");
        assert_eq!(list[0].duration, 30000);
        assert!(list[0].to_disk);
    }
}
