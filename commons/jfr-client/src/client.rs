use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::backend::RecordingBackend;
use crate::config::BackendConfig;
use crate::correlation::IdGenerator;
use crate::error::{ClientError, TransportError};
use crate::types::{
    CommandMessage, EventInfo, RecordingDescriptor, ResponseMessage,
    SavedRecording, Target, escape_segment,
};

/// Header carrying the correlation id of each command.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientUrl {
    client_url: String,
}

/// One authenticated session against the recording service.
///
/// Holds the command base URL discovered at connect time. After any
/// transport failure the channel must be dropped, never reused.
pub struct CommandChannel {
    http: reqwest::Client,
    base: String,
    token: String,
    ids: Arc<dyn IdGenerator>,
    cancel: CancellationToken,
    last: Option<CommandMessage>,
    closed: bool,
}

impl CommandChannel {
    #[instrument(skip_all, fields(backend = %cfg.url))]
    pub async fn connect(
        cfg: &BackendConfig,
        ids: Arc<dyn IdGenerator>,
        cancel: CancellationToken,
    ) -> Result<Self, ClientError> {
        let management = cfg.management_base()?;
        let token = cfg.resolve_token()?;
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .danger_accept_invalid_certs(cfg.insecure_tls)
            .build()?;
        let mut channel = Self {
            http,
            base: management.clone(),
            token,
            ids,
            cancel,
            last: None,
            closed: false,
        };

        let msg = channel.message("clienturl", None, vec![]);
        let req = channel
            .http
            .get(format!("{}/api/v1/clienturl", management));
        let discovered: ClientUrl = channel
            .execute(msg, req)
            .await?
            .into_json()
            .map_err(|e| ClientError::Discovery(e.to_string()))?;
        channel.base = command_base(&discovered.client_url)?;
        info!(base = %channel.base, "command channel connected");
        Ok(channel)
    }

    /// Base URL all command paths are built on.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Most recent command put on the wire.
    pub fn last_command(&self) -> Option<&CommandMessage> {
        self.last.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn message(
        &self,
        command: &str,
        target: Option<&Target>,
        args: Vec<String>,
    ) -> CommandMessage {
        CommandMessage {
            id: self.ids.next_id(),
            command: command.to_string(),
            target_id: target.map(|t| t.as_str().to_string()),
            args,
        }
    }

    fn targeted(
        &self,
        target: &Target,
        resource: &str,
        name: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/api/v1/targets/{}/{}",
            self.base,
            target.escaped(),
            resource
        );
        if let Some(n) = name {
            url.push('/');
            url.push_str(&escape_segment(n));
        }
        url
    }

    fn global(&self, resource: &str, name: Option<&str>) -> String {
        let mut url = format!("{}/api/v1/{}", self.base, resource);
        if let Some(n) = name {
            url.push('/');
            url.push_str(&escape_segment(n));
        }
        url
    }

    async fn execute(
        &mut self,
        msg: CommandMessage,
        req: RequestBuilder,
    ) -> Result<ResponseMessage, ClientError> {
        if self.closed {
            return Err(TransportError::Closed.into());
        }
        debug!(
            request_id = %msg.id,
            command = %msg.command,
            target = ?msg.target_id,
            args = ?msg.args,
            "backend request"
        );
        let req = req
            .bearer_auth(&self.token)
            .header(REQUEST_ID_HEADER, msg.id.as_str());
        self.last = Some(msg.clone());
        let exchange = async {
            let resp = req.send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(TransportError::Cancelled.into());
            }
            res = exchange => res?,
        };
        debug!(
            request_id = %msg.id,
            command = %msg.command,
            status = status.as_u16(),
            "backend response"
        );
        ResponseMessage::from_http(&msg, status, body)
    }

    async fn create(
        &mut self,
        command: &str,
        target: &Target,
        name: &str,
        seconds: Option<u64>,
        events: &[String],
    ) -> Result<(), ClientError> {
        let events = events.join(",");
        let mut args = vec![name.to_string(), events.clone()];
        let mut form = vec![
            ("recordingName", name.to_string()),
            ("events", events),
        ];
        if let Some(s) = seconds {
            args.push(s.to_string());
            form.push(("duration", s.to_string()));
        }
        let msg = self.message(command, Some(target), args);
        let req = self
            .http
            .post(self.targeted(target, "recordings", None))
            .form(&form);
        self.execute(msg, req).await?.into_unit()
    }

    async fn patch(
        &mut self,
        target: &Target,
        name: &str,
        verb: &str,
    ) -> Result<ResponseMessage, ClientError> {
        let msg = self.message(verb, Some(target), vec![name.to_string()]);
        let req = self
            .http
            .patch(self.targeted(target, "recordings", Some(name)))
            .header(CONTENT_TYPE, "text/plain")
            .body(verb.to_string());
        self.execute(msg, req).await
    }
}

#[async_trait]
impl RecordingBackend for CommandChannel {
    async fn list_recordings(
        &mut self,
        target: &Target,
    ) -> Result<Vec<RecordingDescriptor>, ClientError> {
        let msg = self.message("list", Some(target), vec![]);
        let req = self.http.get(self.targeted(target, "recordings", None));
        self.execute(msg, req).await?.into_json()
    }

    async fn dump_recording(
        &mut self,
        target: &Target,
        name: &str,
        seconds: u64,
        events: &[String],
    ) -> Result<(), ClientError> {
        self.create("dump", target, name, Some(seconds), events)
            .await
    }

    async fn start_recording(
        &mut self,
        target: &Target,
        name: &str,
        events: &[String],
    ) -> Result<(), ClientError> {
        self.create("start", target, name, None, events).await
    }

    async fn stop_recording(
        &mut self,
        target: &Target,
        name: &str,
    ) -> Result<(), ClientError> {
        self.patch(target, name, "stop").await?.into_unit()
    }

    async fn save_recording(
        &mut self,
        target: &Target,
        name: &str,
    ) -> Result<String, ClientError> {
        let filename = self.patch(target, name, "save").await?.into_text()?;
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ClientError::Protocol {
                command: "save".into(),
                reason: "empty archive filename".into(),
                raw: String::new(),
            });
        }
        Ok(filename.to_string())
    }

    async fn list_saved_recordings(
        &mut self,
    ) -> Result<Vec<SavedRecording>, ClientError> {
        let msg = self.message("list-saved", None, vec![]);
        let req = self.http.get(self.global("recordings", None));
        self.execute(msg, req).await?.into_json()
    }

    async fn delete_recording(
        &mut self,
        target: &Target,
        name: &str,
    ) -> Result<(), ClientError> {
        let msg = self.message("delete", Some(target), vec![name.into()]);
        let req = self
            .http
            .delete(self.targeted(target, "recordings", Some(name)));
        self.execute(msg, req).await?.into_unit()
    }

    async fn delete_saved_recording(
        &mut self,
        filename: &str,
    ) -> Result<(), ClientError> {
        let msg = self.message("delete-saved", None, vec![filename.into()]);
        let req = self.http.delete(self.global("recordings", Some(filename)));
        self.execute(msg, req).await?.into_unit()
    }

    async fn list_event_types(
        &mut self,
        target: &Target,
    ) -> Result<Vec<EventInfo>, ClientError> {
        let msg = self.message("list-event-types", Some(target), vec![]);
        let req = self.http.get(self.targeted(target, "events", None));
        self.execute(msg, req).await?.into_json()
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            info!(base = %self.base, "command channel closed");
        }
    }
}

/// Reduce the advertised client URL (often a `ws(s)://…/api/v1/command`
/// socket address) to the HTTP(S) base REST paths hang off. A path prefix
/// in front of `/api/` is kept for backends served below a sub-path.
pub(crate) fn command_base(client_url: &str) -> Result<String, ClientError> {
    let mut url = Url::parse(client_url.trim()).map_err(|e| {
        ClientError::Discovery(format!(
            "invalid clientUrl {:?}: {}",
            client_url, e
        ))
    })?;
    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(ClientError::Discovery(format!(
                "unsupported clientUrl scheme {:?}",
                other
            )));
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        ClientError::Discovery(format!("cannot rewrite scheme of {}", url))
    })?;
    let prefix = url
        .path()
        .find("/api/")
        .map(|i| url.path()[..i].trim_end_matches('/'))
        .unwrap_or_default();
    Ok(format!("{}{}", url.origin().ascii_serialization(), prefix))
}
