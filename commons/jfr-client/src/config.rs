use envconfig::Envconfig;

use crate::error::ClientError;

#[derive(Envconfig, Clone, Debug)]
pub struct BackendConfig {
    /// Management endpoint of the recording service, e.g.
    /// `https://jfr-backend.jfr.svc:8181`. The command base URL is
    /// discovered from here once per session.
    /// Env: JFR_BACKEND_URL
    #[envconfig(from = "JFR_BACKEND_URL")]
    pub url: String,

    /// Explicit bearer token. When absent the service-account token file
    /// is read on every connect so rotated tokens are picked up.
    #[envconfig(from = "JFR_BACKEND_TOKEN")]
    pub token: Option<String>,

    #[envconfig(
        from = "JFR_BACKEND_TOKEN_PATH",
        default = "/var/run/secrets/kubernetes.io/serviceaccount/token"
    )]
    pub token_path: String,

    /// Per-request timeout in seconds.
    /// Env: JFR_BACKEND_TIMEOUT_SECS
    #[envconfig(from = "JFR_BACKEND_TIMEOUT_SECS", default = "10")]
    pub timeout_secs: u64,

    /// Accept self-signed backend certificates.
    /// Env: JFR_BACKEND_INSECURE_TLS
    #[envconfig(from = "JFR_BACKEND_INSECURE_TLS", default = "false")]
    pub insecure_tls: bool,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            token_path: "/var/run/secrets/kubernetes.io/serviceaccount/token"
                .into(),
            timeout_secs: 10,
            insecure_tls: false,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The operator authenticates as itself, never on behalf of a user.
    pub fn resolve_token(&self) -> Result<String, ClientError> {
        if let Some(t) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(t.to_string());
        }
        let raw = std::fs::read_to_string(&self.token_path).map_err(|e| {
            ClientError::Config(format!(
                "cannot read service account token {}: {}",
                self.token_path, e
            ))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(ClientError::Config(format!(
                "service account token {} is empty",
                self.token_path
            )));
        }
        Ok(token.to_string())
    }

    pub(crate) fn management_base(&self) -> Result<String, ClientError> {
        let url = self.url.trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "backend url must start with http:// or https://, got {:?}",
                self.url
            )));
        }
        Ok(url.to_string())
    }
}
