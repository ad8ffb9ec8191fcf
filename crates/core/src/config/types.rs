use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration
///
/// Flat so that the documented environment variables (`ASVO_HOST`,
/// `ASVO_USER`, ...) map directly onto fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "text")]
    pub user: String,
    #[serde(default, deserialize_with = "text")]
    pub pass: String,
    /// Verify the server's TLS certificate (`SSL_VERIFY`, "1" = on).
    #[serde(default = "default_ssl_verify", deserialize_with = "flag")]
    pub ssl_verify: bool,
    /// Request timeout in seconds for API calls (downloads are not bounded).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Number of concurrent download workers.
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,
    /// How long the run loop waits for a result before re-checking
    /// whether every job has finished (milliseconds).
    #[serde(default = "default_result_poll")]
    pub result_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            pass: String::new(),
            ssl_verify: default_ssl_verify(),
            timeout_secs: default_timeout(),
            download_workers: default_download_workers(),
            result_poll_ms: default_result_poll(),
        }
    }
}

impl Config {
    /// Base URL of the REST API, without trailing slash.
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }

    /// URL of the job-results websocket.
    pub fn events_url(&self) -> String {
        format!("wss://{}:{}/api/job_results", self.host, self.port)
    }
}

fn default_host() -> String {
    "asvo.mwatelescope.org".to_string()
}

fn default_port() -> u16 {
    8778
}

fn default_ssl_verify() -> bool {
    true
}

fn default_timeout() -> u32 {
    60
}

fn default_download_workers() -> usize {
    4
}

fn default_result_poll() -> u64 {
    1000 // 1 second
}

/// Accept `true`/`false`, `1`/`0` and their string forms.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i == 1,
        Flag::Text(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
    })
}

/// Environment values that look numeric arrive as numbers; credentials are
/// always text.
fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Text::deserialize(deserializer)? {
        Text::Text(s) => s,
        Text::Int(i) => i.to_string(),
        Text::Float(f) => f.to_string(),
        Text::Bool(b) => b.to_string(),
    })
}

/// Sanitized config for log output (password redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password_configured: bool,
    pub ssl_verify: bool,
    pub download_workers: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password_configured: !config.pass.is_empty(),
            ssl_verify: config.ssl_verify,
            download_workers: config.download_workers,
        }
    }
}
