use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default host substrings accepted in the `Origin` header of SSE connections
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["localhost", "127.0.0.1"];

/// Transport the server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// HTTP with Server-Sent Events
    Sse,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "sse" => Ok(Transport::Sse),
            "stdio" => Ok(Transport::Stdio),
            _ => Err(anyhow::anyhow!(
                "Invalid transport '{}'. Valid options: sse, stdio",
                s
            )),
        }
    }
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Sse => "sse",
            Transport::Stdio => "stdio",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of an actor's dataset a tool returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// A handful of trimmed records, small enough for chat clients and n8n
    Summary,
    /// Every record plus run metadata
    Full,
}

impl FromStr for ResultMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "summary" => Ok(ResultMode::Summary),
            "full" => Ok(ResultMode::Full),
            _ => Err(anyhow::anyhow!(
                "Invalid result mode '{}'. Valid options: summary, full",
                s
            )),
        }
    }
}

impl ResultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultMode::Summary => "summary",
            ResultMode::Full => "full",
        }
    }
}

impl fmt::Display for ResultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub apify_token: Option<String>,
    pub apify_base_url: String,
    pub actor_wait_secs: u64,
    pub heartbeat_secs: u64,
    pub allowed_origins: Vec<String>,
    pub result_mode: ResultMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Sse,
            host: "127.0.0.1".to_string(),
            port: 4000,
            apify_token: None,
            apify_base_url: "https://api.apify.com".to_string(),
            actor_wait_secs: 60,
            heartbeat_secs: 30,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            result_mode: ResultMode::Summary,
        }
    }
}

impl Config {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// DNS-rebinding guard: an origin passes when it mentions an allow-listed host.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| origin.contains(allowed.as_str()))
    }
}
