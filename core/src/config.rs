//! Client configuration.

use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_USER_AGENT: &str = concat!("stack-client/", env!("CARGO_PKG_VERSION"));

/// Everything a `Client` needs besides its transport.
///
/// `server_url` is used verbatim as the prefix of every request URL; it is
/// not normalized, so pass it without a trailing slash.
#[derive(Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub api_key: SecretString,
    /// Whole-request timeout for the default transport. `None` waits forever.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: SecretString::new(api_key.into()),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_does_not_leak_api_key() {
        let config = ClientConfig::new("https://host", "key123").with_timeout(Duration::from_secs(5));
        let printed = format!("{config:?}");
        assert!(!printed.contains("key123"));
        assert!(printed.contains("https://host"));
    }
}
