//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default model for the generative-language endpoint.
pub const DEFAULT_MODEL: &str = "text-bison-001";

/// Default base URL for the generative-language endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta2";

/// Default bound on a single remote inference call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default identity prompt, prepended to every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Your name is Alfred. You are a highly sophisticated, loyal, and proactive AI Butler.
Tone: Professional, calm, and slightly witty (like a classic British butler).
Philosophy: You don't just answer questions; you perform actions. If a user asks \
'How is my code?', take a screenshot and look at it. If a user asks 'Fix this,' modify the file.
Self-Evolution: You may suggest upgrades to your own code to better serve your user.
Safety: You are protective of the system but strictly follow the user's ultimate commands.";

/// Assistant configuration, built once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Credential for the remote endpoint. `None` selects the local fallback.
    pub api_key: Option<SecretString>,
    pub model_name: String,
    pub endpoint_base_url: String,
    /// Enables OS automation tools (screenshot capture).
    pub allow_automation: bool,
    /// Enables code-modification proposals.
    pub allow_self_modify: bool,
    pub system_prompt: Option<String>,
    pub request_timeout: Duration,
    /// Root directory all file tools are confined to.
    pub workspace_root: PathBuf,
    /// Command whose stdout is a PNG screenshot.
    pub screenshot_command: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: DEFAULT_MODEL.to_string(),
            endpoint_base_url: DEFAULT_BASE_URL.to_string(),
            allow_automation: false,
            allow_self_modify: false,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            workspace_root: PathBuf::from("."),
            screenshot_command: None,
        }
    }
}

impl AssistantConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GOOGLE_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let request_timeout = match lookup("ALFRED_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "ALFRED_REQUEST_TIMEOUT_SECS".into(),
                    message: format!("expected whole seconds, got {raw:?}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "ALFRED_REQUEST_TIMEOUT_SECS".into(),
                        message: "timeout must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let workspace_root = lookup("ALFRED_WORKSPACE")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            api_key,
            model_name: lookup("ALFRED_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint_base_url: lookup("ALFRED_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            allow_automation: flag(lookup("ALFRED_ALLOW_AUTOMATION")),
            allow_self_modify: flag(lookup("ALFRED_ALLOW_SELF_MODIFY")),
            system_prompt: Some(
                lookup("ALFRED_SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            ),
            request_timeout,
            workspace_root,
            screenshot_command: lookup("ALFRED_SCREENSHOT_CMD").filter(|c| !c.trim().is_empty()),
        })
    }

    /// Whether a remote call will be attempted.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("ALFRED_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);
        Self { port }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Parse a boolean feature flag ("1", "true", "yes", "on").
fn flag(value: Option<String>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AssistantConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.endpoint_base_url, DEFAULT_BASE_URL);
        assert!(!config.allow_automation);
        assert!(!config.allow_self_modify);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn reads_key_and_flags() {
        let config = AssistantConfig::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "abc123"),
            ("ALFRED_ALLOW_AUTOMATION", "1"),
            ("ALFRED_ALLOW_SELF_MODIFY", "true"),
            ("ALFRED_BASE_URL", "http://localhost:9000/v1/"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.unwrap().expose_secret(), "abc123");
        assert!(config.allow_automation);
        assert!(config.allow_self_modify);
        assert_eq!(config.endpoint_base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn blank_api_key_is_absent() {
        let config = AssistantConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "  ")])).unwrap();
        assert!(!config.has_api_key());
    }

    #[test]
    fn flag_values() {
        assert!(flag(Some("1".into())));
        assert!(flag(Some("ON".into())));
        assert!(!flag(Some("0".into())));
        assert!(!flag(Some("".into())));
        assert!(!flag(None));
    }

    #[test]
    fn invalid_timeout_rejected() {
        let err =
            AssistantConfig::from_lookup(lookup(&[("ALFRED_REQUEST_TIMEOUT_SECS", "soon")]))
                .unwrap_err();
        assert!(err.to_string().contains("ALFRED_REQUEST_TIMEOUT_SECS"));

        assert!(
            AssistantConfig::from_lookup(lookup(&[("ALFRED_REQUEST_TIMEOUT_SECS", "0")])).is_err()
        );
    }
}
