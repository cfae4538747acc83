// Configuration module: which instance we talk to, where its endpoints
// live and which token authenticates us.

use crate::error::{Result, UploadError};
use std::fmt;

pub const PRODUCTION_URL: &str = "https://zenodo.org";
pub const SANDBOX_URL: &str = "https://sandbox.zenodo.org";

/// The two deployments of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    Production,
    Sandbox,
}

impl Instance {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    /// Environment variable holding the token for this instance.
    pub fn token_var(self) -> &'static str {
        match self {
            Self::Production => "ZENODO_TOKEN",
            Self::Sandbox => "ZENODO_SANDBOX_TOKEN",
        }
    }

    pub fn web_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_URL,
            Self::Sandbox => SANDBOX_URL,
        }
    }
}

/// Bearer token for the service. Never printed.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Everything the client needs to reach one instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub instance: Instance,
    /// Base of the REST API, without a trailing slash.
    pub api_url: String,
    /// Base of the web UI, used for remediation links.
    pub web_url: String,
    pub credential: Credential,
    /// Request timeout in seconds; `None` disables it.
    pub timeout_secs: Option<u64>,
}

impl ServiceConfig {
    /// Resolve the configuration from the process environment.
    pub fn from_env(instance: Instance, api_override: Option<String>) -> Result<Self> {
        Self::resolve(instance, api_override, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration, reading variables through `lookup`.
    ///
    /// An unset or empty token variable is a configuration error.
    pub fn resolve<F>(instance: Instance, api_override: Option<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = instance.token_var();
        let token = lookup(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| UploadError::Configuration(format!("Set {var} environment variable")))?;

        let web_url = instance.web_url().to_string();
        let api_url = match api_override {
            Some(url) => {
                let url = url.trim_end_matches('/').to_string();
                reqwest::Url::parse(&url).map_err(|err| {
                    UploadError::Configuration(format!("invalid API URL {url:?}: {err}"))
                })?;
                url
            }
            None => format!("{web_url}/api"),
        };

        Ok(Self {
            instance,
            api_url,
            web_url,
            credential: Credential::new(token),
            timeout_secs: None,
        })
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Where a user creates a new personal access token.
    pub fn token_settings_url(&self) -> String {
        format!("{}/account/settings/applications/", self.web_url)
    }
}
