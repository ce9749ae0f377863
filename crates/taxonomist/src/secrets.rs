//! Credential resolution for LLM endpoints.
//!
//! An API key may come from one of three places, checked in this order:
//!
//! 1. **Inline value** (`api_key`), for local experiments
//! 2. **File** (`api_key_file`), for mounted Docker/Kubernetes secrets
//! 3. **Environment variable** (`api_key_env`), for CI and production

use secrecy::SecretString;

use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source configured (need an inline value, a file path, or an env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// The configured places a secret may be read from. Empty strings count as
/// unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub inline: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn is_configured(&self) -> bool {
        [self.inline, self.file, self.env_var]
            .iter()
            .any(|s| non_empty(*s).is_some())
    }

    /// Resolve the secret, failing when nothing is configured.
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = non_empty(self.inline) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(self.file) {
            let expanded = expand_home(path);
            let content =
                std::fs::read_to_string(&expanded).map_err(|e| SecretError::FileRead {
                    path: expanded.clone(),
                    source: e,
                })?;
            return Ok(SecretString::from(content.trim().to_string()));
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`SecretSource::resolve`], but an unconfigured source yields
    /// `None`. Local inference servers usually need no key.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<'a> From<&'a LlmConfig> for SecretSource<'a> {
    fn from(config: &'a LlmConfig) -> Self {
        Self {
            inline: config.api_key.as_deref(),
            file: config.api_key_file.as_deref(),
            env_var: config.api_key_env.as_deref(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Expands a leading `~` to the home directory (HOME, then USERPROFILE).
/// `~user` forms are left untouched.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
