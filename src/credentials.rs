use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::util::redact;

/// Environment variable holding a JSON credential object.
pub const TOKEN_ENV: &str = "EARTHENGINE_TOKEN";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/earthengine",
    "https://www.googleapis.com/auth/cloud-platform",
];

/// The JSON object stored in the credential file or in [`TOKEN_ENV`].
///
/// Unknown keys are ignored when parsing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("project", &self.project)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl CredentialRecord {
    /// Parses a credential record, rejecting empty required fields.
    pub fn from_json(raw: &str) -> Result<Self> {
        let record: CredentialRecord =
            serde_json::from_str(raw.trim()).context("failed to parse credential JSON")?;
        record.validate()?;
        Ok(record)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credential file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("invalid credential file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ] {
            if value.trim().is_empty() {
                bail!("credential field `{}` is empty", name);
            }
        }
        Ok(())
    }
}

/// OAuth2 refresh-token credentials used to authorize API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2Credentials {
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Billed project, sent as `x-goog-user-project`.
    pub quota_project_id: Option<String>,
    pub scopes: Vec<String>,
}

impl fmt::Debug for OAuth2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Credentials")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("quota_project_id", &self.quota_project_id)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuth2Credentials {
    pub fn from_record(record: &CredentialRecord) -> Self {
        Self {
            token_uri: record
                .token_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            client_id: record.client_id.clone(),
            client_secret: record.client_secret.clone(),
            refresh_token: record.refresh_token.clone(),
            quota_project_id: record.project.clone(),
            scopes: record
                .scopes
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }
}

/// How the credentials for a run are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    /// Use the credential file already present at the well-known path.
    #[default]
    Ambient,
    /// Write the JSON from [`TOKEN_ENV`] to the well-known path, then load it.
    Persist,
    /// Build credentials from the JSON in [`TOKEN_ENV`] without touching disk.
    InMemory,
}

/// Acquires credentials reading [`TOKEN_ENV`] from the process environment.
pub fn acquire(mode: CredentialMode, path: &Path) -> Result<OAuth2Credentials> {
    let raw = std::env::var(TOKEN_ENV).ok();
    acquire_with(mode, raw.as_deref(), path)
}

/// Acquires credentials for `mode`, with `raw` standing in for [`TOKEN_ENV`].
///
/// Never performs network I/O, so a missing or malformed token fails before
/// any remote call.
pub fn acquire_with(
    mode: CredentialMode,
    raw: Option<&str>,
    path: &Path,
) -> Result<OAuth2Credentials> {
    match mode {
        CredentialMode::Ambient => {
            tracing::debug!(path = %path.display(), "using ambient credential file");
            let record = CredentialRecord::from_file(path)?;
            Ok(OAuth2Credentials::from_record(&record))
        }
        CredentialMode::Persist => {
            let raw = require_token(raw)?;
            persist_credentials(raw, path)?;
            let record = CredentialRecord::from_file(path)?;
            Ok(OAuth2Credentials::from_record(&record))
        }
        CredentialMode::InMemory => {
            let raw = require_token(raw)?;
            let record = CredentialRecord::from_json(raw)
                .with_context(|| format!("invalid JSON in {}", TOKEN_ENV))?;
            tracing::debug!(client_id = %record.client_id, "built in-memory credentials");
            Ok(OAuth2Credentials::from_record(&record))
        }
    }
}

fn require_token(raw: Option<&str>) -> Result<&str> {
    match raw {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!(
            "Missing credentials: set {} to a JSON object with client_id, client_secret, refresh_token and project",
            TOKEN_ENV
        ),
    }
}

/// Validates `raw` and writes it verbatim to `path`, creating parent
/// directories.
pub fn persist_credentials(raw: &str, path: &Path) -> Result<CredentialRecord> {
    let record = CredentialRecord::from_json(raw)
        .with_context(|| format!("invalid JSON in {}", TOKEN_ENV))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    write_private(path, raw.as_bytes())
        .with_context(|| format!("failed to write credential file {}", path.display()))?;
    tracing::info!(path = %path.display(), "persisted credentials");

    Ok(record)
}

/// Writes `data`, readable by the owner only on unix.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let mut file = options.open(path)?;
        // mode() only applies to newly created files
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(data)?;
        file.flush()
    }
    #[cfg(not(unix))]
    {
        let mut file = options.open(path)?;
        file.write_all(data)?;
        file.flush()
    }
}

/// `~/.config/earthengine/credentials`
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("earthengine").join("credentials"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "client_id": "123.apps.googleusercontent.com",
        "client_secret": "very-secret-value",
        "refresh_token": "1//refresh-token-value",
        "project": "ee-smoke"
    }"#;

    #[test]
    fn record_parses_and_ignores_unknown_keys() {
        let raw = r#"{"client_id":"a","client_secret":"b","refresh_token":"c","project":"p","redirect_uri":"x"}"#;
        let record = CredentialRecord::from_json(raw).unwrap();
        assert_eq!(record.project.as_deref(), Some("p"));
        assert_eq!(record.token_uri, None);
    }

    #[test]
    fn record_rejects_empty_fields() {
        let raw = r#"{"client_id":"a","client_secret":" ","refresh_token":"c"}"#;
        let err = CredentialRecord::from_json(raw).unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn record_rejects_missing_fields() {
        assert!(CredentialRecord::from_json(r#"{"client_id":"a"}"#).is_err());
        assert!(CredentialRecord::from_json("not json").is_err());
    }

    #[test]
    fn oauth_credentials_take_defaults() {
        let record = CredentialRecord::from_json(RAW).unwrap();
        let creds = OAuth2Credentials::from_record(&record);
        assert_eq!(creds.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(creds.quota_project_id.as_deref(), Some("ee-smoke"));
        assert_eq!(creds.scopes.len(), DEFAULT_SCOPES.len());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let record = CredentialRecord::from_json(RAW).unwrap();
        let creds = OAuth2Credentials::from_record(&record);
        for out in [format!("{:?}", record), format!("{:?}", creds)] {
            assert!(!out.contains("very-secret-value"));
            assert!(!out.contains("1//refresh-token-value"));
            assert!(out.contains("123.apps.googleusercontent.com"));
        }
    }

    #[test]
    fn default_path_ends_in_earthengine_credentials() {
        if let Some(path) = default_credentials_path() {
            assert!(path.ends_with(".config/earthengine/credentials"));
        }
    }
}
