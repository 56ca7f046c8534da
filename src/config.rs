use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::client::ClientConfig;
use crate::credentials::default_credentials_path;

pub const DEFAULT_API_URL: &str = "https://earthengine.googleapis.com";

pub(crate) const API_URL_ENV: &str = "EARTHENGINE_API_URL";
pub(crate) const PROJECT_ENV: &str = "EARTHENGINE_PROJECT";
pub(crate) const CREDENTIALS_ENV: &str = "EARTHENGINE_CREDENTIALS";

/// Resolves the client configuration from explicit values and the process
/// environment.
pub fn load_config(
    url: Option<String>,
    project: Option<String>,
    verify: Option<bool>,
) -> ClientConfig {
    resolve_config(url, project, verify, |name| std::env::var(name).ok())
}

/// Precedence: explicit argument, then environment, then default.
///
/// The project may stay unset here; the session falls back to the quota
/// project of the credentials.
pub(crate) fn resolve_config<F>(
    url: Option<String>,
    project: Option<String>,
    verify: Option<bool>,
    env: F,
) -> ClientConfig
where
    F: Fn(&str) -> Option<String>,
{
    let url = url
        .or_else(|| env(API_URL_ENV))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let project = project
        .or_else(|| env(PROJECT_ENV))
        .filter(|v| !v.trim().is_empty());

    ClientConfig {
        url,
        project,
        verify: verify.unwrap_or(true),
    }
}

/// Picks the credential file path: explicit, then `EARTHENGINE_CREDENTIALS`,
/// then `~/.config/earthengine/credentials`.
pub fn credentials_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    resolve_credentials_path(explicit, |name| std::env::var(name).ok())
}

pub(crate) fn resolve_credentials_path<F>(explicit: Option<PathBuf>, env: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = explicit {
        return Ok(p);
    }
    if let Some(p) = env(CREDENTIALS_ENV).filter(|v| !v.trim().is_empty()) {
        return Ok(PathBuf::from(p));
    }
    match default_credentials_path() {
        Some(p) => Ok(p),
        None => bail!(
            "Missing configuration: credential file (set {} or pass --credentials-file; no home directory found)",
            CREDENTIALS_ENV
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let cfg = resolve_config(None, None, None, env_of(&[]));
        assert_eq!(cfg.url, DEFAULT_API_URL);
        assert_eq!(cfg.project, None);
        assert!(cfg.verify);
    }

    #[test]
    fn env_overrides_defaults() {
        let env = env_of(&[(API_URL_ENV, "http://localhost:8080"), (PROJECT_ENV, "env-proj")]);
        let cfg = resolve_config(None, None, Some(false), env);
        assert_eq!(cfg.url, "http://localhost:8080");
        assert_eq!(cfg.project.as_deref(), Some("env-proj"));
        assert!(!cfg.verify);
    }

    #[test]
    fn explicit_values_win_over_env() {
        let env = env_of(&[(API_URL_ENV, "http://env"), (PROJECT_ENV, "env-proj")]);
        let cfg = resolve_config(
            Some("http://explicit".into()),
            Some("explicit-proj".into()),
            None,
            env,
        );
        assert_eq!(cfg.url, "http://explicit");
        assert_eq!(cfg.project.as_deref(), Some("explicit-proj"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let env = env_of(&[(API_URL_ENV, " "), (PROJECT_ENV, "")]);
        let cfg = resolve_config(None, None, None, env);
        assert_eq!(cfg.url, DEFAULT_API_URL);
        assert_eq!(cfg.project, None);
    }

    #[test]
    fn credentials_path_precedence() {
        let env = env_of(&[(CREDENTIALS_ENV, "/tmp/from-env")]);
        let p = resolve_credentials_path(Some(PathBuf::from("/tmp/explicit")), &env).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/explicit"));
        let p = resolve_credentials_path(None, &env).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/from-env"));
    }
}
