//! Restricted-data credential resolution.
//!
//! `restricted_data` in the configuration is either absent/empty (anonymous),
//! a single string (path of a token file) or a two-element list
//! (username/password). Tokens can expire mid-run: on an `Unauthorized`
//! classification the manager is invalidated once, the expiry is surfaced to
//! the caller exactly once, and the run continues anonymously for data that
//! is open.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// The configured `restricted_data` value, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RestrictedData {
    #[default]
    Anonymous,
    /// Path of a file holding an access token.
    TokenFile(String),
    /// `[username, password]`.
    UserPassword(Vec<String>),
}

impl RestrictedData {
    /// Empty strings and empty lists normalize to anonymous access.
    pub fn normalize(self) -> Result<RestrictedData, ConfigError> {
        match self {
            RestrictedData::TokenFile(s) if s.trim().is_empty() => Ok(RestrictedData::Anonymous),
            RestrictedData::UserPassword(v) if v.is_empty() => Ok(RestrictedData::Anonymous),
            RestrictedData::UserPassword(v) if v.len() != 2 => Err(ConfigError::Validation(
                format!("restricted_data: expected [user, password], got {} items", v.len()),
            )),
            other => Ok(other),
        }
    }
}

/// Authorization attached to outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer(String),
    Basic { username: String, password: String },
}

/// Resolves and tracks restricted-data access for one run.
pub struct CredentialManager {
    auth: Option<AuthScheme>,
    expired: AtomicBool,
}

impl CredentialManager {
    /// Resolve the configured spec. Token files are read once, here; a
    /// missing or unreadable token file is a configuration error.
    pub fn resolve(spec: &RestrictedData) -> Result<Self, ConfigError> {
        let auth = match spec {
            RestrictedData::Anonymous => None,
            RestrictedData::TokenFile(path) => {
                let token = std::fs::read_to_string(Path::new(path)).map_err(|e| {
                    ConfigError::Validation(format!("restricted_data: cannot read token file {path}: {e}"))
                })?;
                let token = token.trim().to_string();
                if token.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "restricted_data: token file {path} is empty"
                    )));
                }
                Some(AuthScheme::Bearer(token))
            }
            RestrictedData::UserPassword(pair) => Some(AuthScheme::Basic {
                username: pair[0].clone(),
                password: pair[1].clone(),
            }),
        };
        Ok(Self {
            auth,
            expired: AtomicBool::new(false),
        })
    }

    pub fn anonymous() -> Self {
        Self {
            auth: None,
            expired: AtomicBool::new(false),
        }
    }

    /// Credentials were supplied for this run (even if since expired).
    pub fn supplied(&self) -> bool {
        self.auth.is_some()
    }

    /// Authorization to attach to a waveform request, if still usable.
    pub fn auth(&self) -> Option<AuthScheme> {
        if self.expired.load(Ordering::Relaxed) {
            None
        } else {
            self.auth.clone()
        }
    }

    /// Invalidate after an `Unauthorized` exchange. Returns true on the
    /// first invalidation only, so expiry is reported once per run.
    pub fn invalidate(&self) -> bool {
        self.auth.is_some() && !self.expired.swap(true, Ordering::SeqCst)
    }

    /// Supplied credentials were rejected at some point during the run.
    pub fn expired(&self) -> bool {
        self.auth.is_some() && self.expired.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_empty_forms() {
        assert_eq!(
            RestrictedData::TokenFile("  ".into()).normalize().unwrap(),
            RestrictedData::Anonymous
        );
        assert_eq!(
            RestrictedData::UserPassword(vec![]).normalize().unwrap(),
            RestrictedData::Anonymous
        );
        assert!(RestrictedData::UserPassword(vec!["only-user".into()])
            .normalize()
            .is_err());
    }

    #[test]
    fn test_anonymous_manager() {
        let mgr = CredentialManager::anonymous();
        assert!(!mgr.supplied());
        assert!(mgr.auth().is_none());
        assert!(!mgr.invalidate());
    }

    #[test]
    fn test_user_password_resolution() {
        let spec = RestrictedData::UserPassword(vec!["alice".into(), "s3cret".into()]);
        let mgr = CredentialManager::resolve(&spec).unwrap();
        assert!(mgr.supplied());
        assert_eq!(
            mgr.auth(),
            Some(AuthScheme::Basic {
                username: "alice".into(),
                password: "s3cret".into()
            })
        );
    }

    #[test]
    fn test_token_file_resolution() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tok-abc123").unwrap();
        let spec = RestrictedData::TokenFile(file.path().display().to_string());
        let mgr = CredentialManager::resolve(&spec).unwrap();
        assert_eq!(mgr.auth(), Some(AuthScheme::Bearer("tok-abc123".into())));

        let missing = RestrictedData::TokenFile("/nonexistent/token".into());
        assert!(CredentialManager::resolve(&missing).is_err());
    }

    #[test]
    fn test_invalidate_reports_once_and_disables_auth() {
        let spec = RestrictedData::UserPassword(vec!["u".into(), "p".into()]);
        let mgr = CredentialManager::resolve(&spec).unwrap();
        assert!(!mgr.expired());
        assert!(mgr.invalidate());
        assert!(!mgr.invalidate());
        assert!(mgr.expired());
        assert!(mgr.auth().is_none());
        // supplied() still true: eligibility checks key on the config
        assert!(mgr.supplied());
    }

    #[test]
    fn test_anonymous_never_expires() {
        let mgr = CredentialManager::anonymous();
        assert!(!mgr.invalidate());
        assert!(!mgr.expired());
    }

    #[test]
    fn test_serde_forms() {
        let anon: RestrictedData = serde_json::from_str("null").unwrap_or_default();
        assert_eq!(anon, RestrictedData::Anonymous);
        let tok: RestrictedData = serde_json::from_str(r#""/home/me/token.asc""#).unwrap();
        assert_eq!(tok, RestrictedData::TokenFile("/home/me/token.asc".into()));
        let pair: RestrictedData = serde_json::from_str(r#"["u", "p"]"#).unwrap();
        assert_eq!(pair, RestrictedData::UserPassword(vec!["u".into(), "p".into()]));
    }
}
