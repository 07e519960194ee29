//! Firebase client plumbing shared by the Firestore poller and the
//! Realtime Database listener

pub mod firestore;
pub mod rtdb;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming the service account file. Required.
pub const CRED_PATH_VAR: &str = "FIREBASE_CRED_PATH";

/// Environment variable holding a pre-minted OAuth bearer token. Optional;
/// without it requests go out unauthenticated.
pub const ACCESS_TOKEN_VAR: &str = "FIREBASE_ACCESS_TOKEN";

/// The service account fields this bridge needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
}

/// Credentials resolved at startup
#[derive(Debug, Clone)]
pub struct Credentials {
    pub service_account: ServiceAccount,
    pub access_token: Option<String>,
}

impl Credentials {
    /// Load `.env.local` (if present) and resolve credentials from the
    /// environment. A missing `FIREBASE_CRED_PATH` is fatal.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");

        let path = std::env::var(CRED_PATH_VAR)
            .with_context(|| format!("{CRED_PATH_VAR} is not set in the environment"))?;
        let service_account = read_service_account(Path::new(&path))?;

        let access_token = std::env::var(ACCESS_TOKEN_VAR)
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            service_account,
            access_token,
        })
    }

    /// Project ID from the service account file
    pub fn project_id(&self) -> &str {
        &self.service_account.project_id
    }
}

fn read_service_account(path: &Path) -> Result<ServiceAccount> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read service account file {}", path.display()))?;
    let account: ServiceAccount = serde_json::from_str(&raw)
        .with_context(|| format!("invalid service account file {}", path.display()))?;
    if account.project_id.is_empty() {
        bail!(
            "service account file {} has an empty project_id",
            path.display()
        );
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("gate-bridge-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_service_account() {
        let path = write_temp(
            "sa.json",
            r#"{"project_id": "scoreboard-prod", "client_email": "svc@scoreboard-prod.iam.gserviceaccount.com"}"#,
        );
        let account = read_service_account(&path).unwrap();
        assert_eq!(account.project_id, "scoreboard-prod");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_service_account_missing_file() {
        let result = read_service_account(Path::new("/nonexistent/creds.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_service_account_empty_project() {
        let path = write_temp("sa-empty.json", r#"{"project_id": ""}"#);
        let result = read_service_account(&path);
        assert!(result.is_err());
        std::fs::remove_file(path).ok();
    }
}
