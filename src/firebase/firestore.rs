//! Firestore gate document access
//!
//! Talks to the Firestore REST v1 API. The poller only ever touches one
//! document and one boolean field on it, so the client surface is a fetch of
//! the flag plus a precondition-guarded clear.

use super::Credentials;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

/// Snapshot of the gate document as observed by one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDoc {
    /// Value of the flag field (absent field reads as false)
    pub gate_closed: bool,
    /// Server `updateTime` of the observed revision, used as the clear
    /// precondition
    pub update_time: String,
}

/// Result of clearing the flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The observed revision was still current and the flag is now false
    Cleared,
    /// Another writer touched the document after the observation; the clear
    /// did not apply
    Superseded,
}

/// Store seam for the poller
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Read the gate document; `None` when it does not exist
    async fn fetch(&self) -> Result<Option<GateDoc>>;

    /// Clear the flag, conditional on the observed revision still being
    /// current
    async fn clear(&self, observed: &GateDoc) -> Result<ClearOutcome>;
}

/// Configuration for the Firestore client
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Database ID; the deployment uses a database named "default", not the
    /// `(default)` alias
    pub database_id: String,
    /// Collection holding the gate document
    pub collection: String,
    /// Document ID
    pub document: String,
    /// Boolean flag field on the document
    pub flag_field: String,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            database_id: "default".into(),
            collection: "realtime".into(),
            document: "gate".into(),
            flag_field: "gateClosed".into(),
        }
    }
}

const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";

/// REST client for the gate document
pub struct FirestoreClient {
    http: reqwest::Client,
    config: FirestoreConfig,
    doc_url: String,
    access_token: Option<String>,
}

impl FirestoreClient {
    /// Create a client for the project named by the credentials
    pub fn new(credentials: &Credentials, config: FirestoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let doc_url = document_url(credentials.project_id(), &config);

        Ok(Self {
            http,
            config,
            doc_url,
            access_token: credentials.access_token.clone(),
        })
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl GateStore for FirestoreClient {
    async fn fetch(&self) -> Result<Option<GateDoc>> {
        let response = self
            .with_auth(self.http.get(&self.doc_url))
            .send()
            .await
            .context("gate document fetch failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("gate document fetch returned {status}: {body}");
        }

        let document: RestDocument = response
            .json()
            .await
            .context("gate document response was not valid JSON")?;
        Ok(Some(snapshot_from(document, &self.config.flag_field)))
    }

    async fn clear(&self, observed: &GateDoc) -> Result<ClearOutcome> {
        let body = json!({
            "fields": { &self.config.flag_field: { "booleanValue": false } }
        });

        let response = self
            .with_auth(self.http.patch(&self.doc_url))
            .query(&[
                ("updateMask.fieldPaths", self.config.flag_field.as_str()),
                ("currentDocument.updateTime", observed.update_time.as_str()),
            ])
            .json(&body)
            .send()
            .await
            .context("gate flag clear failed")?;

        let status = response.status();
        if status.is_success() {
            return Ok(ClearOutcome::Cleared);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.contains("FAILED_PRECONDITION") {
            return Ok(ClearOutcome::Superseded);
        }
        bail!("gate flag clear returned {status}: {body}");
    }
}

fn document_url(project_id: &str, config: &FirestoreConfig) -> String {
    format!(
        "{FIRESTORE_API}/projects/{project_id}/databases/{}/documents/{}/{}",
        config.database_id, config.collection, config.document
    )
}

/// Wire shape of a Firestore REST document, reduced to what the poller reads
#[derive(Debug, Deserialize)]
struct RestDocument {
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
    #[serde(rename = "updateTime", default)]
    update_time: String,
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    #[serde(rename = "booleanValue")]
    boolean_value: Option<bool>,
}

fn snapshot_from(document: RestDocument, flag_field: &str) -> GateDoc {
    let gate_closed = document
        .fields
        .get(flag_field)
        .and_then(|v| v.boolean_value)
        .unwrap_or(false);
    GateDoc {
        gate_closed,
        update_time: document.update_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url() {
        let url = document_url("scoreboard-prod", &FirestoreConfig::default());
        assert_eq!(
            url,
            "https://firestore.googleapis.com/v1/projects/scoreboard-prod/databases/default/documents/realtime/gate"
        );
    }

    #[test]
    fn test_snapshot_flag_set() {
        let raw = r#"{
            "name": "projects/p/databases/default/documents/realtime/gate",
            "fields": { "gateClosed": { "booleanValue": true } },
            "createTime": "2024-05-01T10:00:00.000000Z",
            "updateTime": "2024-05-01T10:30:00.123456Z"
        }"#;
        let document: RestDocument = serde_json::from_str(raw).unwrap();
        let snapshot = snapshot_from(document, "gateClosed");
        assert!(snapshot.gate_closed);
        assert_eq!(snapshot.update_time, "2024-05-01T10:30:00.123456Z");
    }

    #[test]
    fn test_snapshot_flag_missing_reads_false() {
        let raw = r#"{
            "name": "projects/p/databases/default/documents/realtime/gate",
            "fields": { "other": { "booleanValue": true } },
            "updateTime": "2024-05-01T10:30:00Z"
        }"#;
        let document: RestDocument = serde_json::from_str(raw).unwrap();
        let snapshot = snapshot_from(document, "gateClosed");
        assert!(!snapshot.gate_closed);
    }

    #[test]
    fn test_snapshot_no_fields() {
        let raw = r#"{ "name": "projects/p/databases/default/documents/realtime/gate", "updateTime": "2024-05-01T10:30:00Z" }"#;
        let document: RestDocument = serde_json::from_str(raw).unwrap();
        let snapshot = snapshot_from(document, "gateClosed");
        assert!(!snapshot.gate_closed);
    }
}
