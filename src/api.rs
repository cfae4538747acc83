// API client module: a small blocking HTTP client that walks a deposition
// through the service's REST API. One call in flight at a time; every
// non-success status is turned into an `UploadError` carrying the body.

use crate::config::ServiceConfig;
use crate::error::{Result, UploadError};
use crate::metadata::RecordMetadata;
use crate::progress::ProgressReader;
use crate::workflow::UploadTarget;
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::time::Duration;
use tracing::{debug, info};

/// Client bound to one instance and one token.
#[derive(Clone)]
pub struct UploadClient {
    client: Client,
    api_url: String,
    token_url: String,
}

/// Draft record as the service reports it. Only the fields the workflow
/// reads are kept.
#[derive(Deserialize, Debug, Clone)]
pub struct Deposition {
    pub id: u64,
    #[serde(default)]
    pub links: DepositionLinks,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DepositionLinks {
    /// Where file bytes are PUT.
    pub bucket: Option<String>,
    /// Canonical page of the record.
    pub html: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DepositionFile {
    pub filename: String,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Acknowledgement returned by the bucket after a PUT.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct StoredFile {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// A published record: the persistent identifier and its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub id: u64,
    pub doi: String,
    pub html: String,
}

impl PublishedRecord {
    pub fn html_url(&self) -> &str {
        &self.html
    }
}

#[derive(Deserialize)]
struct PublishResponse {
    id: u64,
    doi: String,
    #[serde(default)]
    links: DepositionLinks,
}

impl PublishResponse {
    /// A publish answer is only usable with both the identifier and the
    /// record page.
    fn into_record(self) -> Option<PublishedRecord> {
        let doi = self.doi.trim();
        let html = self.links.html.filter(|html| !html.trim().is_empty())?;
        if doi.is_empty() {
            return None;
        }
        Some(PublishedRecord {
            id: self.id,
            doi: doi.to_string(),
            html,
        })
    }
}

#[derive(Serialize)]
struct MetadataUpdate<'a> {
    metadata: &'a RecordMetadata,
}

/// Pass successful responses through; turn anything else into a
/// `Service` error with the body verbatim.
fn ensure_success(stage: &'static str, res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    debug!(stage, %status, %body, "request rejected");
    Err(UploadError::Service { stage, status, body })
}

impl UploadClient {
    /// Build the HTTP client for `config` and check that its token can be
    /// used for depositing.
    pub fn connect(config: &ServiceConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&config.credential.bearer()).map_err(|_| {
            UploadError::Configuration("token contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|err| UploadError::Configuration(format!("failed to build HTTP client: {err}")))?;

        let uploader = Self {
            client,
            api_url: config.api_url.clone(),
            token_url: config.token_settings_url(),
        };
        uploader.verify_token()?;
        Ok(uploader)
    }

    fn depositions_url(&self) -> String {
        format!("{}/deposit/depositions", self.api_url)
    }

    fn deposition_url(&self, id: u64) -> String {
        format!("{}/deposit/depositions/{id}", self.api_url)
    }

    /// List depositions purely to learn whether the token has the scopes
    /// the rest of the workflow needs.
    fn verify_token(&self) -> Result<()> {
        const STAGE: &str = "verify token";
        let url = self.depositions_url();
        debug!(method = "GET", %url, "verifying token");
        let res = self
            .client
            .get(&url)
            .send()
            .map_err(UploadError::transport(STAGE))?;
        if res.status() == StatusCode::FORBIDDEN {
            return Err(UploadError::Authorization {
                status: res.status(),
                token_url: self.token_url.clone(),
            });
        }
        ensure_success(STAGE, res)?;
        info!("token verified");
        Ok(())
    }

    /// Create an empty deposition and attach `metadata` to it. Returns the
    /// deposition id.
    ///
    /// If the metadata call fails the empty deposition is left behind.
    pub fn create_deposit(&self, metadata: &RecordMetadata) -> Result<u64> {
        const CREATE: &str = "create deposition";
        let url = self.depositions_url();
        debug!(method = "POST", %url, "creating deposition");
        let res = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .map_err(UploadError::transport(CREATE))?;
        let created: Deposition = ensure_success(CREATE, res)?
            .json()
            .map_err(UploadError::transport(CREATE))?;
        info!(id = created.id, "deposition created");

        const UPDATE: &str = "update metadata";
        let url = self.deposition_url(created.id);
        debug!(method = "PUT", %url, "attaching metadata");
        let res = self
            .client
            .put(&url)
            .json(&MetadataUpdate { metadata })
            .send()
            .map_err(UploadError::transport(UPDATE))?;
        ensure_success(UPDATE, res)?;
        Ok(created.id)
    }

    /// Fetch the current state of a deposition.
    pub fn deposition(&self, id: u64) -> Result<Deposition> {
        const STAGE: &str = "fetch deposition";
        let url = self.deposition_url(id);
        debug!(method = "GET", %url, "fetching deposition");
        let res = self
            .client
            .get(&url)
            .send()
            .map_err(UploadError::transport(STAGE))?;
        ensure_success(STAGE, res)?
            .json()
            .map_err(UploadError::transport(STAGE))
    }

    /// Stream `target` into the deposition's bucket under its base name.
    ///
    /// `on_progress` gets the cumulative number of bytes sent. The transfer
    /// is a single PUT; a failure part way means starting again.
    pub fn upload_file<F>(&self, id: u64, target: &UploadTarget, on_progress: F) -> Result<StoredFile>
    where
        F: FnMut(u64) + Send + 'static,
    {
        const STAGE: &str = "upload file";
        let deposition = self.deposition(id)?;
        let bucket = deposition
            .links
            .bucket
            .ok_or_else(|| UploadError::UnexpectedResponse {
                stage: STAGE,
                detail: format!("deposition {id} has no bucket link"),
            })?;
        let mut url = Url::parse(&bucket).map_err(|err| UploadError::UnexpectedResponse {
            stage: STAGE,
            detail: format!("bucket link {bucket:?} is not a URL: {err}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| UploadError::UnexpectedResponse {
                stage: STAGE,
                detail: format!("bucket link {bucket:?} cannot take a file name"),
            })?
            .pop_if_empty()
            .push(&target.name);

        let file = File::open(&target.path).map_err(UploadError::io(&target.path))?;
        let body = Body::sized(ProgressReader::new(file, on_progress), target.size);

        debug!(method = "PUT", %url, size = target.size, "uploading file");
        let res = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .map_err(UploadError::transport(STAGE))?;
        let text = ensure_success(STAGE, res)?
            .text()
            .map_err(UploadError::transport(STAGE))?;

        let stored = serde_json::from_str::<StoredFile>(&text).unwrap_or_else(|_| {
            debug!(file = %target.name, "bucket acknowledgement was not JSON");
            StoredFile {
                key: target.name.clone(),
                size: None,
                checksum: None,
            }
        });
        info!(file = %target.name, bytes = target.size, "file uploaded");
        Ok(stored)
    }

    /// Publish the deposition. A `400` means the service considers it
    /// incomplete.
    pub fn publish(&self, id: u64) -> Result<PublishedRecord> {
        const STAGE: &str = "publish";
        let url = format!("{}/actions/publish", self.deposition_url(id));
        debug!(method = "POST", %url, "publishing deposition");
        let res = self
            .client
            .post(&url)
            .send()
            .map_err(UploadError::transport(STAGE))?;
        if res.status() == StatusCode::BAD_REQUEST {
            let detail = res.text().unwrap_or_default();
            return Err(UploadError::Publish { id, detail });
        }
        let text = ensure_success(STAGE, res)?
            .text()
            .map_err(UploadError::transport(STAGE))?;
        let record = serde_json::from_str::<PublishResponse>(&text)
            .ok()
            .and_then(PublishResponse::into_record)
            .ok_or_else(|| UploadError::UnexpectedResponse {
                stage: STAGE,
                detail: format!("publish answer lacks a DOI or record URL: {text}"),
            })?;
        info!(id, doi = %record.doi, "deposition published");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, Instance};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn config_for(server: &MockServer) -> ServiceConfig {
        ServiceConfig {
            instance: Instance::Sandbox,
            api_url: server.url("/api"),
            web_url: server.base_url(),
            credential: Credential::new("secret"),
            timeout_secs: Some(5),
        }
    }

    fn sample_metadata() -> RecordMetadata {
        RecordMetadata::from_input(&crate::metadata::MetadataInput {
            title: "t".into(),
            description: "d".into(),
            creators: "Doe, Jane".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn verified(server: &MockServer) -> UploadClient {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/deposit/depositions")
                .header("authorization", "Bearer secret");
            then.status(200).json_body(json!([]));
        });
        UploadClient::connect(&config_for(server)).unwrap()
    }

    #[test]
    fn forbidden_verification_is_an_authorization_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/deposit/depositions");
            then.status(403).body("forbidden");
        });

        let err = UploadClient::connect(&config_for(&server)).err().unwrap();
        match err {
            UploadError::Authorization { token_url, .. } => {
                assert_eq!(token_url, server.url("/account/settings/applications/"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_verification_failures_carry_the_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/deposit/depositions");
            then.status(500).body("maintenance");
        });

        match UploadClient::connect(&config_for(&server)).err().unwrap() {
            UploadError::Service { status, body, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejected_create_is_a_service_error() {
        let server = MockServer::start();
        let client = verified(&server);
        let update = server.mock(|when, then| {
            when.method(PUT);
            then.status(200);
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/deposit/depositions");
            then.status(500).body("database unavailable");
        });

        match client.create_deposit(&sample_metadata()).unwrap_err() {
            UploadError::Service {
                stage,
                status,
                body,
            } => {
                assert_eq!(stage, "create deposition");
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        update.assert_calls(0);
    }

    #[test]
    fn failed_metadata_update_reports_its_stage() {
        let server = MockServer::start();
        let client = verified(&server);
        server.mock(|when, then| {
            when.method(POST).path("/api/deposit/depositions");
            then.status(201).json_body(json!({"id": 9}));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/api/deposit/depositions/9");
            then.status(400).body(r#"{"message":"Validation error"}"#);
        });

        let err = client.create_deposit(&sample_metadata()).unwrap_err();
        assert_eq!(err.stage(), Some("update metadata"));
    }

    #[test]
    fn upload_puts_bytes_under_the_base_name() {
        let server = MockServer::start();
        let client = verified(&server);
        let bucket = server.url("/api/files/bucket-1");
        server.mock(move |when, then| {
            when.method(GET).path("/api/deposit/depositions/3");
            then.status(200)
                .json_body(json!({"id": 3, "links": {"bucket": bucket}, "files": []}));
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/files/bucket-1/data-1.csv")
                .header("authorization", "Bearer secret")
                .body("a,b\n1,2\n");
            then.status(201)
                .json_body(json!({"key": "data-1.csv", "size": 8, "checksum": "md5:abc"}));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data-1.csv");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"a,b\n1,2\n")
            .unwrap();
        let target = UploadTarget::resolve(&path).unwrap();

        let sent = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&sent);
        let stored = client
            .upload_file(3, &target, move |total| seen.store(total, Ordering::SeqCst))
            .unwrap();

        put.assert();
        assert_eq!(stored.checksum.as_deref(), Some("md5:abc"));
        assert_eq!(sent.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn publish_bad_request_is_a_publish_error() {
        let server = MockServer::start();
        let client = verified(&server);
        let publish = server.mock(|when, then| {
            when.method(POST)
                .path("/api/deposit/depositions/5/actions/publish");
            then.status(400).body(r#"{"message":"Missing files"}"#);
        });

        match client.publish(5).unwrap_err() {
            UploadError::Publish { id, detail } => {
                assert_eq!(id, 5);
                assert!(detail.contains("Missing files"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        publish.assert();
    }

    #[test]
    fn publish_answer_without_identifier_is_rejected() {
        let server = MockServer::start();
        let client = verified(&server);
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/deposit/depositions/6/actions/publish");
            then.status(202).json_body(json!({"id": 6}));
        });

        match client.publish(6).unwrap_err() {
            UploadError::UnexpectedResponse { stage, .. } => assert_eq!(stage, "publish"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn publish_answer_without_record_page_is_rejected() {
        let server = MockServer::start();
        let client = verified(&server);
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/deposit/depositions/6/actions/publish");
            then.status(202)
                .json_body(json!({"id": 6, "doi": "10.5072/zenodo.6", "links": {}}));
        });

        assert!(matches!(
            client.publish(6).unwrap_err(),
            UploadError::UnexpectedResponse { stage: "publish", .. }
        ));
    }

    #[test]
    fn publish_returns_identifier_and_page() {
        let server = MockServer::start();
        let client = verified(&server);
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/deposit/depositions/6/actions/publish");
            then.status(202).json_body(json!({
                "id": 6,
                "doi": "10.5072/zenodo.6",
                "links": {"html": "https://sandbox.zenodo.org/records/6"}
            }));
        });

        let record = client.publish(6).unwrap();
        assert_eq!(
            record,
            PublishedRecord {
                id: 6,
                doi: "10.5072/zenodo.6".into(),
                html: "https://sandbox.zenodo.org/records/6".into(),
            }
        );
    }
}
