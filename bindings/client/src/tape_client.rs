use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tape_tunnel_instruments::{report_operation, OperationRecord, Reporter};
use url::Url;

use crate::error::{TapeError, TapeOperation};
use crate::model::{ArchiveInfo, ArchiveInfoRequest, StageRequest, StageResponse, StageStatus, StagedFile};

const STAGE_PATH: &str = "api/v1/stage";
const ARCHIVE_INFO_PATH: &str = "api/v1/archiveinfo";

/// Connection settings for [TapeClientInstrumented].
#[derive(Clone)]
pub struct TapeClientConfig {
    pub base_url: Url,
    /// Sent as `Authorization: Bearer <token>` on every call when set.
    pub bearer_token: Option<String>,
    /// Skip TLS certificate verification. Only meant for test services with self-signed
    /// certificates.
    pub accept_invalid_certs: bool,
    /// Per request timeout. The reqwest default applies when not set.
    pub timeout: Option<Duration>,
}

impl TapeClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            bearer_token: None,
            accept_invalid_certs: false,
            timeout: None,
        }
    }
}

impl fmt::Debug for TapeClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapeClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Client for the StoRM Tape REST API which reports every call to a [Reporter].
///
/// Each call is recorded under a fixed operation label, `stage`, `cancel`, `archiveinfo` or the
/// label given for status checks, so that statistics group the same way however many request ids
/// a run creates. Protocol failures are recorded with their message.
#[derive(Clone)]
pub struct TapeClientInstrumented {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
    reporter: Arc<Reporter>,
}

impl fmt::Debug for TapeClientInstrumented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapeClientInstrumented")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl TapeClientInstrumented {
    pub fn new(config: TapeClientConfig, reporter: Arc<Reporter>) -> Result<Self, TapeError> {
        if config.base_url.cannot_be_a_base() {
            return Err(TapeError::InvalidUrl(config.base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if config.accept_invalid_certs {
            log::warn!(
                "TLS certificate verification is disabled for {}",
                config.base_url
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        // Relative joins replace the last path segment unless the base ends with a slash.
        let mut base_url = config.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            bearer_token: config.bearer_token,
            reporter,
        })
    }

    /// Submit a stage request for `files`, returning the request id chosen by the service.
    ///
    /// Both 200 and 201 are accepted. Any other status, a body that is not JSON or a body without
    /// a `requestId` is a failure.
    pub async fn stage(&self, files: Vec<StagedFile>) -> Result<String, TapeError> {
        let mut record = OperationRecord::new("stage").with_method("POST");
        let result = self.stage_inner(&mut record, files).await;
        report_operation(&self.reporter, record, &result);
        result
    }

    async fn stage_inner(
        &self,
        record: &mut OperationRecord,
        files: Vec<StagedFile>,
    ) -> Result<String, TapeError> {
        let url = self.url(STAGE_PATH)?;
        let request = self
            .request(Method::POST, url)
            .json(&StageRequest { files });
        let (status, body) = self.send(record, request).await?;

        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(TapeError::unexpected_status(TapeOperation::Stage, status));
        }

        let response: StageResponse = parse_body(&body)?;
        match response.request_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(TapeError::MissingRequestId),
        }
    }

    /// Read the status of a stage request, recorded under `label`.
    pub async fn stage_status(&self, id: &str, label: &str) -> Result<StageStatus, TapeError> {
        let mut record = OperationRecord::new(label).with_method("GET");
        let result = self.stage_status_inner(&mut record, id).await;
        report_operation(&self.reporter, record, &result);
        result
    }

    async fn stage_status_inner(
        &self,
        record: &mut OperationRecord,
        id: &str,
    ) -> Result<StageStatus, TapeError> {
        let url = self.stage_url(id)?;
        let (status, body) = self.send(record, self.request(Method::GET, url)).await?;

        if !status.is_success() {
            return Err(TapeError::unexpected_status(TapeOperation::Status, status));
        }

        parse_body(&body)
    }

    /// Cancel a stage request with `DELETE /api/v1/stage/{id}`.
    pub async fn cancel(&self, id: &str) -> Result<(), TapeError> {
        let mut record = OperationRecord::new("cancel").with_method("DELETE");
        let result = self.cancel_inner(&mut record, id).await;
        report_operation(&self.reporter, record, &result);
        result
    }

    async fn cancel_inner(&self, record: &mut OperationRecord, id: &str) -> Result<(), TapeError> {
        let url = self.stage_url(id)?;
        let (status, _) = self.send(record, self.request(Method::DELETE, url)).await?;

        if !status.is_success() {
            return Err(TapeError::unexpected_status(TapeOperation::Cancel, status));
        }

        Ok(())
    }

    /// Ask where the given files are, on disk or on tape.
    pub async fn archive_info(&self, files: Vec<StagedFile>) -> Result<Vec<ArchiveInfo>, TapeError> {
        let mut record = OperationRecord::new("archiveinfo").with_method("POST");
        let result = self.archive_info_inner(&mut record, files).await;
        report_operation(&self.reporter, record, &result);
        result
    }

    async fn archive_info_inner(
        &self,
        record: &mut OperationRecord,
        files: Vec<StagedFile>,
    ) -> Result<Vec<ArchiveInfo>, TapeError> {
        let url = self.url(ARCHIVE_INFO_PATH)?;
        let request = self
            .request(Method::POST, url)
            .json(&ArchiveInfoRequest { files });
        let (status, body) = self.send(record, request).await?;

        if !status.is_success() {
            return Err(TapeError::unexpected_status(
                TapeOperation::ArchiveInfo,
                status,
            ));
        }

        parse_body(&body)
    }

    fn url(&self, path: &str) -> Result<Url, TapeError> {
        self.base_url
            .join(path)
            .map_err(|e| TapeError::InvalidUrl(format!("{}{path}: {e}", self.base_url)))
    }

    fn stage_url(&self, id: &str) -> Result<Url, TapeError> {
        let mut url = self.url(STAGE_PATH)?;
        url.path_segments_mut()
            .map_err(|_| TapeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        record: &mut OperationRecord,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), TapeError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        record.set_content_length(body.len() as u64);

        log::trace!("Tape service answered {status} with {} bytes", body.len());

        Ok((status, body))
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, TapeError> {
    serde_json::from_slice(body).map_err(|e| TapeError::MalformedResponse(e.to_string()))
}
