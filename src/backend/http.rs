use super::{JobStatusClient, ScenarioBackend};
use crate::error::CoreError;
use crate::model::{
    ChangeSet, ReportInfo, RunConfig, ScenarioRequest, ScenarioResponse, StartResponse,
    UploadResponse,
};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the analysis backend.
#[derive(Clone)]
pub(crate) struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    pub fn new(cfg: &RunConfig) -> Result<Self, CoreError> {
        let base = Url::parse(cfg.api_base.trim_end_matches('/')).map_err(|e| {
            CoreError::Validation(format!("invalid API base URL '{}': {e}", cfg.api_base))
        })?;
        if base.cannot_be_a_base() {
            return Err(CoreError::Validation(format!(
                "API base URL '{}' cannot carry a path",
                cfg.api_base
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self { http, base })
    }

    /// Append escaped path segments to the API base.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CoreError::Validation("API base URL cannot carry a path".into()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `POST /scripts/upload`
    pub async fn upload_script(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<UploadResponse, CoreError> {
        let url = self.endpoint(&["scripts", "upload"])?;
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        tracing::debug!(%url, file_name, "uploading script");
        let resp = self.http.post(url).multipart(form).send().await?;
        read_json(resp).await
    }

    /// `POST /runs/{document_id}/start`
    pub async fn start_run(&self, document_id: &str) -> Result<StartResponse, CoreError> {
        let url = self.endpoint(&["runs", document_id, "start"])?;
        tracing::debug!(%url, "starting run");
        let resp = self.http.post(url).send().await?;
        read_json(resp).await
    }

    /// `POST /reports/{run_id}/generate`
    pub async fn generate_report(&self, run_id: &str) -> Result<ReportInfo, CoreError> {
        let url = self.endpoint(&["reports", run_id, "generate"])?;
        tracing::debug!(%url, "requesting report generation");
        let resp = self.http.post(url).send().await?;
        read_json(resp).await
    }
}

#[async_trait]
impl JobStatusClient for BackendClient {
    async fn fetch(&self, run_id: &str) -> Result<serde_json::Value, CoreError> {
        let url = self.endpoint(&["results", run_id])?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if is_not_ready(status) {
            return Err(CoreError::NotReadyYet);
        }
        if !status.is_success() {
            let (status, message) = error_detail(resp).await;
            return Err(CoreError::Transport(format!(
                "results endpoint returned {status}: {message}"
            )));
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ScenarioBackend for BackendClient {
    async fn recompute(
        &self,
        run_id: &str,
        change_set: &ChangeSet,
    ) -> Result<ScenarioResponse, CoreError> {
        let resp = match change_set {
            ChangeSet::Preset(preset) => {
                let url = self.endpoint(&["whatif", run_id, "presets", preset.as_str()])?;
                self.http.post(url).send().await?
            }
            ChangeSet::Custom(changes) => {
                let url = self.endpoint(&["whatif", run_id])?;
                self.http
                    .post(url)
                    .json(&ScenarioRequest { changes })
                    .send()
                    .await?
            }
        };
        read_json(resp).await
    }
}

/// 404 and 202 mean the run has no materialized result yet.
fn is_not_ready(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::ACCEPTED
}

/// Decode a 2xx body. A 202 carrying `detail` is the backend's "run not
/// completed" refusal and is reported as `Upstream` with the message verbatim.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CoreError> {
    let status = resp.status();
    if !status.is_success() {
        let (status, message) = error_detail(resp).await;
        return Err(CoreError::Upstream { status, message });
    }
    let body = resp.bytes().await?;
    if status == StatusCode::ACCEPTED {
        if let Some(message) = std::str::from_utf8(&body).ok().and_then(detail_message) {
            return Err(CoreError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
    }
    Ok(serde_json::from_slice(&body)?)
}

async fn error_detail(resp: reqwest::Response) -> (u16, String) {
    let status = resp.status();
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    };
    let message = match resp.text().await {
        Ok(body) => detail_message(&body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                fallback()
            } else {
                trimmed.to_string()
            }
        }),
        Err(_) => fallback(),
    };
    (status.as_u16(), message)
}

/// Extract the `detail` field of an error body, verbatim.
fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
