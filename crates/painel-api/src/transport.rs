use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use painel_core::{CoreError, HttpMethod};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartFile),
}

#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub bearer: Option<String>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Errors from a transport mean no response was received at all.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, CoreError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .field("client", &self.client)
            .finish()
    }
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(CoreError::Configuration(
                "API base URL is empty. Set api.base_url or PAINEL_API_BASE.".to_owned(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent("painel/api")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                CoreError::Configuration(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let suffix = path.trim_start_matches('/');
        format!("{}/{suffix}", self.base_url)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, CoreError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.endpoint(&request.path))
            .header(reqwest::header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(file) => {
                let part = reqwest::multipart::Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(|error| {
                        CoreError::Configuration(format!(
                            "invalid upload content type '{}': {error}",
                            file.mime
                        ))
                    })?;
                builder.multipart(reqwest::multipart::Form::new().part(file.field, part))
            }
        };

        let response = builder.send().await.map_err(|error| {
            CoreError::Unreachable(format!("{} {} failed: {error}", request.method, request.path))
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|error| {
            CoreError::Unreachable(format!(
                "failed to read response for {} {}: {error}",
                request.method, request.path
            ))
        })?;

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}
