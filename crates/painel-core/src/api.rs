use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::CoreError;
use crate::identifiers::SessionScope;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub scope: SessionScope,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ReadRequest {
    pub fn new(scope: SessionScope, path: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub scope: SessionScope,
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl WriteRequest {
    pub fn new(scope: SessionScope, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            scope,
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Records(Vec<Record>),
    Malformed(String),
}

#[async_trait]
pub trait RecordApi: Send + Sync {
    async fn fetch_collection(&self, request: ReadRequest) -> Result<FetchOutcome, CoreError>;

    async fn fetch_document(&self, request: ReadRequest) -> Result<Value, CoreError>;

    // Returns the decoded response body, or `Value::Null` when the server sent none.
    async fn write(&self, request: WriteRequest) -> Result<Value, CoreError>;
}
