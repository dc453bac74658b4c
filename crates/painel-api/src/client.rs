use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use painel_core::{
    CoreError, FetchOutcome, HttpMethod, ReadRequest, Record, RecordApi, RecordKey, SessionScope,
    WriteRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::ficha::{ficha_payload, normalize_ficha};
use crate::response::{
    decode_body, decode_collection, decode_list, decode_write_body, extract_error_message,
};
use crate::session::Session;
use crate::transport::{
    ApiRequest, ApiResponse, HttpTransport, MultipartFile, ReqwestTransport, RequestBody,
};

const UPLOAD_FIELD: &str = "arquivo";
const CSV_MIME: &str = "text/csv";
const OCTET_STREAM_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "nome")]
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub scope: SessionScope,
    pub user: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    sucesso: Option<bool>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    usuario: Option<Value>,
    #[serde(default)]
    mensagem: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<Session>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<Session>,
    ) -> Result<Self, CoreError> {
        let transport = ReqwestTransport::new(base_url, timeout)?;
        Ok(Self::with_transport(Arc::new(transport), session))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, session: Arc<Session>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn login(
        &self,
        scope: SessionScope,
        email: &str,
        senha: &str,
    ) -> Result<LoginOutcome, CoreError> {
        let email = email.trim();
        if email.is_empty() || senha.is_empty() {
            return Err(CoreError::Configuration(
                "E-mail and password are required to sign in.".to_owned(),
            ));
        }

        let response = self
            .execute(
                scope,
                HttpMethod::Post,
                scope.login_endpoint(),
                Vec::new(),
                RequestBody::Json(json!({ "email": email, "senha": senha })),
                false,
            )
            .await?;
        let body: LoginResponse = serde_json::from_value(decode_body(&response.body)?)
            .map_err(|error| {
                CoreError::MalformedResponse(format!("failed to decode login response: {error}"))
            })?;

        let accepted = match scope {
            SessionScope::Main => body.sucesso == Some(true),
            SessionScope::Rondas => body.sucesso != Some(false),
        };
        let token = body
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());
        let Some(token) = token.filter(|_| accepted) else {
            return Err(CoreError::rejected(
                response.status,
                body.mensagem
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Invalid e-mail or password.".to_owned()),
            ));
        };

        self.session.set_token(scope, token)?;
        info!(scope = %scope, "signed in");
        Ok(LoginOutcome {
            scope,
            user: body.usuario,
        })
    }

    pub fn logout(&self, scope: SessionScope) -> Result<(), CoreError> {
        self.session.clear(scope)
    }

    pub async fn upload_file(
        &self,
        scope: SessionScope,
        resource: &str,
        key: &RecordKey,
        upload: FileUpload,
    ) -> Result<Vec<StoredFile>, CoreError> {
        if upload.bytes.is_empty() {
            return Err(CoreError::Configuration(format!(
                "refusing to upload empty file '{}'",
                upload.file_name
            )));
        }

        let path = format!(
            "{}/upload/{}",
            resource.trim_end_matches('/'),
            key.path_segment()
        );
        let response = self
            .execute(
                scope,
                HttpMethod::Post,
                &path,
                Vec::new(),
                RequestBody::Multipart(MultipartFile {
                    field: UPLOAD_FIELD.to_owned(),
                    file_name: upload.file_name,
                    mime: upload.mime.unwrap_or_else(|| OCTET_STREAM_MIME.to_owned()),
                    bytes: upload.bytes,
                }),
                true,
            )
            .await?;
        decode_list(&response.body, "upload")
    }

    pub async fn list_files(
        &self,
        scope: SessionScope,
        path: &str,
    ) -> Result<Vec<StoredFile>, CoreError> {
        let response = self
            .execute(scope, HttpMethod::Get, path, Vec::new(), RequestBody::Empty, true)
            .await?;
        decode_list(&response.body, "file list")
    }

    pub async fn delete_file(&self, scope: SessionScope, path: &str) -> Result<(), CoreError> {
        self.execute(scope, HttpMethod::Delete, path, Vec::new(), RequestBody::Empty, true)
            .await?;
        Ok(())
    }

    pub async fn import_csv(
        &self,
        scope: SessionScope,
        path: &str,
        upload: FileUpload,
    ) -> Result<Value, CoreError> {
        if upload.bytes.is_empty() {
            return Err(CoreError::Configuration(
                "CSV import requires a non-empty file.".to_owned(),
            ));
        }

        let response = self
            .execute(
                scope,
                HttpMethod::Post,
                path,
                Vec::new(),
                RequestBody::Multipart(MultipartFile {
                    field: UPLOAD_FIELD.to_owned(),
                    file_name: upload.file_name,
                    mime: upload.mime.unwrap_or_else(|| CSV_MIME.to_owned()),
                    bytes: upload.bytes,
                }),
                true,
            )
            .await?;
        Ok(decode_write_body(&response.body))
    }

    pub async fn import_candidatos(
        &self,
        mrh: &RecordKey,
        upload: FileUpload,
    ) -> Result<Value, CoreError> {
        let path = format!("/candidatos/importar-csv/{}", mrh.path_segment());
        self.import_csv(SessionScope::Main, &path, upload).await
    }

    pub async fn import_bulk(
        &self,
        scope: SessionScope,
        resource: &str,
        items: Vec<Value>,
    ) -> Result<Value, CoreError> {
        if items.is_empty() {
            return Err(CoreError::Configuration(
                "Bulk import requires at least one item.".to_owned(),
            ));
        }

        let path = format!("{}/importacao-massa", resource.trim_end_matches('/'));
        let response = self
            .execute(
                scope,
                HttpMethod::Post,
                &path,
                Vec::new(),
                RequestBody::Json(json!({ "itens": items })),
                true,
            )
            .await?;
        Ok(decode_write_body(&response.body))
    }

    pub async fn download(
        &self,
        scope: SessionScope,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<Vec<u8>, CoreError> {
        let response = self
            .execute(scope, HttpMethod::Get, path, query, RequestBody::Empty, true)
            .await?;
        Ok(response.body)
    }

    pub async fn list_comments(&self, mrh: &RecordKey) -> Result<Vec<Record>, CoreError> {
        let request = ReadRequest::new(SessionScope::Main, format!("/mrhs/{}/comentarios", mrh.path_segment()));
        match self.fetch_collection(request).await? {
            FetchOutcome::Records(records) => Ok(records),
            FetchOutcome::Malformed(reason) => {
                warn!(mrh = %mrh, reason = %reason, "comment list was malformed; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn add_comment(&self, mrh: &RecordKey, text: &str) -> Result<Value, CoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Configuration(
                "Comments require non-empty content.".to_owned(),
            ));
        }

        self.write(
            WriteRequest::new(
                SessionScope::Main,
                HttpMethod::Post,
                format!("/mrhs/{}/comentarios", mrh.path_segment()),
            )
            .with_body(json!({ "comentario": text })),
        )
        .await
    }

    // Candidates without a ficha get one created on first open.
    pub async fn open_ficha(&self, candidato: &Record) -> Result<Value, CoreError> {
        let id = candidato.key("id").ok_or_else(|| {
            CoreError::Configuration("candidate record has no id".to_owned())
        })?;

        let raw = match candidato.key("ficha_id") {
            Some(ficha) => {
                self.fetch_document(ReadRequest::new(
                    SessionScope::Main,
                    format!("/fichas/{}", ficha.path_segment()),
                ))
                .await?
            }
            None => {
                info!(candidato = %id, "creating ficha");
                self.write(
                    WriteRequest::new(
                        SessionScope::Main,
                        HttpMethod::Post,
                        format!("/fichas/candidato/{}", id.path_segment()),
                    )
                    .with_body(json!({})),
                )
                .await?
            }
        };
        Ok(normalize_ficha(raw))
    }

    pub async fn save_ficha(&self, ficha: Value) -> Result<Value, CoreError> {
        let id = ficha
            .get("id")
            .and_then(RecordKey::from_value)
            .ok_or_else(|| CoreError::Configuration("ficha has no id".to_owned()))?;

        self.write(
            WriteRequest::new(
                SessionScope::Main,
                HttpMethod::Put,
                format!("/fichas/{}", id.path_segment()),
            )
            .with_body(ficha_payload(ficha)),
        )
        .await
    }

    async fn execute(
        &self,
        scope: SessionScope,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: RequestBody,
        authenticated: bool,
    ) -> Result<ApiResponse, CoreError> {
        let bearer = if authenticated {
            self.session.token(scope)
        } else {
            None
        };
        debug!(
            method = %method,
            path,
            scope = %scope,
            with_token = bearer.is_some(),
            "api request"
        );

        let response = self
            .transport
            .send(ApiRequest {
                method,
                path: path.to_owned(),
                query,
                body,
                bearer,
            })
            .await
            .map_err(|error| {
                warn!(method = %method, path, error = %error, "api network error");
                error
            })?;

        if response.is_success() {
            debug!(method = %method, path, status = response.status, "api response");
            return Ok(response);
        }

        let message = extract_error_message(&response.body);
        warn!(
            method = %method,
            path,
            status = response.status,
            message = message.as_deref().unwrap_or_default(),
            "api request rejected"
        );

        if authenticated && response.status == 401 && self.session.is_protected(scope) {
            self.session.invalidate(scope);
            return Err(CoreError::Unauthorized { scope });
        }

        Err(CoreError::rejected(
            response.status,
            message.unwrap_or_else(|| format!("Request failed with HTTP {}.", response.status)),
        ))
    }
}

#[async_trait]
impl RecordApi for ApiClient {
    async fn fetch_collection(&self, request: ReadRequest) -> Result<FetchOutcome, CoreError> {
        let response = self
            .execute(
                request.scope,
                HttpMethod::Get,
                &request.path,
                request.query,
                RequestBody::Empty,
                true,
            )
            .await?;
        Ok(decode_collection(&response.body))
    }

    async fn fetch_document(&self, request: ReadRequest) -> Result<Value, CoreError> {
        let response = self
            .execute(
                request.scope,
                HttpMethod::Get,
                &request.path,
                request.query,
                RequestBody::Empty,
                true,
            )
            .await?;
        decode_body(&response.body)
    }

    async fn write(&self, request: WriteRequest) -> Result<Value, CoreError> {
        let body = match request.body {
            Some(value) => RequestBody::Json(value),
            None => RequestBody::Empty,
        };
        let response = self
            .execute(
                request.scope,
                request.method,
                &request.path,
                Vec::new(),
                body,
                true,
            )
            .await?;
        Ok(decode_write_body(&response.body))
    }
}
