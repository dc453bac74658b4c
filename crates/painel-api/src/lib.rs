//! REST client for the HR dashboard API.

pub mod client;
pub mod ficha;
pub mod response;
pub mod session;
pub mod transport;

pub use client::{ApiClient, FileUpload, LoginOutcome, StoredFile};
pub use ficha::{ficha_payload, normalize_ficha};
pub use session::{AuthEvent, Session};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, MultipartFile, RequestBody, ReqwestTransport,
};
