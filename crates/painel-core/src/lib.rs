pub mod api;
pub mod error;
pub mod identifiers;
pub mod record;

pub use api::{FetchOutcome, HttpMethod, ReadRequest, RecordApi, WriteRequest};
pub use error::CoreError;
pub use identifiers::{encode_path_segment, RecordKey, SessionScope};
pub use record::{values_equal, Record};
