mod upload_auth;

pub use upload_auth::{bearer_token, UploadAuth};
