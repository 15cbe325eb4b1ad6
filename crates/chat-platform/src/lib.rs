pub mod api;
pub mod auth;
pub mod storage;

pub use api::HttpChatApi;
pub use auth::LocalStorageAuth;
pub use storage::auto_detect_storage;
