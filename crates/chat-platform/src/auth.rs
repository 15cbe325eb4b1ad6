//! Bearer token read from `window.localStorage`.
//!
//! The token is looked up on every call, so signing in or out in another
//! part of the page takes effect on the next request.

use chat_core::ports::AuthPort;

pub struct LocalStorageAuth {
    key: String,
}

impl LocalStorageAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl AuthPort for LocalStorageAuth {
    fn bearer_token(&self) -> Option<String> {
        let storage = web_sys::window()?.local_storage().ok()??;
        match storage.get_item(&self.key) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                log::warn!("Could not read auth token: {:?}", e);
                None
            }
        }
    }
}
