pub mod ports;
pub mod event_bus;
pub mod sse;
pub mod cache;
pub mod quota;
pub mod cancel;
pub mod store;
pub mod sync;
pub mod exchange;


pub use exchange::SendOutcome;
pub use store::{ChatStore, StoreSnapshot};
