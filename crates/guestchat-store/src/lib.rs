//! Local persistence and event fan-out for widget instances.
//!
//! - [`storage`]: `localStorage`-style key/value stores (memory, file)
//! - [`vault`]: session snapshot load/save with expiry and history cap
//! - [`stream`]: broadcast hub for `message-sent` / `response-received`

pub mod storage;
pub mod stream;
pub mod vault;

pub use storage::{FileStorage, MemoryStorage};
pub use stream::EventStreamHub;
pub use vault::SessionVault;
