//! Common test infrastructure
//!
//! Spawns a real uploader session wired to a scripted backend. Tests should
//! only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestSession;
//!
//! #[tokio::test]
//! async fn test_upload() {
//!     let session = TestSession::spawn().await;
//!     let id = session.prepare_album("Album", "Artist", &["/m/a.mp3"]).await;
//!     session.handle.request_upload(id).await.unwrap();
//!     session.wait_until_idle().await;
//! }
//! ```

mod backend;
mod constants;
mod session;

pub use backend::ScriptedBackend;
pub use constants::*;
pub use session::TestSession;
