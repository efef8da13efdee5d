//! Session log — in-memory cache + JSONL file persistence.
//!
//! Each session is a `.jsonl` file under `~/.reagent/sessions/`: a metadata
//! header line followed by one `{"role","content"}` record per message.

pub mod manager;

pub use manager::{SessionStore, SessionSummary};
