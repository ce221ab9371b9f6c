//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and in-memory stores so route
//! handlers can stay focused on protocol translation and error mapping.

pub mod agent;
pub mod chat;
pub mod preview;
pub mod sandbox;
pub mod settings;
pub mod tools;
pub mod workspace;

use time::OffsetDateTime;

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or_default()
}
