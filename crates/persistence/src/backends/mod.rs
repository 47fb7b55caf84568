//! Document store implementations.
//!
//! Each store is gated behind a feature flag.
//!
//! | Store | Feature | Description |
//! |-------|---------|-------------|
//! | SQLite | `sqlite` | Embedded database, in memory or file backed |

#[cfg(feature = "sqlite")]
pub mod sqlite;
