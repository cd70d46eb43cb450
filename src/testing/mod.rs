//! Connector test harness
//!
//! Drives a connector through a full record lifecycle and checks the shape
//! of every result. Used by integration tests and by anyone validating a
//! new provider against a sandbox account.
//!
//! ```rust,ignore
//! let report = CrudScenario::new("tickets", json!({"subject": "Hi"}), json!({"status": "solved"}))
//!     .search(Filter::eq("status", "solved"))
//!     .run(&connector, &ctx)
//!     .await?;
//! assert!(report.deleted);
//! ```

mod assertions;
mod scenario;

pub use assertions::{assert_read_result, assert_write_ok, contains_record};
pub use scenario::{CrudScenario, ScenarioReport};
