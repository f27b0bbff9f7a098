//! Domain layer for the DNS filtering core.
//!
//! Pure value types and invariants — no I/O, no async. `config` defines the
//! shapes the filtering core is configured with; loading them is an external
//! collaborator (spec §1).

pub mod config;
pub mod errors;
pub mod ids;
pub mod record_type;
pub mod result;
pub mod schedule;

pub use errors::FilterError;
pub use ids::{BlockedServiceId, FilterListId, RuleText};
pub use record_type::RecordType;
pub use result::FilterResult;
pub use schedule::{DayInterval, WeeklySchedule};
