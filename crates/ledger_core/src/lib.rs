pub mod api;
pub mod error;
pub mod ids;
pub mod integrity;
pub mod interval;
pub mod overlap;
pub mod registry;
pub mod resolver;
pub mod time;

pub use api::*;
pub use error::{LedgerError, LedgerResult};
pub use ids::*;
pub use integrity::{check_intervals, IntegrityReport};
pub use interval::{validate_fields, CompensationInterval, IntervalSpan};
pub use overlap::{conflicts, find_conflict, overlaps};
pub use registry::StaticSubjectRegistry;
pub use resolver::{current_value_as_of, resolve_current};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
pub use crate::time::*;
