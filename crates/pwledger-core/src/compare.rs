//! Compare two stores entry by entry

pub mod engine;
pub mod filter;
pub mod model;
pub mod report;

pub use engine::{compare, diff_fields, CompareOptions};
pub use filter::{passes, FilterField, MatchRule, SubgroupFilter};
pub use model::{CompareItem, CompareResult};
pub use report::write_report;
