//! Query construction over the sales star schema
//!
//! Three layers, leaves first:
//! - [`filter`]: maps per-dimension filter entries to SQL predicates with
//!   positional binds
//! - [`builder`]: composes full aggregate queries (joins, filter, group-by,
//!   order) plus the pivot and drill-through variants
//! - [`hierarchy`]: resolves drill-down/roll-up requests to an ordered
//!   prefix of grouping columns

pub mod builder;
pub mod filter;
pub mod hierarchy;

pub use builder::{BoundQuery, MeasureAgg};
pub use hierarchy::{Hierarchy, LevelEdge};
