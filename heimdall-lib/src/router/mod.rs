pub mod pattern;
pub mod table;

pub use pattern::{split_segments, Pattern, Segment};
pub use table::{RouteTable, RouteTableBuilder};

pub(crate) use table::RouteMatch;
