//! Content records and the external content provider boundary.

mod types;

pub use types::*;
