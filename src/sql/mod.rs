//! Safe SQL builder: identifiers from config only, values as parameters.

mod builder;
pub mod params;
pub mod raw;
pub use builder::*;
pub use params::*;
pub use raw::{parse_select, ParsedSelect};
