//! JSON-like values and path addressing

mod path;
mod value;

pub use path::*;
pub use value::*;
