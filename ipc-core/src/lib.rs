pub mod array_build;
pub mod bit_util;
pub mod errors;

pub use errors::{Error, Result};
