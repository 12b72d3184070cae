//! A random-access reader for the Arrow IPC file format.
//!
//! Open a file with [`open`] or [`OpenOptions`], then pull record batches out
//! by index with [`FileReader::record_at`]/[`FileReader::record`] or
//! sequentially with [`FileReader::read`].

pub mod compression;
pub mod dictionary;
pub mod footer;
pub mod io;
pub mod loader;
pub mod message;
pub mod reader;

pub use dictionary::DictionaryMemo;
pub use footer::{BlockLoc, FooterView, MAGIC};
pub use io::{ObjectStoreReadAt, Reader};
pub use loader::DEFAULT_MAX_NESTING;
pub use reader::{open, FileReader, OpenOptions};

pub use ipc_core::errors::{Error, Result};
