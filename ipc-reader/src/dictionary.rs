//! Dictionary memo and the (stubbed) dictionary-batch decoder.
//!
//! A dictionary message carries
//! a single-column record batch over the dictionary's value type plus a
//! dictionary id, and would be routed through the same array-loading path as
//! any other record batch (a fresh loader, a synthetic one-field schema).
//! That decode is not implemented; any file whose footer lists one or more
//! dictionary blocks fails `open` with `Unsupported` instead of silently
//! producing wrong data for dictionary-encoded columns.

use std::{collections::HashMap, sync::Arc};

use arrow_array::ArrayRef;
use ipc_core::errors::{Error, Result};

use crate::{footer::BlockLoc, io::Reader};

/// A write-once mapping from dictionary id to its decoded values array.
/// Populated during `open`; read-only thereafter.
#[derive(Debug, Default, Clone)]
pub struct DictionaryMemo {
    values: HashMap<i64, ArrayRef>,
}

impl DictionaryMemo {
    pub fn get(&self, id: i64) -> Option<&ArrayRef> {
        self.values.get(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds the dictionary memo for a footer's declared dictionary blocks.
/// Stubbed: any non-empty `dictionary_blocks` fails `Unsupported`, since
/// `read_dictionary` (the function this would call per block) is not
/// implemented. The signature is shaped the way a real implementation would
/// need (reader + block list in, memo out) so completing it does not change
/// any caller.
pub fn init_dictionaries(
    reader: &(impl Reader + ?Sized),
    dictionary_blocks: &[BlockLoc],
) -> Result<DictionaryMemo> {
    if dictionary_blocks.is_empty() {
        return Ok(DictionaryMemo::default());
    }
    let _ = reader;
    Err(Error::Unsupported(
        "dictionary-encoded columns are not implemented".to_string(),
    ))
}

/// Would decode a single dictionary batch into `(id, values)`. Left as a
/// named, callable stub so a future implementer fills in the body without
/// touching `init_dictionaries`' contract.
#[allow(dead_code)]
fn read_dictionary(_reader: &(impl Reader + ?Sized), _block: &BlockLoc) -> Result<(i64, Arc<dyn arrow_array::Array>)> {
    Err(Error::Unsupported(
        "dictionary batch decoding is not implemented".to_string(),
    ))
}
