//! The public file-reader facade: `OpenOptions` plus `FileReader<R>`.

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use ipc_core::errors::{Error, Result};

use crate::{
    dictionary::{self, DictionaryMemo},
    footer::{self, BlockLoc},
    io::Reader,
    loader::{self, DEFAULT_MAX_NESTING},
    message,
};

/// Builder for [`FileReader::open`]-style construction. `footer_offset` lets
/// a caller open a file whose trailer is not at the end of the underlying
/// source (an Arrow IPC file embedded in some larger container).
/// `expected_schema`, if set, fails `open` with `SchemaMismatch` rather than
/// silently returning a reader over a different schema than the caller
/// expects. `max_nesting_depth` bounds the array loader's recursion.
#[derive(Clone)]
pub struct OpenOptions {
    footer_offset: Option<u64>,
    expected_schema: Option<SchemaRef>,
    max_nesting_depth: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self {
            footer_offset: None,
            expected_schema: None,
            max_nesting_depth: DEFAULT_MAX_NESTING,
        }
    }

    pub fn footer_offset(mut self, offset: u64) -> Self {
        self.footer_offset = Some(offset);
        self
    }

    pub fn expected_schema(mut self, schema: SchemaRef) -> Self {
        self.expected_schema = Some(schema);
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn open<R: Reader>(self, reader: R) -> Result<FileReader<R>> {
        let footer = footer::decode_footer(&reader, self.footer_offset)?;
        log::debug!(
            "opened Arrow IPC file: {} record block(s), {} dictionary block(s), version {:?}",
            footer.record_blocks.len(),
            footer.dictionary_blocks.len(),
            footer.version
        );

        if let Some(expected) = &self.expected_schema {
            if expected.as_ref() != footer.schema.as_ref() {
                return Err(Error::SchemaMismatch(format!(
                    "file schema {:?} does not match the caller-supplied schema {:?}",
                    footer.schema, expected
                )));
            }
        }

        let dictionaries = dictionary::init_dictionaries(&reader, &footer.dictionary_blocks)?;

        Ok(FileReader {
            reader,
            schema: footer.schema,
            record_blocks: footer.record_blocks,
            dictionaries,
            version: footer.version,
            max_nesting_depth: self.max_nesting_depth,
            cursor: 0,
            cached: None,
        })
    }
}

/// Opens `reader` with default options. Equivalent to
/// `OpenOptions::new().open(reader)`.
pub fn open<R: Reader>(reader: R) -> Result<FileReader<R>> {
    OpenOptions::new().open(reader)
}

/// A random-access handle onto one Arrow IPC file. The footer, schema, and
/// dictionary memo are resolved once in `open` and are immutable afterward,
/// which is what makes [`FileReader::record_at`] safe to call concurrently
/// from multiple threads sharing a `&FileReader`. [`FileReader::record`] and
/// [`FileReader::read`] take `&mut self`: the borrow checker, not a runtime
/// lock, is what keeps those two off limits for concurrent use.
pub struct FileReader<R: Reader> {
    reader: R,
    schema: SchemaRef,
    record_blocks: Vec<BlockLoc>,
    dictionaries: DictionaryMemo,
    version: arrow_ipc::MetadataVersion,
    max_nesting_depth: usize,
    cursor: usize,
    cached: Option<(usize, RecordBatch)>,
}

impl<R: Reader> FileReader<R> {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_records(&self) -> usize {
        self.record_blocks.len()
    }

    pub fn num_dictionaries(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn version(&self) -> arrow_ipc::MetadataVersion {
        self.version
    }

    /// Decodes and returns an owned copy of record batch `i`. `i` must
    /// satisfy `0 <= i < self.num_records()`; out-of-range indices fail
    /// `ProgrammerError` rather than panicking.
    pub fn record_at(&self, i: usize) -> Result<RecordBatch> {
        let block = self.record_blocks.get(i).ok_or_else(|| {
            Error::ProgrammerError(format!(
                "record index {i} out of range (0..{})",
                self.record_blocks.len()
            ))
        })?;
        log::debug!("decoding record batch {i} ({} body bytes)", block.body_length);
        let message = message::read_record_batch_message(&self.reader, block)?;
        loader::load_record_batch(&self.reader, &self.schema, &message, self.max_nesting_depth)
    }

    /// Decodes record batch `i` and caches it, returning a borrow of the
    /// cached value. A repeated call with the same `i` skips re-decoding.
    pub fn record(&mut self, i: usize) -> Result<&RecordBatch> {
        let already_cached = matches!(&self.cached, Some((idx, _)) if *idx == i);
        if !already_cached {
            let batch = self.record_at(i)?;
            self.cached = Some((i, batch));
        }
        Ok(&self.cached.as_ref().expect("just inserted").1)
    }

    /// Decodes and returns the next record batch after the internal cursor,
    /// advancing it. Returns `Ok(None)` once every batch has been read.
    pub fn read(&mut self) -> Result<Option<RecordBatch>> {
        if self.cursor >= self.record_blocks.len() {
            return Ok(None);
        }
        let batch = self.record_at(self.cursor)?;
        self.cursor += 1;
        Ok(Some(batch))
    }

    /// Releases the footer bytes and cached record this reader holds (schema,
    /// record blocks, dictionary memo, and the `record`/`read` cache and
    /// cursor all drop here). The source is not owned by this reader and is
    /// handed back to the caller rather than dropped.
    pub fn close(self) -> R {
        self.reader
    }
}
