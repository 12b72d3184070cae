//! Trailer and footer decoding: the magic-delimited envelope at the head and
//! tail of an Arrow IPC file, and the FlatBuffers `Footer` it wraps.

use arrow_ipc::{convert::fb_to_schema, root_as_footer};
use arrow_schema::SchemaRef;
use byteorder::{ByteOrder, LittleEndian};
use ipc_core::errors::{Error, Result};

use crate::io::Reader;

/// `b"ARROW1"`, written at both the head and the tail of a well-formed file.
pub const MAGIC: &[u8] = b"ARROW1";

/// A decoded `Block{offset, meta_length, body_length}` triple. All three
/// fields are required to be multiples of 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLoc {
    pub offset: i64,
    pub meta_length: i32,
    pub body_length: i64,
}

impl BlockLoc {
    fn from_fb(block: &arrow_ipc::Block) -> Self {
        BlockLoc {
            offset: block.offset(),
            meta_length: block.metaDataLength(),
            body_length: block.bodyLength(),
        }
    }

    /// Validates the alignment invariant: offset, meta_length, and
    /// body_length must each be a multiple of 8.
    pub fn check_aligned(&self) -> Result<()> {
        if !ipc_core::bit_util::is_8_aligned(self.offset)
            || self.meta_length % 8 != 0
            || !ipc_core::bit_util::is_8_aligned(self.body_length)
        {
            return Err(Error::Misaligned(format!(
                "block offset={}, meta_length={}, body_length={} is not 8-byte aligned",
                self.offset, self.meta_length, self.body_length
            )));
        }
        Ok(())
    }

    pub fn meta_range(&self) -> (u64, u64) {
        (self.offset as u64, (self.offset + self.meta_length as i64) as u64)
    }

    pub fn body_range(&self) -> (u64, u64) {
        let body_start = self.offset + self.meta_length as i64;
        (body_start as u64, (body_start + self.body_length) as u64)
    }
}

/// The decoded footer: schema, dictionary blocks, record blocks, version.
#[derive(Debug, Clone)]
pub struct FooterView {
    pub schema: SchemaRef,
    pub dictionary_blocks: Vec<BlockLoc>,
    pub record_blocks: Vec<BlockLoc>,
    pub version: arrow_ipc::MetadataVersion,
}

/// Resolves and decodes the footer from `reader`. `footer_offset`, when
/// given, names the absolute offset of the footer-size trailer's first byte
/// (i.e. the start of the 4+|MAGIC| byte trailer) instead of deriving it from
/// `seek_end()`; this lets callers open a file embedded inside a larger
/// container.
pub fn decode_footer(reader: &(impl Reader + ?Sized), footer_offset: Option<u64>) -> Result<FooterView> {
    let file_size = reader.size()?;
    let trailer_len = MAGIC.len() as u64 + 4;
    let tail_end = footer_offset.unwrap_or(file_size);

    if tail_end < 2 * MAGIC.len() as u64 + 4 {
        return Err(Error::Malformed(format!(
            "file of size {tail_end} is smaller than the minimum {} bytes for a valid trailer",
            2 * MAGIC.len() + 4
        )));
    }

    let mut head_magic = vec![0u8; MAGIC.len()];
    reader.read_exact_at(&mut head_magic, 0)?;
    if head_magic != MAGIC {
        return Err(Error::NotArrowFile(
            "head magic bytes do not match the expected Arrow IPC magic".to_string(),
        ));
    }

    let mut trailer = vec![0u8; trailer_len as usize];
    reader.read_exact_at(&mut trailer, tail_end - trailer_len)?;

    let tail_magic = &trailer[4..];
    if tail_magic != MAGIC {
        return Err(Error::NotArrowFile(
            "tail magic bytes do not match the expected Arrow IPC magic".to_string(),
        ));
    }
    let footer_size = LittleEndian::read_u32(&trailer[..4]);

    if footer_size == 0 || footer_size as u64 > tail_end - 2 * MAGIC.len() as u64 - 4 {
        return Err(Error::Malformed(format!(
            "footer size {footer_size} is zero or larger than the file can hold"
        )));
    }

    let footer_end = tail_end - trailer_len;
    let footer_start = footer_end - footer_size as u64;
    let mut footer_bytes = vec![0u8; footer_size as usize];
    reader.read_exact_at(&mut footer_bytes, footer_start)?;

    let footer = root_as_footer(&footer_bytes)?;

    let schema_fb = footer
        .schema()
        .ok_or_else(|| Error::Malformed("footer has no schema".to_string()))?;
    let schema = fb_to_schema(schema_fb);

    let dictionary_blocks = footer
        .dictionaries()
        .map(|blocks| blocks.iter().map(|b| BlockLoc::from_fb(&b)).collect())
        .unwrap_or_default();
    let record_blocks = footer
        .recordBatches()
        .map(|blocks| blocks.iter().map(|b| BlockLoc::from_fb(&b)).collect())
        .unwrap_or_default();

    Ok(FooterView {
        schema: SchemaRef::new(schema),
        dictionary_blocks,
        record_blocks,
        version: footer.version(),
    })
}
