//! The recursive, pre-order array loader: the heart of this crate. Walks a
//! schema tree and, for each field, consumes the field-node and buffer
//! descriptors the writer produced for it in a fixed order, per each type's
//! buffer layout.

use std::sync::Arc;

use arrow_array::{
    new_null_array, Array, ArrayRef, FixedSizeListArray, GenericListArray, RecordBatch,
    RecordBatchOptions, StructArray,
};
use arrow_buffer::{Buffer, NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, FieldRef, SchemaRef};
use ipc_core::{array_build, errors::Error};

use crate::{
    compression::Decompressor,
    io::Reader,
    message::RecordBatchMessage,
};

type Result<T> = ipc_core::errors::Result<T>;

/// Bounded recursion depth, a sane default for nested schemas. Exceeding it
/// fails `NestingTooDeep` rather than overflowing the call stack on a
/// pathological or adversarial schema.
pub const DEFAULT_MAX_NESTING: usize = 64;

struct ArrayLoader<'a> {
    nodes: &'a [crate::message::FieldNodeInfo],
    buffers: &'a [crate::message::BufferDescriptor],
    body: &'a [u8],
    decompressor: Decompressor,
    ifield: usize,
    ibuffer: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> ArrayLoader<'a> {
    fn next_field_node(&mut self) -> Result<crate::message::FieldNodeInfo> {
        let idx = self.ifield;
        let node = *self.nodes.get(idx).ok_or_else(|| {
            Error::Malformed(format!(
                "field node index {idx} out of range (schema has {} nodes)",
                self.nodes.len()
            ))
        })?;
        self.ifield += 1;
        Ok(node)
    }

    fn next_buffer(&mut self) -> Result<Buffer> {
        let idx = self.ibuffer;
        let desc = self.buffers.get(idx).ok_or_else(|| {
            Error::Malformed(format!(
                "buffer index {idx} out of range ({} buffers declared)",
                self.buffers.len()
            ))
        })?;
        self.ibuffer += 1;
        if desc.length == 0 {
            return Ok(Buffer::from(Vec::new()));
        }
        let start = desc.offset as usize;
        let end = start
            .checked_add(desc.length as usize)
            .ok_or_else(|| Error::Malformed("buffer range overflows usize".to_string()))?;
        let raw = self.body.get(start..end).ok_or_else(|| {
            Error::Malformed(format!(
                "buffer range {start}..{end} exceeds the {}-byte record batch body",
                self.body.len()
            ))
        })?;
        let materialized = self.decompressor.materialize(raw)?;
        Ok(Buffer::from(materialized))
    }

    /// Every node reserves a buffer slot for validity, but it's only actually
    /// read when `null_count != 0`.
    fn read_validity(&mut self, null_count: i64, num_rows: usize) -> Result<Option<NullBuffer>> {
        if null_count == 0 {
            if self.ibuffer >= self.buffers.len() {
                return Err(Error::Malformed(format!(
                    "buffer index {} out of range ({} buffers declared)",
                    self.ibuffer,
                    self.buffers.len()
                )));
            }
            self.ibuffer += 1;
            Ok(None)
        } else {
            let buf = self.next_buffer()?;
            Ok(array_build::validity_from_buffer(buf, num_rows))
        }
    }

    fn load_field(&mut self, field: &FieldRef) -> Result<ArrayRef> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(Error::NestingTooDeep(self.max_depth));
        }
        let result = self.load_field_inner(field);
        self.depth -= 1;
        result
    }

    fn load_field_inner(&mut self, field: &FieldRef) -> Result<ArrayRef> {
        let data_type = field.data_type();

        if matches!(data_type, DataType::Null) {
            let node = self.next_field_node()?;
            return Ok(new_null_array(data_type, node.length as usize));
        }

        let node = self.next_field_node()?;
        let num_rows = node.length as usize;
        let validity = self.read_validity(node.null_count, num_rows)?;

        match data_type {
            DataType::List(child) => {
                let offsets = self.next_buffer()?;
                let offsets = OffsetBuffer::new(ScalarBuffer::<i32>::new(offsets, 0, num_rows + 1));
                let values = self.load_field(child)?;
                Ok(Arc::new(GenericListArray::<i32>::new(
                    child.clone(),
                    offsets,
                    values,
                    validity,
                )))
            }
            DataType::LargeList(child) => {
                let offsets = self.next_buffer()?;
                let offsets = OffsetBuffer::new(ScalarBuffer::<i64>::new(offsets, 0, num_rows + 1));
                let values = self.load_field(child)?;
                Ok(Arc::new(GenericListArray::<i64>::new(
                    child.clone(),
                    offsets,
                    values,
                    validity,
                )))
            }
            DataType::FixedSizeList(child, size) => {
                let values = self.load_field(child)?;
                Ok(Arc::new(FixedSizeListArray::new(
                    child.clone(),
                    *size,
                    values,
                    validity,
                )))
            }
            DataType::Struct(fields) => {
                let mut children = Vec::with_capacity(fields.len());
                for child_field in fields.iter() {
                    children.push(self.load_field(child_field)?);
                }
                Ok(Arc::new(StructArray::new(fields.clone(), children, validity)))
            }
            DataType::Map(entries_field, sorted) => {
                let offsets = self.next_buffer()?;
                let offsets = OffsetBuffer::new(ScalarBuffer::<i32>::new(offsets, 0, num_rows + 1));
                let entries = self.load_field(entries_field)?;
                let entries = entries
                    .as_any()
                    .downcast_ref::<StructArray>()
                    .ok_or_else(|| {
                        Error::Malformed("map entries child did not decode to a struct".to_string())
                    })?
                    .clone();
                Ok(Arc::new(arrow_array::MapArray::new(
                    entries_field.clone(),
                    offsets,
                    entries,
                    validity,
                    *sorted,
                )))
            }
            DataType::Union(_, _) => Err(Error::Unsupported(
                "union-typed columns are not supported".to_string(),
            )),
            DataType::Dictionary(_, _) => Err(Error::Unsupported(
                "dictionary-encoded columns are not supported".to_string(),
            )),
            other => array_build::build_leaf_array(other, validity, num_rows, || self.next_buffer()),
        }
    }
}

/// Reads the record batch body via `reader`, then walks `schema`'s fields in
/// order, building one array per top-level field and assembling the result
/// into an [`arrow_array::RecordBatch`].
pub fn load_record_batch(
    reader: &(impl Reader + ?Sized),
    schema: &SchemaRef,
    message: &RecordBatchMessage,
    max_depth: usize,
) -> Result<RecordBatch> {
    let mut body = vec![0u8; message.body_len as usize];
    reader.read_exact_at(&mut body, message.body_start)?;

    let decompressor = Decompressor::for_codec(message.compression)?;
    let mut loader = ArrayLoader {
        nodes: &message.nodes,
        buffers: &message.buffers,
        body: &body,
        decompressor,
        ifield: 0,
        ibuffer: 0,
        depth: 0,
        max_depth,
    };

    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields().iter() {
        let array = loader.load_field(field)?;
        if array.len() as i64 != message.length {
            return Err(Error::Malformed(format!(
                "field '{}' decoded to {} rows, batch header declares {}",
                field.name(),
                array.len(),
                message.length
            )));
        }
        columns.push(array);
    }

    if loader.ifield != loader.nodes.len() {
        return Err(Error::Malformed(format!(
            "record batch declared {} field nodes but the schema consumed {}",
            loader.nodes.len(),
            loader.ifield
        )));
    }
    if loader.ibuffer != loader.buffers.len() {
        return Err(Error::Malformed(format!(
            "record batch declared {} buffers but the schema consumed {}",
            loader.buffers.len(),
            loader.ibuffer
        )));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(message.length as usize));
    RecordBatch::try_new_with_options(schema.clone(), columns, &options)
        .map_err(|e| Error::Malformed(format!("failed to assemble record batch: {e}")))
}
