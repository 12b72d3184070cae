use std::sync::Arc;

use arrow_array::{
    builder::{Int32Builder, ListBuilder},
    Array, ArrayRef, Int32Array, RecordBatch,
};
use arrow_ipc::writer::FileWriter;
use arrow_schema::{Field, Schema, SchemaRef};
use ipc_reader::{open, Error, OpenOptions};

fn write_ipc_file(schema: &SchemaRef, batches: &[RecordBatch]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buf, schema).unwrap();
        for batch in batches {
            writer.write(batch).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

fn valid_int32_file() -> Vec<u8> {
    let schema: SchemaRef = Arc::new(Schema::new(vec![Field::new(
        "a",
        arrow_schema::DataType::Int32,
        false,
    )]));
    let array: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
    let batch = RecordBatch::try_new(schema.clone(), vec![array]).unwrap();
    write_ipc_file(&schema, &[batch])
}

#[test]
fn flipped_head_magic_is_not_arrow_file() {
    let mut bytes = valid_int32_file();
    bytes[0] = b'X';
    let err = open(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, Error::NotArrowFile(_)));
}

#[test]
fn flipped_tail_magic_is_not_arrow_file() {
    let mut bytes = valid_int32_file();
    let len = bytes.len();
    bytes[len - 1] = b'X';
    let err = open(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, Error::NotArrowFile(_)));
}

#[test]
fn truncated_file_fails_to_open() {
    let bytes = valid_int32_file();
    let truncated = &bytes[..bytes.len() / 2];
    assert!(open(truncated).is_err());
}

#[test]
fn empty_buffer_is_not_arrow_file() {
    let err = open(&[][..]).unwrap_err();
    assert!(matches!(err, Error::Malformed(_) | Error::NotArrowFile(_)));
}

#[test]
fn nesting_deeper_than_the_configured_limit_fails() {
    let mut builder = ListBuilder::new(ListBuilder::new(Int32Builder::new()));
    builder.values().values().append_value(1);
    builder.values().append(true);
    builder.append(true);
    let array: ArrayRef = Arc::new(builder.finish());

    let schema: SchemaRef = Arc::new(Schema::new(vec![Field::new(
        "a",
        array.data_type().clone(),
        true,
    )]));
    let batch = RecordBatch::try_new(schema.clone(), vec![array]).unwrap();
    let bytes = write_ipc_file(&schema, &[batch]);

    let reader = OpenOptions::new()
        .max_nesting_depth(1)
        .open(bytes.as_slice())
        .unwrap();
    let err = reader.record_at(0).unwrap_err();
    assert!(matches!(err, Error::NestingTooDeep(1)));
}

#[test]
fn same_schema_decodes_fine_with_default_nesting_limit() {
    let mut builder = ListBuilder::new(ListBuilder::new(Int32Builder::new()));
    builder.values().values().append_value(1);
    builder.values().append(true);
    builder.append(true);
    let array: ArrayRef = Arc::new(builder.finish());

    let schema: SchemaRef = Arc::new(Schema::new(vec![Field::new(
        "a",
        array.data_type().clone(),
        true,
    )]));
    let batch = RecordBatch::try_new(schema.clone(), vec![array]).unwrap();
    let bytes = write_ipc_file(&schema, &[batch]);

    let reader = open(bytes.as_slice()).unwrap();
    let decoded = reader.record_at(0).unwrap();
    assert_eq!(decoded.num_rows(), 1);
}
