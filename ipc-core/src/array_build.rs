//! Constructs Arrow arrays from already-materialized, already-decompressed
//! buffers. The array loader (in `ipc-reader`) owns the recursive traversal,
//! the validity-slot bookkeeping, and child construction for nested types; it
//! hands leaf types off to [`build_leaf_array`] once the validity buffer and
//! the node's own value buffers have been pulled off the cursor in order.

use std::sync::Arc;

use arrow_array::{
    new_null_array,
    types::{
        Date32Type, Date64Type, Decimal128Type, Decimal256Type, DurationMicrosecondType,
        DurationMillisecondType, DurationNanosecondType, DurationSecondType, Float16Type,
        Float32Type, Float64Type, GenericBinaryType, GenericStringType, Int16Type, Int32Type,
        Int64Type, Int8Type, IntervalDayTimeType, IntervalMonthDayNanoType,
        IntervalYearMonthType, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
        Time64NanosecondType, TimestampMicrosecondType, TimestampMillisecondType,
        TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type,
        UInt8Type,
    },
    ArrayRef, ArrowPrimitiveType, BooleanArray, FixedSizeBinaryArray, GenericByteArray,
    OffsetSizeTrait, PrimitiveArray,
};
use arrow_buffer::{BooleanBuffer, Buffer, NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, IntervalUnit, TimeUnit};

use crate::errors::{Error, Result};

/// Wraps a raw validity buffer in a [`NullBuffer`], or `None` if it is empty
/// (meaning "all valid" — a zero null count means the writer emitted no
/// validity bitmap at all).
pub fn validity_from_buffer(buffer: Buffer, num_rows: usize) -> Option<NullBuffer> {
    if buffer.is_empty() {
        None
    } else {
        Some(NullBuffer::new(BooleanBuffer::new(buffer, 0, num_rows)))
    }
}

fn new_primitive_array<T: ArrowPrimitiveType>(
    values: Buffer,
    validity: Option<NullBuffer>,
    num_rows: usize,
    data_type: &DataType,
) -> ArrayRef {
    let values = ScalarBuffer::<T::Native>::new(values, 0, num_rows);
    Arc::new(PrimitiveArray::<T>::new(values, validity).with_data_type(data_type.clone()))
}

fn new_byte_array<O: OffsetSizeTrait>(
    offsets: Buffer,
    values: Buffer,
    validity: Option<NullBuffer>,
    num_rows: usize,
) -> ArrayRef
where
    GenericStringType<O>: arrow_array::types::ByteArrayType,
{
    let offsets = ScalarBuffer::<O>::new(offsets, 0, num_rows + 1);
    Arc::new(GenericByteArray::<GenericStringType<O>>::new(
        OffsetBuffer::new(offsets),
        values,
        validity,
    ))
}

fn new_binary_array<O: OffsetSizeTrait>(
    offsets: Buffer,
    values: Buffer,
    validity: Option<NullBuffer>,
    num_rows: usize,
) -> ArrayRef
where
    GenericBinaryType<O>: arrow_array::types::ByteArrayType,
{
    let offsets = ScalarBuffer::<O>::new(offsets, 0, num_rows + 1);
    Arc::new(GenericByteArray::<GenericBinaryType<O>>::new(
        OffsetBuffer::new(offsets),
        values,
        validity,
    ))
}

/// Builds a leaf (childless) array for `data_type` given its already-resolved
/// validity buffer and a source of its remaining value buffers, in the order
/// named by each type's buffer layout. `next_buffer` is called
/// exactly as many times as the type needs and no more.
pub fn build_leaf_array(
    data_type: &DataType,
    validity: Option<NullBuffer>,
    num_rows: usize,
    mut next_buffer: impl FnMut() -> Result<Buffer>,
) -> Result<ArrayRef> {
    use DataType::*;
    match data_type {
        Null => Ok(new_null_array(data_type, num_rows)),
        Boolean => {
            let values = next_buffer()?;
            let values = BooleanBuffer::new(values, 0, num_rows);
            Ok(Arc::new(BooleanArray::new(values, validity)))
        }
        Date32 => Ok(new_primitive_array::<Date32Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Date64 => Ok(new_primitive_array::<Date64Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Decimal128(_, _) => Ok(new_primitive_array::<Decimal128Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Decimal256(_, _) => Ok(new_primitive_array::<Decimal256Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Duration(unit) => {
            let values = next_buffer()?;
            Ok(match unit {
                TimeUnit::Second => {
                    new_primitive_array::<DurationSecondType>(values, validity, num_rows, data_type)
                }
                TimeUnit::Millisecond => new_primitive_array::<DurationMillisecondType>(
                    values, validity, num_rows, data_type,
                ),
                TimeUnit::Microsecond => new_primitive_array::<DurationMicrosecondType>(
                    values, validity, num_rows, data_type,
                ),
                TimeUnit::Nanosecond => new_primitive_array::<DurationNanosecondType>(
                    values, validity, num_rows, data_type,
                ),
            })
        }
        Float16 => Ok(new_primitive_array::<Float16Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Float32 => Ok(new_primitive_array::<Float32Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Float64 => Ok(new_primitive_array::<Float64Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Int8 => Ok(new_primitive_array::<Int8Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Int16 => Ok(new_primitive_array::<Int16Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Int32 => Ok(new_primitive_array::<Int32Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Int64 => Ok(new_primitive_array::<Int64Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        UInt8 => Ok(new_primitive_array::<UInt8Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        UInt16 => Ok(new_primitive_array::<UInt16Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        UInt32 => Ok(new_primitive_array::<UInt32Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        UInt64 => Ok(new_primitive_array::<UInt64Type>(
            next_buffer()?,
            validity,
            num_rows,
            data_type,
        )),
        Interval(unit) => {
            let values = next_buffer()?;
            Ok(match unit {
                IntervalUnit::YearMonth => new_primitive_array::<IntervalYearMonthType>(
                    values, validity, num_rows, data_type,
                ),
                IntervalUnit::DayTime => {
                    new_primitive_array::<IntervalDayTimeType>(values, validity, num_rows, data_type)
                }
                IntervalUnit::MonthDayNano => new_primitive_array::<IntervalMonthDayNanoType>(
                    values, validity, num_rows, data_type,
                ),
            })
        }
        Time32(unit) => {
            let values = next_buffer()?;
            match unit {
                TimeUnit::Second => Ok(new_primitive_array::<Time32SecondType>(
                    values, validity, num_rows, data_type,
                )),
                TimeUnit::Millisecond => Ok(new_primitive_array::<Time32MillisecondType>(
                    values, validity, num_rows, data_type,
                )),
                _ => Err(Error::Malformed(format!(
                    "invalid time unit {unit:?} for a 32-bit time column"
                ))),
            }
        }
        Time64(unit) => {
            let values = next_buffer()?;
            match unit {
                TimeUnit::Microsecond => Ok(new_primitive_array::<Time64MicrosecondType>(
                    values, validity, num_rows, data_type,
                )),
                TimeUnit::Nanosecond => Ok(new_primitive_array::<Time64NanosecondType>(
                    values, validity, num_rows, data_type,
                )),
                _ => Err(Error::Malformed(format!(
                    "invalid time unit {unit:?} for a 64-bit time column"
                ))),
            }
        }
        Timestamp(unit, _) => {
            let values = next_buffer()?;
            Ok(match unit {
                TimeUnit::Second => new_primitive_array::<TimestampSecondType>(
                    values, validity, num_rows, data_type,
                ),
                TimeUnit::Millisecond => new_primitive_array::<TimestampMillisecondType>(
                    values, validity, num_rows, data_type,
                ),
                TimeUnit::Microsecond => new_primitive_array::<TimestampMicrosecondType>(
                    values, validity, num_rows, data_type,
                ),
                TimeUnit::Nanosecond => new_primitive_array::<TimestampNanosecondType>(
                    values, validity, num_rows, data_type,
                ),
            })
        }
        FixedSizeBinary(size) => {
            let values = next_buffer()?;
            Ok(Arc::new(FixedSizeBinaryArray::new(*size, values, validity)))
        }
        Utf8 => Ok(new_byte_array::<i32>(
            next_buffer()?,
            next_buffer()?,
            validity,
            num_rows,
        )),
        LargeUtf8 => Ok(new_byte_array::<i64>(
            next_buffer()?,
            next_buffer()?,
            validity,
            num_rows,
        )),
        Binary => Ok(new_binary_array::<i32>(
            next_buffer()?,
            next_buffer()?,
            validity,
            num_rows,
        )),
        LargeBinary => Ok(new_binary_array::<i64>(
            next_buffer()?,
            next_buffer()?,
            validity,
            num_rows,
        )),
        other => Err(Error::Unsupported(format!(
            "{other} is not a leaf type this loader can decode"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, Int32Array, StringArray};

    fn buf(bytes: &[u8]) -> Buffer {
        Buffer::from(bytes.to_vec())
    }

    #[test]
    fn int32_no_nulls() {
        let mut values = Vec::new();
        values.extend_from_slice(&1i32.to_le_bytes());
        values.extend_from_slice(&2i32.to_le_bytes());
        values.extend_from_slice(&3i32.to_le_bytes());
        let values = buf(&values);
        let array = build_leaf_array(&DataType::Int32, None, 3, || Ok(values.clone())).unwrap();
        let array = array.as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(array.values(), &[1, 2, 3]);
        assert!(!array.is_nullable() || array.null_count() == 0);
    }

    #[test]
    fn utf8_two_rows() {
        let offsets = Buffer::from(
            [0i32, 2, 5]
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect::<Vec<u8>>(),
        );
        let values = Buffer::from(b"abcde".to_vec());
        let mut bufs = vec![offsets, values].into_iter();
        let array =
            build_leaf_array(&DataType::Utf8, None, 2, || Ok(bufs.next().unwrap())).unwrap();
        let array = array.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(array.value(0), "ab");
        assert_eq!(array.value(1), "cde");
    }

    #[test]
    fn validity_empty_buffer_is_none() {
        assert!(validity_from_buffer(Buffer::from(Vec::<u8>::new()), 3).is_none());
    }

    #[test]
    fn validity_nonempty_buffer_is_some() {
        let bitmap = Buffer::from(vec![0b0000_0101u8]);
        let nulls = validity_from_buffer(bitmap, 3).unwrap();
        assert!(nulls.is_valid(0));
        assert!(!nulls.is_valid(1));
        assert!(nulls.is_valid(2));
    }
}
