//! Fixed-width little-endian field encoding.

use super::error::{SyncError, SyncResult};

/// Scalar types a [`Serializer`](super::Serializer) can carry.
pub trait SyncValue: Copy {
    /// Wire tag guarding against type drift between save and load.
    const TAG: u8;

    /// Appends the little-endian encoding.
    fn encode(self, out: &mut Vec<u8>);

    /// Decodes from the front of `input`, advancing it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Truncated`] when `input` is too short and
    /// [`SyncError::InvalidValue`] for an out-of-domain encoding.
    fn decode(input: &mut &[u8], field: &str) -> SyncResult<Self>;

    /// Widened value for inspection.
    fn to_field(self) -> FieldValue;
}

/// Inspectable value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FieldValue {
    /// Boolean latch.
    Bool(bool),
    /// Unsigned integer, zero-extended.
    Unsigned(u64),
    /// Signed integer, sign-extended.
    Signed(i64),
    /// Raw buffer.
    Bytes(Vec<u8>),
}

pub(super) const BYTES_TAG: u8 = 0x10;

pub(super) fn take<'a>(input: &mut &'a [u8], len: usize, field: &str) -> SyncResult<&'a [u8]> {
    if input.len() < len {
        return Err(SyncError::Truncated {
            field: field.to_owned(),
        });
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

pub(super) fn take_array<const N: usize>(input: &mut &[u8], field: &str) -> SyncResult<[u8; N]> {
    let bytes = take(input, N, field)?;
    let mut out = [0; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

macro_rules! sync_unsigned {
    ($($ty:ty => $tag:expr),* $(,)?) => {$(
        impl SyncValue for $ty {
            const TAG: u8 = $tag;

            fn encode(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(input: &mut &[u8], field: &str) -> SyncResult<Self> {
                take_array(input, field).map(<$ty>::from_le_bytes)
            }

            fn to_field(self) -> FieldValue {
                FieldValue::Unsigned(u64::from(self))
            }
        }
    )*};
}

macro_rules! sync_signed {
    ($($ty:ty => $tag:expr),* $(,)?) => {$(
        impl SyncValue for $ty {
            const TAG: u8 = $tag;

            fn encode(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(input: &mut &[u8], field: &str) -> SyncResult<Self> {
                take_array(input, field).map(<$ty>::from_le_bytes)
            }

            fn to_field(self) -> FieldValue {
                FieldValue::Signed(i64::from(self))
            }
        }
    )*};
}

sync_unsigned!(u8 => 0x01, u16 => 0x02, u32 => 0x03, u64 => 0x04);
sync_signed!(i8 => 0x05, i16 => 0x06, i32 => 0x07, i64 => 0x08);

impl SyncValue for bool {
    const TAG: u8 = 0x00;

    fn encode(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn decode(input: &mut &[u8], field: &str) -> SyncResult<Self> {
        match take_array::<1>(input, field)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(SyncError::InvalidValue {
                field: field.to_owned(),
                value: i64::from(other),
            }),
        }
    }

    fn to_field(self) -> FieldValue {
        FieldValue::Bool(self)
    }
}
