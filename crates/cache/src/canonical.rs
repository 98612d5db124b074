//! Lossless, order-independent encoding of serializable values
//!
//! Call inputs are hashed through this encoding rather than through JSON.
//! JSON writes every non-finite float as `null`, which would give `NaN`,
//! `inf` and `None` the same fingerprint. Here every float keeps its bit
//! pattern (all NaNs fold into one) and map entries are sorted by their
//! encoded key, so `HashMap` iteration order never reaches a fingerprint.
//!
//! The encoding is prefix-free: each value starts with a tag and carries its
//! own length, so distinct values never produce the same bytes.

use serde::Serialize;
use serde::ser::{self, Serializer as _};
use std::fmt;
use thiserror::Error;

const NULL: u8 = b'n';
const BOOL: u8 = b'b';
const INT: u8 = b'i';
const WIDE_UINT: u8 = b'u';
const FLOAT: u8 = b'f';
const STR: u8 = b's';
const BYTES: u8 = b'y';
const SOME: u8 = b'o';
const SEQ: u8 = b'l';
const MAP: u8 = b'm';
const VARIANT: u8 = b'v';

/// Failure to encode a value
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// A float that JSON cannot represent, found in finite-only mode
    #[error("non-finite float {0} cannot be represented in JSON")]
    NonFinite(f64),
    /// The value's `Serialize` implementation failed
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for CanonicalError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

/// Encode `value` losslessly.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    value.serialize(Canonical { finite_only: false })
}

/// Fail with [`CanonicalError::NonFinite`] if `value` holds a NaN or an
/// infinity anywhere.
pub fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Result<(), CanonicalError> {
    value.serialize(Canonical { finite_only: true }).map(drop)
}

#[derive(Debug, Clone, Copy)]
struct Canonical {
    finite_only: bool,
}

fn push_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&u64::try_from(len).unwrap_or(u64::MAX).to_le_bytes());
}

fn text(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + bytes.len());
    out.push(tag);
    push_len(&mut out, bytes.len());
    out.extend_from_slice(bytes);
    out
}

fn int(value: i128) -> Vec<u8> {
    let mut out = Vec::with_capacity(17);
    out.push(INT);
    out.extend_from_slice(&value.to_le_bytes());
    out
}

fn variant(name: &str) -> Vec<u8> {
    let mut out = vec![VARIANT];
    out.extend(text(STR, name.as_bytes()));
    out
}

impl ser::Serializer for Canonical {
    type Ok = Vec<u8>;
    type Error = CanonicalError;
    type SerializeSeq = SeqEncoder;
    type SerializeTuple = SeqEncoder;
    type SerializeTupleStruct = SeqEncoder;
    type SerializeTupleVariant = SeqEncoder;
    type SerializeMap = MapEncoder;
    type SerializeStruct = MapEncoder;
    type SerializeStructVariant = MapEncoder;

    fn serialize_bool(self, v: bool) -> Result<Vec<u8>, CanonicalError> {
        Ok(vec![BOOL, u8::from(v)])
    }

    fn serialize_i8(self, v: i8) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Vec<u8>, CanonicalError> {
        Ok(int(i128::from(v)))
    }

    fn serialize_u128(self, v: u128) -> Result<Vec<u8>, CanonicalError> {
        match i128::try_from(v) {
            Ok(narrow) => Ok(int(narrow)),
            Err(_) => {
                let mut out = vec![WIDE_UINT];
                out.extend_from_slice(&v.to_le_bytes());
                Ok(out)
            }
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Vec<u8>, CanonicalError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Vec<u8>, CanonicalError> {
        if self.finite_only && !v.is_finite() {
            return Err(CanonicalError::NonFinite(v));
        }
        let bits = if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        };
        let mut out = Vec::with_capacity(9);
        out.push(FLOAT);
        out.extend_from_slice(&bits.to_le_bytes());
        Ok(out)
    }

    fn serialize_char(self, v: char) -> Result<Vec<u8>, CanonicalError> {
        self.serialize_str(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<Vec<u8>, CanonicalError> {
        Ok(text(STR, v.as_bytes()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Vec<u8>, CanonicalError> {
        Ok(text(BYTES, v))
    }

    fn serialize_none(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(vec![NULL])
    }

    fn serialize_some<T>(self, value: &T) -> Result<Vec<u8>, CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        let mut out = vec![SOME];
        out.extend(value.serialize(self)?);
        Ok(out)
    }

    fn serialize_unit(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(vec![NULL])
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Vec<u8>, CanonicalError> {
        Ok(vec![NULL])
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        name: &'static str,
    ) -> Result<Vec<u8>, CanonicalError> {
        let mut out = variant(name);
        out.push(NULL);
        Ok(out)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        name: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        let mut out = variant(name);
        out.extend(value.serialize(self)?);
        Ok(out)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqEncoder, CanonicalError> {
        Ok(SeqEncoder::new(self, Vec::new(), len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder, CanonicalError> {
        Ok(SeqEncoder::new(self, Vec::new(), len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqEncoder, CanonicalError> {
        Ok(SeqEncoder::new(self, Vec::new(), len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        name: &'static str,
        len: usize,
    ) -> Result<SeqEncoder, CanonicalError> {
        Ok(SeqEncoder::new(self, variant(name), len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapEncoder, CanonicalError> {
        Ok(MapEncoder::new(self, Vec::new(), len.unwrap_or(0)))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<MapEncoder, CanonicalError> {
        Ok(MapEncoder::new(self, Vec::new(), len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        name: &'static str,
        len: usize,
    ) -> Result<MapEncoder, CanonicalError> {
        Ok(MapEncoder::new(self, variant(name), len))
    }
}

/// Sequences, tuples and tuple variants
struct SeqEncoder {
    canonical: Canonical,
    prefix: Vec<u8>,
    items: Vec<Vec<u8>>,
}

impl SeqEncoder {
    fn new(canonical: Canonical, prefix: Vec<u8>, len: usize) -> Self {
        Self {
            canonical,
            prefix,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CanonicalError> {
        self.items.push(value.serialize(self.canonical)?);
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        let mut out = self.prefix;
        out.push(SEQ);
        push_len(&mut out, self.items.len());
        for item in self.items {
            out.extend(item);
        }
        out
    }
}

impl ser::SerializeSeq for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}

/// Maps, structs and struct variants, written in encoded-key order
struct MapEncoder {
    canonical: Canonical,
    prefix: Vec<u8>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl MapEncoder {
    fn new(canonical: Canonical, prefix: Vec<u8>, len: usize) -> Self {
        Self {
            canonical,
            prefix,
            entries: Vec::with_capacity(len),
            pending_key: None,
        }
    }

    fn field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CanonicalError> {
        let value = value.serialize(self.canonical)?;
        self.entries.push((text(STR, key.as_bytes()), value));
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        self.entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let mut out = self.prefix;
        out.push(MAP);
        push_len(&mut out, self.entries.len());
        for (key, value) in self.entries {
            out.extend(key);
            out.extend(value);
        }
        out
    }
}

impl ser::SerializeMap for MapEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(key.serialize(self.canonical)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CanonicalError::Custom("map value without a key".to_string()))?;
        let value = value.serialize(self.canonical)?;
        self.entries.push((key, value));
        Ok(())
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.field(key, value)
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapEncoder {
    type Ok = Vec<u8>;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), CanonicalError>
    where
        T: ?Sized + Serialize,
    {
        self.field(key, value)
    }

    fn end(self) -> Result<Vec<u8>, CanonicalError> {
        Ok(self.finish())
    }
}
