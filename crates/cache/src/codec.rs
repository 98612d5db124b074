//! Payload codecs for persisted cache entries

use crate::canonical;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialization format of a slot.
///
/// A store is parameterized by one codec; every slot it writes uses that
/// codec's encoding and file extension.
pub trait Codec {
    /// File extension of slots written with this codec, without the dot
    const EXTENSION: &'static str;

    /// Encode a value into bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] when the value cannot be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes produced by [`Codec::encode`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for truncated or foreign bytes.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Plain JSON.
///
/// JSON has no representation for NaN or infinities. Values holding one are
/// rejected at encode time instead of being written as `null`; use
/// [`MsgPackCodec`] for results that may carry non-finite floats.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    const EXTENSION: &'static str = "json";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        canonical::ensure_finite(value).map_err(|e| Error::encode(Self::EXTENSION, e))?;
        serde_json::to_vec(value).map_err(|e| Error::encode(Self::EXTENSION, e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::decode(Self::EXTENSION, e))
    }
}

/// MessagePack, lossless for every float value
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    const EXTENSION: &'static str = "msgpack";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| Error::encode(Self::EXTENSION, e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::decode(Self::EXTENSION, e))
    }
}

/// Zstandard compression around another codec.
///
/// Suited to large numeric payloads such as optimizer traces.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec<C = JsonCodec> {
    inner: C,
    level: i32,
}

impl<C> ZstdCodec<C> {
    /// Compression level used by [`ZstdCodec::default`]
    pub const DEFAULT_LEVEL: i32 = 3;

    /// Wrap `inner` with the given compression level
    #[must_use]
    pub fn new(inner: C, level: i32) -> Self {
        Self { inner, level }
    }
}

impl<C: Default> Default for ZstdCodec<C> {
    fn default() -> Self {
        Self::new(C::default(), Self::DEFAULT_LEVEL)
    }
}

impl<C: Codec> Codec for ZstdCodec<C> {
    const EXTENSION: &'static str = "zst";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let raw = self.inner.encode(value)?;
        zstd::encode_all(raw.as_slice(), self.level).map_err(|e| {
            Error::encode(Self::EXTENSION, format!("zstd compression failed: {e}"))
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let raw = zstd::decode_all(bytes).map_err(|e| {
            Error::decode(Self::EXTENSION, format!("zstd decompression failed: {e}"))
        })?;
        self.inner.decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_decodes_nested_payloads() {
        let mut table = BTreeMap::new();
        table.insert("peak_kw".to_string(), vec![412.5, 398.0, 420.25]);
        let bytes = JsonCodec.encode(&table).unwrap();
        let back: BTreeMap<String, Vec<f64>> = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn json_rejects_garbage() {
        let err = JsonCodec.decode::<Vec<u32>>(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Decode { format: "json", .. }));
    }

    #[test]
    fn json_refuses_non_finite_floats() {
        let err = JsonCodec
            .encode(&vec![Some(1.0), Some(f64::INFINITY)])
            .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
        assert!(JsonCodec.encode(&Some(f64::NAN)).is_err());
        assert!(
            ZstdCodec::<JsonCodec>::default()
                .encode(&f64::NEG_INFINITY)
                .is_err()
        );
    }

    #[test]
    fn msgpack_keeps_non_finite_floats() {
        let series = vec![Some(f64::INFINITY), None, Some(f64::NEG_INFINITY), Some(-0.0)];
        let bytes = MsgPackCodec.encode(&series).unwrap();
        let back: Vec<Option<f64>> = MsgPackCodec.decode(&bytes).unwrap();
        assert_eq!(back, series);
        assert!(back[3].unwrap().is_sign_negative());

        let nan: f64 = MsgPackCodec
            .decode(&MsgPackCodec.encode(&f64::NAN).unwrap())
            .unwrap();
        assert!(nan.is_nan());
    }

    #[test]
    fn msgpack_decodes_nested_payloads() {
        let mut table = BTreeMap::new();
        table.insert("peak_kw".to_string(), vec![412.5, 398.0, 420.25]);
        let bytes = MsgPackCodec.encode(&table).unwrap();
        let back: BTreeMap<String, Vec<f64>> = MsgPackCodec.decode(&bytes).unwrap();
        assert_eq!(back, table);
        assert!(MsgPackCodec.decode::<Vec<f64>>(b"\xc1").is_err());
    }

    #[test]
    fn zstd_compresses_repetitive_payloads() {
        let codec = ZstdCodec::<JsonCodec>::default();
        let series = vec![0.0_f64; 4096];
        let packed = codec.encode(&series).unwrap();
        let plain = JsonCodec.encode(&series).unwrap();
        assert!(packed.len() < plain.len());
        let back: Vec<f64> = codec.decode(&packed).unwrap();
        assert_eq!(back, series);
    }

    #[test]
    fn zstd_rejects_uncompressed_input() {
        let codec = ZstdCodec::<JsonCodec>::default();
        let err = codec.decode::<Vec<f64>>(b"[1.0, 2.0]").unwrap_err();
        assert!(matches!(err, Error::Decode { format: "zst", .. }));
    }

    #[test]
    fn extensions_differ() {
        assert_eq!(JsonCodec::EXTENSION, "json");
        assert_eq!(MsgPackCodec::EXTENSION, "msgpack");
        assert_eq!(ZstdCodec::<JsonCodec>::EXTENSION, "zst");
    }
}
