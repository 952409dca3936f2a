//! Decoding and encoding seams between raw payloads and typed records

use crate::error::DecodeError;

/// Turns one raw payload into a typed record.
///
/// Shared by all file workers, so it must be `Send + Sync`. Any closure
/// `Fn(&[u8]) -> Result<R, DecodeError>` is a decoder.
pub trait Decoder: Send + Sync {
    type Record: Send + 'static;

    fn decode(&self, raw: &[u8]) -> Result<Self::Record, DecodeError>;
}

impl<F, R> Decoder for F
where
    F: Fn(&[u8]) -> Result<R, DecodeError> + Send + Sync,
    R: Send + 'static,
{
    type Record = R;

    fn decode(&self, raw: &[u8]) -> Result<R, DecodeError> {
        self(raw)
    }
}

/// Passes payloads through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Record = Vec<u8>;

    fn decode(&self, raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(raw.to_vec())
    }
}

/// Decodes payloads as UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Decoder;

impl Decoder for Utf8Decoder {
    type Record = String;

    fn decode(&self, raw: &[u8]) -> Result<String, DecodeError> {
        Ok(std::str::from_utf8(raw)?.to_owned())
    }
}

/// Serializes a record into its payload bytes
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);
}

impl Encode for [u8] {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl Encode for str {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, out: &mut Vec<u8>) {
        (**self).encode(out);
    }
}
