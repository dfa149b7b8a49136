//! Little-endian encoding helpers for fixed-size on-disk records.
//!
//! Every record in [`crate::fs_layout`] implements [`OnDisk`]: a constant
//! `SIZE` plus an `encode`/`decode` pair working on a byte slice of exactly
//! that many bytes.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes were available than the record needs.
    Truncated { needed: usize, got: usize },
    BadMagic(i64),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated { needed, got } => {
                write!(f, "truncated record: needed {needed} bytes, got {got}")
            }
            CodecError::BadMagic(m) => write!(f, "bad superblock magic {m:#x}"),
        }
    }
}

impl std::error::Error for CodecError {}

pub trait OnDisk: Sized {
    const SIZE: usize;

    fn encode_into(&self, w: &mut Writer);

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(Self::SIZE);
        self.encode_into(&mut w);
        debug_assert_eq!(w.len(), Self::SIZE);
        w.into_inner()
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < Self::SIZE {
            return Err(CodecError::Truncated {
                needed: Self::SIZE,
                got: buf.len(),
            });
        }
        let mut r = Reader::new(&buf[..Self::SIZE]);
        Self::decode_from(&mut r)
    }
}

pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn record<T: OnDisk>(&mut self, v: &T) {
        v.encode_into(self);
    }
}

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(CodecError::Truncated {
                needed: end,
                got: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(raw))
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(raw))
    }

    pub fn f32(&mut self) -> Result<f32, CodecError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(f32::from_le_bytes(raw))
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.take(N)?);
        Ok(raw)
    }

    pub fn record<T: OnDisk>(&mut self) -> Result<T, CodecError> {
        T::decode_from(self)
    }
}

/// Copies `s` into a zero-padded fixed field, dropping bytes past `N`.
pub fn fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Logical string of a fixed field: bytes up to the first NUL, whitespace trimmed.
pub fn field_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}
