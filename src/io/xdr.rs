// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Reading and writing of fixed-size binary words with explicit byte order.
//!
//! Xdr streams (xtc, trr) are always big-endian. Dcd files use whichever
//! byte order the writing machine had; the order is detected when the file
//! is opened and fixed for the lifetime of the reader.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::errors::XdrError;

/// Byte order of the words in a binary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order of the machine the code runs on.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Returns `true` if words in this order have to be byte-swapped on this machine.
    #[inline]
    pub fn needs_swap(self) -> bool {
        self != ByteOrder::native()
    }

    /// Get the opposite byte order.
    #[inline]
    pub fn swapped(self) -> Self {
        match self {
            ByteOrder::Big => ByteOrder::Little,
            ByteOrder::Little => ByteOrder::Big,
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::native()
    }
}

/// Number of zero bytes appended to an opaque block of `n` bytes to reach a multiple of 4.
#[inline]
pub(crate) fn padding(n: usize) -> usize {
    (4 - n % 4) % 4
}

/// Fixed-size word that can be stored in a binary stream.
///
/// 8-byte words are byte-reversed as a whole word, never as two 4-byte halves.
pub trait XdrWord: Copy {
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    /// Decode the word from bytes stored in the given order.
    fn decode(bytes: Self::Bytes, order: ByteOrder) -> Self;

    /// Encode the word into bytes in the given order.
    fn encode(self, order: ByteOrder) -> Self::Bytes;
}

macro_rules! impl_xdr_word {
    ($($t:ty => $n:literal),* $(,)?) => {
        $(
            impl XdrWord for $t {
                type Bytes = [u8; $n];

                #[inline]
                fn decode(bytes: Self::Bytes, order: ByteOrder) -> Self {
                    match order {
                        ByteOrder::Big => <$t>::from_be_bytes(bytes),
                        ByteOrder::Little => <$t>::from_le_bytes(bytes),
                    }
                }

                #[inline]
                fn encode(self, order: ByteOrder) -> Self::Bytes {
                    match order {
                        ByteOrder::Big => self.to_be_bytes(),
                        ByteOrder::Little => self.to_le_bytes(),
                    }
                }
            }
        )*
    };
}

impl_xdr_word!(i32 => 4, u32 => 4, f32 => 4, i64 => 8, u64 => 8, f64 => 8);

/******************************/
/*           READER           */
/******************************/

/// Reader of binary words from an underlying stream.
#[derive(Debug)]
pub struct XdrReader<R> {
    inner: R,
    order: ByteOrder,
}

impl<R: Read> XdrReader<R> {
    /// Create a new big-endian (xdr) reader.
    pub fn new(inner: R) -> Self {
        XdrReader {
            inner,
            order: ByteOrder::Big,
        }
    }

    /// Create a new reader decoding words in the specified byte order.
    pub fn with_order(inner: R, order: ByteOrder) -> Self {
        XdrReader { inner, order }
    }

    /// Byte order used by the reader.
    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Get immutable reference to the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Get mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    #[inline]
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), XdrError> {
        self.inner
            .read_exact(buf)
            .map_err(|e| XdrError::from_read(e, buf.len()))
    }

    /// Read a single word.
    #[inline]
    pub fn read<T: XdrWord>(&mut self) -> Result<T, XdrError> {
        let mut bytes = T::Bytes::default();
        self.fill(bytes.as_mut())?;
        Ok(T::decode(bytes, self.order))
    }

    /// Read `out.len()` consecutive words into `out`.
    ///
    /// ## Returns
    /// Number of words read, i.e. `out.len()`.
    /// On failure, the content of `out` is unspecified.
    pub fn read_into<T: XdrWord>(&mut self, out: &mut [T]) -> Result<usize, XdrError> {
        for item in out.iter_mut() {
            *item = self.read()?;
        }

        Ok(out.len())
    }

    /// Read `n` raw bytes followed by zero padding up to a multiple of 4 bytes.
    pub fn read_opaque(&mut self, n: usize) -> Result<Vec<u8>, XdrError> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf)?;

        let pad = padding(n);
        if pad > 0 {
            let mut pad_buf = [0u8; 4];
            self.fill(&mut pad_buf[..pad])?;
        }

        Ok(buf)
    }

    /// Read a length-prefixed string with zero padding up to a multiple of 4 bytes.
    pub fn read_string(&mut self) -> Result<String, XdrError> {
        let len = self.read::<u32>()? as usize;
        let bytes = self.read_opaque(len)?;

        String::from_utf8(bytes)
            .map(|s| s.trim_end_matches('\0').to_owned())
            .map_err(|_| XdrError::InvalidString(len))
    }

    /// Skip `n` bytes of the stream.
    pub fn skip(&mut self, n: u64) -> Result<(), XdrError> {
        let copied = std::io::copy(&mut (&mut self.inner).take(n), &mut std::io::sink())
            .map_err(|e| XdrError::ReadFailed(e.to_string()))?;

        if copied < n {
            return Err(XdrError::UnexpectedEof(n as usize));
        }

        Ok(())
    }
}

impl<R: Read + Seek> XdrReader<R> {
    /// Get the current position in the stream (in bytes from the start).
    pub fn position(&mut self) -> Result<u64, XdrError> {
        self.inner
            .stream_position()
            .map_err(|e| XdrError::SeekFailed(e.to_string()))
    }

    /// Move to an absolute position in the stream.
    pub fn seek_to(&mut self, pos: u64) -> Result<(), XdrError> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .map(|_| ())
            .map_err(|e| XdrError::SeekFailed(e.to_string()))
    }

    /// Move relative to the current position in the stream.
    pub fn seek_by(&mut self, offset: i64) -> Result<(), XdrError> {
        self.inner
            .seek(SeekFrom::Current(offset))
            .map(|_| ())
            .map_err(|e| XdrError::SeekFailed(e.to_string()))
    }

    /// Get the total length of the stream in bytes. The position in the stream is preserved.
    pub fn stream_len(&mut self) -> Result<u64, XdrError> {
        let current = self.position()?;
        let end = self
            .inner
            .seek(SeekFrom::End(0))
            .map_err(|e| XdrError::SeekFailed(e.to_string()))?;
        self.seek_to(current)?;
        Ok(end)
    }
}

/******************************/
/*           WRITER           */
/******************************/

/// Writer of binary words into an underlying stream.
#[derive(Debug)]
pub struct XdrWriter<W: Write> {
    inner: W,
    order: ByteOrder,
}

impl<W: Write> XdrWriter<W> {
    /// Create a new big-endian (xdr) writer.
    pub fn new(inner: W) -> Self {
        XdrWriter {
            inner,
            order: ByteOrder::Big,
        }
    }

    /// Create a new writer encoding words in the specified byte order.
    pub fn with_order(inner: W, order: ByteOrder) -> Self {
        XdrWriter { inner, order }
    }

    /// Byte order used by the writer.
    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Get immutable reference to the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the writer returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) -> Result<(), XdrError> {
        self.inner
            .write_all(bytes)
            .map_err(|e| XdrError::WriteFailed(e.to_string()))
    }

    /// Write a single word.
    #[inline]
    pub fn write<T: XdrWord>(&mut self, value: T) -> Result<(), XdrError> {
        let bytes = value.encode(self.order);
        self.put(bytes.as_ref())
    }

    /// Write all words of a slice.
    pub fn write_slice<T: XdrWord>(&mut self, values: &[T]) -> Result<(), XdrError> {
        values.iter().try_for_each(|&v| self.write(v))
    }

    /// Write raw bytes followed by zero padding up to a multiple of 4 bytes.
    pub fn write_opaque(&mut self, bytes: &[u8]) -> Result<(), XdrError> {
        self.put(bytes)?;
        let pad = padding(bytes.len());
        if pad > 0 {
            self.put(&[0u8; 4][..pad])?;
        }

        Ok(())
    }

    /// Write a length-prefixed string with zero padding up to a multiple of 4 bytes.
    pub fn write_string(&mut self, string: &str) -> Result<(), XdrError> {
        self.write(string.len() as u32)?;
        self.write_opaque(string.as_bytes())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<(), XdrError> {
        self.inner
            .flush()
            .map_err(|e| XdrError::WriteFailed(e.to_string()))
    }
}

impl<W: Write + Seek> XdrWriter<W> {
    /// Get the current position in the stream (in bytes from the start).
    pub fn position(&mut self) -> Result<u64, XdrError> {
        self.inner
            .stream_position()
            .map_err(|e| XdrError::SeekFailed(e.to_string()))
    }

    /// Move to an absolute position in the stream.
    pub fn seek_to(&mut self, pos: u64) -> Result<(), XdrError> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .map(|_| ())
            .map_err(|e| XdrError::SeekFailed(e.to_string()))
    }

    /// Move to the end of the stream.
    pub fn seek_to_end(&mut self) -> Result<u64, XdrError> {
        self.inner
            .seek(SeekFrom::End(0))
            .map_err(|e| XdrError::SeekFailed(e.to_string()))
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/
