// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Variable-bit-width integer codec used by the compressed coordinate format.
//!
//! Bits are packed most-significant first. Groups of integers with known
//! ranges are combined into a single mixed-radix number whose bytes are
//! emitted least-significant first. The scheme is bit-exact with the classic
//! xdrfile implementation.

use crate::errors::CodecError;

/// Maximal number of bytes of the mixed-radix accumulator.
const MAX_BYTES: usize = 32;

/// Smallest number of bits `n` such that `2^n >= size`,
/// i.e. the number of bits needed to store any value in `[0, size)`.
///
/// ## Example
/// ```
/// # use trjkit::io::bitcodec::sizeofint;
/// assert_eq!(sizeofint(1), 0);
/// assert_eq!(sizeofint(2), 1);
/// assert_eq!(sizeofint(256), 8);
/// assert_eq!(sizeofint(257), 9);
/// ```
pub const fn sizeofint(size: u32) -> u32 {
    let mut num: u64 = 1;
    let mut nbits = 0;

    while num < size as u64 {
        nbits += 1;
        num <<= 1;
    }

    nbits
}

/// Number of bits used to jointly encode a tuple of integers with the given radices.
///
/// The radices are multiplied in base 256 and the bit width of the product is returned.
///
/// ## Returns
/// `CodecError::ZeroSize` if any radix is zero.
/// `CodecError::AccumulatorOverflow` if the product does not fit into 32 bytes.
pub fn sizeofints(sizes: &[u32]) -> Result<u32, CodecError> {
    let mut bytes = [0u8; MAX_BYTES];
    bytes[0] = 1;
    let mut nbytes = 1usize;

    for (i, &size) in sizes.iter().enumerate() {
        if size == 0 {
            return Err(CodecError::ZeroSize(i));
        }

        let mut tmp: u64 = 0;
        let mut bytecount = 0usize;
        while bytecount < nbytes {
            tmp += bytes[bytecount] as u64 * size as u64;
            bytes[bytecount] = (tmp & 0xff) as u8;
            tmp >>= 8;
            bytecount += 1;
        }

        while tmp != 0 {
            if bytecount >= MAX_BYTES {
                return Err(CodecError::AccumulatorOverflow);
            }
            bytes[bytecount] = (tmp & 0xff) as u8;
            tmp >>= 8;
            bytecount += 1;
        }

        nbytes = bytecount;
    }

    let last = nbytes - 1;
    let mut num = 1u32;
    let mut nbits = 0u32;
    while bytes[last] as u32 >= num {
        nbits += 1;
        num *= 2;
    }

    Ok(nbits + last as u32 * 8)
}

/// Position within a bit stream. Created fresh for every encoding or decoding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitCursor {
    /// Number of completed bytes.
    pub count: usize,
    /// Number of pending bits held in `lastbyte`.
    pub lastbits: u32,
    /// Bit accumulator; only the lowest `lastbits` bits are meaningful.
    pub lastbyte: u32,
}

/// Mask of the lowest `nbits` bits.
#[inline(always)]
const fn mask(nbits: u32) -> u32 {
    if nbits >= 32 {
        u32::MAX
    } else {
        (1u32 << nbits) - 1
    }
}

/******************************/
/*           WRITER           */
/******************************/

/// Packs integers into a growing byte buffer.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    cursor: BitCursor,
}

impl BitWriter {
    /// Create a new empty bit writer.
    pub fn new() -> Self {
        BitWriter::default()
    }

    /// Create a new bit writer with preallocated capacity (in bytes).
    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter {
            buf: Vec::with_capacity(capacity),
            cursor: BitCursor::default(),
        }
    }

    /// Current position of the writer.
    #[inline]
    pub fn cursor(&self) -> BitCursor {
        self.cursor
    }

    /// Append the lowest `nbits` bits of `value` to the stream.
    ///
    /// ## Returns
    /// `CodecError::TooManyBits` if `nbits > 32`.
    /// `CodecError::ValueOutOfRange` if `value` does not fit into `nbits` bits.
    pub fn encodebits(&mut self, nbits: u32, value: u32) -> Result<(), CodecError> {
        if nbits > 32 {
            return Err(CodecError::TooManyBits(nbits));
        }

        if nbits < 32 && value > mask(nbits) {
            return Err(CodecError::ValueOutOfRange {
                value,
                size: 1u32 << nbits,
            });
        }

        self.put_bits(nbits, value);
        Ok(())
    }

    /// Append bits without range checks. `value` must fit into `nbits` bits.
    #[inline]
    fn put_bits(&mut self, mut nbits: u32, value: u32) {
        let BitCursor {
            mut lastbits,
            mut lastbyte,
            ..
        } = self.cursor;

        while nbits >= 8 {
            lastbyte = (lastbyte << 8) | ((value >> (nbits - 8)) & 0xff);
            self.buf.push((lastbyte >> lastbits) as u8);
            nbits -= 8;
        }

        if nbits > 0 {
            lastbyte = (lastbyte << nbits) | (value & mask(nbits));
            lastbits += nbits;
            if lastbits >= 8 {
                lastbits -= 8;
                self.buf.push((lastbyte >> lastbits) as u8);
            }
        }

        self.cursor = BitCursor {
            count: self.buf.len(),
            lastbits,
            lastbyte,
        };
    }

    /// Encode a tuple of integers, each in `[0, sizes[i])`, as one mixed-radix number
    /// stored in exactly `nbits` bits.
    ///
    /// ## Returns
    /// `CodecError::ValueOutOfRange` if any value is not smaller than its radix.
    pub fn encodeints(&mut self, nbits: u32, sizes: &[u32], nums: &[u32]) -> Result<(), CodecError> {
        let mut bytes = [0u8; MAX_BYTES];
        let mut nbytes = 0usize;

        let (Some(&first), Some(&first_size)) = (nums.first(), sizes.first()) else {
            return Ok(());
        };

        if first >= first_size {
            return Err(CodecError::ValueOutOfRange {
                value: first,
                size: first_size,
            });
        }

        let mut tmp = first;
        loop {
            bytes[nbytes] = (tmp & 0xff) as u8;
            nbytes += 1;
            tmp >>= 8;
            if tmp == 0 {
                break;
            }
        }

        for (&num, &size) in nums.iter().zip(sizes.iter()).skip(1) {
            if num >= size {
                return Err(CodecError::ValueOutOfRange { value: num, size });
            }

            let mut tmp = num as u64;
            let mut bytecount = 0usize;
            while bytecount < nbytes {
                tmp += bytes[bytecount] as u64 * size as u64;
                bytes[bytecount] = (tmp & 0xff) as u8;
                tmp >>= 8;
                bytecount += 1;
            }

            while tmp != 0 {
                if bytecount >= MAX_BYTES {
                    return Err(CodecError::AccumulatorOverflow);
                }
                bytes[bytecount] = (tmp & 0xff) as u8;
                tmp >>= 8;
                bytecount += 1;
            }

            nbytes = bytecount;
        }

        let full_bits = nbytes as u32 * 8;
        if nbits >= full_bits {
            for &byte in &bytes[..nbytes] {
                self.put_bits(8, byte as u32);
            }
            // zero padding up to the requested width
            let mut remaining = nbits - full_bits;
            while remaining > 0 {
                let chunk = remaining.min(32);
                self.put_bits(chunk, 0);
                remaining -= chunk;
            }
        } else {
            let lead_bits = (nbytes as u32 - 1) * 8;
            let last = bytes[nbytes - 1] as u32;
            if nbits < lead_bits || last > mask(nbits - lead_bits) {
                return Err(CodecError::ValueOutOfRange {
                    value: last,
                    size: 1u32 << nbits.saturating_sub(lead_bits).min(31),
                });
            }

            for &byte in &bytes[..nbytes - 1] {
                self.put_bits(8, byte as u32);
            }
            let rest = nbits - lead_bits;
            self.put_bits(rest, last);
        }

        Ok(())
    }

    /// Number of bytes the stream occupies, counting a partially filled last byte.
    #[inline]
    pub fn byte_count(&self) -> usize {
        self.cursor.count + usize::from(self.cursor.lastbits != 0)
    }

    /// Flush the partially filled last byte and return the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.cursor.lastbits != 0 {
            let BitCursor {
                lastbits, lastbyte, ..
            } = self.cursor;
            self.buf.push((lastbyte << (8 - lastbits)) as u8);
        }

        self.buf
    }
}

/******************************/
/*           READER           */
/******************************/

/// Unpacks integers from a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    cursor: BitCursor,
}

impl<'a> BitReader<'a> {
    /// Create a new reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader {
            buf,
            cursor: BitCursor::default(),
        }
    }

    /// Current position of the reader.
    #[inline]
    pub fn cursor(&self) -> BitCursor {
        self.cursor
    }

    #[inline(always)]
    fn next_byte(&mut self) -> Result<u32, CodecError> {
        match self.buf.get(self.cursor.count) {
            Some(&byte) => {
                self.cursor.count += 1;
                Ok(byte as u32)
            }
            None => Err(CodecError::BufferUnderrun(
                self.cursor.count,
                self.buf.len(),
            )),
        }
    }

    /// Read `nbits` bits from the stream as an unsigned integer.
    ///
    /// ## Returns
    /// `CodecError::TooManyBits` if `nbits > 32`.
    /// `CodecError::BufferUnderrun` if the stream ends before all bits are read.
    pub fn decodebits(&mut self, mut nbits: u32) -> Result<u32, CodecError> {
        if nbits > 32 {
            return Err(CodecError::TooManyBits(nbits));
        }

        let full_mask = mask(nbits);
        let mut lastbits = self.cursor.lastbits;
        let mut lastbyte = self.cursor.lastbyte;
        let mut num = 0u32;

        while nbits >= 8 {
            lastbyte = (lastbyte << 8) | self.next_byte()?;
            num |= (lastbyte >> lastbits) << (nbits - 8);
            nbits -= 8;
        }

        if nbits > 0 {
            if lastbits < nbits {
                lastbits += 8;
                lastbyte = (lastbyte << 8) | self.next_byte()?;
            }
            lastbits -= nbits;
            num |= (lastbyte >> lastbits) & mask(nbits);
        }

        self.cursor.lastbits = lastbits;
        self.cursor.lastbyte = lastbyte;

        Ok(num & full_mask)
    }

    /// Decode a tuple of integers stored as one mixed-radix number of `nbits` bits.
    /// `out` must have the same length as `sizes`.
    pub fn decodeints(
        &mut self,
        mut nbits: u32,
        sizes: &[u32],
        out: &mut [u32],
    ) -> Result<(), CodecError> {
        if nbits as usize > MAX_BYTES * 8 {
            return Err(CodecError::AccumulatorOverflow);
        }

        let mut bytes = [0u8; MAX_BYTES];
        let mut nbytes = 0usize;

        while nbits > 8 {
            bytes[nbytes] = self.decodebits(8)? as u8;
            nbytes += 1;
            nbits -= 8;
        }

        if nbits > 0 {
            bytes[nbytes] = self.decodebits(nbits)? as u8;
            nbytes += 1;
        }

        for i in (1..out.len().min(sizes.len())).rev() {
            let size = sizes[i] as u64;
            if size == 0 {
                return Err(CodecError::ZeroSize(i));
            }

            let mut num: u64 = 0;
            for j in (0..nbytes).rev() {
                num = (num << 8) | bytes[j] as u64;
                let p = num / size;
                bytes[j] = p as u8;
                num -= p * size;
            }
            out[i] = num as u32;
        }

        if let Some(first) = out.first_mut() {
            *first = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        Ok(())
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn sizeofint_minimal() {
        assert_eq!(sizeofint(0), 0);
        assert_eq!(sizeofint(1), 0);
        assert_eq!(sizeofint(2), 1);
        assert_eq!(sizeofint(3), 2);
        assert_eq!(sizeofint(256), 8);
        assert_eq!(sizeofint(257), 9);
        assert_eq!(sizeofint(u32::MAX), 32);

        for size in 2..5000u32 {
            let n = sizeofint(size);
            assert!(1u64 << n >= size as u64);
            assert!(1u64 << (n - 1) < size as u64);
        }
    }

    #[test]
    fn sizeofints_product_width() {
        assert_eq!(sizeofints(&[2, 2, 2]).unwrap(), 4);
        assert_eq!(sizeofints(&[255]).unwrap(), 8);
        assert_eq!(sizeofints(&[256]).unwrap(), 9);
        assert_eq!(sizeofints(&[1000, 1000, 1000]).unwrap(), 30);
        assert_eq!(sizeofints(&[3, 0, 4]), Err(CodecError::ZeroSize(1)));
    }

    #[test]
    fn encodebits_known_bytes() {
        let mut writer = BitWriter::new();
        writer.encodebits(1, 1).unwrap();
        writer.encodebits(5, 3).unwrap();
        assert_eq!(writer.byte_count(), 1);
        assert_eq!(writer.finish(), vec![0b1000_1100]);

        let mut writer = BitWriter::new();
        writer.encodebits(12, 0xabc).unwrap();
        writer.encodebits(4, 0xd).unwrap();
        assert_eq!(writer.finish(), vec![0xab, 0xcd]);
    }

    #[test]
    fn zero_bits_are_noop() {
        let mut writer = BitWriter::new();
        writer.encodebits(0, 0).unwrap();
        assert_eq!(writer.byte_count(), 0);
        assert!(writer.finish().is_empty());

        let mut reader = BitReader::new(&[]);
        assert_eq!(reader.decodebits(0).unwrap(), 0);
    }

    #[test]
    fn encodebits_rejects_wide_value() {
        let mut writer = BitWriter::new();
        assert_eq!(
            writer.encodebits(3, 8),
            Err(CodecError::ValueOutOfRange { value: 8, size: 8 })
        );
        assert_eq!(writer.encodebits(33, 0), Err(CodecError::TooManyBits(33)));
    }

    #[test]
    fn bits_roundtrip_random() {
        let mut rng = StdRng::seed_from_u64(1995);
        let mut values = Vec::new();
        let mut writer = BitWriter::new();

        for _ in 0..2000 {
            let nbits = rng.gen_range(0..=32u32);
            let value = if nbits == 32 {
                rng.gen::<u32>()
            } else {
                rng.gen::<u32>() & mask(nbits)
            };
            writer.encodebits(nbits, value).unwrap();
            values.push((nbits, value));
        }

        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        for (nbits, value) in values {
            assert_eq!(reader.decodebits(nbits).unwrap(), value);
        }
    }

    #[test]
    fn ints_roundtrip_random() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tuples = Vec::new();
        let mut writer = BitWriter::new();

        for _ in 0..1000 {
            let sizes = [
                rng.gen_range(1..=0xffffffu32),
                rng.gen_range(1..=0xffffffu32),
                rng.gen_range(1..=0xffffffu32),
            ];
            let nums = [
                rng.gen_range(0..sizes[0]),
                rng.gen_range(0..sizes[1]),
                rng.gen_range(0..sizes[2]),
            ];
            let nbits = sizeofints(&sizes).unwrap();
            writer.encodeints(nbits, &sizes, &nums).unwrap();
            tuples.push((nbits, sizes, nums));
        }

        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        for (nbits, sizes, nums) in tuples {
            let mut out = [0u32; 3];
            reader.decodeints(nbits, &sizes, &mut out).unwrap();
            assert_eq!(out, nums);
        }
    }

    #[test]
    fn ints_small_width() {
        // typical run-length tuple stored with magic index width
        let sizes = [8u32, 8, 8];
        let nbits = 9;

        let mut writer = BitWriter::new();
        writer.encodeints(nbits, &sizes, &[7, 0, 5]).unwrap();
        assert_eq!(writer.cursor().count, 1);
        assert_eq!(writer.cursor().lastbits, 1);

        let bytes = writer.finish();
        assert_eq!(bytes.len(), 2);

        let mut out = [0u32; 3];
        BitReader::new(&bytes)
            .decodeints(nbits, &sizes, &mut out)
            .unwrap();
        assert_eq!(out, [7, 0, 5]);
    }

    #[test]
    fn encodeints_rejects_out_of_range() {
        let mut writer = BitWriter::new();
        assert_eq!(
            writer.encodeints(12, &[10, 10, 10], &[3, 10, 2]),
            Err(CodecError::ValueOutOfRange {
                value: 10,
                size: 10
            })
        );
    }

    #[test]
    fn decode_underrun() {
        let mut reader = BitReader::new(&[0xff]);
        assert_eq!(reader.decodebits(4).unwrap(), 0xf);
        assert_eq!(reader.decodebits(4).unwrap(), 0xf);
        assert_eq!(reader.decodebits(1), Err(CodecError::BufferUnderrun(1, 1)));
    }
}
