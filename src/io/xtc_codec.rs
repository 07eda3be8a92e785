// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Lossy compression of atomic coordinates used by xtc trajectories.
//!
//! Coordinates are scaled by the precision, rounded to integers and stored
//! relative to the per-axis minimum. Consecutive atoms close to each other
//! are stored as small deltas in runs of up to eight atoms, with the first
//! two atoms of a run swapped (improves compression of water molecules).
//! Systems of at most nine atoms are stored as raw floats.

use std::io::{Read, Write};

use crate::errors::{CodecError, XdrError};
use crate::io::bitcodec::{sizeofint, sizeofints, BitReader, BitWriter};
use crate::io::xdr::{XdrReader, XdrWriter};

/// Table of radices used for the small deltas; `MAGICINTS[i]^3` is close to `2^i`.
#[rustfmt::skip]
pub const MAGICINTS: [i32; 73] = [
    0,        0,        0,       0,       0,       0,       0,       0,       0,       8,
    10,       12,       16,      20,      25,      32,      40,      50,      64,      80,
    101,      128,      161,     203,     256,     322,     406,     512,     645,     812,
    1024,     1290,     1625,    2048,    2580,    3250,    4096,    5060,    6501,    8192,
    10321,    13003,    16384,   20642,   26007,   32768,   41285,   52015,   65536,   82570,
    104031,   131072,   165140,  208063,  262144,  330280,  416127,  524287,  660561,  832255,
    1048576,  1321122,  1664510, 2097152, 2642245, 3329021, 4194304, 5284491, 6658042, 8388607,
    10568983, 13316085, 16777216
];

/// First usable index into `MAGICINTS`.
pub const FIRSTIDX: usize = 9;
/// Number of entries of `MAGICINTS`.
pub const LASTIDX: usize = MAGICINTS.len();

/// Precision used when the caller supplies a non-positive one.
pub const DEFAULT_PRECISION: f32 = 1000.0;

/// Systems with at most this many atoms are stored uncompressed.
pub const RAW_THRESHOLD: usize = 9;

/// Largest magnitude of a scaled coordinate.
const MAXABS: f64 = (i32::MAX - 2) as f64;

/// Ranges above this value are encoded axis by axis instead of as one mixed-radix number.
const LARGE_RANGE: u32 = 0xffffff;

/// Maximal number of atoms in one run of small deltas.
const MAX_RUN_ATOMS: usize = 8;

#[inline(always)]
fn within(a: &[i32; 3], b: &[i32; 3], limit: i32) -> bool {
    (0..3).all(|d| (a[d] as i64 - b[d] as i64).abs() < limit as i64)
}

#[inline(always)]
fn sq_distance(a: &[i32; 3], b: &[i32; 3]) -> i64 {
    (0..3)
        .map(|d| {
            let diff = a[d] as i64 - b[d] as i64;
            diff * diff
        })
        .sum()
}

/// Ranges of the integer coordinates and the number of bits needed to store them.
struct Ranges {
    sizeint: [u32; 3],
    /// Width of the mixed-radix number; zero flags per-axis storage.
    bitsize: u32,
    bitsizeint: [u32; 3],
}

impl Ranges {
    fn new(minint: &[i32; 3], maxint: &[i32; 3]) -> Result<Self, CodecError> {
        let mut sizeint = [0u32; 3];
        for d in 0..3 {
            if minint[d] > maxint[d] {
                return Err(CodecError::InvalidBounds(minint[d], maxint[d]));
            }

            let size = maxint[d] as i64 - minint[d] as i64 + 1;
            sizeint[d] = u32::try_from(size).map_err(|_| CodecError::RangeTooLarge(d))?;
        }

        if (sizeint[0] | sizeint[1] | sizeint[2]) > LARGE_RANGE {
            // bit width of the size itself, one bit more than needed at powers of two
            let bitsizeint = sizeint.map(|s| sizeofint(s.saturating_add(1)));
            Ok(Ranges {
                sizeint,
                bitsize: 0,
                bitsizeint,
            })
        } else {
            Ok(Ranges {
                sizeint,
                bitsize: sizeofints(&sizeint)?,
                bitsizeint: [0; 3],
            })
        }
    }
}

/// Adaptive state of the small-delta radix.
struct SmallState {
    smallidx: usize,
    smaller: i32,
    smallnum: i32,
}

impl SmallState {
    fn new(smallidx: usize) -> Self {
        SmallState {
            smallidx,
            smaller: MAGICINTS[FIRSTIDX.max(smallidx - 1)] / 2,
            smallnum: MAGICINTS[smallidx] / 2,
        }
    }

    #[inline(always)]
    fn sizesmall(&self) -> [u32; 3] {
        [MAGICINTS[self.smallidx] as u32; 3]
    }

    /// Move the radix one step down (`-1`) or up (`+1`).
    fn shift(&mut self, is_smaller: i32) -> Result<(), CodecError> {
        if is_smaller == 0 {
            return Ok(());
        }

        let new = self.smallidx as i32 + is_smaller;
        if new < FIRSTIDX as i32 || new >= LASTIDX as i32 {
            return Err(CodecError::InvalidSmallIndex(new));
        }
        self.smallidx = new as usize;

        if is_smaller < 0 {
            self.smallnum = self.smaller;
            self.smaller = if self.smallidx > FIRSTIDX {
                MAGICINTS[self.smallidx - 1] / 2
            } else {
                0
            };
        } else {
            self.smaller = self.smallnum;
            self.smallnum = MAGICINTS[self.smallidx] / 2;
        }

        Ok(())
    }
}

/******************************/
/*          ENCODING          */
/******************************/

/// Integer coordinates of a frame ready to be compressed.
struct Quantized {
    ints: Vec<[i32; 3]>,
    minint: [i32; 3],
    maxint: [i32; 3],
    mindiff: i64,
}

/// Scale and round coordinates to integers, tracking bounds and
/// the smallest neighbour-to-neighbour difference.
fn quantize(coords: &[[f32; 3]], precision: f32) -> Result<Quantized, CodecError> {
    let mut ints = Vec::with_capacity(coords.len());
    let mut minint = [i32::MAX; 3];
    let mut maxint = [i32::MIN; 3];
    let mut mindiff = i32::MAX as i64;
    let mut old = [0i32; 3];

    for (atom, coord) in coords.iter().enumerate() {
        let mut q = [0i32; 3];
        for d in 0..3 {
            let scaled = coord[d] * precision;
            let rounded = if coord[d] >= 0.0 {
                (scaled as f64 + 0.5) as f32
            } else {
                (scaled as f64 - 0.5) as f32
            };

            // also rejects NaN
            if !((rounded as f64).abs() <= MAXABS) {
                return Err(CodecError::CoordinateOutOfRange {
                    atom,
                    value: coord[d],
                });
            }

            q[d] = rounded as i32;
            minint[d] = minint[d].min(q[d]);
            maxint[d] = maxint[d].max(q[d]);
        }

        let diff: i64 = (0..3).map(|d| (old[d] as i64 - q[d] as i64).abs()).sum();
        if atom > 0 && diff < mindiff {
            mindiff = diff;
        }

        old = q;
        ints.push(q);
    }

    for d in 0..3 {
        if maxint[d] as f64 - minint[d] as f64 >= MAXABS {
            return Err(CodecError::RangeTooLarge(d));
        }
    }

    Ok(Quantized {
        ints,
        minint,
        maxint,
        mindiff,
    })
}

/// Compressed representation of a frame with more than `RAW_THRESHOLD` atoms.
struct CompressedBlock {
    minint: [i32; 3],
    maxint: [i32; 3],
    smallidx: usize,
    bytes: Vec<u8>,
}

fn compress(coords: &[[f32; 3]], precision: f32) -> Result<CompressedBlock, CodecError> {
    let Quantized {
        mut ints,
        minint,
        maxint,
        mindiff,
    } = quantize(coords, precision)?;

    let natoms = ints.len();
    let ranges = Ranges::new(&minint, &maxint)?;

    let mut smallidx = FIRSTIDX;
    while smallidx < LASTIDX - 1 && (MAGICINTS[smallidx] as i64) < mindiff {
        smallidx += 1;
    }
    let initial_smallidx = smallidx;

    let maxidx = (LASTIDX - 1).min(smallidx + 8);
    let minidx = maxidx - 8;
    let larger = MAGICINTS[maxidx] / 2;
    let mut state = SmallState::new(smallidx);

    let mut bits = BitWriter::with_capacity(natoms * 4);
    let mut prevcoord = [0i32; 3];
    let mut prevrun: i32 = -1;
    let mut tmpcoord = [0u32; 3 * MAX_RUN_ATOMS];

    let mut i = 0;
    while i < natoms {
        let mut is_small = false;
        let mut is_smaller: i32 = if state.smallidx < maxidx
            && i >= 1
            && within(&ints[i], &prevcoord, larger)
        {
            1
        } else if state.smallidx > minidx {
            -1
        } else {
            0
        };

        if i + 1 < natoms && within(&ints[i], &ints[i + 1], state.smallnum) {
            ints.swap(i, i + 1);
            is_small = true;
        }

        let this = ints[i];
        let relative = [0, 1, 2].map(|d| (this[d] as i64 - minint[d] as i64) as u32);
        if ranges.bitsize == 0 {
            for d in 0..3 {
                bits.encodebits(ranges.bitsizeint[d], relative[d])?;
            }
        } else {
            bits.encodeints(ranges.bitsize, &ranges.sizeint, &relative)?;
        }

        prevcoord = this;
        i += 1;

        let mut run = 0usize;
        if !is_small && is_smaller == -1 {
            is_smaller = 0;
        }

        while is_small && run < 3 * MAX_RUN_ATOMS {
            let this = ints[i];
            if is_smaller == -1
                && sq_distance(&this, &prevcoord) >= state.smaller as i64 * state.smaller as i64
            {
                is_smaller = 0;
            }

            for d in 0..3 {
                tmpcoord[run] =
                    (this[d] as i64 - prevcoord[d] as i64 + state.smallnum as i64) as u32;
                run += 1;
            }

            prevcoord = this;
            i += 1;
            is_small = i < natoms && within(&ints[i], &prevcoord, state.smallnum);
        }

        if run as i32 != prevrun || is_smaller != 0 {
            prevrun = run as i32;
            bits.encodebits(1, 1)?;
            bits.encodebits(5, (run as i32 + is_smaller + 1) as u32)?;
        } else {
            bits.encodebits(1, 0)?;
        }

        let sizesmall = state.sizesmall();
        for chunk in tmpcoord[..run].chunks_exact(3) {
            bits.encodeints(state.smallidx as u32, &sizesmall, chunk)?;
        }

        state.shift(is_smaller)?;
    }

    Ok(CompressedBlock {
        minint,
        maxint,
        smallidx: initial_smallidx,
        bytes: bits.finish(),
    })
}

/// Write a compressed coordinate block.
///
/// Writes the atom count and, for systems with at most nine atoms, raw floats.
/// Otherwise writes the precision, integer bounds, initial small index,
/// byte count and the padded bit stream.
///
/// ## Parameters
/// - `precision`: coordinates are stored as `round(x * precision)`; non-positive values
///   fall back to `DEFAULT_PRECISION`.
///
/// ## Returns
/// `CodecError::CoordinateOutOfRange` if any scaled coordinate does not fit into
/// a 32-bit integer and `CodecError::RangeTooLarge` if the span of an axis is too large.
/// Nothing is written in these cases.
pub fn encode_coordinates<W: Write>(
    coords: &[[f32; 3]],
    precision: f32,
    writer: &mut XdrWriter<W>,
) -> Result<(), CodecError> {
    let natoms = coords.len();

    if natoms <= RAW_THRESHOLD {
        writer.write(natoms as i32)?;
        for coord in coords {
            writer.write_slice(coord)?;
        }
        return Ok(());
    }

    let precision = if precision > 0.0 && precision.is_finite() {
        precision
    } else {
        DEFAULT_PRECISION
    };

    let block = compress(coords, precision)?;

    writer.write(natoms as i32)?;
    writer.write(precision)?;
    writer.write_slice(&block.minint)?;
    writer.write_slice(&block.maxint)?;
    writer.write(block.smallidx as i32)?;
    writer.write(block.bytes.len() as i32)?;
    writer.write_opaque(&block.bytes)?;

    Ok(())
}

/// Write a compressed coordinate block from double precision coordinates.
/// Coordinates are converted to single precision first; the stored precision is always a float.
pub fn encode_coordinates_f64<W: Write>(
    coords: &[[f64; 3]],
    precision: f64,
    writer: &mut XdrWriter<W>,
) -> Result<(), CodecError> {
    let converted: Vec<[f32; 3]> = coords
        .iter()
        .map(|c| [c[0] as f32, c[1] as f32, c[2] as f32])
        .collect();

    encode_coordinates(&converted, precision as f32, writer)
}

/******************************/
/*          DECODING          */
/******************************/

/// Upper bound on the size of a valid compressed block of `natoms` atoms.
#[inline]
fn max_block_bytes(natoms: usize) -> usize {
    natoms.saturating_mul(24).saturating_add(64)
}

/// Read a compressed coordinate block into `out`.
///
/// ## Parameters
/// - `natoms`: number of atoms declared by the frame header; must match the block.
///
/// ## Returns
/// The precision of the block, or `0.0` for raw (uncompressed) blocks.
/// Truncated or corrupted blocks result in an error; `out` is then unspecified.
pub fn decode_coordinates<R: Read>(
    reader: &mut XdrReader<R>,
    natoms: usize,
    out: &mut Vec<[f32; 3]>,
) -> Result<f32, CodecError> {
    let declared: i32 = reader.read()?;
    if declared < 0 {
        return Err(CodecError::NegativeAtomCount(declared));
    }

    if declared as usize != natoms {
        return Err(CodecError::AtomCountMismatch {
            declared: declared as usize,
            expected: natoms,
        });
    }

    out.clear();
    out.reserve(natoms);

    if natoms <= RAW_THRESHOLD {
        for _ in 0..natoms {
            let mut coord = [0.0f32; 3];
            reader.read_into(&mut coord)?;
            out.push(coord);
        }
        return Ok(0.0);
    }

    let precision: f32 = reader.read()?;
    if !(precision > 0.0 && precision.is_finite()) {
        return Err(CodecError::InvalidPrecision(precision));
    }

    let mut minint = [0i32; 3];
    let mut maxint = [0i32; 3];
    reader.read_into(&mut minint)?;
    reader.read_into(&mut maxint)?;
    let ranges = Ranges::new(&minint, &maxint)?;

    let smallidx: i32 = reader.read()?;
    if smallidx < FIRSTIDX as i32 || smallidx >= LASTIDX as i32 {
        return Err(CodecError::InvalidSmallIndex(smallidx));
    }
    let mut state = SmallState::new(smallidx as usize);

    let nbytes: i32 = reader.read()?;
    let limit = max_block_bytes(natoms);
    if nbytes < 0 || nbytes as usize > limit {
        return Err(XdrError::OpaqueTooLarge(nbytes.max(0) as usize, limit).into());
    }
    let bytes = reader.read_opaque(nbytes as usize)?;
    let mut bits = BitReader::new(&bytes);

    let inv_precision = 1.0f32 / precision;
    let scale = |c: [i32; 3]| c.map(|v| v as f32 * inv_precision);

    let mut run: i32 = 0;
    let mut i = 0usize;
    while i < natoms {
        let mut raw = [0u32; 3];
        if ranges.bitsize == 0 {
            for d in 0..3 {
                raw[d] = bits.decodebits(ranges.bitsizeint[d])?;
            }
        } else {
            bits.decodeints(ranges.bitsize, &ranges.sizeint, &mut raw)?;
        }
        i += 1;

        let mut prevcoord = [0, 1, 2].map(|d| minint[d].wrapping_add(raw[d] as i32));

        let mut is_smaller = 0;
        if bits.decodebits(1)? == 1 {
            run = bits.decodebits(5)? as i32;
            is_smaller = run % 3;
            run -= is_smaller;
            is_smaller -= 1;
        }

        if run > 0 {
            let run_atoms = (run / 3) as usize;
            if i + run_atoms > natoms {
                return Err(CodecError::RunOverflow(natoms));
            }

            let sizesmall = state.sizesmall();
            for k in 0..run_atoms {
                let mut small = [0u32; 3];
                bits.decodeints(state.smallidx as u32, &sizesmall, &mut small)?;
                i += 1;

                let mut this = [0, 1, 2].map(|d| {
                    prevcoord[d]
                        .wrapping_add(small[d] as i32)
                        .wrapping_sub(state.smallnum)
                });

                if k == 0 {
                    std::mem::swap(&mut this, &mut prevcoord);
                    out.push(scale(prevcoord));
                } else {
                    prevcoord = this;
                }
                out.push(scale(this));
            }
        } else {
            out.push(scale(prevcoord));
        }

        state.shift(is_smaller)?;
    }

    Ok(precision)
}

/******************************/
/*         UNIT TESTS         */
/******************************/
