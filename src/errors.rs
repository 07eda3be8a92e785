// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Implementation of errors that can be returned by the library.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur when reading or writing fixed-size binary words.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum XdrError {
    #[error("unexpected end of data while reading {0} bytes")]
    UnexpectedEof(usize),
    #[error("could not read from the stream ({0})")]
    ReadFailed(String),
    #[error("could not write into the stream ({0})")]
    WriteFailed(String),
    #[error("could not seek in the stream ({0})")]
    SeekFailed(String),
    #[error("opaque block of {0} bytes exceeds the allowed maximum of {1} bytes")]
    OpaqueTooLarge(usize, usize),
    #[error("string of {0} bytes is not valid utf-8")]
    InvalidString(usize),
}

impl XdrError {
    /// Returns `true` if the error signals a clean end of the underlying stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, XdrError::UnexpectedEof(_))
    }

    pub(crate) fn from_read(e: std::io::Error, n_bytes: usize) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => XdrError::UnexpectedEof(n_bytes),
            _ => XdrError::ReadFailed(e.to_string()),
        }
    }
}

/// Errors that can occur in the variable-bit-width integer codec
/// and in the compressed-coordinate codec built on top of it.
#[derive(Error, Debug, PartialEq)]
pub enum CodecError {
    #[error("bit buffer underrun: needed byte {0} but the buffer only holds {1} bytes")]
    BufferUnderrun(usize, usize),
    #[error("cannot encode {0} bits at once (maximum is 32)")]
    TooManyBits(u32),
    #[error("value `{value}` does not fit into range of size `{size}`")]
    ValueOutOfRange { value: u32, size: u32 },
    #[error("mixed-radix size at position {0} is zero")]
    ZeroSize(usize),
    #[error("mixed-radix accumulator overflow (more than 32 bytes)")]
    AccumulatorOverflow,
    #[error("coordinate `{value}` of atom {atom} cannot be represented as a 32-bit integer at the given precision")]
    CoordinateOutOfRange { atom: usize, value: f32 },
    #[error("coordinate range of axis {0} is too large to be compressed")]
    RangeTooLarge(usize),
    #[error("invalid precision `{0}`")]
    InvalidPrecision(f32),
    #[error("invalid compression index `{0}`")]
    InvalidSmallIndex(i32),
    #[error("invalid bounds: minimum `{0}` is larger than maximum `{1}`")]
    InvalidBounds(i32, i32),
    #[error("compressed block declares {declared} atoms but the frame header declares {expected}")]
    AtomCountMismatch { declared: usize, expected: usize },
    #[error("compressed block declares a negative number of atoms ({0})")]
    NegativeAtomCount(i32),
    #[error("run of small coordinates overflows the frame ({0} atoms)")]
    RunOverflow(usize),
    #[error("{0}")]
    Xdr(#[from] XdrError),
}

/// Errors that can occur when reading trajectory files.
#[derive(Error, Debug, PartialEq)]
pub enum ReadTrajError {
    #[error("file `{0}` was not found or could not be opened")]
    FileNotFound(Box<Path>),
    #[error("file `{0}` is not a valid dcd file")]
    NotDcd(Box<Path>),
    #[error("file `{0}` is not a valid xtc file")]
    NotXtc(Box<Path>),
    #[error("file `{0}` is not a valid trr file")]
    NotTrr(Box<Path>),
    #[error("file `{0}` has an unknown or unsupported extension")]
    UnknownExtension(Box<Path>),
    #[error("header of `{0}` is malformed ({1})")]
    InvalidHeader(Box<Path>, String),
    #[error("file `{0}` uses {1} which is not supported")]
    Unsupported(Box<Path>, String),
    #[error("record markers do not match in frame {frame} (leading {leading}, trailing {trailing}, expected {expected})")]
    RecordMismatch {
        frame: usize,
        leading: u64,
        trailing: u64,
        expected: u64,
    },
    #[error("invalid magic number `{magic}` in frame {frame}")]
    InvalidMagic { frame: usize, magic: i32 },
    #[error("frame {frame} contains {found} atoms but the trajectory contains {expected} atoms")]
    InconsistentAtoms {
        frame: usize,
        found: usize,
        expected: usize,
    },
    #[error("frame {0} is out of range (trajectory contains {1} frames)")]
    FrameOutOfRange(usize, usize),
    #[error("file ended unexpectedly while reading frame {0}")]
    UnexpectedEof(usize),
    #[error("group contains {0} atoms but the trajectory frame contains {1} atoms")]
    AtomsNumberMismatch(usize, usize),
    #[error("current frame of the trajectory contains no velocities")]
    NoVelocities,
    #[error("could not read frame {frame} ({source})")]
    Xdr { frame: usize, source: XdrError },
    #[error("could not decode coordinates of frame {frame} ({source})")]
    Codec { frame: usize, source: CodecError },
    #[error("step for frame iteration must be positive, not `{0}`")]
    InvalidStep(usize),
    #[error("{0}")]
    Other(String),
}

impl ReadTrajError {
    /// Wrap a word-level read error with the index of the frame being read.
    pub(crate) fn xdr(frame: usize, source: XdrError) -> Self {
        match source {
            XdrError::UnexpectedEof(_) => ReadTrajError::UnexpectedEof(frame),
            _ => ReadTrajError::Xdr { frame, source },
        }
    }

    /// Wrap a codec error with the index of the frame being decoded.
    pub(crate) fn codec(frame: usize, source: CodecError) -> Self {
        match source {
            CodecError::Xdr(e) => ReadTrajError::xdr(frame, e),
            other => ReadTrajError::Codec {
                frame,
                source: other,
            },
        }
    }
}

/// Errors that can occur when writing trajectory files.
#[derive(Error, Debug, PartialEq)]
pub enum WriteTrajError {
    #[error("file `{0}` could not be created")]
    CouldNotCreate(Box<Path>),
    #[error("file `{0}` could not be opened for appending ({1})")]
    CouldNotAppend(Box<Path>, String),
    #[error("header has not been set")]
    HeaderNotSet,
    #[error("header has already been written")]
    HeaderAlreadyWritten,
    #[error("header must be written before writing frames")]
    HeaderNotWritten,
    #[error("attempting to write more frames than declared ({0})")]
    TooManyFrames(usize),
    #[error("frame contains {0} atoms but the file expects {1} atoms")]
    AtomsNumberMismatch(usize, usize),
    #[error("file expects a periodic box but the frame has none")]
    MissingBox,
    #[error("frame has a periodic box but the file was declared without one")]
    UnexpectedBox,
    #[error("step `{step}` of frame {frame} does not fit into the step field of the file")]
    StepOutOfRange { frame: usize, step: u64 },
    #[error("could not write frame {frame} ({source})")]
    Xdr { frame: usize, source: XdrError },
    #[error("could not compress coordinates of frame {frame} ({source})")]
    Codec { frame: usize, source: CodecError },
}

impl WriteTrajError {
    pub(crate) fn codec(frame: usize, source: CodecError) -> Self {
        match source {
            CodecError::Xdr(e) => WriteTrajError::Xdr { frame, source: e },
            other => WriteTrajError::Codec {
                frame,
                source: other,
            },
        }
    }
}

/// Errors that can occur when scanning or repairing the frame count of a dcd file.
#[derive(Error, Debug, PartialEq)]
pub enum RepairError {
    #[error("file `{0}` could not be opened for repair")]
    CouldNotOpen(Box<Path>),
    #[error("{0}")]
    Read(#[from] ReadTrajError),
    #[error("could not patch the header of `{0}` ({1})")]
    PatchFailed(Box<Path>, XdrError),
}
