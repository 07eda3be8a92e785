// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Reading and writing of xtc trajectory files.
//!
//! Each xtc frame starts with a header (magic number `1995`, number of atoms,
//! simulation step, simulation time and 3x3 box matrix) followed by
//! a block of compressed coordinates. Coordinates are stored as written,
//! i.e. in nanometers for files produced by Gromacs.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use getset::CopyGetters;

use crate::errors::{CodecError, ReadTrajError, WriteTrajError, XdrError};
use crate::io::traj_io::{init_cache, Frame, TrajOptions, TrajState, Trajectory};
use crate::io::xdr::{padding, XdrReader, XdrWriter};
use crate::io::xtc_codec::{self, DEFAULT_PRECISION, RAW_THRESHOLD};
use crate::structures::{group::AtomGroup, simbox::SimBox, vector3d::Vector3D};

/// Magic number starting every xtc frame.
pub const XTC_MAGIC: i32 = 1995;

/// Number of 4-byte words of a compressed block preceding its byte count:
/// atom count, precision, minimum and maximum integer coordinates, small index.
const COMPRESSED_PREAMBLE: u64 = 9;

/// Header of a single xtc frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct XtcFrameHeader {
    natoms: usize,
    step: i32,
    time: f32,
    matrix: [f32; 9],
}

/// Read the header of an xtc frame.
///
/// ## Returns
/// `Ok(None)` if the stream ends before the frame.
fn read_frame_header<R: std::io::Read>(
    reader: &mut XdrReader<R>,
    frame: usize,
) -> Result<Option<XtcFrameHeader>, ReadTrajError> {
    let magic: i32 = match reader.read() {
        Ok(magic) => magic,
        Err(e) if e.is_eof() => return Ok(None),
        Err(e) => return Err(ReadTrajError::xdr(frame, e)),
    };

    if magic != XTC_MAGIC {
        return Err(ReadTrajError::InvalidMagic { frame, magic });
    }

    let natoms: i32 = reader.read().map_err(|e| ReadTrajError::xdr(frame, e))?;
    if natoms < 0 {
        return Err(ReadTrajError::codec(frame, CodecError::NegativeAtomCount(natoms)));
    }

    let step: i32 = reader.read().map_err(|e| ReadTrajError::xdr(frame, e))?;
    let time: f32 = reader.read().map_err(|e| ReadTrajError::xdr(frame, e))?;
    let mut matrix = [0.0f32; 9];
    reader
        .read_into(&mut matrix)
        .map_err(|e| ReadTrajError::xdr(frame, e))?;

    Ok(Some(XtcFrameHeader {
        natoms: natoms as usize,
        step,
        time,
        matrix,
    }))
}

/// Skip over the compressed coordinate block of a frame with `natoms` atoms.
fn skip_coordinates<R: std::io::Read + std::io::Seek>(
    reader: &mut XdrReader<R>,
    natoms: usize,
    frame: usize,
) -> Result<(), ReadTrajError> {
    let io = |e: XdrError| ReadTrajError::xdr(frame, e);

    if natoms <= RAW_THRESHOLD {
        let declared: i32 = reader.read().map_err(io)?;
        if declared as usize != natoms {
            return Err(ReadTrajError::InconsistentAtoms {
                frame,
                found: declared.max(0) as usize,
                expected: natoms,
            });
        }
        reader.seek_by(12 * natoms as i64).map_err(io)?;
    } else {
        reader.seek_by(4 * COMPRESSED_PREAMBLE as i64).map_err(io)?;
        let nbytes: i32 = reader.read().map_err(io)?;
        let limit = natoms.saturating_mul(24).saturating_add(64);
        if nbytes < 0 || nbytes as usize > limit {
            return Err(ReadTrajError::Xdr {
                frame,
                source: XdrError::OpaqueTooLarge(nbytes.max(0) as usize, limit),
            });
        }
        let nbytes = nbytes as usize;
        reader
            .seek_by((nbytes + padding(nbytes)) as i64)
            .map_err(io)?;
    }

    Ok(())
}

/**************************/
/*         READER         */
/**************************/

/// Reader of xtc trajectory files.
///
/// All frames are scanned when the file is opened, so that the number of frames
/// is known and any frame can be accessed directly.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let mut xtc = XtcReader::open("trajectory.xtc", TrajOptions::default()).unwrap();
/// xtc.read_frame_at(10).unwrap();
/// println!("{:?}", xtc.coords()[0]);
/// ```
pub struct XtcReader {
    filename: Box<Path>,
    reader: XdrReader<BufReader<File>>,
    offsets: Vec<u64>,
    natoms: usize,
    timestep: f32,
    buffer: Vec<[f32; 3]>,
    coords: Vec<Vector3D>,
    simbox: Option<SimBox>,
    step: Option<u64>,
    time: Option<f32>,
    precision: Option<f32>,
    options: TrajOptions,
    state: TrajState,
}

impl XtcReader {
    /// Open an xtc file and scan its frames.
    ///
    /// ## Returns
    /// `XtcReader` if the file is a valid xtc file. Otherwise `ReadTrajError`.
    /// Incomplete frame at the end of the file is ignored.
    pub fn open(filename: impl AsRef<Path>, options: TrajOptions) -> Result<XtcReader, ReadTrajError> {
        let filename = filename.as_ref();
        let file = File::open(filename).map_err(|_| ReadTrajError::FileNotFound(Box::from(filename)))?;
        let mut reader = XdrReader::new(BufReader::new(file));

        let XtcScan {
            offsets,
            natoms,
            timestep,
            ..
        } = scan_frames(&mut reader, filename)?;

        log::debug!(
            "Xtc file '{}' contains {} frames of {} atoms.",
            filename.display(),
            offsets.len(),
            natoms
        );

        let mut xtc = XtcReader {
            filename: Box::from(filename),
            reader,
            offsets,
            natoms,
            timestep,
            buffer: Vec::with_capacity(natoms),
            coords: vec![Vector3D::default(); natoms],
            simbox: None,
            step: None,
            time: None,
            precision: None,
            options,
            state: TrajState::default(),
        };

        init_cache(&mut xtc)?;
        Ok(xtc)
    }

    /// Get the name of the xtc file.
    pub fn filename(&self) -> &Path {
        &self.filename
    }
}

/// Complete frames found in an xtc file.
#[derive(Debug, Clone, PartialEq)]
struct XtcScan {
    offsets: Vec<u64>,
    natoms: usize,
    /// Estimated time step.
    timestep: f32,
    /// Position just after the last complete frame.
    end: u64,
    file_len: u64,
}

/// Scan all frames of an xtc file.
fn scan_frames(
    reader: &mut XdrReader<BufReader<File>>,
    filename: &Path,
) -> Result<XtcScan, ReadTrajError> {
    let file_len = reader
        .stream_len()
        .map_err(|e| ReadTrajError::InvalidHeader(Box::from(filename), e.to_string()))?;
    if file_len == 0 {
        return Err(ReadTrajError::NotXtc(Box::from(filename)));
    }

    let mut offsets = Vec::new();
    let mut natoms = None;
    let mut timestep = 0.0;
    let mut complete_end = 0;

    loop {
        let frame = offsets.len();
        let offset = reader.position().map_err(|e| ReadTrajError::xdr(frame, e))?;
        if offset >= file_len {
            break;
        }

        let header = match read_frame_header(reader, frame) {
            Ok(Some(header)) => header,
            Ok(None) | Err(ReadTrajError::UnexpectedEof(_)) => {
                log::warn!(
                    "Xtc file '{}' ends with an incomplete frame header. Ignoring it.",
                    filename.display()
                );
                break;
            }
            Err(ReadTrajError::InvalidMagic { .. }) if frame == 0 => {
                return Err(ReadTrajError::NotXtc(Box::from(filename)))
            }
            Err(e) => return Err(e),
        };

        match natoms {
            None => natoms = Some(header.natoms),
            Some(n) if n != header.natoms => {
                return Err(ReadTrajError::InconsistentAtoms {
                    frame,
                    found: header.natoms,
                    expected: n,
                })
            }
            Some(_) => (),
        }

        if header.step != 0 {
            timestep = header.time / header.step as f32;
        }

        match skip_coordinates(reader, header.natoms, frame) {
            Ok(()) => (),
            Err(ReadTrajError::UnexpectedEof(_)) => {
                log::warn!(
                    "Xtc file '{}' ends with an incomplete frame. Ignoring it.",
                    filename.display()
                );
                break;
            }
            Err(e) => return Err(e),
        }

        let end = reader.position().map_err(|e| ReadTrajError::xdr(frame, e))?;
        if end > file_len {
            log::warn!(
                "Xtc file '{}' ends with an incomplete frame. Ignoring it.",
                filename.display()
            );
            break;
        }

        offsets.push(offset);
        complete_end = end;
    }

    if offsets.is_empty() {
        return Err(ReadTrajError::NotXtc(Box::from(filename)));
    }

    reader
        .seek_to(offsets.first().copied().unwrap_or(0))
        .map_err(|e| ReadTrajError::xdr(0, e))?;

    Ok(XtcScan {
        offsets,
        natoms: natoms.unwrap_or(0),
        timestep,
        end: complete_end,
        file_len,
    })
}

impl Trajectory for XtcReader {
    fn natoms(&self) -> usize {
        self.natoms
    }

    fn nframes(&self) -> usize {
        self.offsets.len()
    }

    /// Time step estimated from the frame times: `time / step`.
    fn timestep(&self) -> f32 {
        self.timestep
    }

    /// Box of the current frame is checked; a zero box matrix means no periodic box.
    fn has_periodic_box(&self) -> bool {
        self.simbox.is_some()
    }

    /// Zero box matrix is reported as `None`.
    fn periodic_box(&self) -> Option<SimBox> {
        self.simbox
    }

    fn coords(&self) -> &[Vector3D] {
        &self.coords
    }

    fn frame_step(&self) -> Option<u64> {
        self.step
    }

    fn frame_time(&self) -> Option<f32> {
        self.time
    }

    fn precision(&self) -> Option<f32> {
        self.precision
    }

    fn options(&self) -> TrajOptions {
        self.options
    }

    fn state(&self) -> &TrajState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TrajState {
        &mut self.state
    }

    fn seek_frame_impl(&mut self, index: usize) -> Result<(), ReadTrajError> {
        let offset = *self
            .offsets
            .get(index)
            .ok_or(ReadTrajError::FrameOutOfRange(index, self.offsets.len()))?;

        self.reader
            .seek_to(offset)
            .map_err(|e| ReadTrajError::xdr(index, e))
    }

    fn parse_frame(&mut self, index: usize) -> Result<bool, ReadTrajError> {
        let header = match read_frame_header(&mut self.reader, index)? {
            Some(header) => header,
            None => return Ok(false),
        };

        if header.natoms != self.natoms {
            return Err(ReadTrajError::InconsistentAtoms {
                frame: index,
                found: header.natoms,
                expected: self.natoms,
            });
        }

        let precision = xtc_codec::decode_coordinates(&mut self.reader, self.natoms, &mut self.buffer)
            .map_err(|e| ReadTrajError::codec(index, e))?;

        for (coord, raw) in self.coords.iter_mut().zip(self.buffer.iter()) {
            *coord = Vector3D::from(*raw);
        }

        let simbox = SimBox::from_matrix(header.matrix);
        self.simbox = if simbox.is_zero() { None } else { Some(simbox) };
        self.step = Some(header.step.max(0) as u64);
        self.time = Some(header.time);
        self.precision = if precision > 0.0 { Some(precision) } else { None };

        Ok(true)
    }

    fn rewind_impl(&mut self) -> Result<(), ReadTrajError> {
        self.reader
            .seek_to(self.offsets.first().copied().unwrap_or(0))
            .map_err(|e| ReadTrajError::xdr(0, e))
    }
}

/**************************/
/*         WRITER         */
/**************************/

/// Options for writing xtc files.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct XtcWriterOptions {
    /// Coordinates are stored as `round(x * precision)`. Default: 1000.
    precision: f32,
    /// Simulation time per simulation step. Default: 1.
    dt: f32,
    /// Number of simulation steps between written frames. Default: 1.
    steps_per_frame: u64,
}

impl Default for XtcWriterOptions {
    fn default() -> Self {
        XtcWriterOptions {
            precision: DEFAULT_PRECISION,
            dt: 1.0,
            steps_per_frame: 1,
        }
    }
}

impl XtcWriterOptions {
    pub fn with_precision(mut self, precision: f32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_steps_per_frame(mut self, steps: u64) -> Self {
        self.steps_per_frame = steps;
        self
    }
}

/// Writer of xtc trajectory files.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let mut group = AtomGroup::new(100);
/// group.set_box(Some(SimBox::from([5.0, 5.0, 5.0])));
///
/// let options = XtcWriterOptions::default().with_precision(100.0).with_dt(0.002);
/// let mut writer = XtcWriter::create("output.xtc", options).unwrap();
/// writer.write_group(&group).unwrap();
/// writer.finish().unwrap();
/// ```
pub struct XtcWriter {
    writer: XdrWriter<BufWriter<File>>,
    options: XtcWriterOptions,
    natoms: Option<usize>,
    /// Frames already present in an appended file.
    existing: usize,
    frames_written: usize,
}

impl XtcWriter {
    /// Create a new xtc file.
    pub fn create(
        filename: impl AsRef<Path>,
        options: XtcWriterOptions,
    ) -> Result<XtcWriter, WriteTrajError> {
        let filename = filename.as_ref();
        let file = File::create(filename)
            .map_err(|_| WriteTrajError::CouldNotCreate(Box::from(filename)))?;

        Ok(XtcWriter {
            writer: XdrWriter::new(BufWriter::new(file)),
            options,
            natoms: None,
            existing: 0,
            frames_written: 0,
        })
    }

    /// Open an xtc file for appending frames. The file is created if it does not exist.
    ///
    /// ## Notes
    /// - New frames must contain the same number of atoms as the frames already present.
    /// - Incomplete frame at the end of the file is removed.
    /// - Steps calculated from the writer options continue from the number of frames in the file.
    ///
    /// ## Example
    /// ```no_run
    /// use trjkit::prelude::*;
    ///
    /// let group = AtomGroup::new(100);
    ///
    /// let mut writer = XtcWriter::append("output.xtc", XtcWriterOptions::default()).unwrap();
    /// writer.write_group(&group).unwrap();
    /// writer.finish().unwrap();
    /// ```
    pub fn append(
        filename: impl AsRef<Path>,
        options: XtcWriterOptions,
    ) -> Result<XtcWriter, WriteTrajError> {
        let filename = filename.as_ref();
        let append_error = |e: String| WriteTrajError::CouldNotAppend(Box::from(filename), e);

        let is_empty = match std::fs::metadata(filename) {
            Ok(metadata) => metadata.len() == 0,
            Err(_) => true,
        };
        if is_empty {
            return XtcWriter::create(filename, options);
        }

        let file = File::open(filename).map_err(|e| append_error(e.to_string()))?;
        let mut reader = XdrReader::new(BufReader::new(file));
        let scan = scan_frames(&mut reader, filename).map_err(|e| append_error(e.to_string()))?;

        let file = OpenOptions::new()
            .write(true)
            .open(filename)
            .map_err(|e| append_error(e.to_string()))?;

        if scan.file_len > scan.end {
            log::warn!(
                "Removing {} bytes of incomplete frame data from the end of '{}'.",
                scan.file_len - scan.end,
                filename.display()
            );
            file.set_len(scan.end)
                .map_err(|e| append_error(e.to_string()))?;
        }

        let mut writer = XdrWriter::new(BufWriter::new(file));
        writer
            .seek_to(scan.end)
            .map_err(|e| append_error(e.to_string()))?;

        log::debug!(
            "Appending to xtc file '{}' with {} frames of {} atoms.",
            filename.display(),
            scan.offsets.len(),
            scan.natoms
        );

        Ok(XtcWriter {
            writer,
            options,
            natoms: Some(scan.natoms),
            existing: scan.offsets.len(),
            frames_written: 0,
        })
    }

    /// Number of frames written by this writer. Frames already present in an appended file are not counted.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn write_coords(
        &mut self,
        coords: &[Vector3D],
        simbox: Option<&SimBox>,
        step: u64,
        time: f32,
        precision: f32,
    ) -> Result<(), WriteTrajError> {
        let frame = self.existing + self.frames_written;
        let natoms = *self.natoms.get_or_insert(coords.len());
        if coords.len() != natoms {
            return Err(WriteTrajError::AtomsNumberMismatch(coords.len(), natoms));
        }

        // compress first so that nothing is written for invalid coordinates
        let raw: Vec<[f32; 3]> = coords.iter().map(|c| c.to_array()).collect();
        let mut block = XdrWriter::new(Vec::new());
        xtc_codec::encode_coordinates(&raw, precision, &mut block)
            .map_err(|e| WriteTrajError::codec(frame, e))?;
        let block = block.into_inner();

        let matrix = simbox.map(|s| s.to_matrix()).unwrap_or([0.0; 9]);
        let step =
            i32::try_from(step).map_err(|_| WriteTrajError::StepOutOfRange { frame, step })?;

        let result = (|| {
            self.writer.write(XTC_MAGIC)?;
            self.writer.write(natoms as i32)?;
            self.writer.write(step)?;
            self.writer.write(time)?;
            self.writer.write_slice(&matrix)?;
            self.writer.write_opaque(&block)
        })();
        result.map_err(|e| WriteTrajError::Xdr { frame, source: e })?;

        self.frames_written += 1;
        Ok(())
    }

    /// Step and time of the next frame calculated from the writer options.
    fn next_step_time(&self) -> (u64, f32) {
        let step = (self.existing + self.frames_written) as u64 * self.options.steps_per_frame;
        (step, step as f32 * self.options.dt)
    }

    /// Write a frame. Step and time of the frame are used if present,
    /// otherwise they are calculated from the writer options.
    /// The precision of the writer is always used.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), WriteTrajError> {
        let (step, time) = self.next_step_time();
        self.write_coords(
            frame.coords(),
            frame.simbox().as_ref(),
            frame.step().unwrap_or(step),
            frame.time().unwrap_or(time),
            self.options.precision,
        )
    }

    /// Write the current positions of an atom group as a new frame.
    /// Step and time are calculated from the writer options.
    pub fn write_group(&mut self, group: &AtomGroup) -> Result<(), WriteTrajError> {
        let (step, time) = self.next_step_time();
        self.write_coords(
            group.positions(),
            group.get_box(),
            step,
            time,
            self.options.precision,
        )
    }

    /// Flush all written frames into the file.
    pub fn finish(mut self) -> Result<(), WriteTrajError> {
        let frame = self.existing + self.frames_written;
        self.writer
            .flush()
            .map_err(|e| WriteTrajError::Xdr { frame, source: e })
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(natoms: i32, step: i32, time: f32) -> Vec<u8> {
        let mut writer = XdrWriter::new(Vec::new());
        writer.write(XTC_MAGIC).unwrap();
        writer.write(natoms).unwrap();
        writer.write(step).unwrap();
        writer.write(time).unwrap();
        writer
            .write_slice(&[3.0f32, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 5.0])
            .unwrap();
        writer.into_inner()
    }

    #[test]
    fn read_header() {
        let mut reader = XdrReader::new(Cursor::new(header_bytes(12, 100, 0.2)));
        let header = read_frame_header(&mut reader, 0).unwrap().unwrap();
        assert_eq!(header.natoms, 12);
        assert_eq!(header.step, 100);
        assert_eq!(header.time, 0.2);
        assert_eq!(header.matrix[4], 4.0);
    }

    #[test]
    fn read_header_end_of_stream() {
        let mut reader = XdrReader::new(Cursor::new(Vec::new()));
        assert!(read_frame_header(&mut reader, 3).unwrap().is_none());
    }

    #[test]
    fn read_header_truncated() {
        let mut bytes = header_bytes(12, 100, 0.2);
        bytes.truncate(20);
        let mut reader = XdrReader::new(Cursor::new(bytes));
        assert_eq!(
            read_frame_header(&mut reader, 3),
            Err(ReadTrajError::UnexpectedEof(3))
        );
    }

    #[test]
    fn read_header_invalid_magic() {
        let mut bytes = header_bytes(12, 100, 0.2);
        bytes[..4].copy_from_slice(&1993i32.to_be_bytes());
        let mut reader = XdrReader::new(Cursor::new(bytes));
        assert_eq!(
            read_frame_header(&mut reader, 1),
            Err(ReadTrajError::InvalidMagic {
                frame: 1,
                magic: 1993
            })
        );
    }

    #[test]
    fn skip_compressed_and_raw() {
        for natoms in [3usize, 9, 10, 200] {
            let coords: Vec<[f32; 3]> = (0..natoms)
                .map(|i| [i as f32 * 0.1, 1.0, -(i as f32) * 0.05])
                .collect();
            let mut writer = XdrWriter::new(Vec::new());
            xtc_codec::encode_coordinates(&coords, 1000.0, &mut writer).unwrap();
            writer.write(42i32).unwrap();

            let mut reader = XdrReader::new(Cursor::new(writer.into_inner()));
            skip_coordinates(&mut reader, natoms, 0).unwrap();
            assert_eq!(reader.read::<i32>().unwrap(), 42);
        }
    }

    #[test]
    fn writer_options() {
        let options = XtcWriterOptions::default();
        assert_eq!(options.precision(), 1000.0);
        assert_eq!(options.dt(), 1.0);
        assert_eq!(options.steps_per_frame(), 1);

        let options = options
            .with_precision(100.0)
            .with_dt(0.002)
            .with_steps_per_frame(5000);
        assert_eq!(options.precision(), 100.0);
        assert_eq!(options.dt(), 0.002);
        assert_eq!(options.steps_per_frame(), 5000);
    }
}
