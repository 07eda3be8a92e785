// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Reading, writing and repairing of CHARMM/NAMD dcd trajectory files.
//!
//! A dcd file is a sequence of Fortran unformatted records, each bracketed by
//! two identical record markers holding the length of the record. The file starts
//! with a header record (`CORD` + 20 control integers), a title record and an atom
//! count record. Each frame consists of an optional crystal record (6 doubles)
//! followed by one record per axis (`natoms` floats each).
//!
//! Byte order and the width of the record markers (32 or 64 bits) depend on the
//! machine and program that wrote the file and are detected at open.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;

use getset::{CopyGetters, Getters};

use crate::errors::{ReadTrajError, RepairError, WriteTrajError, XdrError};
use crate::io::traj_io::{init_cache, Frame, TrajOptions, TrajState, Trajectory};
use crate::io::xdr::{ByteOrder, XdrReader, XdrWord, XdrWriter};
use crate::structures::{group::AtomGroup, simbox::SimBox, vector3d::Vector3D};

/// Length of the header record.
const HEADER_RECORD: u64 = 84;
/// Length of the crystal (unit cell) record.
const CRYSTAL_RECORD: u64 = 48;
/// Length of a single title line.
const TITLE_LENGTH: usize = 80;
/// CHARMM version written into new files.
const CHARMM_VERSION: i32 = 24;

// indices into the control array of the header
const NSET: usize = 0;
const ISTART: usize = 1;
const NSAVC: usize = 2;
const NSTEP: usize = 3;
const DEGREES_OF_FREEDOM: usize = 7;
const NAMNF: usize = 8;
const DELTA: usize = 9;
const CRYSTAL_FLAG: usize = 10;
const DIM4_FLAG: usize = 11;
const VERSION: usize = 19;

/// Width of the Fortran record markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarkerWidth {
    #[default]
    Bits32,
    Bits64,
}

impl MarkerWidth {
    /// Size of the marker in bytes.
    #[inline]
    pub fn bytes(self) -> u64 {
        match self {
            MarkerWidth::Bits32 => 4,
            MarkerWidth::Bits64 => 8,
        }
    }
}

/// Detect byte order and marker width from the first 8 bytes of a dcd file.
/// The first record is the header and its marker always holds 84.
fn detect_format(bytes: [u8; 8]) -> Option<(ByteOrder, MarkerWidth)> {
    if u64::decode(bytes, ByteOrder::Little) == HEADER_RECORD {
        return Some((ByteOrder::Little, MarkerWidth::Bits64));
    }
    if u64::decode(bytes, ByteOrder::Big) == HEADER_RECORD {
        return Some((ByteOrder::Big, MarkerWidth::Bits64));
    }

    let first = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if u32::decode(first, ByteOrder::Little) as u64 == HEADER_RECORD {
        return Some((ByteOrder::Little, MarkerWidth::Bits32));
    }
    if u32::decode(first, ByteOrder::Big) as u64 == HEADER_RECORD {
        return Some((ByteOrder::Big, MarkerWidth::Bits32));
    }

    None
}

/**************************/
/*         HEADER         */
/**************************/

/// Information stored in the header of a dcd file.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DcdHeader {
    /// Number of atoms in each frame.
    #[getset(get_copy = "pub")]
    natoms: usize,
    /// Number of frames declared by the header (`NSET`). May be wrong for files
    /// written by programs that terminated unexpectedly.
    #[getset(get_copy = "pub")]
    declared_frames: i32,
    /// Simulation step of the first frame (`ISTART`).
    #[getset(get_copy = "pub")]
    istart: i32,
    /// Number of simulation steps between frames (`NSAVC`).
    #[getset(get_copy = "pub")]
    nsavc: i32,
    /// Total number of simulation steps (`NSTEP`).
    #[getset(get_copy = "pub")]
    nsteps: i32,
    /// Integration time step (`DELTA`).
    #[getset(get_copy = "pub")]
    timestep: f32,
    /// Frames contain a crystal (unit cell) record.
    #[getset(get_copy = "pub")]
    has_crystal: bool,
    #[getset(get_copy = "pub")]
    charmm_version: i32,
    /// Byte order of the file.
    #[getset(get_copy = "pub")]
    byte_order: ByteOrder,
    /// Width of the record markers.
    #[getset(get_copy = "pub")]
    marker_width: MarkerWidth,
    /// Title lines with trailing whitespace removed.
    #[getset(get = "pub")]
    titles: Vec<String>,
}

impl DcdHeader {
    /// Size of one frame record in bytes.
    fn frame_size(&self) -> u64 {
        let marker = self.marker_width.bytes();
        let axis = 4 * self.natoms as u64 + 2 * marker;
        let crystal = if self.has_crystal {
            CRYSTAL_RECORD + 2 * marker
        } else {
            0
        };

        3 * axis + crystal
    }

    /// Position of the control integer with the given index in the file.
    fn control_offset(&self, index: usize) -> u64 {
        // leading marker, `CORD`
        self.marker_width.bytes() + 4 + 4 * index as u64
    }
}

/// Header of an opened dcd file together with the position of the first frame.
struct DcdLayout {
    header: DcdHeader,
    first_frame_pos: u64,
    file_len: u64,
}

impl DcdLayout {
    #[inline]
    fn frame_size(&self) -> u64 {
        self.header.frame_size()
    }

    #[inline]
    fn frame_offset(&self, index: usize) -> u64 {
        self.first_frame_pos + index as u64 * self.frame_size()
    }

    /// Number of frames that fit into the file and the number of remaining bytes.
    fn frames_by_size(&self) -> (u64, u64) {
        let data = self.file_len.saturating_sub(self.first_frame_pos);
        let size = self.frame_size();
        (data / size, data % size)
    }
}

/// Read a record marker.
fn read_marker<R: Read>(reader: &mut XdrReader<R>, width: MarkerWidth) -> Result<u64, XdrError> {
    match width {
        MarkerWidth::Bits32 => Ok(reader.read::<u32>()? as u64),
        MarkerWidth::Bits64 => reader.read::<u64>(),
    }
}

/// Open a dcd file and read its header.
fn open_layout(
    filename: &Path,
) -> Result<(XdrReader<BufReader<File>>, DcdLayout), ReadTrajError> {
    let file = File::open(filename).map_err(|_| ReadTrajError::FileNotFound(Box::from(filename)))?;
    let mut buffer = BufReader::new(file);

    let mut first = [0u8; 8];
    buffer
        .read_exact(&mut first)
        .map_err(|_| ReadTrajError::NotDcd(Box::from(filename)))?;
    let (order, width) =
        detect_format(first).ok_or_else(|| ReadTrajError::NotDcd(Box::from(filename)))?;
    buffer
        .rewind()
        .map_err(|_| ReadTrajError::NotDcd(Box::from(filename)))?;

    log::debug!(
        "Dcd file '{}' uses {:?} byte order and {}-byte record markers.",
        filename.display(),
        order,
        width.bytes()
    );

    let mut reader = XdrReader::with_order(buffer, order);
    let header = read_header(&mut reader, filename, order, width)?;

    let invalid = |e: XdrError| ReadTrajError::InvalidHeader(Box::from(filename), e.to_string());
    let first_frame_pos = reader.position().map_err(invalid)?;
    let file_len = reader.stream_len().map_err(invalid)?;

    Ok((
        reader,
        DcdLayout {
            header,
            first_frame_pos,
            file_len,
        },
    ))
}

/// Read header, title and atom count records.
fn read_header<R: Read>(
    reader: &mut XdrReader<R>,
    filename: &Path,
    order: ByteOrder,
    width: MarkerWidth,
) -> Result<DcdHeader, ReadTrajError> {
    let invalid = |msg: String| ReadTrajError::InvalidHeader(Box::from(filename), msg);
    let io = |e: XdrError| ReadTrajError::InvalidHeader(Box::from(filename), e.to_string());

    // header record
    read_marker(reader, width).map_err(io)?;
    let magic = reader.read_opaque(4).map_err(io)?;
    if magic != b"CORD" {
        return Err(ReadTrajError::NotDcd(Box::from(filename)));
    }

    let mut control = [0i32; 20];
    reader.read_into(&mut control).map_err(io)?;
    let trailing = read_marker(reader, width).map_err(io)?;
    if trailing != HEADER_RECORD {
        return Err(invalid(format!(
            "header record ends with marker {} instead of {}",
            trailing, HEADER_RECORD
        )));
    }

    if control[NAMNF] != 0 {
        return Err(ReadTrajError::Unsupported(
            Box::from(filename),
            format!("fixed atoms ({})", control[NAMNF]),
        ));
    }

    if control[DIM4_FLAG] != 0 {
        return Err(ReadTrajError::Unsupported(
            Box::from(filename),
            "four-dimensional coordinates".to_owned(),
        ));
    }

    // title record
    let length = read_marker(reader, width).map_err(io)?;
    let ntitles: i32 = reader.read().map_err(io)?;
    if ntitles < 0 || length != 4 + (ntitles as u64) * TITLE_LENGTH as u64 {
        return Err(invalid(format!(
            "title record of {} bytes does not hold {} titles",
            length, ntitles
        )));
    }

    let mut titles = Vec::with_capacity(ntitles as usize);
    for _ in 0..ntitles {
        let raw = reader.read_opaque(TITLE_LENGTH).map_err(io)?;
        titles.push(
            String::from_utf8_lossy(&raw)
                .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_owned(),
        );
    }

    if read_marker(reader, width).map_err(io)? != length {
        return Err(invalid("title record markers do not match".to_owned()));
    }

    // atom count record
    if read_marker(reader, width).map_err(io)? != 4 {
        return Err(invalid("invalid atom count record".to_owned()));
    }
    let natoms: i32 = reader.read().map_err(io)?;
    if read_marker(reader, width).map_err(io)? != 4 {
        return Err(invalid("invalid atom count record".to_owned()));
    }
    if natoms < 0 {
        return Err(invalid(format!("negative number of atoms ({})", natoms)));
    }

    Ok(DcdHeader {
        natoms: natoms as usize,
        declared_frames: control[NSET],
        istart: control[ISTART],
        nsavc: control[NSAVC],
        nsteps: control[NSTEP],
        timestep: f32::from_bits(control[DELTA] as u32),
        has_crystal: control[CRYSTAL_FLAG] == 1,
        charmm_version: control[VERSION],
        byte_order: order,
        marker_width: width,
        titles,
    })
}

/**************************/
/*         READER         */
/**************************/

/// Reader of dcd trajectory files.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let mut dcd = DcdReader::open("trajectory.dcd", TrajOptions::default()).unwrap();
/// println!("{} atoms, {} frames", dcd.natoms(), dcd.nframes());
///
/// while dcd.read_frame().unwrap() {
///     let x = dcd.xcoords();
///     // analyze the frame
/// }
/// ```
pub struct DcdReader {
    filename: Box<Path>,
    reader: XdrReader<BufReader<File>>,
    layout: DcdLayout,
    nframes: usize,
    xs: Vec<f32>,
    ys: Vec<f32>,
    zs: Vec<f32>,
    coords: Vec<Vector3D>,
    /// Raw crystal record in file order: `[a, gamma, b, beta, alpha, c]`.
    crystal: Option<[f64; 6]>,
    current: Option<usize>,
    options: TrajOptions,
    state: TrajState,
}

impl DcdReader {
    /// Open a dcd file and read its header.
    ///
    /// ## Returns
    /// `DcdReader` if the file is a valid dcd file. Otherwise `ReadTrajError`.
    ///
    /// ## Notes
    /// - The frame count declared in the header is trusted. If it disagrees with
    ///   the size of the file, a warning is logged; use `repair_dcd_frame_count` to fix the file.
    /// - If the header declares zero frames, the number of complete frames is calculated from the size of the file.
    ///   Trailing bytes of an incomplete frame are ignored.
    pub fn open(filename: impl AsRef<Path>, options: TrajOptions) -> Result<DcdReader, ReadTrajError> {
        let filename = filename.as_ref();
        let (reader, layout) = open_layout(filename)?;

        let (by_size, remainder) = layout.frames_by_size();
        let declared = layout.header.declared_frames;

        let nframes = if declared <= 0 {
            if by_size > 0 {
                log::warn!(
                    "Dcd file '{}' declares {} frames. Using {} frames calculated from the file size (+{} bytes of an incomplete frame). Run the frame count repair to fix the header.",
                    filename.display(),
                    declared,
                    by_size,
                    remainder
                );
            } else if remainder != 0 {
                log::warn!(
                    "Dcd file '{}' declares {} frames and contains only {} bytes of an incomplete frame.",
                    filename.display(),
                    declared,
                    remainder
                );
            }
            by_size as usize
        } else {
            if by_size != declared as u64 || remainder != 0 {
                log::warn!(
                    "Dcd file '{}' declares {} frames but its size corresponds to {} frames (+{} bytes). Run the frame count repair to fix the header.",
                    filename.display(),
                    declared,
                    by_size,
                    remainder
                );
            }
            declared as usize
        };

        let natoms = layout.header.natoms;
        let mut dcd = DcdReader {
            filename: Box::from(filename),
            reader,
            layout,
            nframes,
            xs: vec![0.0; natoms],
            ys: vec![0.0; natoms],
            zs: vec![0.0; natoms],
            coords: vec![Vector3D::default(); natoms],
            crystal: None,
            current: None,
            options,
            state: TrajState::default(),
        };

        init_cache(&mut dcd)?;
        Ok(dcd)
    }

    /// Get the header of the dcd file.
    pub fn header(&self) -> &DcdHeader {
        &self.layout.header
    }

    /// Get the name of the dcd file.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Returns `true` if the file uses the byte order of this machine.
    pub fn native_format(&self) -> bool {
        !self.layout.header.byte_order.needs_swap()
    }

    /// Unit cell of the current frame as `[a, b, c, alpha, beta, gamma]`,
    /// with the angles exactly as stored in the file.
    /// `None` if the frames contain no crystal record or no frame has been read.
    pub fn unit_cell(&self) -> Option<[f64; 6]> {
        self.crystal
            .map(|c| [c[0], c[2], c[5], c[4], c[3], c[1]])
    }

    /// The x-coordinates of the current frame.
    pub fn xcoords(&self) -> &[f32] {
        &self.xs
    }

    /// The y-coordinates of the current frame.
    pub fn ycoords(&self) -> &[f32] {
        &self.ys
    }

    /// The z-coordinates of the current frame.
    pub fn zcoords(&self) -> &[f32] {
        &self.zs
    }

    /// Read a record of `out.len()` words checking both of its markers.
    fn read_record<T: XdrWord>(&mut self, frame: usize, out: &mut [T]) -> Result<(), ReadTrajError> {
        let width = self.layout.header.marker_width;
        let expected = (out.len() * std::mem::size_of::<T>()) as u64;

        let leading = read_marker(&mut self.reader, width).map_err(|e| ReadTrajError::xdr(frame, e))?;
        if leading != expected {
            return Err(ReadTrajError::RecordMismatch {
                frame,
                leading,
                trailing: 0,
                expected,
            });
        }

        self.reader
            .read_into(out)
            .map_err(|e| ReadTrajError::xdr(frame, e))?;

        let trailing = read_marker(&mut self.reader, width).map_err(|e| ReadTrajError::xdr(frame, e))?;
        if trailing != expected {
            return Err(ReadTrajError::RecordMismatch {
                frame,
                leading,
                trailing,
                expected,
            });
        }

        Ok(())
    }
}

impl Trajectory for DcdReader {
    fn natoms(&self) -> usize {
        self.layout.header.natoms
    }

    fn nframes(&self) -> usize {
        self.nframes
    }

    fn timestep(&self) -> f32 {
        self.layout.header.timestep
    }

    fn has_periodic_box(&self) -> bool {
        self.layout.header.has_crystal
    }

    /// Angles with all absolute values not larger than one are interpreted as cosines.
    fn periodic_box(&self) -> Option<SimBox> {
        let cell = self.unit_cell()?;
        let lengths = Vector3D::new(cell[0] as f32, cell[1] as f32, cell[2] as f32);

        let mut angles = [cell[3], cell[4], cell[5]];
        if angles.iter().all(|a| a.abs() <= 1.0) {
            angles = angles.map(|a| a.acos().to_degrees());
        }

        Some(SimBox::from_lengths_angles(
            lengths,
            Vector3D::new(angles[0] as f32, angles[1] as f32, angles[2] as f32),
        ))
    }

    fn coords(&self) -> &[Vector3D] {
        &self.coords
    }

    /// Step is calculated as `ISTART + index * NSAVC`.
    fn frame_step(&self) -> Option<u64> {
        let header = &self.layout.header;
        self.current.map(|index| {
            (header.istart as i64 + index as i64 * header.nsavc as i64).max(0) as u64
        })
    }

    fn frame_time(&self) -> Option<f32> {
        self.frame_step()
            .map(|step| step as f32 * self.layout.header.timestep)
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
        let offset = self.layout.frame_offset(index);
        self.reader
            .seek_to(offset)
            .map_err(|e| ReadTrajError::xdr(index, e))
    }

    fn parse_frame(&mut self, index: usize) -> Result<bool, ReadTrajError> {
        let position = self
            .reader
            .position()
            .map_err(|e| ReadTrajError::xdr(index, e))?;
        if position >= self.layout.file_len {
            return Ok(false);
        }

        let mut crystal = None;
        if self.layout.header.has_crystal {
            let mut cell = [0.0f64; 6];
            self.read_record(index, &mut cell)?;
            crystal = Some(cell);
        }

        let natoms = self.layout.header.natoms;
        let mut xs = std::mem::take(&mut self.xs);
        let mut ys = std::mem::take(&mut self.ys);
        let mut zs = std::mem::take(&mut self.zs);
        xs.resize(natoms, 0.0);
        ys.resize(natoms, 0.0);
        zs.resize(natoms, 0.0);

        let result = self
            .read_record(index, &mut xs)
            .and_then(|_| self.read_record(index, &mut ys))
            .and_then(|_| self.read_record(index, &mut zs));

        self.xs = xs;
        self.ys = ys;
        self.zs = zs;
        result?;

        for (i, coord) in self.coords.iter_mut().enumerate() {
            *coord = Vector3D::new(self.xs[i], self.ys[i], self.zs[i]);
        }
        self.crystal = crystal;
        self.current = Some(index);

        Ok(true)
    }

    fn rewind_impl(&mut self) -> Result<(), ReadTrajError> {
        self.reader
            .seek_to(self.layout.first_frame_pos)
            .map_err(|e| ReadTrajError::xdr(0, e))
    }
}

/**************************/
/*         WRITER         */
/**************************/

/// Parameters of a dcd file to be written.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DcdHeaderSpec {
    natoms: usize,
    nframes: usize,
    timestep: f32,
    has_box: bool,
}

/// Writer of dcd trajectory files.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let group = AtomGroup::new(100);
///
/// let mut writer = DcdWriter::create("output.dcd").unwrap();
/// writer.set_header(100, 10, 0.002, false).unwrap();
/// writer.write_header().unwrap();
/// for _ in 0..10 {
///     writer.write_group(&group).unwrap();
/// }
/// writer.finish().unwrap();
/// ```
pub struct DcdWriter {
    filename: Box<Path>,
    writer: XdrWriter<BufWriter<File>>,
    marker_width: MarkerWidth,
    spec: Option<DcdHeaderSpec>,
    titles: Vec<String>,
    header_written: bool,
    /// Frames present in the file before appending.
    existing: usize,
    /// Frames declared in the header currently stored in the file.
    declared: usize,
    /// Maximal number of frames that can be written. `None` when appending.
    limit: Option<usize>,
    frames_written: usize,
    header_layout: Option<DcdHeader>,
}

impl DcdWriter {
    /// Create a new dcd file in the byte order of this machine with 32-bit record markers.
    pub fn create(filename: impl AsRef<Path>) -> Result<DcdWriter, WriteTrajError> {
        DcdWriter::with_format(filename, ByteOrder::native(), MarkerWidth::Bits32)
    }

    /// Create a new dcd file using the specified byte order.
    pub fn with_byte_order(
        filename: impl AsRef<Path>,
        order: ByteOrder,
    ) -> Result<DcdWriter, WriteTrajError> {
        DcdWriter::with_format(filename, order, MarkerWidth::Bits32)
    }

    /// Create a new dcd file using the specified byte order and record marker width.
    pub fn with_format(
        filename: impl AsRef<Path>,
        order: ByteOrder,
        marker_width: MarkerWidth,
    ) -> Result<DcdWriter, WriteTrajError> {
        let filename = filename.as_ref();
        let file = File::create(filename)
            .map_err(|_| WriteTrajError::CouldNotCreate(Box::from(filename)))?;

        Ok(DcdWriter {
            filename: Box::from(filename),
            writer: XdrWriter::with_order(BufWriter::new(file), order),
            marker_width,
            spec: None,
            titles: vec![format!("Created by trjkit {}", crate::TRJKIT_VERSION)],
            header_written: false,
            existing: 0,
            declared: 0,
            limit: None,
            frames_written: 0,
            header_layout: None,
        })
    }

    /// Open an existing dcd file for appending frames.
    /// Byte order, marker width, number of atoms and presence of the box are taken from the file.
    /// Incomplete trailing frame data are removed.
    /// The frame count in the header is updated by `finish`.
    pub fn append(filename: impl AsRef<Path>) -> Result<DcdWriter, WriteTrajError> {
        let filename = filename.as_ref();
        let append_error = |e: String| WriteTrajError::CouldNotAppend(Box::from(filename), e);

        let scan = scan_dcd_frames(filename).map_err(|e| append_error(e.to_string()))?;
        let (_, layout) = open_layout(filename).map_err(|e| append_error(e.to_string()))?;
        let header = layout.header.clone();

        let end = layout.frame_offset(scan.actual_frames);
        let file = OpenOptions::new()
            .write(true)
            .open(filename)
            .map_err(|e| append_error(e.to_string()))?;

        if scan.trailing_bytes > 0 {
            log::warn!(
                "Removing {} bytes of incomplete frame data from the end of '{}'.",
                scan.trailing_bytes,
                filename.display()
            );
            file.set_len(end).map_err(|e| append_error(e.to_string()))?;
        }

        let mut writer = XdrWriter::with_order(BufWriter::new(file), header.byte_order);
        writer
            .seek_to(end)
            .map_err(|e| append_error(e.to_string()))?;

        Ok(DcdWriter {
            filename: Box::from(filename),
            writer,
            marker_width: header.marker_width,
            spec: Some(DcdHeaderSpec {
                natoms: header.natoms,
                nframes: scan.actual_frames,
                timestep: header.timestep,
                has_box: header.has_crystal,
            }),
            titles: header.titles.clone(),
            header_written: true,
            existing: scan.actual_frames,
            declared: header.declared_frames.max(0) as usize,
            limit: None,
            frames_written: 0,
            header_layout: Some(header),
        })
    }

    /// Configure the header of the file.
    pub fn set_header(
        &mut self,
        natoms: usize,
        nframes: usize,
        timestep: f32,
        has_box: bool,
    ) -> Result<(), WriteTrajError> {
        if self.header_written {
            return Err(WriteTrajError::HeaderAlreadyWritten);
        }

        self.spec = Some(DcdHeaderSpec {
            natoms,
            nframes,
            timestep,
            has_box,
        });
        self.limit = Some(nframes);
        Ok(())
    }

    /// Set title lines of the file. Lines longer than 80 bytes are truncated.
    pub fn set_titles(&mut self, titles: Vec<String>) -> Result<(), WriteTrajError> {
        if self.header_written {
            return Err(WriteTrajError::HeaderAlreadyWritten);
        }

        self.titles = titles;
        Ok(())
    }

    /// Number of frames written by this writer.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn io(&self, e: XdrError) -> WriteTrajError {
        WriteTrajError::Xdr {
            frame: self.existing + self.frames_written,
            source: e,
        }
    }

    fn write_marker(&mut self, length: u64) -> Result<(), XdrError> {
        match self.marker_width {
            MarkerWidth::Bits32 => self.writer.write(length as u32),
            MarkerWidth::Bits64 => self.writer.write(length),
        }
    }

    fn write_record<T: XdrWord>(&mut self, data: &[T]) -> Result<(), XdrError> {
        let length = (data.len() * std::mem::size_of::<T>()) as u64;
        self.write_marker(length)?;
        self.writer.write_slice(data)?;
        self.write_marker(length)
    }

    /// Write the header of the file. Must be called exactly once, before writing any frames.
    pub fn write_header(&mut self) -> Result<(), WriteTrajError> {
        if self.header_written {
            return Err(WriteTrajError::HeaderAlreadyWritten);
        }
        let spec = self.spec.ok_or(WriteTrajError::HeaderNotSet)?;

        let mut control = [0i32; 20];
        control[NSET] = spec.nframes as i32;
        control[ISTART] = 0;
        control[NSAVC] = 1;
        control[NSTEP] = spec.nframes as i32;
        control[DEGREES_OF_FREEDOM] = (3 * spec.natoms as i32 - 6).max(0);
        control[DELTA] = spec.timestep.to_bits() as i32;
        control[CRYSTAL_FLAG] = spec.has_box as i32;
        control[VERSION] = CHARMM_VERSION;

        let mut titles = Vec::with_capacity(self.titles.len() * TITLE_LENGTH);
        for title in self.titles.iter() {
            let mut line = title.as_bytes().to_vec();
            line.resize(TITLE_LENGTH, b' ');
            titles.extend_from_slice(&line);
        }
        let ntitles = self.titles.len() as i32;

        let result = (|| {
            self.write_marker(HEADER_RECORD)?;
            self.writer.write_opaque(b"CORD")?;
            self.writer.write_slice(&control)?;
            self.write_marker(HEADER_RECORD)?;

            let title_length = 4 + titles.len() as u64;
            self.write_marker(title_length)?;
            self.writer.write(ntitles)?;
            self.writer.write_opaque(&titles)?;
            self.write_marker(title_length)?;

            self.write_record(&[spec.natoms as i32])
        })();
        result.map_err(|e| self.io(e))?;

        self.declared = spec.nframes;
        self.header_written = true;
        Ok(())
    }

    fn write_coords(
        &mut self,
        coords: &[Vector3D],
        simbox: Option<&SimBox>,
    ) -> Result<(), WriteTrajError> {
        if !self.header_written {
            return Err(WriteTrajError::HeaderNotWritten);
        }
        let spec = self.spec.ok_or(WriteTrajError::HeaderNotSet)?;

        if let Some(limit) = self.limit {
            if self.frames_written >= limit {
                return Err(WriteTrajError::TooManyFrames(limit));
            }
        }

        if coords.len() != spec.natoms {
            return Err(WriteTrajError::AtomsNumberMismatch(coords.len(), spec.natoms));
        }

        let crystal = match (spec.has_box, simbox) {
            (true, None) => return Err(WriteTrajError::MissingBox),
            (false, Some(_)) => return Err(WriteTrajError::UnexpectedBox),
            (false, None) => None,
            (true, Some(simbox)) => Some(crystal_record(simbox)),
        };

        let xs: Vec<f32> = coords.iter().map(|c| c.x).collect();
        let ys: Vec<f32> = coords.iter().map(|c| c.y).collect();
        let zs: Vec<f32> = coords.iter().map(|c| c.z).collect();

        let result = (|| {
            if let Some(cell) = crystal {
                self.write_record(&cell)?;
            }
            self.write_record(&xs)?;
            self.write_record(&ys)?;
            self.write_record(&zs)
        })();
        result.map_err(|e| self.io(e))?;

        self.frames_written += 1;
        Ok(())
    }

    /// Write a frame into the file.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), WriteTrajError> {
        self.write_coords(frame.coords(), frame.simbox().as_ref())
    }

    /// Write the current state of an atom group into the file as a new frame.
    pub fn write_group(&mut self, group: &AtomGroup) -> Result<(), WriteTrajError> {
        self.write_coords(group.positions(), group.get_box())
    }

    /// Flush the file and make the frame count in the header match the number of frames in the file.
    pub fn finish(mut self) -> Result<(), WriteTrajError> {
        self.writer.flush().map_err(|e| self.io(e))?;

        let total = self.existing + self.frames_written;
        if !self.header_written || total == self.declared {
            return Ok(());
        }

        let header = match self.header_layout.take() {
            Some(header) => header,
            None => {
                let (_, layout) = open_layout(&self.filename)
                    .map_err(|e| WriteTrajError::CouldNotAppend(self.filename.clone(), e.to_string()))?;
                layout.header
            }
        };

        log::info!(
            "Updating frame count in the header of '{}' from {} to {}.",
            self.filename.display(),
            self.declared,
            total
        );

        let nsteps = total as i64 * header.nsavc.max(1) as i64;
        let result = (|| {
            self.writer.seek_to(header.control_offset(NSET))?;
            self.writer.write(total as i32)?;
            self.writer.seek_to(header.control_offset(NSTEP))?;
            self.writer.write(nsteps as i32)?;
            self.writer.flush()
        })();
        result.map_err(|e| self.io(e))
    }
}

/// Crystal record `[a, gamma, b, beta, alpha, c]` of a simulation box.
fn crystal_record(simbox: &SimBox) -> [f64; 6] {
    if simbox.is_orthogonal() {
        [
            simbox.x as f64,
            90.0,
            simbox.y as f64,
            90.0,
            90.0,
            simbox.z as f64,
        ]
    } else {
        let (lengths, angles) = simbox.to_lengths_angles();
        [
            lengths.x as f64,
            angles.z as f64,
            lengths.y as f64,
            angles.y as f64,
            angles.x as f64,
            lengths.z as f64,
        ]
    }
}

/**************************/
/*         REPAIR         */
/**************************/

/// Result of counting the frames of a dcd file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DcdScan {
    /// Number of frames declared by the header.
    declared_frames: i32,
    /// Number of complete frames with valid record markers.
    actual_frames: usize,
    /// Number of bytes following the last complete frame.
    trailing_bytes: u64,
}

impl DcdScan {
    /// Returns `true` if the header declares the actual number of frames.
    pub fn is_consistent(&self) -> bool {
        self.declared_frames >= 0 && self.declared_frames as usize == self.actual_frames
    }
}

/// Check markers of all records of a single frame without reading the data.
fn frame_is_valid<R: Read>(
    reader: &mut XdrReader<R>,
    header: &DcdHeader,
) -> Result<bool, XdrError> {
    let axis = 4 * header.natoms as u64;
    let mut records = Vec::with_capacity(4);
    if header.has_crystal {
        records.push(CRYSTAL_RECORD);
    }
    records.extend_from_slice(&[axis, axis, axis]);

    for length in records {
        if read_marker(reader, header.marker_width)? != length {
            return Ok(false);
        }
        reader.skip(length)?;
        if read_marker(reader, header.marker_width)? != length {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Count the complete frames of a dcd file independently of the frame count declared in its header.
///
/// ## Returns
/// `DcdScan` with the declared and the actual number of frames.
/// Counting stops at the first frame that is incomplete or has invalid record markers.
pub fn scan_dcd_frames(filename: impl AsRef<Path>) -> Result<DcdScan, RepairError> {
    let filename = filename.as_ref();
    let (mut reader, layout) = open_layout(filename)?;

    let frame_size = layout.frame_size();
    let mut actual = 0usize;
    while layout.frame_offset(actual) + frame_size <= layout.file_len {
        match frame_is_valid(&mut reader, &layout.header) {
            Ok(true) => actual += 1,
            Ok(false) => break,
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(RepairError::Read(ReadTrajError::xdr(actual, e))),
        }
    }

    let scan = DcdScan {
        declared_frames: layout.header.declared_frames,
        actual_frames: actual,
        trailing_bytes: layout.file_len - layout.frame_offset(actual),
    };

    log::debug!(
        "Dcd file '{}' declares {} frames and contains {} complete frames.",
        filename.display(),
        scan.declared_frames,
        scan.actual_frames
    );

    Ok(scan)
}

/// Count the frames of a dcd file and rewrite the frame count (`NSET`) and the number
/// of steps (`NSTEP = frames * NSAVC`) in its header.
/// The file keeps its byte order and marker width. Frame data are not modified.
///
/// ## Returns
/// `DcdScan` describing the file before the repair.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let scan = repair_dcd_frame_count("broken.dcd").unwrap();
/// println!("Header declared {} frames, file contains {} frames.",
///     scan.declared_frames(), scan.actual_frames());
/// ```
pub fn repair_dcd_frame_count(filename: impl AsRef<Path>) -> Result<DcdScan, RepairError> {
    let filename = filename.as_ref();
    let scan = scan_dcd_frames(filename)?;
    let (_, layout) = open_layout(filename)?;
    let header = layout.header;

    let nsteps = scan.actual_frames as i64 * header.nsavc as i64;
    if scan.is_consistent() && header.nsteps as i64 == nsteps {
        return Ok(scan);
    }

    let file = OpenOptions::new()
        .write(true)
        .open(filename)
        .map_err(|_| RepairError::CouldNotOpen(Box::from(filename)))?;
    let mut writer = XdrWriter::with_order(file, header.byte_order);

    let patch = |writer: &mut XdrWriter<File>| -> Result<(), XdrError> {
        writer.seek_to(header.control_offset(NSET))?;
        writer.write(scan.actual_frames as i32)?;
        writer.seek_to(header.control_offset(NSTEP))?;
        writer.write(nsteps as i32)?;
        writer.flush()
    };
    patch(&mut writer).map_err(|e| RepairError::PatchFailed(Box::from(filename), e))?;

    log::info!(
        "Repaired header of '{}': {} frames declared, {} frames present.",
        filename.display(),
        scan.declared_frames,
        scan.actual_frames
    );

    Ok(scan)
}

/******************************/
/*         UNIT TESTS         */
/******************************/
