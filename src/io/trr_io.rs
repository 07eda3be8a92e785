// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Reading and writing of trr trajectory files.
//!
//! Trr files store uncompressed coordinates, velocities and forces
//! in single or double precision. Every frame starts with a header
//! declaring the sizes of the data blocks that follow.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use crate::errors::{ReadTrajError, WriteTrajError, XdrError};
use crate::io::traj_io::{init_cache, Frame, TrajOptions, TrajState, Trajectory};
use crate::io::xdr::{XdrReader, XdrWriter};
use crate::structures::{group::AtomGroup, simbox::SimBox, vector3d::Vector3D};

/// Magic number starting every trr frame.
pub const TRR_MAGIC: i32 = 1993;

/// Version string written into the header of every trr frame.
const TRR_VERSION: &str = "GMX_trn_file";

/// Header of a single trr frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TrrHeader {
    box_size: usize,
    vir_size: usize,
    pres_size: usize,
    x_size: usize,
    v_size: usize,
    f_size: usize,
    natoms: usize,
    step: i32,
    double: bool,
    time: f64,
    lambda: f64,
}

impl TrrHeader {
    /// Size of a floating point number in bytes.
    #[inline]
    fn real_size(&self) -> usize {
        if self.double {
            8
        } else {
            4
        }
    }

    /// Number of bytes of data following the header.
    fn data_size(&self) -> u64 {
        let matrix = 9 * self.real_size() as u64;
        let vectors = 3 * (self.natoms * self.real_size()) as u64;

        [
            (self.box_size, matrix),
            (self.vir_size, matrix),
            (self.pres_size, matrix),
            (self.x_size, vectors),
            (self.v_size, vectors),
            (self.f_size, vectors),
        ]
        .iter()
        .filter(|(declared, _)| *declared != 0)
        .map(|(_, size)| size)
        .sum()
    }
}

/// Determine the width of floating point numbers from the declared block sizes.
///
/// ## Returns
/// `Some(true)` for double precision, `Some(false)` for single precision
/// and `None` if the sizes correspond to neither.
/// Frames with no data blocks are treated as single precision.
fn infer_double(box_size: usize, sizes: [usize; 3], natoms: usize) -> Option<bool> {
    let width = if box_size != 0 {
        if box_size % 9 != 0 {
            return None;
        }
        box_size / 9
    } else {
        match sizes.iter().find(|&&s| s != 0) {
            Some(&size) if natoms != 0 && size % (natoms * 3) == 0 => size / (natoms * 3),
            Some(_) => return None,
            None => return Some(false),
        }
    };

    match width {
        4 => Some(false),
        8 => Some(true),
        _ => None,
    }
}

/// Read the header of a trr frame.
///
/// ## Returns
/// `Ok(None)` if the stream ends before the frame.
fn read_frame_header<R: Read>(
    reader: &mut XdrReader<R>,
    frame: usize,
    filename: &Path,
) -> Result<Option<TrrHeader>, ReadTrajError> {
    let magic: i32 = match reader.read() {
        Ok(magic) => magic,
        Err(e) if e.is_eof() => return Ok(None),
        Err(e) => return Err(ReadTrajError::xdr(frame, e)),
    };

    if magic != TRR_MAGIC {
        return Err(ReadTrajError::InvalidMagic { frame, magic });
    }

    let io = |e: XdrError| ReadTrajError::xdr(frame, e);

    // length of the version string including the terminating character
    let _slen: i32 = reader.read().map_err(io)?;
    let _version = reader.read_string().map_err(io)?;

    let mut sizes = [0i32; 13];
    reader.read_into(&mut sizes).map_err(io)?;
    let [_ir, _e, box_size, vir_size, pres_size, _top, _sym, x_size, v_size, f_size, natoms, step, _nre] =
        sizes;

    let size = |value: i32, name: &str| {
        usize::try_from(value).map_err(|_| {
            ReadTrajError::InvalidHeader(
                Box::from(filename),
                format!("negative {} ({}) in frame {}", name, value, frame),
            )
        })
    };

    let box_size = size(box_size, "box size")?;
    let vir_size = size(vir_size, "virial size")?;
    let pres_size = size(pres_size, "pressure size")?;
    let x_size = size(x_size, "coordinate size")?;
    let v_size = size(v_size, "velocity size")?;
    let f_size = size(f_size, "force size")?;
    let natoms = size(natoms, "number of atoms")?;

    let double = infer_double(box_size, [x_size, v_size, f_size], natoms).ok_or_else(|| {
        ReadTrajError::InvalidHeader(
            Box::from(filename),
            format!("cannot determine the floating point width of frame {}", frame),
        )
    })?;

    let width = if double { 8 } else { 4 };
    let blocks = [
        ("box", box_size, 9 * width),
        ("virial", vir_size, 9 * width),
        ("pressure", pres_size, 9 * width),
        ("coordinate", x_size, 3 * natoms * width),
        ("velocity", v_size, 3 * natoms * width),
        ("force", f_size, 3 * natoms * width),
    ];
    for (name, declared, expected) in blocks {
        if declared != 0 && declared != expected {
            return Err(ReadTrajError::InvalidHeader(
                Box::from(filename),
                format!(
                    "{} block of frame {} declares {} bytes, expected {}",
                    name, frame, declared, expected
                ),
            ));
        }
    }

    let (time, lambda) = if double {
        (reader.read::<f64>().map_err(io)?, reader.read::<f64>().map_err(io)?)
    } else {
        (
            reader.read::<f32>().map_err(io)? as f64,
            reader.read::<f32>().map_err(io)? as f64,
        )
    };

    Ok(Some(TrrHeader {
        box_size,
        vir_size,
        pres_size,
        x_size,
        v_size,
        f_size,
        natoms,
        step,
        double,
        time,
        lambda,
    }))
}

/// Read `out.len()` floating point numbers of the given width.
fn read_reals<R: Read>(
    reader: &mut XdrReader<R>,
    double: bool,
    out: &mut [f64],
) -> Result<(), XdrError> {
    for value in out.iter_mut() {
        *value = if double {
            reader.read::<f64>()?
        } else {
            reader.read::<f32>()? as f64
        };
    }

    Ok(())
}

/// Read a 3x3 matrix.
fn read_matrix<R: Read>(reader: &mut XdrReader<R>, double: bool) -> Result<[f64; 9], XdrError> {
    let mut matrix = [0.0; 9];
    read_reals(reader, double, &mut matrix)?;
    Ok(matrix)
}

/// Read a block of vectors into `out`.
fn read_vectors<R: Read>(
    reader: &mut XdrReader<R>,
    double: bool,
    out: &mut Vec<Vector3D>,
    natoms: usize,
) -> Result<(), XdrError> {
    out.clear();
    out.reserve(natoms);
    let mut vector = [0.0f64; 3];
    for _ in 0..natoms {
        read_reals(reader, double, &mut vector)?;
        out.push(Vector3D::new(
            vector[0] as f32,
            vector[1] as f32,
            vector[2] as f32,
        ));
    }

    Ok(())
}

/**************************/
/*         READER         */
/**************************/

/// Reader of trr trajectory files.
///
/// Frames are scanned when the file is opened. Coordinates and velocities are exposed
/// through the [`Trajectory`] trait, forces and the remaining frame data
/// through the methods of this structure.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let mut trr = TrrReader::open("trajectory.trr", TrajOptions::default()).unwrap();
/// while trr.read_frame().unwrap() {
///     if let Some(velocities) = trr.velocities() {
///         println!("{:?}", velocities[0]);
///     }
/// }
/// ```
pub struct TrrReader {
    filename: Box<Path>,
    reader: XdrReader<BufReader<File>>,
    offsets: Vec<u64>,
    natoms: usize,
    header: Option<TrrHeader>,
    coords: Vec<Vector3D>,
    velocities: Vec<Vector3D>,
    forces: Vec<Vector3D>,
    simbox: Option<SimBox>,
    virial: Option<[f64; 9]>,
    pressure: Option<[f64; 9]>,
    options: TrajOptions,
    state: TrajState,
}

impl TrrReader {
    /// Open a trr file and scan its frames.
    ///
    /// ## Returns
    /// `TrrReader` if the file is a valid trr file. Otherwise `ReadTrajError`.
    /// Incomplete frame at the end of the file is ignored.
    pub fn open(filename: impl AsRef<Path>, options: TrajOptions) -> Result<TrrReader, ReadTrajError> {
        let filename = filename.as_ref();
        let file = File::open(filename).map_err(|_| ReadTrajError::FileNotFound(Box::from(filename)))?;
        let mut reader = XdrReader::new(BufReader::new(file));

        let (offsets, first) = scan_frames(&mut reader, filename)?;

        log::debug!(
            "Trr file '{}' contains {} frames of {} atoms.",
            filename.display(),
            offsets.len(),
            first.natoms
        );

        let mut trr = TrrReader {
            filename: Box::from(filename),
            reader,
            offsets,
            natoms: first.natoms,
            header: None,
            coords: vec![Vector3D::default(); first.natoms],
            velocities: Vec::new(),
            forces: Vec::new(),
            simbox: None,
            virial: None,
            pressure: None,
            options,
            state: TrajState::default(),
        };

        init_cache(&mut trr)?;
        Ok(trr)
    }

    /// Get the name of the trr file.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Forces of the current frame. `None` if the frame stores no forces.
    pub fn forces(&self) -> Option<&[Vector3D]> {
        self.header
            .filter(|h| h.f_size != 0)
            .map(|_| self.forces.as_slice())
    }

    /// Virial of the current frame, if stored.
    pub fn virial(&self) -> Option<[f64; 9]> {
        self.virial
    }

    /// Pressure tensor of the current frame, if stored.
    pub fn pressure(&self) -> Option<[f64; 9]> {
        self.pressure
    }

    /// Free energy lambda of the current frame.
    pub fn lambda(&self) -> Option<f64> {
        self.header.map(|h| h.lambda)
    }

    /// Returns `true` if the current frame stores coordinates.
    pub fn has_coords(&self) -> bool {
        self.header.is_some_and(|h| h.x_size != 0)
    }

    /// Returns `true` if the current frame is stored in double precision.
    pub fn is_double(&self) -> bool {
        self.header.is_some_and(|h| h.double)
    }
}

/// Scan all frames of a trr file.
///
/// ## Returns
/// Offsets of the frames and the header of the first frame.
fn scan_frames(
    reader: &mut XdrReader<BufReader<File>>,
    filename: &Path,
) -> Result<(Vec<u64>, TrrHeader), ReadTrajError> {
    let file_len = reader
        .stream_len()
        .map_err(|e| ReadTrajError::InvalidHeader(Box::from(filename), e.to_string()))?;

    let mut offsets = Vec::new();
    let mut first: Option<TrrHeader> = None;

    loop {
        let frame = offsets.len();
        let offset = reader.position().map_err(|e| ReadTrajError::xdr(frame, e))?;
        if offset >= file_len {
            break;
        }

        let header = match read_frame_header(reader, frame, filename) {
            Ok(Some(header)) => header,
            Ok(None) | Err(ReadTrajError::UnexpectedEof(_)) => {
                log::warn!(
                    "Trr file '{}' ends with an incomplete frame header. Ignoring it.",
                    filename.display()
                );
                break;
            }
            Err(ReadTrajError::InvalidMagic { .. }) if frame == 0 => {
                return Err(ReadTrajError::NotTrr(Box::from(filename)))
            }
            Err(e) => return Err(e),
        };

        if let Some(first) = &first {
            if first.natoms != header.natoms {
                return Err(ReadTrajError::InconsistentAtoms {
                    frame,
                    found: header.natoms,
                    expected: first.natoms,
                });
            }
        } else {
            first = Some(header);
        }

        let end = reader
            .position()
            .map_err(|e| ReadTrajError::xdr(frame, e))?
            + header.data_size();
        if end > file_len {
            log::warn!(
                "Trr file '{}' ends with an incomplete frame. Ignoring it.",
                filename.display()
            );
            break;
        }

        reader
            .seek_to(end)
            .map_err(|e| ReadTrajError::xdr(frame, e))?;
        offsets.push(offset);
    }

    let first = match first {
        Some(first) if !offsets.is_empty() => first,
        _ => return Err(ReadTrajError::NotTrr(Box::from(filename))),
    };

    reader
        .seek_to(offsets[0])
        .map_err(|e| ReadTrajError::xdr(0, e))?;

    Ok((offsets, first))
}

impl Trajectory for TrrReader {
    fn natoms(&self) -> usize {
        self.natoms
    }

    fn nframes(&self) -> usize {
        self.offsets.len()
    }

    /// Trr files do not define a time step.
    fn timestep(&self) -> f32 {
        0.0
    }

    fn has_periodic_box(&self) -> bool {
        self.simbox.is_some()
    }

    fn periodic_box(&self) -> Option<SimBox> {
        self.simbox
    }

    fn coords(&self) -> &[Vector3D] {
        &self.coords
    }

    /// `None` if the current frame stores no velocities.
    fn velocities(&self) -> Option<&[Vector3D]> {
        self.header
            .filter(|h| h.v_size != 0)
            .map(|_| self.velocities.as_slice())
    }

    fn frame_step(&self) -> Option<u64> {
        self.header.map(|h| h.step.max(0) as u64)
    }

    fn frame_time(&self) -> Option<f32> {
        self.header.map(|h| h.time as f32)
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
        let header = match read_frame_header(&mut self.reader, index, &self.filename)? {
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

        let io = |e: XdrError| ReadTrajError::xdr(index, e);
        let reader = &mut self.reader;
        let double = header.double;

        let matrix = if header.box_size != 0 {
            Some(read_matrix(reader, double).map_err(io)?)
        } else {
            None
        };
        let virial = if header.vir_size != 0 {
            Some(read_matrix(reader, double).map_err(io)?)
        } else {
            None
        };
        let pressure = if header.pres_size != 0 {
            Some(read_matrix(reader, double).map_err(io)?)
        } else {
            None
        };

        if header.x_size != 0 {
            read_vectors(reader, double, &mut self.coords, header.natoms).map_err(io)?;
        }
        if header.v_size != 0 {
            read_vectors(reader, double, &mut self.velocities, header.natoms).map_err(io)?;
        }
        if header.f_size != 0 {
            read_vectors(reader, double, &mut self.forces, header.natoms).map_err(io)?;
        }

        self.simbox = matrix
            .map(|m| SimBox::from_matrix(m.map(|v| v as f32)))
            .filter(|simbox| !simbox.is_zero());
        self.virial = virial;
        self.pressure = pressure;
        self.header = Some(header);

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

/// Writer of single precision trr trajectory files.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let group = AtomGroup::new(100);
/// let velocities = vec![Vector3D::new(0.1, 0.0, 0.0); 100];
///
/// let mut writer = TrrWriter::create("output.trr").unwrap();
/// writer
///     .write_frame_with(&Frame::from_group(&group), Some(velocities.as_slice()), None)
///     .unwrap();
/// writer.finish().unwrap();
/// ```
pub struct TrrWriter {
    writer: XdrWriter<BufWriter<File>>,
    natoms: Option<usize>,
    frames_written: usize,
}

impl TrrWriter {
    /// Create a new trr file.
    pub fn create(filename: impl AsRef<Path>) -> Result<TrrWriter, WriteTrajError> {
        let filename = filename.as_ref();
        let file = File::create(filename)
            .map_err(|_| WriteTrajError::CouldNotCreate(Box::from(filename)))?;

        Ok(TrrWriter {
            writer: XdrWriter::new(BufWriter::new(file)),
            natoms: None,
            frames_written: 0,
        })
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Write a frame containing coordinates and the periodic box.
    ///
    /// ## Notes
    /// - If the frame has no step, the index of the frame is used.
    /// - If the frame has no time, zero is written.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), WriteTrajError> {
        self.write_frame_with(frame, None, None)
    }

    /// Write a frame containing coordinates, the periodic box and optionally
    /// velocities and forces.
    pub fn write_frame_with(
        &mut self,
        frame: &Frame,
        velocities: Option<&[Vector3D]>,
        forces: Option<&[Vector3D]>,
    ) -> Result<(), WriteTrajError> {
        let natoms = *self.natoms.get_or_insert(frame.natoms());
        if frame.natoms() != natoms {
            return Err(WriteTrajError::AtomsNumberMismatch(frame.natoms(), natoms));
        }

        for block in [velocities, forces].into_iter().flatten() {
            if block.len() != natoms {
                return Err(WriteTrajError::AtomsNumberMismatch(block.len(), natoms));
            }
        }

        let step = frame
            .step()
            .unwrap_or(self.frames_written as u64)
            .min(i32::MAX as u64) as i32;
        let time = frame.time().unwrap_or(0.0);

        let index = self.frames_written;
        write_trr_frame(
            &mut self.writer,
            natoms,
            step,
            time,
            frame.simbox().as_ref(),
            frame.coords(),
            velocities,
            forces,
        )
        .map_err(|e| WriteTrajError::Xdr {
            frame: index,
            source: e,
        })?;

        self.frames_written += 1;
        Ok(())
    }

    /// Write the current state of an atom group as a new frame.
    /// Velocities of the group are written if present.
    pub fn write_group(&mut self, group: &AtomGroup) -> Result<(), WriteTrajError> {
        self.write_frame_with(&Frame::from_group(group), group.velocities(), None)
    }

    /// Flush all written frames into the file.
    pub fn finish(mut self) -> Result<(), WriteTrajError> {
        let frame = self.frames_written;
        self.writer
            .flush()
            .map_err(|e| WriteTrajError::Xdr { frame, source: e })
    }
}

/// Write a single precision trr frame.
#[allow(clippy::too_many_arguments)]
fn write_trr_frame<W: std::io::Write>(
    writer: &mut XdrWriter<W>,
    natoms: usize,
    step: i32,
    time: f32,
    simbox: Option<&SimBox>,
    coords: &[Vector3D],
    velocities: Option<&[Vector3D]>,
    forces: Option<&[Vector3D]>,
) -> Result<(), XdrError> {
    let vector_size = (natoms * 3 * 4) as i32;
    let block_size = |present: bool| if present { vector_size } else { 0 };

    writer.write(TRR_MAGIC)?;
    writer.write(TRR_VERSION.len() as i32 + 1)?;
    writer.write_string(TRR_VERSION)?;

    let box_size = if simbox.is_some() { 36 } else { 0 };
    writer.write_slice(&[
        0i32, // ir
        0,    // e
        box_size,
        0, // vir
        0, // pres
        0, // top
        0, // sym
        vector_size,
        block_size(velocities.is_some()),
        block_size(forces.is_some()),
        natoms as i32,
        step,
        0, // nre
    ])?;
    writer.write(time)?;
    writer.write(0.0f32)?;

    if let Some(simbox) = simbox {
        writer.write_slice(&simbox.to_matrix())?;
    }

    for block in [Some(coords), velocities, forces].into_iter().flatten() {
        for vector in block {
            writer.write_slice(&vector.to_array())?;
        }
    }

    Ok(())
}

/******************************/
/*         UNIT TESTS         */
/******************************/

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn float_width() {
        assert_eq!(infer_double(36, [0, 0, 0], 10), Some(false));
        assert_eq!(infer_double(72, [0, 0, 0], 10), Some(true));
        assert_eq!(infer_double(0, [120, 0, 0], 10), Some(false));
        assert_eq!(infer_double(0, [0, 240, 0], 10), Some(true));
        assert_eq!(infer_double(0, [0, 0, 0], 10), Some(false));
        assert_eq!(infer_double(0, [0, 0, 0], 0), Some(false));
        assert_eq!(infer_double(40, [0, 0, 0], 10), None);
        assert_eq!(infer_double(0, [100, 0, 0], 10), None);
        assert_eq!(infer_double(0, [12, 0, 0], 0), None);
        assert_eq!(infer_double(45, [0, 0, 0], 10), None);
        assert_eq!(infer_double(0, [130, 0, 0], 10), None);
        assert_eq!(infer_double(0, [0, 0, 250], 10), None);
    }

    #[test]
    fn header_inconsistent_block_sizes() {
        // box says single precision, coordinates would need 24 bytes
        let mut writer = XdrWriter::new(Vec::new());
        writer.write(TRR_MAGIC).unwrap();
        writer.write(13i32).unwrap();
        writer.write_string(TRR_VERSION).unwrap();
        writer
            .write_slice(&[0i32, 0, 36, 0, 0, 0, 0, 48, 0, 0, 2, 0, 0])
            .unwrap();
        writer.write_slice(&[0.0f32, 0.0]).unwrap();
        let mut reader = XdrReader::new(Cursor::new(writer.into_inner()));

        match read_frame_header(&mut reader, 3, Path::new("test.trr")) {
            Err(ReadTrajError::InvalidHeader(_, msg)) => assert!(msg.contains("coordinate")),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn header_box_not_divisible() {
        let mut writer = XdrWriter::new(Vec::new());
        writer.write(TRR_MAGIC).unwrap();
        writer.write(13i32).unwrap();
        writer.write_string(TRR_VERSION).unwrap();
        writer
            .write_slice(&[0i32, 0, 40, 0, 0, 0, 0, 0, 0, 0, 10, 0, 0])
            .unwrap();
        writer.write_slice(&[0.0f32, 0.0]).unwrap();
        let mut reader = XdrReader::new(Cursor::new(writer.into_inner()));

        match read_frame_header(&mut reader, 0, Path::new("test.trr")) {
            Err(ReadTrajError::InvalidHeader(_, _)) => (),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn header_roundtrip() {
        let coords = vec![Vector3D::new(1.0, 2.0, 3.0); 4];
        let velocities = vec![Vector3D::new(-1.0, 0.5, 0.25); 4];
        let simbox = SimBox::from([3.0, 4.0, 5.0]);

        let mut writer = XdrWriter::new(Vec::new());
        write_trr_frame(
            &mut writer,
            4,
            150,
            0.3,
            Some(&simbox),
            &coords,
            Some(velocities.as_slice()),
            None,
        )
        .unwrap();
        let bytes = writer.into_inner();

        let mut reader = XdrReader::new(Cursor::new(bytes.clone()));
        let header = read_frame_header(&mut reader, 0, Path::new("test.trr"))
            .unwrap()
            .unwrap();

        assert_eq!(header.natoms, 4);
        assert_eq!(header.step, 150);
        assert!(!header.double);
        assert_eq!(header.time, 0.3f32 as f64);
        assert_eq!(header.lambda, 0.0);
        assert_eq!(header.box_size, 36);
        assert_eq!(header.x_size, 48);
        assert_eq!(header.v_size, 48);
        assert_eq!(header.f_size, 0);

        let position = reader.position().unwrap();
        assert_eq!(position + header.data_size(), bytes.len() as u64);
    }

    #[test]
    fn header_invalid_magic() {
        let mut writer = XdrWriter::new(Vec::new());
        writer.write(1995i32).unwrap();
        let mut reader = XdrReader::new(Cursor::new(writer.into_inner()));

        assert_eq!(
            read_frame_header(&mut reader, 2, Path::new("test.trr")),
            Err(ReadTrajError::InvalidMagic {
                frame: 2,
                magic: 1995
            })
        );
    }

    #[test]
    fn header_negative_size() {
        let mut writer = XdrWriter::new(Vec::new());
        writer.write(TRR_MAGIC).unwrap();
        writer.write(13i32).unwrap();
        writer.write_string(TRR_VERSION).unwrap();
        writer
            .write_slice(&[0i32, 0, 36, 0, 0, 0, 0, -12, 0, 0, 1, 0, 0])
            .unwrap();
        writer.write_slice(&[0.0f32, 0.0]).unwrap();
        let mut reader = XdrReader::new(Cursor::new(writer.into_inner()));

        match read_frame_header(&mut reader, 0, Path::new("test.trr")) {
            Err(ReadTrajError::InvalidHeader(_, _)) => (),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn header_end_of_stream() {
        let mut reader = XdrReader::new(Cursor::new(Vec::new()));
        assert!(read_frame_header(&mut reader, 0, Path::new("test.trr"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn double_precision_frame() {
        let mut writer = XdrWriter::new(Vec::new());
        writer.write(TRR_MAGIC).unwrap();
        writer.write(13i32).unwrap();
        writer.write_string(TRR_VERSION).unwrap();
        writer
            .write_slice(&[0i32, 0, 72, 0, 0, 0, 0, 48, 0, 0, 2, 7, 0])
            .unwrap();
        writer.write_slice(&[1.5f64, 0.25]).unwrap();
        writer
            .write_slice(&[2.0f64, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0])
            .unwrap();
        writer
            .write_slice(&[0.1f64, 0.2, 0.3, 1.1, 1.2, 1.3])
            .unwrap();

        let mut reader = XdrReader::new(Cursor::new(writer.into_inner()));
        let header = read_frame_header(&mut reader, 0, Path::new("test.trr"))
            .unwrap()
            .unwrap();
        assert!(header.double);
        assert_eq!(header.time, 1.5);
        assert_eq!(header.lambda, 0.25);
        assert_eq!(header.data_size(), 72 + 48);

        let matrix = read_matrix(&mut reader, true).unwrap();
        assert_eq!(matrix[4], 2.0);

        let mut coords = Vec::new();
        read_vectors(&mut reader, true, &mut coords, 2).unwrap();
        assert_eq!(coords[1].to_array(), [1.1f32, 1.2, 1.3]);
    }
}
