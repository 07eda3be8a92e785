// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Format-independent reading of trajectory files.
//!
//! Every trajectory format implements the required methods of the [`Trajectory`] trait
//! (how to find, parse and expose a single frame). The provided methods of the trait
//! implement the frame cursor shared by all formats: sequential reading, random access,
//! rewinding and the optional caching of the first frame at open.

use std::path::Path;

use getset::{CopyGetters, Getters};

use crate::errors::ReadTrajError;
use crate::files::FileType;
use crate::io::dcd_io::DcdReader;
use crate::io::trr_io::TrrReader;
use crate::io::xtc_io::XtcReader;
use crate::progress::{ProgressPrinter, ProgressStatus};
use crate::structures::{group::AtomGroup, simbox::SimBox, vector3d::Vector3D};

/**************************/
/*         FRAME          */
/**************************/

/// Owned snapshot of a single trajectory frame.
#[derive(Debug, Clone, PartialEq, Default, Getters, CopyGetters)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// Coordinates of the atoms in the order of the trajectory.
    #[getset(get = "pub")]
    coords: Vec<Vector3D>,
    /// Periodic box of the frame. `None` if the frame is not periodic.
    #[getset(get_copy = "pub")]
    simbox: Option<SimBox>,
    /// Simulation step, if the format stores it.
    #[getset(get_copy = "pub")]
    step: Option<u64>,
    /// Simulation time, if the format stores it.
    #[getset(get_copy = "pub")]
    time: Option<f32>,
    /// Precision of compressed coordinates (xtc only).
    #[getset(get_copy = "pub")]
    precision: Option<f32>,
}

impl Frame {
    /// Create a new frame from coordinates without any further information.
    pub fn new(coords: Vec<Vector3D>) -> Self {
        Frame {
            coords,
            ..Default::default()
        }
    }

    /// Set the periodic box of the frame.
    pub fn with_box(mut self, simbox: Option<SimBox>) -> Self {
        self.simbox = simbox;
        self
    }

    /// Set the simulation step and time of the frame.
    pub fn with_step_time(mut self, step: u64, time: f32) -> Self {
        self.step = Some(step);
        self.time = Some(time);
        self
    }

    /// Set the precision of the frame.
    pub fn with_precision(mut self, precision: f32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Create a frame from the current state of an atom group.
    pub fn from_group(group: &AtomGroup) -> Self {
        Frame {
            coords: group.positions().to_vec(),
            simbox: group.get_box().copied(),
            step: Some(group.get_simulation_step()),
            time: Some(group.get_simulation_time()),
            precision: None,
        }
    }

    /// Number of atoms in the frame.
    #[inline]
    pub fn natoms(&self) -> usize {
        self.coords.len()
    }

    /// Coordinates of the frame as plain arrays.
    pub fn coords_array(&self) -> Vec<[f32; 3]> {
        self.coords.iter().map(|c| c.to_array()).collect()
    }
}

/**************************/
/*        OPTIONS         */
/**************************/

/// Options controlling how a trajectory file is opened and read.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let options = TrajOptions::default()
///     .with_cache_first_frame(false)
///     .with_check_atom_count(true);
///
/// let traj = XtcReader::open("trajectory.xtc", options).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct TrajOptions {
    /// Parse the first frame when the file is opened. Default: `true`.
    cache_first_frame: bool,
    /// Require groups updated from the trajectory to have exactly as many atoms
    /// as the trajectory. Default: `true`.
    check_atom_count: bool,
}

impl Default for TrajOptions {
    fn default() -> Self {
        TrajOptions {
            cache_first_frame: true,
            check_atom_count: true,
        }
    }
}

impl TrajOptions {
    pub fn with_cache_first_frame(mut self, cache: bool) -> Self {
        self.cache_first_frame = cache;
        self
    }

    pub fn with_check_atom_count(mut self, check: bool) -> Self {
        self.check_atom_count = check;
        self
    }
}

/**************************/
/*      FRAME CURSOR      */
/**************************/

/// Position of a trajectory reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    /// No frame has been read yet.
    #[default]
    BeforeFirst,
    /// Frame with the given index is the current frame.
    At(usize),
    /// All frames have been read.
    AtEnd,
}

/// State of the frame cursor shared by all trajectory formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrajState {
    pub cursor: Cursor,
    /// The first frame is already parsed and the next sequential read returns it
    /// without touching the file.
    pub cached_first: bool,
}

/**************************/
/*    TRAJECTORY TRAIT    */
/**************************/

/// Any trajectory format must implement this trait.
///
/// Implementors provide access to the data of the current frame and
/// three low-level operations (`seek_frame_impl`, `parse_frame`, `rewind_impl`).
/// Reading itself should be done using the provided methods
/// `read_frame`, `read_frame_at` and `rewind`.
pub trait Trajectory: Send {
    /// Number of atoms in each frame.
    fn natoms(&self) -> usize;

    /// Number of frames in the trajectory.
    fn nframes(&self) -> usize;

    /// Time between two consecutive frames.
    fn timestep(&self) -> f32;

    /// Returns `true` if the trajectory contains periodic box information.
    /// Formats storing the box in every frame report the current frame.
    fn has_periodic_box(&self) -> bool;

    /// Periodic box of the current frame.
    fn periodic_box(&self) -> Option<SimBox>;

    /// Coordinates of the current frame.
    fn coords(&self) -> &[Vector3D];

    /// Simulation step of the current frame.
    fn frame_step(&self) -> Option<u64>;

    /// Simulation time of the current frame.
    fn frame_time(&self) -> Option<f32>;

    /// Precision of the current frame. Only meaningful for compressed formats.
    fn precision(&self) -> Option<f32> {
        None
    }

    /// Velocities of the current frame.
    /// `None` if the format or the current frame stores no velocities.
    fn velocities(&self) -> Option<&[Vector3D]> {
        None
    }

    /// Returns `true` if the current frame contains velocities.
    fn has_velocities(&self) -> bool {
        self.velocities().is_some()
    }

    /// Options the trajectory was opened with.
    fn options(&self) -> TrajOptions;

    fn state(&self) -> &TrajState;

    fn state_mut(&mut self) -> &mut TrajState;

    /// Position the underlying stream at the start of the frame with index `index`.
    /// The index is guaranteed to be lower than `nframes`.
    fn seek_frame_impl(&mut self, index: usize) -> Result<(), ReadTrajError>;

    /// Parse the frame at the current stream position.
    ///
    /// ## Returns
    /// `Ok(true)` if a frame has been read, `Ok(false)` if there are no data left.
    fn parse_frame(&mut self, index: usize) -> Result<bool, ReadTrajError>;

    /// Position the underlying stream at the start of the first frame.
    fn rewind_impl(&mut self) -> Result<(), ReadTrajError>;

    /// Read the next frame of the trajectory.
    ///
    /// ## Returns
    /// - `Ok(true)` if the frame has been read.
    /// - `Ok(false)` if the end of the trajectory has been reached.
    ///   Calling this method again keeps returning `Ok(false)`.
    /// - `ReadTrajError` if the frame could not be read. The cursor is not moved
    ///   and the next call attempts to read the same frame again.
    fn read_frame(&mut self) -> Result<bool, ReadTrajError> {
        let state = *self.state();
        let next = match state.cursor {
            Cursor::AtEnd => return Ok(false),
            Cursor::BeforeFirst => 0,
            Cursor::At(0) if state.cached_first => {
                self.state_mut().cached_first = false;
                return Ok(true);
            }
            Cursor::At(index) => index + 1,
        };

        if next >= self.nframes() {
            *self.state_mut() = TrajState {
                cursor: Cursor::AtEnd,
                cached_first: false,
            };
            return Ok(false);
        }

        self.seek_frame_impl(next)?;
        let read = self.parse_frame(next)?;

        *self.state_mut() = TrajState {
            cursor: if read { Cursor::At(next) } else { Cursor::AtEnd },
            cached_first: false,
        };

        Ok(read)
    }

    /// Read the frame with index `index`.
    /// Subsequent calls to `read_frame` continue with frame `index + 1`.
    ///
    /// ## Returns
    /// - `Ok(true)` if the frame has been read.
    /// - `Ok(false)` if the file contains fewer frames than declared.
    /// - `ReadTrajError::FrameOutOfRange` if `index` is not lower than `nframes`.
    ///   The state of the trajectory is not changed.
    fn read_frame_at(&mut self, index: usize) -> Result<bool, ReadTrajError> {
        let nframes = self.nframes();
        if index >= nframes {
            return Err(ReadTrajError::FrameOutOfRange(index, nframes));
        }

        let state = *self.state();
        if index == 0 && state.cached_first {
            self.state_mut().cached_first = false;
            return Ok(true);
        }

        self.seek_frame_impl(index)?;
        let read = self.parse_frame(index)?;

        *self.state_mut() = TrajState {
            cursor: if read { Cursor::At(index) } else { Cursor::AtEnd },
            cached_first: false,
        };

        Ok(read)
    }

    /// Return to the start of the trajectory.
    /// The first frame is parsed immediately and the next call to `read_frame` returns it.
    ///
    /// ## Returns
    /// `Ok(true)` if the first frame has been read, `Ok(false)` if the trajectory is empty.
    fn rewind(&mut self) -> Result<bool, ReadTrajError> {
        self.rewind_impl()?;

        if self.nframes() == 0 {
            *self.state_mut() = TrajState::default();
            return Ok(false);
        }

        let read = self.parse_frame(0)?;
        *self.state_mut() = if read {
            TrajState {
                cursor: Cursor::At(0),
                cached_first: true,
            }
        } else {
            TrajState {
                cursor: Cursor::AtEnd,
                cached_first: false,
            }
        };

        Ok(read)
    }

    /// Copy coordinates of the current frame into the atom group.
    /// The `i`th atom of the group receives the `i`th coordinate of the frame.
    /// Periodic box (if present), simulation step and time are also updated.
    ///
    /// ## Returns
    /// `ReadTrajError::AtomsNumberMismatch` if the group does not match the trajectory.
    /// Groups with fewer atoms than the trajectory are accepted if
    /// `TrajOptions::check_atom_count` is disabled.
    fn update_group_coords(&self, group: &mut AtomGroup) -> Result<(), ReadTrajError> {
        let coords = self.coords();
        check_group_size(self.options(), self.natoms(), group.len(), coords.len())?;
        group.copy_coordinates(coords);

        if let Some(simbox) = self.periodic_box() {
            group.set_box(Some(simbox));
        }

        group.set_simulation_step_time(
            self.frame_step().unwrap_or_else(|| group.get_simulation_step()),
            self.frame_time().unwrap_or_else(|| group.get_simulation_time()),
        );

        Ok(())
    }

    /// Copy velocities of the current frame into the atom group.
    /// The `i`th atom of the group receives the `i`th velocity of the frame.
    ///
    /// ## Returns
    /// - `ReadTrajError::NoVelocities` if the current frame stores no velocities.
    /// - `ReadTrajError::AtomsNumberMismatch` under the same rules as `update_group_coords`.
    fn update_group_velocities(&self, group: &mut AtomGroup) -> Result<(), ReadTrajError> {
        let velocities = self.velocities().ok_or(ReadTrajError::NoVelocities)?;
        check_group_size(self.options(), self.natoms(), group.len(), velocities.len())?;
        group.copy_velocities(velocities);
        Ok(())
    }

    /// Index of the current frame. `None` if no frame has been read or the end has been reached.
    fn current_frame(&self) -> Option<usize> {
        match self.state().cursor {
            Cursor::At(index) => Some(index),
            _ => None,
        }
    }

    /// Returns `true` if all frames have been read.
    fn is_at_end(&self) -> bool {
        self.state().cursor == Cursor::AtEnd
    }

    /// Owned copy of the current frame.
    fn frame(&self) -> Frame {
        Frame {
            coords: self.coords().to_vec(),
            simbox: self.periodic_box(),
            step: self.frame_step(),
            time: self.frame_time(),
            precision: self.precision(),
        }
    }
}

/// Iteration over owned frames.
/// Implemented for every trajectory, including boxed `dyn Trajectory` objects.
pub trait FrameIterator: Trajectory {
    /// Iterate over the remaining frames of the trajectory, yielding owned frames.
    fn frames(&mut self) -> Frames<'_, Self>;
}

impl<T: Trajectory + ?Sized> FrameIterator for T {
    fn frames(&mut self) -> Frames<'_, Self> {
        Frames::new(self)
    }
}

/// Iterator over owned frames of a trajectory.
/// Iteration stops after the end of the trajectory or after the first error.
pub struct Frames<'a, T: Trajectory + ?Sized> {
    traj: &'a mut T,
    done: bool,
}

impl<'a, T: Trajectory + ?Sized> Frames<'a, T> {
    fn new(traj: &'a mut T) -> Self {
        Frames { traj, done: false }
    }
}

impl<'a, T: Trajectory + ?Sized> Iterator for Frames<'a, T> {
    type Item = Result<Frame, ReadTrajError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.traj.read_frame() {
            Ok(true) => Some(Ok(self.traj.frame())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Check that a group of `group_len` atoms can be updated from a frame of `natoms` atoms
/// with `available` values of the requested kind.
fn check_group_size(
    options: TrajOptions,
    natoms: usize,
    group_len: usize,
    available: usize,
) -> Result<(), ReadTrajError> {
    let mismatch = if options.check_atom_count() {
        group_len != natoms
    } else {
        group_len > natoms
    };

    if mismatch {
        return Err(ReadTrajError::AtomsNumberMismatch(group_len, natoms));
    }

    if available < group_len {
        return Err(ReadTrajError::AtomsNumberMismatch(group_len, available));
    }

    Ok(())
}

/// Parse the first frame at open if requested by the options.
/// Used by the format readers at the end of their `open` functions.
pub(crate) fn init_cache<T: Trajectory + ?Sized>(traj: &mut T) -> Result<(), ReadTrajError> {
    if traj.options().cache_first_frame() && traj.nframes() > 0 {
        traj.rewind()?;
    }

    Ok(())
}

/// Open a trajectory file, choosing the format based on the extension of the file.
///
/// ## Returns
/// Boxed trajectory if the file has been successfully opened.
/// `ReadTrajError::UnknownExtension` if the format is not supported.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let mut traj = open_trajectory("trajectory.dcd", TrajOptions::default()).unwrap();
/// let mut group = AtomGroup::new(traj.natoms());
///
/// while traj.read_frame().unwrap() {
///     traj.update_group_coords(&mut group).unwrap();
/// }
/// ```
pub fn open_trajectory(
    filename: impl AsRef<Path>,
    options: TrajOptions,
) -> Result<Box<dyn Trajectory>, ReadTrajError> {
    let filename = filename.as_ref();

    match FileType::from_name(filename) {
        FileType::DCD => Ok(Box::new(DcdReader::open(filename, options)?)),
        FileType::XTC => Ok(Box::new(XtcReader::open(filename, options)?)),
        FileType::TRR => Ok(Box::new(TrrReader::open(filename, options)?)),
        FileType::Unknown => Err(ReadTrajError::UnknownExtension(Box::from(filename))),
    }
}

/**************************/
/*      TRAJ READER       */
/**************************/

/// Reads frames of a trajectory one after another into an atom group.
///
/// ## Example
/// ```no_run
/// use trjkit::prelude::*;
///
/// let mut traj = XtcReader::open("trajectory.xtc", TrajOptions::default()).unwrap();
/// let mut group = AtomGroup::new(traj.natoms());
///
/// // read every 10th frame
/// let mut reader = TrajReader::new(&mut traj, &mut group).with_step(10).unwrap();
/// while let Some(frame) = reader.next_frame() {
///     let group = frame.unwrap();
///     println!("{}", group.get_simulation_time());
/// }
/// ```
pub struct TrajReader<'a, T: Trajectory + ?Sized> {
    traj: &'a mut T,
    group: &'a mut AtomGroup,
    progress_printer: Option<ProgressPrinter>,
    step: usize,
    frame_number: usize,
    started: bool,
    finished: bool,
}

impl<'a, T: Trajectory + ?Sized> TrajReader<'a, T> {
    /// Wrap a trajectory and the atom group to be updated.
    pub fn new(traj: &'a mut T, group: &'a mut AtomGroup) -> Self {
        TrajReader {
            traj,
            group,
            progress_printer: None,
            step: 1,
            frame_number: 0,
            started: false,
            finished: false,
        }
    }

    /// Read only every `step`th frame of the trajectory.
    ///
    /// ## Returns
    /// `ReadTrajError::InvalidStep` if `step` is zero.
    pub fn with_step(mut self, step: usize) -> Result<Self, ReadTrajError> {
        if step == 0 {
            return Err(ReadTrajError::InvalidStep(step));
        }

        self.step = step;
        Ok(self)
    }

    /// Print progress of the trajectory reading.
    pub fn print_progress(mut self, printer: ProgressPrinter) -> Self {
        self.progress_printer = Some(printer);
        self
    }

    /// Number of frames returned so far.
    pub fn frames_read(&self) -> usize {
        self.frame_number
    }

    fn advance(&mut self) -> Result<bool, ReadTrajError> {
        if !self.started || self.step == 1 {
            self.started = true;
            return self.traj.read_frame();
        }

        let target = match self.traj.current_frame() {
            Some(current) => current + self.step,
            None => return self.traj.read_frame(),
        };

        if target >= self.traj.nframes() {
            *self.traj.state_mut() = TrajState {
                cursor: Cursor::AtEnd,
                cached_first: false,
            };
            return Ok(false);
        }

        self.traj.read_frame_at(target)
    }

    fn report(&mut self, status: ProgressStatus) {
        if let Some(printer) = self.progress_printer.as_mut() {
            printer.set_status(status);
            if let Err(e) = printer.print(self.frame_number, self.group.get_simulation_time()) {
                log::warn!("Could not print progress of trajectory reading: {}", e);
            }
        }
    }

    /// Read the next frame and apply it to the atom group.
    ///
    /// ## Returns
    /// - `Some(Ok(&mut AtomGroup))` if the frame has been successfully read.
    /// - `Some(Err(ReadTrajError))` if the frame could not be read.
    /// - `None` if the end of the trajectory has been reached or reading previously failed.
    pub fn next_frame(&mut self) -> Option<Result<&mut AtomGroup, ReadTrajError>> {
        if self.finished {
            return None;
        }

        let result = self
            .advance()
            .and_then(|read| match read {
                true => self.traj.update_group_coords(self.group).map(|_| true),
                false => Ok(false),
            });

        match result {
            Ok(true) => {
                self.report(ProgressStatus::Running);
                self.frame_number += 1;
                Some(Ok(&mut *self.group))
            }
            Ok(false) => {
                self.finished = true;
                self.report(ProgressStatus::Completed);
                None
            }
            Err(e) => {
                self.finished = true;
                self.report(ProgressStatus::Failed);
                Some(Err(e))
            }
        }
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use tempfile::NamedTempFile;

    /// In-memory trajectory recording how often frames are parsed.
    struct MemoryTrajectory {
        frames: Vec<Vec<Vector3D>>,
        /// Frames declared; may be larger than the number of stored frames.
        declared: usize,
        current: Vec<Vector3D>,
        current_index: Option<usize>,
        position: usize,
        parsed: usize,
        fail_at: Option<usize>,
        options: TrajOptions,
        state: TrajState,
    }

    impl MemoryTrajectory {
        fn new(nframes: usize, natoms: usize, options: TrajOptions) -> Self {
            let frames = (0..nframes)
                .map(|f| {
                    (0..natoms)
                        .map(|a| Vector3D::new(f as f32, a as f32, 0.5))
                        .collect()
                })
                .collect();

            let mut traj = MemoryTrajectory {
                frames,
                declared: nframes,
                current: vec![Vector3D::default(); natoms],
                current_index: None,
                position: 0,
                parsed: 0,
                fail_at: None,
                options,
                state: TrajState::default(),
            };
            init_cache(&mut traj).unwrap();
            traj
        }
    }

    impl Trajectory for MemoryTrajectory {
        fn natoms(&self) -> usize {
            self.current.len()
        }

        fn nframes(&self) -> usize {
            self.declared
        }

        fn timestep(&self) -> f32 {
            2.0
        }

        fn has_periodic_box(&self) -> bool {
            true
        }

        fn periodic_box(&self) -> Option<SimBox> {
            Some(SimBox::from([5.0, 5.0, 5.0]))
        }

        fn coords(&self) -> &[Vector3D] {
            &self.current
        }

        fn frame_step(&self) -> Option<u64> {
            self.current_index.map(|i| i as u64 * 10)
        }

        fn frame_time(&self) -> Option<f32> {
            self.current_index.map(|i| i as f32 * 2.0)
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
            self.position = index;
            Ok(())
        }

        fn parse_frame(&mut self, index: usize) -> Result<bool, ReadTrajError> {
            if self.fail_at == Some(self.position) {
                return Err(ReadTrajError::UnexpectedEof(index));
            }

            match self.frames.get(self.position) {
                None => Ok(false),
                Some(frame) => {
                    self.current = frame.clone();
                    self.current_index = Some(index);
                    self.parsed += 1;
                    self.position += 1;
                    Ok(true)
                }
            }
        }

        fn rewind_impl(&mut self) -> Result<(), ReadTrajError> {
            self.position = 0;
            Ok(())
        }
    }

    fn collect_x(traj: &mut dyn Trajectory) -> Vec<f32> {
        let mut x = Vec::new();
        while traj.read_frame().unwrap() {
            x.push(traj.coords()[0].x);
        }
        x
    }

    #[test]
    fn sequential_reading() {
        let mut traj = MemoryTrajectory::new(4, 3, TrajOptions::default());
        assert_eq!(traj.parsed, 1);
        assert_eq!(traj.state().cursor, Cursor::At(0));
        assert!(traj.state().cached_first);

        assert_eq!(collect_x(&mut traj), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(traj.parsed, 4);
        assert!(traj.is_at_end());
        assert_eq!(traj.current_frame(), None);
    }

    #[test]
    fn end_is_idempotent() {
        let mut traj = MemoryTrajectory::new(2, 3, TrajOptions::default());
        collect_x(&mut traj);
        for _ in 0..3 {
            assert!(!traj.read_frame().unwrap());
        }
        assert!(traj.is_at_end());
    }

    #[test]
    fn cached_and_uncached_are_identical() {
        let mut cached = MemoryTrajectory::new(5, 2, TrajOptions::default());
        let mut uncached =
            MemoryTrajectory::new(5, 2, TrajOptions::default().with_cache_first_frame(false));

        assert_eq!(uncached.parsed, 0);
        assert_eq!(uncached.state().cursor, Cursor::BeforeFirst);

        let a: Vec<Frame> = cached.frames().map(|f| f.unwrap()).collect();
        let b: Vec<Frame> = uncached.frames().map(|f| f.unwrap()).collect();
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn read_frame_at_continues_sequentially() {
        let mut traj = MemoryTrajectory::new(6, 2, TrajOptions::default());
        assert!(traj.read_frame_at(3).unwrap());
        assert_eq!(traj.current_frame(), Some(3));
        assert_eq!(traj.coords()[0].x, 3.0);

        assert!(traj.read_frame().unwrap());
        assert_eq!(traj.current_frame(), Some(4));
        assert_eq!(traj.coords()[0].x, 4.0);
    }

    #[test]
    fn read_frame_at_zero_uses_cache() {
        let mut traj = MemoryTrajectory::new(3, 2, TrajOptions::default());
        assert!(traj.read_frame_at(0).unwrap());
        assert_eq!(traj.parsed, 1);

        // cache consumed, next read continues with frame 1
        assert!(traj.read_frame().unwrap());
        assert_eq!(traj.current_frame(), Some(1));
    }

    #[test]
    fn out_of_range_has_no_side_effects() {
        let mut traj = MemoryTrajectory::new(3, 2, TrajOptions::default());
        traj.read_frame().unwrap();
        traj.read_frame().unwrap();
        let state = *traj.state();

        assert_eq!(
            traj.read_frame_at(3),
            Err(ReadTrajError::FrameOutOfRange(3, 3))
        );
        assert_eq!(*traj.state(), state);
        assert_eq!(traj.coords()[0].x, 1.0);
    }

    #[test]
    fn rewind() {
        let mut traj = MemoryTrajectory::new(3, 2, TrajOptions::default());
        assert_eq!(collect_x(&mut traj), vec![0.0, 1.0, 2.0]);

        assert!(traj.rewind().unwrap());
        assert_eq!(traj.coords()[0].x, 0.0);
        assert_eq!(collect_x(&mut traj), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn empty_trajectory() {
        let mut traj = MemoryTrajectory::new(0, 2, TrajOptions::default());
        assert!(!traj.state().cached_first);
        assert!(!traj.read_frame().unwrap());
        assert!(!traj.rewind().unwrap());
        assert!(traj.read_frame_at(0).is_err());
    }

    #[test]
    fn fewer_frames_than_declared() {
        let mut traj = MemoryTrajectory::new(2, 2, TrajOptions::default());
        traj.declared = 5;
        assert_eq!(collect_x(&mut traj), vec![0.0, 1.0]);
        assert!(traj.is_at_end());
    }

    #[test]
    fn error_does_not_move_cursor() {
        let mut traj = MemoryTrajectory::new(4, 2, TrajOptions::default());
        traj.fail_at = Some(2);
        assert!(traj.read_frame().unwrap());
        assert!(traj.read_frame().unwrap());

        assert_eq!(traj.read_frame(), Err(ReadTrajError::UnexpectedEof(2)));
        assert_eq!(traj.current_frame(), Some(1));

        traj.fail_at = None;
        assert!(traj.read_frame().unwrap());
        assert_eq!(traj.current_frame(), Some(2));
    }

    #[test]
    fn update_group() {
        let mut traj = MemoryTrajectory::new(3, 4, TrajOptions::default());
        traj.read_frame_at(2).unwrap();

        let mut group = AtomGroup::new(4);
        traj.update_group_coords(&mut group).unwrap();
        assert_eq!(group.positions()[3], Vector3D::new(2.0, 3.0, 0.5));
        assert_eq!(group.get_simulation_step(), 20);
        assert_approx_eq!(f32, group.get_simulation_time(), 4.0);
        assert_approx_eq!(f32, group.get_box().unwrap().x, 5.0);
    }

    #[test]
    fn update_group_atom_count() {
        let mut traj = MemoryTrajectory::new(1, 4, TrajOptions::default());
        traj.read_frame().unwrap();

        let mut small = AtomGroup::new(2);
        assert_eq!(
            traj.update_group_coords(&mut small),
            Err(ReadTrajError::AtomsNumberMismatch(2, 4))
        );

        let mut large = AtomGroup::new(5);
        assert_eq!(
            traj.update_group_coords(&mut large),
            Err(ReadTrajError::AtomsNumberMismatch(5, 4))
        );

        traj.options = TrajOptions::default().with_check_atom_count(false);
        traj.update_group_coords(&mut small).unwrap();
        assert_eq!(small.positions()[1], Vector3D::new(0.0, 1.0, 0.5));
        assert!(traj.update_group_coords(&mut large).is_err());
    }

    #[test]
    fn traj_reader_with_step() {
        for (step, expected) in [
            (1, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            (2, vec![0.0, 2.0, 4.0, 6.0]),
            (3, vec![0.0, 3.0, 6.0]),
            (10, vec![0.0]),
        ] {
            let mut traj = MemoryTrajectory::new(7, 2, TrajOptions::default());
            let mut group = AtomGroup::new(2);
            let mut reader = TrajReader::new(&mut traj, &mut group)
                .with_step(step)
                .unwrap();

            let mut x = Vec::new();
            while let Some(frame) = reader.next_frame() {
                x.push(frame.unwrap().positions()[0].x);
            }
            assert_eq!(x, expected);
            assert_eq!(reader.frames_read(), expected.len());
            assert!(reader.next_frame().is_none());
        }
    }

    #[test]
    fn traj_reader_invalid_step() {
        let mut traj = MemoryTrajectory::new(2, 2, TrajOptions::default());
        let mut group = AtomGroup::new(2);
        assert!(matches!(
            TrajReader::new(&mut traj, &mut group).with_step(0),
            Err(ReadTrajError::InvalidStep(0))
        ));
    }

    #[test]
    fn traj_reader_stops_after_error() {
        let mut traj = MemoryTrajectory::new(4, 2, TrajOptions::default());
        traj.fail_at = Some(1);
        let mut group = AtomGroup::new(2);
        let mut reader = TrajReader::new(&mut traj, &mut group);

        assert!(reader.next_frame().unwrap().is_ok());
        assert!(reader.next_frame().unwrap().is_err());
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn traj_reader_progress() {
        let output = NamedTempFile::new().unwrap();
        let printer = ProgressPrinter::new()
            .with_output(Box::new(output.reopen().unwrap()))
            .with_colored(false)
            .with_print_freq(2)
            .with_terminating("\n");

        let mut traj = MemoryTrajectory::new(3, 2, TrajOptions::default());
        let mut group = AtomGroup::new(2);
        let mut reader = TrajReader::new(&mut traj, &mut group).print_progress(printer);
        while let Some(frame) = reader.next_frame() {
            frame.unwrap();
        }

        let printed = std::fs::read_to_string(output.path()).unwrap();
        let lines: Vec<&str> = printed.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[ RUNNING ]"));
        assert!(lines[2].starts_with("[COMPLETED]"));
        assert!(lines[2].contains("Frame            3"));
    }

    #[test]
    fn boxed_trajectory_frames() {
        let mut traj: Box<dyn Trajectory> =
            Box::new(MemoryTrajectory::new(3, 2, TrajOptions::default()));
        let frames: Vec<Frame> = traj.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].step(), Some(10));
        assert_eq!(frames[2].time(), Some(4.0));
        assert_eq!(frames[0].natoms(), 2);
    }

    #[test]
    fn concrete_trajectory_frames() {
        let options = TrajOptions::default().with_cache_first_frame(false);
        let mut traj = MemoryTrajectory::new(4, 3, options);
        assert!(traj.read_frame().unwrap());

        // iteration continues after the current frame
        let frames: Vec<Frame> = traj.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].coords()[0].x, 1.0);
        assert!(traj.is_at_end());
        assert_eq!(traj.frames().count(), 0);
    }

    #[test]
    fn velocities_not_available_by_default() {
        let traj = MemoryTrajectory::new(2, 2, TrajOptions::default());
        assert!(!traj.has_velocities());
        let mut group = AtomGroup::new(2);
        assert_eq!(
            traj.update_group_velocities(&mut group),
            Err(ReadTrajError::NoVelocities)
        );
    }

    #[test]
    fn frame_from_group() {
        let mut group = AtomGroup::from_positions(vec![Vector3D::new(1.0, 2.0, 3.0)]);
        group.set_simulation_step_time(50, 0.1);
        let frame = Frame::from_group(&group);
        assert_eq!(frame.coords_array(), vec![[1.0, 2.0, 3.0]]);
        assert_eq!(frame.step(), Some(50));
        assert!(frame.simbox().is_none());
    }

    #[test]
    fn unknown_extension() {
        assert!(matches!(
            open_trajectory("trajectory.gro", TrajOptions::default()),
            Err(ReadTrajError::UnknownExtension(_))
        ));
    }
}
