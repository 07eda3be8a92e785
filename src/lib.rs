// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! # trjkit: Trajectory Toolkit for Rust
//!
//! Rust library for reading and writing molecular dynamics trajectories.
//! Supports CHARMM/NAMD dcd files (any byte order, 32-bit or 64-bit record markers),
//! compressed Gromacs xtc files and full-precision Gromacs trr files.
//! All formats are accessed through a common [`Trajectory`](crate::io::traj_io::Trajectory) interface
//! providing sequential reading, random access to frames and rewinding.
//!
//! ## Usage
//!
//! Run
//!
//! ```bash
//! $ cargo add trjkit
//! ```
//!
//! Import the crate in your Rust code:
//! ```
//! use trjkit::prelude::*;
//! ```
//!
//! ## Examples
//!
//! #### Reading a trajectory of any supported format
//!
//! The format of the trajectory is detected from the file extension.
//!
//! ```no_run
//! use trjkit::prelude::*;
//! use std::error::Error;
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!     let mut traj = open_trajectory("trajectory.dcd", TrajOptions::default())?;
//!     println!("{} frames of {} atoms", traj.nframes(), traj.natoms());
//!
//!     // read the frames one by one
//!     while traj.read_frame()? {
//!         println!("{:?}", traj.coords()[0]);
//!     }
//!
//!     // jump directly to a specific frame
//!     traj.read_frame_at(5)?;
//!     println!("{:?}", traj.periodic_box());
//!
//!     Ok(())
//! }
//! ```
//!
//! #### Updating a group of atoms
//!
//! Apply the frames of a trajectory to an `AtomGroup`, reading every 10th frame
//! and printing the progress of the reading.
//!
//! ```no_run
//! use trjkit::prelude::*;
//! use std::error::Error;
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!     let mut traj = XtcReader::open("trajectory.xtc", TrajOptions::default())?;
//!     let mut group = AtomGroup::new(traj.natoms());
//!
//!     let mut reader = TrajReader::new(&mut traj, &mut group)
//!         .with_step(10)?
//!         .print_progress(ProgressPrinter::new());
//!
//!     while let Some(group) = reader.next_frame() {
//!         let group = group?;
//!         println!("{} {:?}", group.get_simulation_time(), group.positions()[0]);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! #### Converting an xtc file into a dcd file
//!
//! ```no_run
//! use trjkit::prelude::*;
//! use std::error::Error;
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!     let mut xtc = XtcReader::open("input.xtc", TrajOptions::default())?;
//!
//!     let mut writer = DcdWriter::create("output.dcd")?;
//!     writer.set_header(xtc.natoms(), xtc.nframes(), xtc.timestep(), true)?;
//!     writer.write_header()?;
//!
//!     for frame in xtc.frames() {
//!         writer.write_frame(&frame?)?;
//!     }
//!
//!     writer.finish()?;
//!     Ok(())
//! }
//! ```
//!
//! #### Repairing the frame count of a dcd file
//!
//! Dcd files of interrupted simulations often declare a wrong number of frames.
//! The header can be fixed in place:
//!
//! ```no_run
//! use trjkit::prelude::*;
//!
//! let scan = repair_dcd_frame_count("broken.dcd").unwrap();
//! println!("declared {} frames, found {}", scan.declared_frames(), scan.actual_frames());
//! ```
//!
//! ## Units
//! Coordinates and boxes are reported exactly as stored in the files: `trjkit` performs no unit conversions.
//! Gromacs files (xtc, trr) thus use nanometers, dcd files typically use ångströms.
//!
//! ## Error handling
//! The individual error types are not exported into the `prelude` module.
//! Use them explicitly from the `errors` module, e.g.:
//! ```
//! use trjkit::errors::ReadTrajError;
//! ```
//!
//! ## Logging
//! `trjkit` reports recoverable problems (such as a dcd file declaring a wrong number of frames
//! or an incomplete frame at the end of a trajectory) through the [`log`](https://docs.rs/log) facade.
//! No logger is installed by the library.
//!
//! ## Features
//! - `serde`: serialization and deserialization of `Vector3D`, `SimBox`, `AtomGroup` and `Frame`.
//!
//! ## License
//! This library is released under the MIT License.

/// Current version of the `trjkit` library.
pub const TRJKIT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod files;
pub mod io {
    pub mod bitcodec;
    pub mod dcd_io;
    pub mod traj_io;
    pub mod trr_io;
    pub mod xdr;
    pub mod xtc_codec;
    pub mod xtc_io;
}
pub mod progress;
pub mod structures {
    pub mod group;
    pub mod simbox;
    pub mod vector3d;
}

/// Reexported basic `trjkit` structures and traits.
pub mod prelude {
    pub use crate::io::dcd_io::{
        repair_dcd_frame_count, scan_dcd_frames, DcdReader, DcdWriter, MarkerWidth,
    };
    pub use crate::io::traj_io::{
        open_trajectory, Frame, FrameIterator, TrajOptions, TrajReader, Trajectory,
    };
    pub use crate::io::trr_io::{TrrReader, TrrWriter};
    pub use crate::io::xdr::ByteOrder;
    pub use crate::io::xtc_io::{XtcReader, XtcWriter, XtcWriterOptions};
    pub use crate::progress::{ProgressPrinter, ProgressStatus};
    pub use crate::structures::group::AtomGroup;
    pub use crate::structures::simbox::SimBox;
    pub use crate::structures::vector3d::Vector3D;
}
