// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

use float_cmp::assert_approx_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{Builder, NamedTempFile};
use trjkit::errors::ReadTrajError;
use trjkit::prelude::*;

const NATOMS: usize = 25;
const NFRAMES: usize = 6;

fn test_frames() -> Vec<Frame> {
    let mut rng = StdRng::seed_from_u64(555);
    (0..NFRAMES)
        .map(|i| {
            let coords = (0..NATOMS)
                .map(|_| {
                    Vector3D::new(
                        rng.gen_range(0.0..4.0),
                        rng.gen_range(0.0..4.0),
                        rng.gen_range(0.0..4.0),
                    )
                })
                .collect();
            Frame::new(coords)
                .with_box(Some(SimBox::from([4.0, 4.0, 4.0])))
                .with_step_time(i as u64, i as f32)
        })
        .collect()
}

fn temp_with_suffix(suffix: &str) -> NamedTempFile {
    Builder::new().suffix(suffix).tempfile().unwrap()
}

fn write_all(frames: &[Frame]) -> Vec<NamedTempFile> {
    let dcd = temp_with_suffix(".dcd");
    let mut writer = DcdWriter::create(dcd.path()).unwrap();
    writer.set_header(NATOMS, frames.len(), 1.0, true).unwrap();
    writer.write_header().unwrap();
    for frame in frames {
        writer.write_frame(frame).unwrap();
    }
    writer.finish().unwrap();

    let xtc = temp_with_suffix(".xtc");
    let mut writer = XtcWriter::create(xtc.path(), XtcWriterOptions::default()).unwrap();
    for frame in frames {
        writer.write_frame(frame).unwrap();
    }
    writer.finish().unwrap();

    let trr = temp_with_suffix(".trr");
    let mut writer = TrrWriter::create(trr.path()).unwrap();
    for frame in frames {
        writer.write_frame(frame).unwrap();
    }
    writer.finish().unwrap();

    vec![dcd, xtc, trr]
}

#[test]
fn open_all_formats() {
    let frames = test_frames();
    let files = write_all(&frames);

    for file in files.iter() {
        let mut traj = open_trajectory(file.path(), TrajOptions::default()).unwrap();
        assert_eq!(traj.natoms(), NATOMS);
        assert_eq!(traj.nframes(), NFRAMES);
        assert!(traj.has_periodic_box());

        let read: Vec<Frame> = traj.frames().map(|f| f.unwrap()).collect();
        assert_eq!(read.len(), NFRAMES);

        for (r, e) in read.iter().zip(frames.iter()) {
            assert_eq!(r.simbox(), e.simbox());
            for (a, b) in r.coords().iter().zip(e.coords().iter()) {
                assert_approx_eq!(f32, a.x, b.x, epsilon = 0.0006);
                assert_approx_eq!(f32, a.y, b.y, epsilon = 0.0006);
                assert_approx_eq!(f32, a.z, b.z, epsilon = 0.0006);
            }
        }

        assert!(traj.is_at_end());
        assert!(!traj.read_frame().unwrap());

        // none of the writers stores velocities for plain frames
        assert!(traj.read_frame_at(0).unwrap());
        assert!(!traj.has_velocities());
        assert!(traj.velocities().is_none());
        let mut group = AtomGroup::new(NATOMS);
        assert_eq!(
            traj.update_group_velocities(&mut group),
            Err(ReadTrajError::NoVelocities)
        );
        assert!(group.velocities().is_none());
    }
}

#[test]
fn uniform_cursor_behavior() {
    let frames = test_frames();
    let files = write_all(&frames);

    for file in files.iter() {
        for cache in [true, false] {
            let options = TrajOptions::default().with_cache_first_frame(cache);
            let mut traj = open_trajectory(file.path(), options).unwrap();

            assert!(traj.read_frame_at(3).unwrap());
            assert_eq!(traj.current_frame(), Some(3));
            assert!(traj.read_frame().unwrap());
            assert_eq!(traj.current_frame(), Some(4));

            match traj.read_frame_at(NFRAMES) {
                Err(ReadTrajError::FrameOutOfRange(i, n)) => {
                    assert_eq!(i, NFRAMES);
                    assert_eq!(n, NFRAMES);
                }
                other => panic!("Unexpected result: {:?}", other),
            }
            assert_eq!(traj.current_frame(), Some(4));

            assert!(traj.rewind().unwrap());
            assert_eq!(traj.current_frame(), Some(0));
            let mut count = 0;
            while traj.read_frame().unwrap() {
                count += 1;
            }
            assert_eq!(count, NFRAMES);
        }
    }
}

#[test]
fn traj_reader_with_step() {
    let frames = test_frames();
    let files = write_all(&frames);

    for file in files.iter() {
        let mut traj = open_trajectory(file.path(), TrajOptions::default()).unwrap();
        let mut group = AtomGroup::new(NATOMS);

        let mut reader = TrajReader::new(traj.as_mut(), &mut group).with_step(2).unwrap();
        let mut positions = Vec::new();
        while let Some(group) = reader.next_frame() {
            positions.push(group.unwrap().positions()[0]);
        }
        assert_eq!(reader.frames_read(), 3);
        assert_eq!(positions.len(), 3);

        for (read, index) in positions.iter().zip([0, 2, 4]) {
            assert_approx_eq!(f32, read.x, frames[index].coords()[0].x, epsilon = 0.0006);
        }
    }
}

#[test]
fn update_group_atom_count() {
    let frames = test_frames();
    let files = write_all(&frames);

    for file in files.iter() {
        let traj = open_trajectory(file.path(), TrajOptions::default()).unwrap();
        let mut smaller = AtomGroup::new(NATOMS - 5);
        match traj.update_group_coords(&mut smaller) {
            Err(ReadTrajError::AtomsNumberMismatch(20, 25)) => (),
            other => panic!("Unexpected result: {:?}", other),
        }

        let relaxed = open_trajectory(
            file.path(),
            TrajOptions::default().with_check_atom_count(false),
        )
        .unwrap();
        relaxed.update_group_coords(&mut smaller).unwrap();
        assert_approx_eq!(
            f32,
            smaller.positions()[0].x,
            frames[0].coords()[0].x,
            epsilon = 0.0006
        );

        let mut larger = AtomGroup::new(NATOMS + 1);
        match relaxed.update_group_coords(&mut larger) {
            Err(ReadTrajError::AtomsNumberMismatch(26, 25)) => (),
            other => panic!("Unexpected result: {:?}", other),
        }
    }
}

#[test]
fn unknown_extension() {
    let file = temp_with_suffix(".gro");
    match open_trajectory(file.path(), TrajOptions::default()) {
        Err(ReadTrajError::UnknownExtension(_)) => (),
        other => panic!("Unexpected result: {:?}", other.map(|_| ())),
    }
}
