// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{Builder, NamedTempFile};
use trjkit::errors::{ReadTrajError, WriteTrajError};
use trjkit::prelude::*;

fn random_vectors(rng: &mut StdRng, n: usize) -> Vec<Vector3D> {
    (0..n)
        .map(|_| {
            Vector3D::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
            )
        })
        .collect()
}

#[test]
fn roundtrip() {
    let mut rng = StdRng::seed_from_u64(31);
    let natoms = 40;
    let coords: Vec<Vec<Vector3D>> = (0..4).map(|_| random_vectors(&mut rng, natoms)).collect();
    let velocities: Vec<Vec<Vector3D>> =
        (0..4).map(|_| random_vectors(&mut rng, natoms)).collect();
    let forces: Vec<Vec<Vector3D>> = (0..4).map(|_| random_vectors(&mut rng, natoms)).collect();
    let simbox = SimBox::from([5.5, 6.5, 7.5]);

    let output = NamedTempFile::new().unwrap();
    let mut writer = TrrWriter::create(output.path()).unwrap();
    for i in 0..4 {
        let frame = Frame::new(coords[i].clone())
            .with_box(Some(simbox))
            .with_step_time(i as u64 * 100, i as f32 * 0.2);

        // velocities in every frame, forces only in odd frames
        let f = if i % 2 == 1 {
            Some(forces[i].as_slice())
        } else {
            None
        };
        writer
            .write_frame_with(&frame, Some(velocities[i].as_slice()), f)
            .unwrap();
    }
    assert_eq!(writer.frames_written(), 4);
    writer.finish().unwrap();

    let mut trr = TrrReader::open(output.path(), TrajOptions::default()).unwrap();
    assert_eq!(trr.natoms(), natoms);
    assert_eq!(trr.nframes(), 4);
    assert_eq!(trr.timestep(), 0.0);
    assert!(trr.has_periodic_box());

    for i in 0..4 {
        assert!(trr.read_frame().unwrap());
        assert!(trr.has_coords());
        assert!(!trr.is_double());
        assert_eq!(trr.coords(), coords[i].as_slice());
        assert_eq!(trr.velocities(), Some(velocities[i].as_slice()));
        if i % 2 == 1 {
            assert_eq!(trr.forces(), Some(forces[i].as_slice()));
        } else {
            assert!(trr.forces().is_none());
        }
        assert_eq!(trr.periodic_box(), Some(simbox));
        assert_eq!(trr.frame_step(), Some(i as u64 * 100));
        assert_eq!(trr.frame_time(), Some(i as f32 * 0.2));
        assert_eq!(trr.lambda(), Some(0.0));
        assert!(trr.virial().is_none());
        assert!(trr.pressure().is_none());
    }

    assert!(!trr.read_frame().unwrap());
    assert!(trr.read_frame_at(2).unwrap());
    assert_eq!(trr.coords(), coords[2].as_slice());
}

#[test]
fn no_box() {
    let output = NamedTempFile::new().unwrap();
    let mut writer = TrrWriter::create(output.path()).unwrap();
    writer
        .write_frame(&Frame::new(vec![Vector3D::new(1.0, 2.0, 3.0); 3]))
        .unwrap();
    writer.finish().unwrap();

    let trr = TrrReader::open(output.path(), TrajOptions::default()).unwrap();
    assert!(!trr.has_periodic_box());
    assert!(trr.periodic_box().is_none());
    assert_eq!(trr.frame_step(), Some(0));
    assert_eq!(trr.frame_time(), Some(0.0));
}

#[test]
fn write_group() {
    let mut rng = StdRng::seed_from_u64(32);
    let mut group = AtomGroup::from_positions(random_vectors(&mut rng, 12));
    group.set_box(Some(SimBox::from([3.0, 3.0, 3.0])));
    group.set_simulation_step_time(1000, 2.0);

    let output = NamedTempFile::new().unwrap();
    let mut writer = TrrWriter::create(output.path()).unwrap();
    writer.write_group(&group).unwrap();
    writer.finish().unwrap();

    let trr = TrrReader::open(output.path(), TrajOptions::default()).unwrap();
    let mut read = AtomGroup::new(12);
    trr.update_group_coords(&mut read).unwrap();
    assert_eq!(read, group);
    assert!(!trr.has_velocities());
}

#[test]
fn group_velocities() {
    let mut rng = StdRng::seed_from_u64(34);
    let mut group = AtomGroup::from_positions(random_vectors(&mut rng, 15));
    let velocities = random_vectors(&mut rng, 15);
    group.set_velocities(Some(velocities.clone()));

    let output = Builder::new().suffix(".trr").tempfile().unwrap();
    let mut writer = TrrWriter::create(output.path()).unwrap();
    writer.write_group(&group).unwrap();
    writer
        .write_frame(&Frame::new(random_vectors(&mut rng, 15)))
        .unwrap();
    writer.finish().unwrap();

    let mut traj = open_trajectory(output.path(), TrajOptions::default()).unwrap();

    assert!(traj.has_velocities());
    assert_eq!(traj.velocities(), Some(velocities.as_slice()));

    let mut read = AtomGroup::new(15);
    traj.update_group_velocities(&mut read).unwrap();
    assert_eq!(read.velocities(), Some(velocities.as_slice()));

    let mut wrong = AtomGroup::new(14);
    assert_eq!(
        traj.update_group_velocities(&mut wrong),
        Err(ReadTrajError::AtomsNumberMismatch(14, 15))
    );

    assert!(traj.read_frame().unwrap());
    assert!(traj.read_frame().unwrap());
    assert!(!traj.has_velocities());
    assert_eq!(
        traj.update_group_velocities(&mut read),
        Err(ReadTrajError::NoVelocities)
    );
}

#[test]
fn writer_atom_counts() {
    let output = NamedTempFile::new().unwrap();
    let mut writer = TrrWriter::create(output.path()).unwrap();
    let frame = Frame::new(vec![Vector3D::default(); 5]);
    writer.write_frame(&frame).unwrap();

    assert_eq!(
        writer.write_frame(&Frame::new(vec![Vector3D::default(); 6])),
        Err(WriteTrajError::AtomsNumberMismatch(6, 5))
    );

    let velocities = vec![Vector3D::default(); 4];
    assert_eq!(
        writer.write_frame_with(&frame, Some(velocities.as_slice()), None),
        Err(WriteTrajError::AtomsNumberMismatch(4, 5))
    );
    assert_eq!(writer.frames_written(), 1);
}

#[test]
fn truncated_last_frame_is_ignored() {
    let mut rng = StdRng::seed_from_u64(33);
    let output = NamedTempFile::new().unwrap();
    let mut writer = TrrWriter::create(output.path()).unwrap();
    for _ in 0..3 {
        writer
            .write_frame(&Frame::new(random_vectors(&mut rng, 20)))
            .unwrap();
    }
    writer.finish().unwrap();

    let len = std::fs::metadata(output.path()).unwrap().len();
    std::fs::OpenOptions::new()
        .write(true)
        .open(output.path())
        .unwrap()
        .set_len(len - 8)
        .unwrap();

    let trr = TrrReader::open(output.path(), TrajOptions::default()).unwrap();
    assert_eq!(trr.nframes(), 2);
}

#[test]
fn not_a_trr_file() {
    let mut output = NamedTempFile::new().unwrap();
    output.write_all(b"Plain text pretending to be a trr file.").unwrap();
    output.flush().unwrap();

    match TrrReader::open(output.path(), TrajOptions::default()) {
        Err(ReadTrajError::NotTrr(_)) => (),
        other => panic!("Unexpected result: {:?}", other.map(|_| ())),
    }

    let empty = NamedTempFile::new().unwrap();
    match TrrReader::open(empty.path(), TrajOptions::default()) {
        Err(ReadTrajError::NotTrr(_)) => (),
        other => panic!("Unexpected result: {:?}", other.map(|_| ())),
    }
}
