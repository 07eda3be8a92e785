// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Implementation of the AtomGroup structure, the target of trajectory frame updates.

use crate::structures::{simbox::SimBox, vector3d::Vector3D};

/// Ordered collection of atom positions together with the periodic box
/// and simulation step and time of the trajectory frame last applied to it.
///
/// Positions are matched to trajectory coordinates by index:
/// the `i`th position of the group receives the `i`th coordinate of the frame.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomGroup {
    positions: Vec<Vector3D>,
    velocities: Option<Vec<Vector3D>>,
    simbox: Option<SimBox>,
    step: u64,
    time: f32,
}

impl AtomGroup {
    /// Create a new group of `n_atoms` atoms, all placed at the origin.
    pub fn new(n_atoms: usize) -> Self {
        AtomGroup {
            positions: vec![Vector3D::default(); n_atoms],
            ..Default::default()
        }
    }

    /// Create a new group from a vector of positions.
    pub fn from_positions(positions: Vec<Vector3D>) -> Self {
        AtomGroup {
            positions,
            ..Default::default()
        }
    }

    /// Get the number of atoms in the group.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the group contains no atoms.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get immutable reference to the positions of the atoms.
    #[inline]
    pub fn positions(&self) -> &[Vector3D] {
        &self.positions
    }

    /// Get mutable reference to the positions of the atoms.
    #[inline]
    pub fn positions_mut(&mut self) -> &mut [Vector3D] {
        &mut self.positions
    }

    /// Get the velocities of the atoms. `None` if no velocities have been set.
    #[inline]
    pub fn velocities(&self) -> Option<&[Vector3D]> {
        self.velocities.as_deref()
    }

    /// Set the velocities of the atoms.
    ///
    /// ## Panics
    /// Panics if the number of velocities does not match the number of atoms.
    pub fn set_velocities(&mut self, velocities: Option<Vec<Vector3D>>) {
        if let Some(v) = &velocities {
            assert_eq!(
                v.len(),
                self.positions.len(),
                "Number of velocities must match the number of atoms."
            );
        }
        self.velocities = velocities;
    }

    /// Get the periodic box of the group. `None` if the group is not periodic.
    #[inline]
    pub fn get_box(&self) -> Option<&SimBox> {
        self.simbox.as_ref()
    }

    /// Set the periodic box of the group.
    #[inline]
    pub fn set_box(&mut self, simbox: Option<SimBox>) {
        self.simbox = simbox;
    }

    /// Returns `true` if the group has a periodic box.
    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.simbox.is_some()
    }

    /// Get the simulation step of the last applied frame.
    #[inline]
    pub fn get_simulation_step(&self) -> u64 {
        self.step
    }

    /// Get the simulation time of the last applied frame.
    #[inline]
    pub fn get_simulation_time(&self) -> f32 {
        self.time
    }

    /// Set the simulation step and time.
    #[inline]
    pub fn set_simulation_step_time(&mut self, step: u64, time: f32) {
        self.step = step;
        self.time = time;
    }

    /// Copy coordinates into the group by index.
    /// Only the first `self.len()` coordinates are used; the caller checks the counts.
    pub(crate) fn copy_coordinates(&mut self, coords: &[Vector3D]) {
        for (pos, coord) in self.positions.iter_mut().zip(coords.iter()) {
            *pos = *coord;
        }
    }

    /// Copy velocities into the group by index.
    /// Only the first `self.len()` velocities are used; the caller checks the counts.
    pub(crate) fn copy_velocities(&mut self, velocities: &[Vector3D]) {
        let n = self.positions.len();
        match self.velocities.as_mut() {
            Some(current) if current.len() == n => current.copy_from_slice(&velocities[..n]),
            _ => self.velocities = Some(velocities[..n].to_vec()),
        }
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/
