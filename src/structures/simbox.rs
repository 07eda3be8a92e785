// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Implementation of the SimBox structure and its methods.

use crate::structures::vector3d::Vector3D;
use float_cmp::approx_eq;
use std::ops::Deref;

/// Structure defining the shape and dimensions of a periodic simulation box.
///
/// The box is stored as three box vectors `v1`, `v2`, `v3`.
/// Boxes produced from lengths and angles always have `v1y`, `v1z`, and `v2z` equal to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct SimBox {
    /// You can also use `.x` to reach this value.
    pub v1x: f32,
    /// You can also use `.y` to reach this value.
    pub v2y: f32,
    /// You can also use `.z` to reach this value.
    pub v3z: f32,
    pub v1y: f32,
    pub v1z: f32,
    pub v2x: f32,
    pub v2z: f32,
    pub v3x: f32,
    pub v3y: f32,
}

impl From<[f32; 3]> for SimBox {
    /// Convert 3-member array to an orthogonal SimBox. Last 6 values of SimBox are set to 0.
    fn from(arr: [f32; 3]) -> Self {
        SimBox {
            v1x: arr[0],
            v2y: arr[1],
            v3z: arr[2],
            ..Default::default()
        }
    }
}

impl SimBox {
    /// Create new simulation box from lengths and angles (in degrees).
    ///
    /// ## Example
    /// ```
    /// # use trjkit::prelude::*;
    /// # use float_cmp::assert_approx_eq;
    /// #
    /// let simbox = SimBox::from_lengths_angles([5.0, 4.0, 3.0].into(), [80.0, 70.0, 120.0].into());
    ///
    /// assert_approx_eq!(f32, simbox.v1x,  5.000000, epsilon = 0.0001);
    /// assert_approx_eq!(f32, simbox.v2y,  3.464102, epsilon = 0.0001);
    /// assert_approx_eq!(f32, simbox.v3z,  2.553768, epsilon = 0.0001);
    /// assert_approx_eq!(f32, simbox.v2x, -2.000000, epsilon = 0.0001);
    /// assert_approx_eq!(f32, simbox.v3x,  1.026060, epsilon = 0.0001);
    /// assert_approx_eq!(f32, simbox.v3y,  1.193930, epsilon = 0.0001);
    /// ```
    ///
    /// ## Notes
    /// - Angles within 1e-4 degrees of 90 are treated as exactly right angles.
    pub fn from_lengths_angles(lengths: Vector3D, angles: Vector3D) -> Self {
        let mut simbox = SimBox {
            v1x: lengths.x,
            ..Default::default()
        };

        let right = |angle: f32| approx_eq!(f32, angle, 90.0, epsilon = 1e-4);

        if right(angles.x) && right(angles.y) && right(angles.z) {
            simbox.v2y = lengths.y;
            simbox.v3z = lengths.z;
        } else {
            let alpha = angles.x.to_radians();
            let beta = angles.y.to_radians();
            let gamma = angles.z.to_radians();

            simbox.v2x = lengths.y * gamma.cos();
            simbox.v2y = lengths.y * gamma.sin();

            simbox.v3x = lengths.z * beta.cos();
            simbox.v3y = lengths.z * (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
            simbox.v3z =
                (lengths.z * lengths.z - simbox.v3x * simbox.v3x - simbox.v3y * simbox.v3y).sqrt();
        }

        simbox
    }

    /// Create new simulation box from a row-major 3x3 matrix of box vectors
    /// (`[v1x, v1y, v1z, v2x, v2y, v2z, v3x, v3y, v3z]`), as stored in xdr trajectories.
    pub fn from_matrix(m: [f32; 9]) -> Self {
        SimBox {
            v1x: m[0],
            v1y: m[1],
            v1z: m[2],
            v2x: m[3],
            v2y: m[4],
            v2z: m[5],
            v3x: m[6],
            v3y: m[7],
            v3z: m[8],
        }
    }

    /// Convert the simulation box into a row-major 3x3 matrix of box vectors.
    pub fn to_matrix(&self) -> [f32; 9] {
        [
            self.v1x, self.v1y, self.v1z, self.v2x, self.v2y, self.v2z, self.v3x, self.v3y,
            self.v3z,
        ]
    }

    /// Calculate box lengths and angles (in degrees) from simulation box.
    ///
    /// ## Returns
    /// (`lengths`, `angles`) of the simulation box.
    pub fn to_lengths_angles(&self) -> (Vector3D, Vector3D) {
        if self.is_orthogonal() {
            (
                Vector3D::new(self.v1x, self.v2y, self.v3z),
                Vector3D::new(90.0, 90.0, 90.0),
            )
        } else {
            let gamma = self.v2y.atan2(self.v2x);

            let lengths = Vector3D::new(
                self.v1x,
                (self.v2x * self.v2x + self.v2y * self.v2y).sqrt(),
                (self.v3x * self.v3x + self.v3y * self.v3y + self.v3z * self.v3z).sqrt(),
            );

            let beta = (self.v3x / lengths.z).acos();
            let alpha = ((self.v3y * gamma.sin()) / lengths.z + beta.cos() * gamma.cos()).acos();

            (
                lengths,
                Vector3D::new(alpha.to_degrees(), beta.to_degrees(), gamma.to_degrees()),
            )
        }
    }

    /// Check that the simulation box is orthogonal.
    pub fn is_orthogonal(&self) -> bool {
        self.v1y == 0.0
            && self.v1z == 0.0
            && self.v2x == 0.0
            && self.v2z == 0.0
            && self.v3x == 0.0
            && self.v3y == 0.0
    }

    /// Check whether all dimensions of the simulation box are zero.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0 && self.is_orthogonal()
    }
}

impl Default for SimBox {
    /// Create a zero simulation box.
    fn default() -> Self {
        SimBox {
            v1x: 0.0f32,
            v2y: 0.0f32,
            v3z: 0.0f32,
            v1y: 0.0f32,
            v1z: 0.0f32,
            v2x: 0.0f32,
            v2z: 0.0f32,
            v3x: 0.0f32,
            v3y: 0.0f32,
        }
    }
}

/// Allows using .x, .y, and .z to reach the v1x, v2y, and v3z members of SimBox.
#[repr(C)]
pub struct SimBoxDimensions {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Deref for SimBox {
    type Target = SimBoxDimensions;

    fn deref(&self) -> &Self::Target {
        unsafe { &*(self as *const SimBox as *const SimBoxDimensions) }
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/
