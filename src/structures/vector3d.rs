// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Implementation of methods for three-dimensional vector.

use std::ops::{Deref, DerefMut};

use nalgebra::base::Vector3;

/// Describes a position of a point in space or length and orientation of a vector in space.
/// Implemented using `nalgebra`'s Vector3.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Vector3D(pub(crate) Vector3<f32>);

impl From<[f32; 3]> for Vector3D {
    #[inline]
    fn from(arr: [f32; 3]) -> Self {
        Vector3D(Vector3::new(arr[0], arr[1], arr[2]))
    }
}

impl From<Vector3D> for [f32; 3] {
    #[inline]
    fn from(vec: Vector3D) -> Self {
        [vec.0.x, vec.0.y, vec.0.z]
    }
}

/// Allows accessing fields of `Vector3D` as `.x`, `.y`, and `.z`.
#[repr(C)]
pub struct Vector3Raw {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Deref for Vector3D {
    type Target = Vector3Raw;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // nalgebra stores the three components contiguously
        unsafe { &*(self.0.as_ptr() as *const Vector3Raw) }
    }
}

impl DerefMut for Vector3D {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *(self.0.as_mut_ptr() as *mut Vector3Raw) }
    }
}

impl Vector3D {
    /// Create a new `Vector3D` structure.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3D(Vector3::new(x, y, z))
    }

    /// Calculate length of the vector.
    ///
    /// ## Example
    /// ```
    /// # use trjkit::prelude::*;
    /// # use float_cmp::assert_approx_eq;
    /// #
    /// let vector = Vector3D::new(1.0, 2.0, 3.0);
    /// assert_approx_eq!(f32, vector.len(), 3.741657);
    /// ```
    #[inline]
    pub fn len(&self) -> f32 {
        self.0.magnitude()
    }

    /// Calculate the dot product of two vectors.
    #[inline]
    pub fn dot(&self, vector: &Vector3D) -> f32 {
        self.0.dot(&vector.0)
    }

    /// Calculate distance between two points ignoring periodic boundary conditions.
    ///
    /// ## Example
    /// ```
    /// # use trjkit::prelude::*;
    /// # use float_cmp::assert_approx_eq;
    /// #
    /// let point1 = Vector3D::new(1.0, 2.0, 3.0);
    /// let point2 = Vector3D::new(4.0, 6.0, 3.0);
    /// assert_approx_eq!(f32, point1.distance_naive(&point2), 5.0);
    /// ```
    #[inline]
    pub fn distance_naive(&self, point: &Vector3D) -> f32 {
        (self.0 - point.0).magnitude()
    }

    /// Convert the vector into an array of three floats.
    #[inline]
    pub fn to_array(&self) -> [f32; 3] {
        [self.0.x, self.0.y, self.0.z]
    }

    /// Returns `true` if all the fields of the vector are exactly zero.
    /// Otherwise, returns `false`.
    pub fn is_zero(&self) -> bool {
        self.0.x == 0.0 && self.0.y == 0.0 && self.0.z == 0.0
    }
}

impl Default for Vector3D {
    /// Create a zero vector.
    fn default() -> Self {
        Vector3D(Vector3::new(0.0, 0.0, 0.0))
    }
}

/******************************/
/*       FEATURE: SERDE       */
/******************************/

#[cfg(feature = "serde")]
mod serde {
    use std::fmt;

    use super::*;
    use ::serde::{
        de::{SeqAccess, Visitor},
        Deserialize, Deserializer,
    };
    use ::serde::{ser::SerializeSeq, Serialize, Serializer};

    impl Serialize for Vector3D {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut seq = serializer.serialize_seq(Some(3))?;
            seq.serialize_element(&self.0.x)?;
            seq.serialize_element(&self.0.y)?;
            seq.serialize_element(&self.0.z)?;
            seq.end()
        }
    }

    impl<'de> Deserialize<'de> for Vector3D {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct Vector3DVisitor;

            impl<'de> Visitor<'de> for Vector3DVisitor {
                type Value = Vector3D;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str("a sequence of three floats")
                }

                fn visit_seq<S>(self, mut seq: S) -> Result<Vector3D, S::Error>
                where
                    S: SeqAccess<'de>,
                {
                    let x = seq
                        .next_element()?
                        .ok_or_else(|| ::serde::de::Error::invalid_length(0, &self))?;
                    let y = seq
                        .next_element()?
                        .ok_or_else(|| ::serde::de::Error::invalid_length(1, &self))?;
                    let z = seq
                        .next_element()?
                        .ok_or_else(|| ::serde::de::Error::invalid_length(2, &self))?;
                    Ok(Vector3D(Vector3::new(x, y, z)))
                }
            }

            deserializer.deserialize_seq(Vector3DVisitor)
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

    #[test]
    fn len() {
        let vec = Vector3D::new(4.3, 5.6, 1.2);
        assert_approx_eq!(f32, vec.len(), 7.161704);
    }

    #[test]
    fn deref_fields() {
        let mut vec = Vector3D::new(1.5, -2.5, 3.5);
        assert_eq!(vec.x, 1.5);
        assert_eq!(vec.y, -2.5);
        assert_eq!(vec.z, 3.5);

        vec.y = 7.0;
        assert_eq!(vec.to_array(), [1.5, 7.0, 3.5]);
    }

    #[test]
    fn dot() {
        let vector1 = Vector3D::new(4.0, 2.0, -1.0);
        let vector2 = Vector3D::new(1.0, -3.0, 2.0);
        assert_approx_eq!(f32, vector1.dot(&vector2), -4.0);
    }

    #[test]
    fn array_conversions() {
        let vec: Vector3D = [0.25, 0.5, 0.75].into();
        let arr: [f32; 3] = vec.into();
        assert_eq!(arr, [0.25, 0.5, 0.75]);
    }

    #[test]
    fn is_zero() {
        assert!(Vector3D::default().is_zero());
        assert!(!Vector3D::new(0.0, 0.0, 0.1).is_zero());
    }
}
