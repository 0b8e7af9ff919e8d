use nalgebra::{RealField, Vector3};
use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt::Debug;

/// Convenience trait for types that can be shared between threads
pub trait ThreadSafe: Sync + Send + 'static {}
impl<T> ThreadSafe for T where T: Sync + Send + 'static {}

/// Integer type used for label values of a label volume
pub type Label = i32;

/// Trait for the floating point types used for mesh coordinates (`f32` and `f64`)
pub trait Real: RealField + Copy + FromPrimitive + ToPrimitive + Debug + ThreadSafe {
    /// Converts an `f64` value into this type, rounding if the type has less precision
    #[inline(always)]
    fn from_f64_lossy(value: f64) -> Self {
        nalgebra::convert::<f64, Self>(value)
    }

    /// Converts this value to `f64`, non-representable values become NaN
    #[inline(always)]
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// Converts a vector of this type into a vector of `f64` values
    #[inline(always)]
    fn vec_to_f64(v: &Vector3<Self>) -> Vector3<f64> {
        v.map(|x| x.to_f64_lossy())
    }

    /// Converts a vector of `f64` values into a vector of this type
    #[inline(always)]
    fn vec_from_f64(v: &Vector3<f64>) -> Vector3<Self> {
        v.map(Self::from_f64_lossy)
    }
}

impl<T: RealField + Copy + FromPrimitive + ToPrimitive + Debug + ThreadSafe> Real for T {}
