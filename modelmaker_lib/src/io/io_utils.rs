use anyhow::anyhow;
use std::fmt::Debug;

/// Converts a slice of scalar values to a vector of the same length, returns an error if conversion fails
pub fn try_convert_scalar_slice<
    ScalarFrom: Copy + Debug,
    ScalarTo,
    F: Fn(ScalarFrom) -> Option<ScalarTo>,
>(
    values: &[ScalarFrom],
    f: F,
) -> Result<Vec<ScalarTo>, anyhow::Error> {
    values
        .iter()
        .copied()
        .map(|v| {
            f(v).ok_or_else(|| {
                anyhow!(
                    "failed to convert value {:?} from type {} to {}",
                    v,
                    std::any::type_name::<ScalarFrom>(),
                    std::any::type_name::<ScalarTo>()
                )
            })
        })
        .try_collect_with_capacity(values.len())
}

/// Useful extension methods for iterators
pub(crate) trait IteratorExt {
    /// Tries to collect the items of the iterator into a `Vec` that reserves the given capacity and stops as soon as an error is encountered
    ///
    /// Motivation: <https://github.com/rust-lang/rust/issues/48994>
    fn try_collect_with_capacity<T, E>(self, capacity: usize) -> Result<Vec<T>, E>
    where
        Self: Sized + Iterator<Item = Result<T, E>>;
}

impl<Iter: Iterator> IteratorExt for Iter {
    fn try_collect_with_capacity<T, E>(mut self, capacity: usize) -> Result<Vec<T>, E>
    where
        Self: Sized + Iterator<Item = Result<T, E>>,
    {
        self.try_fold(Vec::with_capacity(capacity), |mut vec, item| {
            vec.push(item?);
            Ok(vec)
        })
    }
}
