//! Column adapters between property types and storage types.
//!
//! A generated database owns one adapter instance per distinct
//! (property type, storage type) pair its mappers and queries need.
//! Primitive pairs use the built-ins below; anything else comes from a
//! converter type listed in `@TypeConverters`, constructed through
//! `Default`.
//!
//! # Examples
//!
//! ```
//! use kabin_runtime::{ColumnAdapter, IntegerAdapter, BooleanAdapter};
//!
//! let ages = IntegerAdapter::<u8>::new();
//! assert_eq!(ages.encode(&42), 42i64);
//! assert!(ages.decode(300).is_err());
//!
//! assert!(BooleanAdapter.decode(1).unwrap());
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::error::{KabinError, Result};

/// Converts between a property type `T` and its storage type `S`.
pub trait ColumnAdapter<T, S> {
    /// Converts a stored value back into the property type.
    fn decode(&self, value: S) -> Result<T>;

    /// Converts a property value into its stored form.
    fn encode(&self, value: &T) -> S;
}

/// Stores `i8 i16 i32 u8 u16 u32` as `i64`.
pub struct IntegerAdapter<T>(PhantomData<fn() -> T>);

impl<T> IntegerAdapter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IntegerAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IntegerAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntegerAdapter<{}>", std::any::type_name::<T>())
    }
}

impl<T> ColumnAdapter<T, i64> for IntegerAdapter<T>
where
    T: TryFrom<i64> + Into<i64> + Copy,
{
    fn decode(&self, value: i64) -> Result<T> {
        T::try_from(value).map_err(|_| {
            KabinError::Conversion(format!(
                "{value} does not fit in {}",
                std::any::type_name::<T>()
            ))
        })
    }

    fn encode(&self, value: &T) -> i64 {
        (*value).into()
    }
}

/// Stores `bool` as `0`/`1`; any non-zero value reads as `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanAdapter;

impl ColumnAdapter<bool, i64> for BooleanAdapter {
    fn decode(&self, value: i64) -> Result<bool> {
        Ok(value != 0)
    }

    fn encode(&self, value: &bool) -> i64 {
        i64::from(*value)
    }
}

/// Stores `f32` as `f64`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatAdapter;

impl ColumnAdapter<f32, f64> for FloatAdapter {
    fn decode(&self, value: f64) -> Result<f32> {
        Ok(value as f32)
    }

    fn encode(&self, value: &f32) -> f64 {
        f64::from(*value)
    }
}
