//! Scaling envelope shared by the baseline and accelerator pools.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capacity bounds that do not satisfy min <= desired <= max.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid capacity bounds: min {min} <= desired {desired} <= max {max} does not hold")]
pub struct InvalidBounds {
    /// Minimum size.
    pub min: i32,
    /// Desired size.
    pub desired: i32,
    /// Maximum size.
    pub max: i32,
}

/// Min/desired/max scaling envelope for an autoscaling node pool.
///
/// Deserializable from configuration; anything constructed from external
/// input must be revalidated with [`CapacityBounds::validate`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityBounds {
    /// Minimum size.
    pub min: i32,
    /// Desired size.
    pub desired: i32,
    /// Maximum size.
    pub max: i32,
}

impl CapacityBounds {
    /// Validated constructor.
    ///
    /// # Errors
    /// Returns [`InvalidBounds`] unless 0 <= min <= desired <= max.
    pub fn new(min: i32, desired: i32, max: i32) -> Result<Self, InvalidBounds> {
        let bounds = Self { min, desired, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Check the ordering invariant.
    ///
    /// # Errors
    /// Returns [`InvalidBounds`] unless 0 <= min <= desired <= max.
    pub fn validate(&self) -> Result<(), InvalidBounds> {
        if self.min < 0 || self.min > self.desired || self.desired > self.max {
            return Err(InvalidBounds {
                min: self.min,
                desired: self.desired,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for CapacityBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.min, self.desired, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_bounds_are_accepted() {
        assert!(CapacityBounds::new(3, 3, 6).is_ok());
        assert!(CapacityBounds::new(1, 1, 3).is_ok());
        assert!(CapacityBounds::new(0, 0, 0).is_ok());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(CapacityBounds::new(3, 2, 6).is_err());
        assert!(CapacityBounds::new(3, 7, 6).is_err());
        assert!(CapacityBounds::new(5, 4, 3).is_err());
        assert!(CapacityBounds::new(-1, 0, 3).is_err());
    }

    #[test]
    fn deserialized_bounds_can_be_revalidated() {
        let bounds: CapacityBounds =
            serde_json::from_str(r#"{"min": 4, "desired": 2, "max": 6}"#).unwrap();
        assert!(bounds.validate().is_err());
    }
}
