//! The scalar attribute cell.

use serde::{Deserialize, Serialize};

/// One scalar cell in the attribute store.
///
/// NaN doubles as the "empty" marker: a default-constructed cell is NaN
/// until the simulation writes a value, and writing NaN is the same as
/// clearing the cell. Readers that skip empty cells check [`is_nan`]
/// rather than comparing values.
///
/// [`is_nan`]: Attribute::is_nan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attribute(f64);

impl Attribute {
    /// The empty cell.
    pub const EMPTY: Attribute = Attribute(f64::NAN);

    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// True iff the cell has never been written or was cleared.
    pub fn is_nan(&self) -> bool {
        self.0.is_nan()
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn set(&mut self, value: f64) {
        self.0 = value;
    }

    /// Clear back to the empty state.
    pub fn clear(&mut self) {
        self.0 = f64::NAN;
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<Attribute> for f64 {
    fn from(attr: Attribute) -> Self {
        attr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(Attribute::default().is_nan());
        assert!(Attribute::EMPTY.is_nan());
    }

    #[test]
    fn test_set_and_clear() {
        let mut attr = Attribute::default();

        attr.set(0.5);
        assert!(!attr.is_nan());
        assert_eq!(attr.value(), 0.5);

        attr.clear();
        assert!(attr.is_nan());
    }

    #[test]
    fn test_writing_nan_clears() {
        let mut attr = Attribute::new(3.0);
        attr.set(f64::NAN);
        assert!(attr.is_nan());
    }

    #[test]
    fn test_conversions() {
        let attr: Attribute = 2.5.into();
        assert_eq!(f64::from(attr), 2.5);
    }
}
