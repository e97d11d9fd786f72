//! Fixed-length face descriptor and its stored encoding.
//!
//! Stored descriptors are a JSON array of exactly [`DESCRIPTOR_LEN`] finite
//! numbers. Decoding is strict: wrong length, non-numeric elements, NaN or
//! infinity all reject the row. Callers treat a rejected row as "student has
//! no descriptor", never as a batch failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimensionality of the embedding space produced by the encoding provider.
pub const DESCRIPTOR_LEN: usize = 128;

#[derive(Error, Debug, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor is not a valid JSON number array: {0}")]
    Malformed(String),
    #[error("descriptor has {0} dimensions, expected {DESCRIPTOR_LEN}")]
    WrongLength(usize),
    #[error("descriptor contains a non-finite value at index {0}")]
    NonFinite(usize),
}

/// An ordered fixed-length embedding vector representing one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Descriptor {
    values: Vec<f64>,
}

impl Descriptor {
    /// Builds a descriptor from raw components, validating length and finiteness.
    pub fn new(values: Vec<f64>) -> Result<Self, DescriptorError> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(DescriptorError::WrongLength(values.len()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::NonFinite(i));
        }
        Ok(Self { values })
    }

    /// Strictly decodes a stored descriptor string.
    pub fn from_json(raw: &str) -> Result<Self, DescriptorError> {
        let values: Vec<f64> = serde_json::from_str(raw)
            .map_err(|e| DescriptorError::Malformed(e.to_string()))?;
        Self::new(values)
    }

    /// Encodes the descriptor into its canonical stored form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.values).expect("descriptor serialization cannot fail")
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Euclidean distance to another descriptor in the same embedding space.
    pub fn distance(&self, other: &Descriptor) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl TryFrom<Vec<f64>> for Descriptor {
    type Error = DescriptorError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Descriptor> for Vec<f64> {
    fn from(d: Descriptor) -> Self {
        d.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(v: f64) -> Descriptor {
        Descriptor::new(vec![v; DESCRIPTOR_LEN]).unwrap()
    }

    #[test]
    fn round_trips_through_stored_form() {
        let d = filled(0.25);
        let decoded = Descriptor::from_json(&d.to_json()).unwrap();
        assert_eq!(d, decoded);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            Descriptor::new(vec![0.0; 12]),
            Err(DescriptorError::WrongLength(12))
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[7] = f64::NAN;
        assert_eq!(Descriptor::new(values), Err(DescriptorError::NonFinite(7)));
    }

    #[test]
    fn rejects_garbage_text() {
        assert!(matches!(
            Descriptor::from_json("__import__('os')"),
            Err(DescriptorError::Malformed(_))
        ));
        assert!(matches!(
            Descriptor::from_json("{\"a\": 1}"),
            Err(DescriptorError::Malformed(_))
        ));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = filled(0.0);
        let b = filled(0.5);
        // sqrt(128 * 0.25)
        let expected = (DESCRIPTOR_LEN as f64 * 0.25).sqrt();
        assert!((a.distance(&b) - expected).abs() < 1e-9);
        assert_eq!(a.distance(&a), 0.0);
    }
}
