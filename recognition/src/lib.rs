//! Face descriptor handling and matching.
//!
//! Detection and embedding themselves are an external capability; this crate
//! owns the descriptor representation, the strict stored-descriptor codec,
//! the distance-threshold matcher, and the [`encoder::FaceEncoder`] boundary
//! through which probe descriptors are obtained from raw images.

pub mod descriptor;
pub mod encoder;
pub mod matcher;

pub use descriptor::{DESCRIPTOR_LEN, Descriptor, DescriptorError};
pub use matcher::match_descriptor;
