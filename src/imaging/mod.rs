//! Numeric side of the service: phantom synthesis, parallel-beam projection,
//! SART and the flat text / PNG encodings stored in the cache.

pub mod grid;
pub mod phantom;
pub mod projection;
pub mod render;
pub mod sart;
pub mod text;

pub use grid::Grid;
pub use phantom::modified_shepp_logan;
pub use projection::{sinogram, uniform_angles};
pub use render::encode_png;
pub use sart::{sart, SartParams};
pub use text::{format_matrix, format_vector, parse_matrix};
