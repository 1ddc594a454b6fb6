use thiserror::Error;

use super::projection::{project, rotate, smear};
use super::Grid;

const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct SartParams {
    pub iterations: usize,
    pub relaxation: f32,
}

impl Default for SartParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            relaxation: 0.5,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SartError {
    #[error("sinogram has {columns} columns but {angles} angles were given")]
    AngleMismatch { columns: usize, angles: usize },
    #[error("sinogram is empty")]
    Empty,
}

/// Simultaneous algebraic reconstruction, one view at a time, using the same
/// rotate-and-sum projector that produced the sinogram.
///
/// The sinogram is `detectors x angles`; the result is `detectors x detectors`.
/// Negative densities are clipped after every view update.
pub fn sart(sinogram: &Grid, angles: &[f32], params: SartParams) -> Result<Grid, SartError> {
    let size = sinogram.rows();
    if size == 0 || sinogram.cols() == 0 {
        return Err(SartError::Empty);
    }
    if sinogram.cols() != angles.len() {
        return Err(SartError::AngleMismatch {
            columns: sinogram.cols(),
            angles: angles.len(),
        });
    }

    let ones = Grid::filled(size, size, 1.0);
    let ray_lengths: Vec<Vec<f32>> = angles
        .iter()
        .map(|angle| project(&rotate(&ones, *angle)))
        .collect();

    let mut image = Grid::zeros(size, size);
    for _ in 0..params.iterations {
        for (view, angle) in angles.iter().enumerate() {
            let estimate = project(&rotate(&image, *angle));
            let residual: Vec<f32> = estimate
                .iter()
                .zip(&ray_lengths[view])
                .enumerate()
                .map(|(bin, (est, len))| {
                    if *len > EPSILON {
                        (sinogram.get(bin, view) - est) / len
                    } else {
                        0.0
                    }
                })
                .collect();

            let correction = rotate(&smear(&residual, size), -angle);
            for (value, delta) in image.values_mut().zip(correction.data()) {
                *value = (*value + params.relaxation * delta).max(0.0);
            }
        }
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{modified_shepp_logan, sinogram, uniform_angles};

    fn residual_norm(image: &Grid, measured: &Grid, angles: &[f32]) -> f32 {
        let estimate = sinogram(image, angles);
        estimate
            .data()
            .iter()
            .zip(measured.data())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    #[test]
    fn reduces_projection_residual() {
        let phantom = modified_shepp_logan(24);
        let angles = uniform_angles(12);
        let measured = sinogram(&phantom, &angles);

        let blank = Grid::zeros(24, 24);
        let result = sart(
            &measured,
            &angles,
            SartParams {
                iterations: 3,
                relaxation: 0.5,
            },
        )
        .unwrap();

        assert_eq!((result.rows(), result.cols()), (24, 24));
        assert!(result.data().iter().all(|v| *v >= 0.0));
        assert!(
            residual_norm(&result, &measured, &angles)
                < 0.6 * residual_norm(&blank, &measured, &angles)
        );
    }

    #[test]
    fn rejects_mismatched_angles() {
        let sino = Grid::zeros(8, 4);
        assert_eq!(
            sart(&sino, &uniform_angles(3), SartParams::default()),
            Err(SartError::AngleMismatch {
                columns: 4,
                angles: 3
            })
        );
    }
}
