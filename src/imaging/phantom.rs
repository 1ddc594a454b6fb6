use super::Grid;

/// (intensity, semi-axis a, semi-axis b, centre x, centre y, rotation in degrees)
const MODIFIED_SHEPP_LOGAN: [(f32, f32, f32, f32, f32, f32); 10] = [
    (1.0, 0.69, 0.92, 0.0, 0.0, 0.0),
    (-0.8, 0.6624, 0.874, 0.0, -0.0184, 0.0),
    (-0.2, 0.11, 0.31, 0.22, 0.0, -18.0),
    (-0.2, 0.16, 0.41, -0.22, 0.0, 18.0),
    (0.1, 0.21, 0.25, 0.0, 0.35, 0.0),
    (0.1, 0.046, 0.046, 0.0, 0.1, 0.0),
    (0.1, 0.046, 0.046, 0.0, -0.1, 0.0),
    (0.1, 0.046, 0.023, -0.08, -0.605, 0.0),
    (0.1, 0.023, 0.023, 0.0, -0.606, 0.0),
    (0.1, 0.023, 0.046, 0.06, -0.605, 0.0),
];

/// Square `size` x `size` modified Shepp-Logan head phantom on [-1, 1]².
pub fn modified_shepp_logan(size: usize) -> Grid {
    let mut grid = Grid::zeros(size, size);
    let n = size as f32;

    for row in 0..size {
        let y = 1.0 - (2.0 * row as f32 + 1.0) / n;
        for col in 0..size {
            let x = (2.0 * col as f32 + 1.0) / n - 1.0;
            let value: f32 = MODIFIED_SHEPP_LOGAN
                .iter()
                .filter(|(_, a, b, x0, y0, phi)| {
                    let (sin, cos) = phi.to_radians().sin_cos();
                    let dx = x - x0;
                    let dy = y - y0;
                    let xr = dx * cos + dy * sin;
                    let yr = -dx * sin + dy * cos;
                    (xr / a).powi(2) + (yr / b).powi(2) <= 1.0
                })
                .map(|(intensity, ..)| intensity)
                .sum();
            grid.set(row, col, value);
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_and_corners() {
        let phantom = modified_shepp_logan(64);
        assert_eq!(phantom.get(0, 0), 0.0);
        assert_eq!(phantom.get(63, 63), 0.0);
        // brain matter: 1.0 - 0.8
        assert!((phantom.get(32, 32) - 0.2).abs() < 1e-6);
        // upper central ellipse adds 0.1
        assert!((phantom.get(20, 32) - 0.3).abs() < 1e-6);
        assert!(phantom.data().iter().all(|v| *v >= -1e-6 && *v <= 1.0 + 1e-6));
    }
}
