use super::Grid;

/// `count` equally spaced angles in degrees over [0, 180).
pub fn uniform_angles(count: usize) -> Vec<f32> {
    let step = 180.0 / count as f32;
    (0..count).map(|i| i as f32 * step).collect()
}

fn sample_bilinear(image: &Grid, y: f32, x: f32) -> f32 {
    if x < 0.0 || y < 0.0 {
        return 0.0;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    if x0 + 1 > image.cols() || y0 + 1 > image.rows() {
        return 0.0;
    }
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let at = |r: usize, c: usize| {
        if r < image.rows() && c < image.cols() {
            image.get(r, c)
        } else {
            0.0
        }
    };
    let top = at(y0, x0) * (1.0 - fx) + at(y0, x0 + 1) * fx;
    let bottom = at(y0 + 1, x0) * (1.0 - fx) + at(y0 + 1, x0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Rotates a square image about its centre by `degrees`, zero-filling
/// samples that fall outside the source.
pub fn rotate(image: &Grid, degrees: f32) -> Grid {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cy = (image.rows() as f32 - 1.0) / 2.0;
    let cx = (image.cols() as f32 - 1.0) / 2.0;
    let mut out = Grid::zeros(image.rows(), image.cols());

    for row in 0..image.rows() {
        let dy = row as f32 - cy;
        for col in 0..image.cols() {
            let dx = col as f32 - cx;
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            out.set(row, col, sample_bilinear(image, sy, sx));
        }
    }
    out
}

/// Line integrals along the rows: one detector bin per column.
pub fn project(image: &Grid) -> Vec<f32> {
    let mut bins = vec![0.0; image.cols()];
    for row in 0..image.rows() {
        for (bin, value) in bins.iter_mut().zip(image.row(row)) {
            *bin += value;
        }
    }
    bins
}

/// Spreads detector values back along the rows; adjoint of [`project`].
pub fn smear(bins: &[f32], rows: usize) -> Grid {
    let mut out = Grid::zeros(rows, bins.len());
    for row in 0..rows {
        for (col, value) in bins.iter().enumerate() {
            out.set(row, col, *value);
        }
    }
    out
}

/// Parallel-beam sinogram: rows are detector bins, columns are angles.
pub fn sinogram(image: &Grid, angles: &[f32]) -> Grid {
    let mut out = Grid::zeros(image.cols(), angles.len());
    for (index, angle) in angles.iter().enumerate() {
        out.set_column(index, &project(&rotate(image, *angle)));
    }
    out
}
