/// Row-major 2-D array of `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Grid {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn column(&self, col: usize) -> Vec<f32> {
        (0..self.rows).map(|row| self.get(row, col)).collect()
    }

    pub fn set_column(&mut self, col: usize, values: &[f32]) {
        debug_assert_eq!(values.len(), self.rows);
        for (row, value) in values.iter().enumerate() {
            self.set(row, col, *value);
        }
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.data.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_strided() {
        let grid = Grid::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(grid.column(1), vec![2.0, 5.0]);
        assert_eq!(grid.row(1), &[4.0, 5.0, 6.0]);
        assert!(Grid::from_vec(2, 2, vec![1.0]).is_none());
    }
}
