//! Host-side 2-D grids.

use crate::error::{GridKernelError, Result};

/// Dimensions of a row-major grid including its one-cell halo ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    /// Number of rows (interior rows + 2).
    pub rows: usize,
    /// Number of columns (interior columns + 2). Also the row stride.
    pub cols: usize,
}

impl GridShape {
    /// Shape of a grid with an `m x n` interior and a one-cell halo.
    pub fn from_interior(m: usize, n: usize) -> Self {
        Self {
            rows: m + 2,
            cols: n + 2,
        }
    }

    /// Interior row count.
    pub fn interior_rows(&self) -> usize {
        self.rows.saturating_sub(2)
    }

    /// Interior column count.
    pub fn interior_cols(&self) -> usize {
        self.cols.saturating_sub(2)
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// True if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear index of `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }
}

/// A 2-D field of `f32` values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: GridShape,
    data: Vec<f32>,
}

impl Grid {
    /// A zero-filled grid.
    pub fn zeros(shape: GridShape) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.len()],
        }
    }

    /// Wrap existing row-major data.
    pub fn from_vec(shape: GridShape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.len() {
            return Err(GridKernelError::config(format!(
                "grid data has {} elements, shape {}x{} needs {}",
                data.len(),
                shape.rows,
                shape.cols,
                shape.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.shape.index(row, col)]
    }

    /// Set the value at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = self.shape.index(row, col);
        self.data[idx] = value;
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume the grid, returning its values.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Euclidean norm over every cell, accumulated in `f64`.
    pub fn norm(&self) -> f64 {
        self.data
            .iter()
            .map(|&v| {
                let v = v as f64;
                v * v
            })
            .sum::<f64>()
            .sqrt()
    }
}
