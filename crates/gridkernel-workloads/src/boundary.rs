//! Stream-function boundary conditions for flow through a box.
//!
//! The box has an inlet on the left wall and an outlet on the bottom wall.
//! Only the halo ring carries values; the interior starts at zero.

use gridkernel_core::config::BASE_INTERIOR;
use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_core::grid::{Grid, GridShape};

/// Base inlet offset, outlet offset and width, multiplied by the scale.
const BASE_B: u32 = 10;
const BASE_H: u32 = 15;
const BASE_W: u32 = 5;

/// Inlet/outlet geometry of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFunctionBoundary {
    /// Row offset of the inlet on the left wall.
    pub b: u32,
    /// Column offset of the outlet on the bottom wall.
    pub h: u32,
    /// Inlet and outlet width.
    pub w: u32,
    /// Interior rows.
    pub m: u32,
    /// Interior columns.
    pub n: u32,
}

impl StreamFunctionBoundary {
    /// Geometry for a scale factor.
    pub fn for_scale(scale: u32) -> Result<Self> {
        let scaled = |base: u32| {
            base.checked_mul(scale)
                .filter(|&v| v > 0)
                .ok_or_else(|| GridKernelError::config(format!("invalid scale factor {}", scale)))
        };
        let m = scaled(BASE_INTERIOR)?;
        Ok(Self {
            b: scaled(BASE_B)?,
            h: scaled(BASE_H)?,
            w: scaled(BASE_W)?,
            m,
            n: m,
        })
    }

    /// Grid shape including the halo.
    pub fn shape(&self) -> GridShape {
        GridShape::from_interior(self.m as usize, self.n as usize)
    }

    /// Value of the halo cell at `(row, col)`, zero elsewhere.
    pub fn value(&self, row: u32, col: u32) -> f32 {
        let (b, h, w, m) = (self.b, self.h, self.w, self.m);
        if col == 0 {
            if row > b && row < b + w {
                return (row - b) as f32;
            }
            if row >= b + w && row <= m {
                return w as f32;
            }
        }
        if row == m + 1 && col >= 1 {
            if col <= h {
                return w as f32;
            }
            if col < h + w {
                return (w + h - col) as f32;
            }
        }
        0.0
    }

    /// The starting grid: boundary values on the halo, zeros inside.
    pub fn initial_grid(&self) -> Grid {
        let shape = self.shape();
        let mut grid = Grid::zeros(shape);
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let value = self.value(row as u32, col as u32);
                if value != 0.0 {
                    grid.set(row, col, value);
                }
            }
        }
        grid
    }
}
