//! Affine transform kernels.
//!
//! Every transform is one 2D affine map `x ↦ M x + t`. The named operations
//! fix a point `o` (the origin argument, or the mirror line's center), i.e.
//! `t = o − M o`:
//! - translate: `M = I`, `t = d`
//! - rotate: `M = R(θ)`, counter-clockwise for positive `θ`
//! - scale: `M = diag(sx, sy)`
//! - skew: sequential shear `x' = x + kx·y`, then `y' = y + ky·x'`, so
//!   `M = [[1, kx], [ky, 1 + kx·ky]]`
//! - mirror across the line through `c` with direction angle `θ`:
//!   `M = [[cos 2θ, sin 2θ], [sin 2θ, −cos 2θ]]`
//!
//! `F32x2` positions are transformed in `f32` with the coefficients rounded
//! once; `F64x2` positions stay in `f64`.

use nalgebra::{Matrix2, Vector2};

use crate::view::VertexViewMut;

/// Line through `center` with direction angle `dir` (radians from +x).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line2 {
    pub dir: f64,
    pub center: Vector2<f64>,
}

/// 2D affine map: `x ↦ M x + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    pub m: Matrix2<f64>,
    pub t: Vector2<f64>,
}

impl Affine2 {
    /// Linear part `m` applied about the fixed point `origin`.
    #[inline]
    pub fn about(m: Matrix2<f64>, origin: Vector2<f64>) -> Self {
        Self {
            m,
            t: origin - m * origin,
        }
    }

    #[inline]
    pub fn translation(d: Vector2<f64>) -> Self {
        Self {
            m: Matrix2::identity(),
            t: d,
        }
    }

    pub fn rotation_about(radians: f64, origin: Vector2<f64>) -> Self {
        let (s, c) = radians.sin_cos();
        Self::about(Matrix2::new(c, -s, s, c), origin)
    }

    pub fn scale_about(factor: Vector2<f64>, origin: Vector2<f64>) -> Self {
        Self::about(Matrix2::new(factor.x, 0.0, 0.0, factor.y), origin)
    }

    pub fn skew_about(factor: Vector2<f64>, origin: Vector2<f64>) -> Self {
        let (kx, ky) = (factor.x, factor.y);
        Self::about(Matrix2::new(1.0, kx, ky, 1.0 + kx * ky), origin)
    }

    pub fn mirror(line: Line2) -> Self {
        let (s, c) = (2.0 * line.dir).sin_cos();
        Self::about(Matrix2::new(c, s, s, -c), line.center)
    }

    #[inline]
    pub fn apply(&self, p: Vector2<f64>) -> Vector2<f64> {
        self.m * p + self.t
    }

    /// Rewrite every position of `view` in place, in its native precision.
    pub fn apply_to(&self, view: &mut VertexViewMut<'_>) {
        let (m, t) = (self.m, self.t);
        let (m32, t32) = (m.cast::<f32>(), t.cast::<f32>());
        view.map_positions(move |p| m32 * p + t32, move |p| m * p + t);
    }
}
