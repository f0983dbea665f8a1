//! Seeded polygon inputs for tests, benches and the `sample` command.
//!
//! A draw is a star-shaped polygon around the origin in counter-clockwise
//! order, fully determined by `(seed, index)`. Vertex `k` sits at angle
//! `phase + k·Δ + ε_k` with `Δ = 2π/n` and `|ε_k| < Δ/2`, at radius
//! `radius · (1 + u_k)`, `|u_k| ≤ radius_jitter < 1`. Angles are sorted
//! after jitter, so the boundary never crosses itself and point-list area
//! comes out positive.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::metrics::area_centroid_seq;
use crate::topology::Topology;
use crate::view::{PositionEncoding, VertexLayout, VertexView};

/// How many vertices a draw has. Counts below 3 are raised to 3.
#[derive(Clone, Copy, Debug)]
pub enum VertexCount {
    Fixed(usize),
    /// Uniform over `min..=max`.
    Uniform { min: usize, max: usize },
}

impl VertexCount {
    fn draw(self, rng: &mut StdRng) -> usize {
        let (lo, hi) = match self {
            VertexCount::Fixed(n) => (n, n),
            VertexCount::Uniform { min, max } => (min, max),
        };
        let lo = lo.max(MIN_VERTICES);
        rng.gen_range(lo..=hi.max(lo))
    }
}

const MIN_VERTICES: usize = 3;

/// Where vertex 0 starts on the circle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Zero,
    Random,
}

#[derive(Clone, Copy, Debug)]
pub struct RadialCfg {
    pub vertices: VertexCount,
    /// Fraction of the spacing `Δ` an angle may move; clamped to [0, 0.49].
    pub angle_jitter: f64,
    /// Clamped to [0, 0.99] so every radius stays positive.
    pub radius_jitter: f64,
    pub radius: f64,
    pub phase: Phase,
}

impl Default for RadialCfg {
    fn default() -> Self {
        Self {
            vertices: VertexCount::Fixed(12),
            angle_jitter: 0.3,
            radius_jitter: 0.25,
            radius: 1.0,
            phase: Phase::Random,
        }
    }
}

/// `(seed, index)` pair naming one draw. Neighbouring indices give
/// unrelated polygons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

fn splitmix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

impl From<ReplayToken> for StdRng {
    fn from(tok: ReplayToken) -> Self {
        let salt = splitmix(tok.index.wrapping_add(0x9e3779b97f4a7c15));
        StdRng::seed_from_u64(splitmix(tok.seed ^ salt))
    }
}

/// Positions of one draw, ready to pack into a vertex buffer.
pub fn radial_polygon(cfg: RadialCfg, tok: ReplayToken) -> Vec<Vector2<f64>> {
    let mut rng = StdRng::from(tok);
    let n = cfg.vertices.draw(&mut rng);
    let max_shift = cfg.angle_jitter.clamp(0.0, 0.49);
    let max_stretch = cfg.radius_jitter.clamp(0.0, 0.99);
    let radius = cfg.radius.max(1e-9);
    let spacing = std::f64::consts::TAU / n as f64;
    let start = match cfg.phase {
        Phase::Zero => 0.0,
        Phase::Random => rng.gen_range(0.0..std::f64::consts::TAU),
    };
    let mut angles: Vec<f64> = (0..n)
        .map(|k| start + (k as f64 + rng.gen_range(-max_shift..=max_shift)) * spacing)
        .collect();
    angles.sort_by(f64::total_cmp);
    angles
        .into_iter()
        .map(|th| {
            let r = radius * (1.0 + rng.gen_range(-max_stretch..=max_stretch));
            Vector2::new(r * th.cos(), r * th.sin())
        })
        .collect()
}

/// Translate `points` so their polygon area-centroid sits at the origin.
/// Returns the applied offset.
pub fn recenter(points: &mut [Vector2<f64>]) -> Result<Vector2<f64>> {
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let bytes = layout.pack(points);
    let view = VertexView::new(&bytes, layout, points.len())?;
    let c = area_centroid_seq(&view, None, Topology::PointList)?.centroid;
    for p in points.iter_mut() {
        *p -= c;
    }
    Ok(-c)
}

/// Fan triangulation `(0, k, k+1)` of an `n`-gon as a triangle-list index
/// buffer. Tiles the polygon exactly when it is convex.
pub fn fan_list_indices(n: usize) -> Vec<u32> {
    (1..n.saturating_sub(1))
        .flat_map(|k| [0, k as u32, k as u32 + 1])
        .collect()
}
