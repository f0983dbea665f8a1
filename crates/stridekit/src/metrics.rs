//! Area and centroid accumulation.
//!
//! Model
//! - Each partition folds its range into a [`Partial`] `{ area, moment }`,
//!   where `moment` is the area-weighted centroid sum. Partials add, and the
//!   final centroid is `moment / area`, so the combine step divides once.
//! - PointList (polygon): shoelace over the cyclic vertex sequence. Signed,
//!   counter-clockwise positive. The only cross-partition read is the
//!   wraparound neighbour `(i + 1) mod n`.
//! - Triangle topologies: every decoded triangle contributes its unsigned
//!   area, so totals are never negative regardless of winding.
//!
//! Degenerate input (zero total area) yields a non-finite centroid; nothing
//! here checks for it.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Range};

use nalgebra::Vector2;

use crate::error::{EngineError, Result};
use crate::topology::{Topology, TopologyWalker};
use crate::view::{IndexView, VertexView};

/// Minimum element count for any area/centroid query.
pub const MIN_ELEMENTS: usize = 3;

/// Additive accumulator owned by one partition.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Partial {
    pub area: f64,
    /// Σ areaₖ · centroidₖ over the contributing pieces.
    pub moment: Vector2<f64>,
}

impl Add for Partial {
    type Output = Partial;
    fn add(self, rhs: Partial) -> Partial {
        Partial {
            area: self.area + rhs.area,
            moment: self.moment + rhs.moment,
        }
    }
}

impl AddAssign for Partial {
    fn add_assign(&mut self, rhs: Partial) {
        *self = *self + rhs;
    }
}

impl Sum for Partial {
    fn sum<I: Iterator<Item = Partial>>(iter: I) -> Partial {
        iter.fold(Partial::default(), Add::add)
    }
}

impl Partial {
    /// Combine into the final result.
    pub fn finish(self) -> AreaCentroid {
        AreaCentroid {
            area: self.area,
            centroid: self.moment / self.area,
        }
    }
}

/// Area and centroid of a polygon or triangle set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaCentroid {
    pub area: f64,
    pub centroid: Vector2<f64>,
}

/// `InsufficientInput` unless `elements >= 3`.
pub fn check_elements(elements: usize) -> Result<()> {
    if elements < MIN_ELEMENTS {
        return Err(EngineError::InsufficientInput {
            expected: MIN_ELEMENTS,
            actual: elements,
        });
    }
    Ok(())
}

#[inline]
fn cross(p: Vector2<f64>, q: Vector2<f64>) -> f64 {
    p.x * q.y - q.x * p.y
}

/// Shoelace terms for edges `(i, i+1 mod n)` with `i` in `range`.
pub fn polygon_partial(view: &VertexView<'_>, range: Range<usize>) -> Partial {
    let n = view.count();
    let mut sum = 0.0;
    let mut moment = Vector2::zeros();
    for i in range {
        let p = view.position(i);
        let q = view.position((i + 1) % n);
        let c = cross(p, q);
        sum += c;
        moment += (p + q) * c;
    }
    Partial {
        area: 0.5 * sum,
        moment: moment / 6.0,
    }
}

/// Unsigned area of triangle `(a, b, c)`.
#[inline]
pub fn triangle_area(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    (0.5 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y))).abs()
}

/// Sum of the triangles owned by cursors in `range`.
pub fn triangle_partial(
    view: &VertexView<'_>,
    walker: &TopologyWalker<'_>,
    range: Range<usize>,
) -> Result<Partial> {
    let mut acc = Partial::default();
    for tri in walker.triangles(range) {
        let [a, b, c] = tri?;
        let (pa, pb, pc) = (view.position(a), view.position(b), view.position(c));
        let area = triangle_area(pa, pb, pc);
        acc.area += area;
        acc.moment += (pa + pb + pc) * (area / 3.0);
    }
    Ok(acc)
}

/// Partial for `range` of whichever cursor domain `topology` uses.
pub fn partial_for(
    view: &VertexView<'_>,
    walker: &TopologyWalker<'_>,
    range: Range<usize>,
) -> Result<Partial> {
    match walker.topology() {
        Topology::PointList => Ok(polygon_partial(view, range)),
        _ => triangle_partial(view, walker, range),
    }
}

/// Number of elements the query runs over: vertices for PointList (the
/// index view is ignored), index entries otherwise, vertices if unindexed.
pub fn element_count(view: &VertexView<'_>, indices: Option<&IndexView<'_>>, topology: Topology) -> usize {
    match (topology, indices) {
        (Topology::PointList, _) | (_, None) => view.count(),
        (_, Some(iv)) => iv.len(),
    }
}

/// Single-threaded area and centroid. The engine computes the same sums per
/// partition; this is the reference it is tested against.
pub fn area_centroid_seq(
    view: &VertexView<'_>,
    indices: Option<&IndexView<'_>>,
    topology: Topology,
) -> Result<AreaCentroid> {
    let elements = element_count(view, indices, topology);
    check_elements(elements)?;
    let indices = match topology {
        Topology::PointList => None,
        _ => indices.copied(),
    };
    let walker = TopologyWalker::new(topology, indices, view.count());
    Ok(partial_for(view, &walker, 0..elements)?.finish())
}
