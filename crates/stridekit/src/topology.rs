//! Triangle decoding for list, strip and fan topologies.
//!
//! Purpose
//! - Map a linear cursor over the element sequence (index buffer entries, or
//!   vertices when unindexed) to the triangle "at" that cursor.
//! - Every triangle is owned by exactly one cursor, so disjoint cursor ranges
//!   decode disjoint triangle sets and can run concurrently.
//!
//! Cursor ownership
//! - List: the triangle starting at `i`.
//! - Strip: the triangle ending at `i`, i.e. `(e[i-2], e[i-1], e[i])`.
//! - Fan: `(apex, e[i], e[i+1])`, where the apex is the first element of the
//!   fan containing `i`.
//!
//! Primitive restart
//! - A window touching the sentinel never yields a triangle.
//! - Lists resume right after the sentinel, which shifts the 3-phase; a
//!   partition boundary cannot know that shift, so restart-enabled lists must
//!   be walked from cursor 0 (see `Topology::is_phase_stable`).
//! - Strips and fans restart two elements after the sentinel. A walker that
//!   starts mid-buffer finds its fan apex by scanning backwards.

use std::ops::Range;

use crate::error::{EngineError, Result};
use crate::view::IndexView;

/// How vertices (or indices) group into primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    /// All vertices form one ordered simple polygon.
    PointList,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    /// Cursor alignment group used when partitioning: 3 for lists, else 1.
    #[inline]
    pub fn group(self) -> usize {
        match self {
            Topology::TriangleList => 3,
            _ => 1,
        }
    }

    /// Whether a cursor range starting at a grouped boundary decodes the same
    /// triangles a sequential walk would. False only for triangle lists with
    /// primitive restart enabled.
    pub fn is_phase_stable(self, primitive_restart: bool) -> bool {
        !(self == Topology::TriangleList && primitive_restart)
    }
}

/// Result of decoding at one cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Vertex indices of the triangle owned by the cursor.
    Triangle { tri: [usize; 3], next: usize },
    /// Nothing owned here; continue at `next`.
    Skip { next: usize },
    /// A fan ended; the next fan's apex is at `next`.
    Restart { next: usize },
    /// No triangle at or after the cursor.
    End,
}

/// Stateless decoder over an optional index buffer.
#[derive(Clone, Copy, Debug)]
pub struct TopologyWalker<'a> {
    topology: Topology,
    indices: Option<IndexView<'a>>,
    vertex_count: usize,
}

impl<'a> TopologyWalker<'a> {
    pub fn new(topology: Topology, indices: Option<IndexView<'a>>, vertex_count: usize) -> Self {
        Self {
            topology,
            indices,
            vertex_count,
        }
    }

    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Length of the cursor domain: index count, or vertex count if unindexed.
    #[inline]
    pub fn element_count(&self) -> usize {
        match &self.indices {
            Some(iv) => iv.len(),
            None => self.vertex_count,
        }
    }

    #[inline]
    pub fn primitive_restart(&self) -> bool {
        self.indices.is_some_and(|iv| iv.primitive_restart())
    }

    #[inline]
    fn is_restart_at(&self, i: usize) -> bool {
        match &self.indices {
            Some(iv) => iv.is_restart(iv.get(i)),
            None => false,
        }
    }

    #[inline]
    fn vertex_at(&self, i: usize) -> Result<usize> {
        let v = match &self.indices {
            Some(iv) => iv.get(i) as usize,
            None => i,
        };
        if v >= self.vertex_count {
            return Err(EngineError::IndexOutOfRange {
                index: v,
                count: self.vertex_count,
            });
        }
        Ok(v)
    }

    fn triple(&self, a: usize, b: usize, c: usize) -> Result<[usize; 3]> {
        Ok([self.vertex_at(a)?, self.vertex_at(b)?, self.vertex_at(c)?])
    }

    /// First element of the fan containing `cursor`: one past the last
    /// sentinel at or before it, or 0. Read-only backward scan.
    pub fn fan_start_before(&self, cursor: usize) -> usize {
        if !self.primitive_restart() {
            return 0;
        }
        let len = self.element_count();
        if len == 0 {
            return 0;
        }
        let mut j = cursor.min(len - 1);
        loop {
            if self.is_restart_at(j) {
                return j + 1;
            }
            if j == 0 {
                return 0;
            }
            j -= 1;
        }
    }

    /// Decode at `cursor`. `fan_start` is only read for fans.
    pub fn step(&self, cursor: usize, fan_start: usize) -> Result<Step> {
        let len = self.element_count();
        let i = cursor;
        match self.topology {
            Topology::PointList => Ok(Step::End),
            Topology::TriangleList => {
                if i.saturating_add(2) >= len {
                    return Ok(Step::End);
                }
                // Resume right after the last sentinel in the window.
                if let Some(k) = (i..i + 3).rev().find(|&k| self.is_restart_at(k)) {
                    return Ok(Step::Skip { next: k + 1 });
                }
                Ok(Step::Triangle {
                    tri: self.triple(i, i + 1, i + 2)?,
                    next: i + 3,
                })
            }
            Topology::TriangleStrip => {
                if i < 2 {
                    return Ok(Step::Skip { next: 2 });
                }
                if i >= len {
                    return Ok(Step::End);
                }
                if self.is_restart_at(i) {
                    return Ok(Step::Skip { next: i + 3 });
                }
                if self.is_restart_at(i - 1) {
                    return Ok(Step::Skip { next: i + 2 });
                }
                if self.is_restart_at(i - 2) {
                    return Ok(Step::Skip { next: i + 1 });
                }
                Ok(Step::Triangle {
                    tri: self.triple(i - 2, i - 1, i)?,
                    next: i + 1,
                })
            }
            Topology::TriangleFan => {
                if i.saturating_add(1) >= len {
                    return Ok(Step::End);
                }
                if i <= fan_start {
                    return Ok(Step::Skip {
                        next: fan_start + 1,
                    });
                }
                if self.is_restart_at(fan_start) {
                    return Ok(Step::Restart {
                        next: fan_start + 1,
                    });
                }
                if self.is_restart_at(i + 1) {
                    return Ok(Step::Restart { next: i + 2 });
                }
                if self.is_restart_at(i) {
                    return Ok(Step::Restart { next: i + 1 });
                }
                Ok(Step::Triangle {
                    tri: self.triple(fan_start, i, i + 1)?,
                    next: i + 1,
                })
            }
        }
    }

    /// Iterate the triangles owned by cursors in `range`.
    pub fn triangles(&self, range: Range<usize>) -> Triangles<'a> {
        let fan_start = match self.topology {
            Topology::TriangleFan => self.fan_start_before(range.start),
            _ => 0,
        };
        Triangles {
            walker: *self,
            cursor: range.start,
            end: range.end,
            fan_start,
        }
    }
}

/// Iterator returned by [`TopologyWalker::triangles`].
///
/// Yields an error at most once, then stops.
#[derive(Clone, Debug)]
pub struct Triangles<'a> {
    walker: TopologyWalker<'a>,
    cursor: usize,
    end: usize,
    fan_start: usize,
}

impl Iterator for Triangles<'_> {
    type Item = Result<[usize; 3]>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.end {
            match self.walker.step(self.cursor, self.fan_start) {
                Ok(Step::Triangle { tri, next }) => {
                    self.cursor = next;
                    return Some(Ok(tri));
                }
                Ok(Step::Skip { next }) => self.cursor = next,
                Ok(Step::Restart { next }) => {
                    self.cursor = next;
                    self.fan_start = next;
                }
                Ok(Step::End) => self.cursor = self.end,
                Err(e) => {
                    self.cursor = self.end;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
