//! Unindexed → indexed conversion by exact position equality.
//!
//! - Key: the raw bit patterns of both position components, so two records
//!   merge iff their positions are byte-identical (`0.0` and `-0.0` differ,
//!   NaNs merge only with the same payload).
//! - Output vertices keep the order of first occurrence and carry the full
//!   record (all attributes) of that first occurrence.
//! - Pass 1 builds key → output index; pass 2 re-scans and emits one index
//!   per input vertex.

use std::collections::HashMap;

use nalgebra::Vector2;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::view::{VertexLayout, VertexView};

/// Deduplicated vertex records plus one index per input vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedMesh {
    /// `vertex_count` records of `layout.stride` bytes each.
    pub vertices: Vec<u8>,
    pub layout: VertexLayout,
    pub vertex_count: usize,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    /// Read-only view over the output records.
    pub fn view(&self) -> Result<VertexView<'_>> {
        VertexView::new(&self.vertices, self.layout, self.vertex_count)
    }

    /// Positions re-expanded through the index buffer, i.e. the input
    /// sequence reconstructed.
    pub fn expanded_positions(&self) -> Result<Vec<Vector2<f64>>> {
        let view = self.view()?;
        let mut out = Vec::new();
        out.try_reserve_exact(self.indices.len())?;
        for &ix in &self.indices {
            let ix = ix as usize;
            if ix >= view.count() {
                return Err(EngineError::IndexOutOfRange {
                    index: ix,
                    count: view.count(),
                });
            }
            out.push(view.position(ix));
        }
        Ok(out)
    }
}

/// Element counts written by [`dedupe_into`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedupCounts {
    pub vertex_count: usize,
    pub index_count: usize,
}

struct DedupIndex {
    map: HashMap<[u64; 2], u32>,
    /// Input record of each output vertex.
    first: Vec<usize>,
}

fn build_index(view: &VertexView<'_>) -> Result<DedupIndex> {
    let n = view.count();
    if u32::try_from(n).is_err() {
        return Err(EngineError::IndexOverflow { count: n });
    }
    let mut map: HashMap<[u64; 2], u32> = HashMap::new();
    map.try_reserve(n)?;
    let mut first = Vec::new();
    for i in 0..n {
        let key = view.position_bits(i);
        if !map.contains_key(&key) {
            // n fits u32, so every output index does too.
            let next = first.len() as u32;
            first.try_reserve(1)?;
            first.push(i);
            map.insert(key, next);
        }
    }
    Ok(DedupIndex { map, first })
}

fn fill_indices(view: &VertexView<'_>, index: &DedupIndex, out: &mut [u32]) {
    for (i, slot) in out.iter_mut().enumerate().take(view.count()) {
        // Every key was inserted by pass 1.
        if let Some(&ix) = index.map.get(&view.position_bits(i)) {
            *slot = ix;
        }
    }
}

fn copy_records(view: &VertexView<'_>, first: &[usize], out: &mut [u8]) {
    let stride = view.layout().stride;
    for (k, &src) in first.iter().enumerate() {
        let record = view.record(src);
        let dst = &mut out[k * stride..(k + 1) * stride];
        dst[..record.len()].copy_from_slice(record);
        // A truncated final input record is zero-padded to full stride.
        dst[record.len()..].fill(0);
    }
}

/// Number of distinct positions, i.e. the output vertex count.
pub fn distinct_count(view: &VertexView<'_>) -> Result<usize> {
    Ok(build_index(view)?.first.len())
}

/// Deduplicate into freshly allocated buffers.
pub fn dedupe(view: &VertexView<'_>) -> Result<IndexedMesh> {
    let index = build_index(view)?;
    let stride = view.layout().stride;
    let distinct = index.first.len();

    let mut vertices = Vec::new();
    vertices.try_reserve_exact(distinct * stride)?;
    vertices.resize(distinct * stride, 0u8);
    copy_records(view, &index.first, &mut vertices);

    let mut indices = Vec::new();
    indices.try_reserve_exact(view.count())?;
    indices.resize(view.count(), 0u32);
    fill_indices(view, &index, &mut indices);

    debug!(input = view.count(), distinct, "deduplicated vertices");
    Ok(IndexedMesh {
        vertices,
        layout: view.layout(),
        vertex_count: distinct,
        indices,
    })
}

/// Deduplicate into caller-provided buffers. `out_vertices` needs
/// `distinct_count(view) * stride` bytes and `out_indices` needs
/// `view.count()` entries; bytes past the written prefix are left alone.
pub fn dedupe_into(
    view: &VertexView<'_>,
    out_vertices: &mut [u8],
    out_indices: &mut [u32],
) -> Result<DedupCounts> {
    let index = build_index(view)?;
    let distinct = index.first.len();
    let need_bytes = distinct * view.layout().stride;
    if out_vertices.len() < need_bytes {
        return Err(EngineError::BufferTooSmall {
            required: need_bytes,
            provided: out_vertices.len(),
        });
    }
    if out_indices.len() < view.count() {
        return Err(EngineError::BufferTooSmall {
            required: view.count(),
            provided: out_indices.len(),
        });
    }
    copy_records(view, &index.first, &mut out_vertices[..need_bytes]);
    fill_indices(view, &index, &mut out_indices[..view.count()]);
    debug!(input = view.count(), distinct, "deduplicated vertices into caller buffers");
    Ok(DedupCounts {
        vertex_count: distinct,
        index_count: view.count(),
    })
}
