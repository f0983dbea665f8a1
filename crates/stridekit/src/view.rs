//! Strided vertex views and index views over caller-owned buffers.
//!
//! - `VertexLayout`: stride, position offset and position encoding of a record.
//! - `VertexView` / `VertexViewMut`: byte slice + layout + record count, with
//!   typed position access. Kernels never cast raw bytes themselves.
//! - `IndexView`: 16- or 32-bit index slice with optional primitive restart.
//!
//! Positions are stored in native byte order. Records need not be aligned.

use nalgebra::Vector2;

use crate::error::{EngineError, Result};
use crate::partition::{is_exact_cover, Partition};

/// Numeric encoding of the 2D position inside a vertex record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PositionEncoding {
    /// Two `f32` components.
    F32x2,
    /// Two `f64` components.
    F64x2,
}

impl PositionEncoding {
    /// Size of the encoded position in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            PositionEncoding::F32x2 => 8,
            PositionEncoding::F64x2 => 16,
        }
    }
}

/// Where the position lives inside each record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub position_offset: usize,
    pub encoding: PositionEncoding,
}

impl VertexLayout {
    /// Checked constructor.
    pub fn new(stride: usize, position_offset: usize, encoding: PositionEncoding) -> Result<Self> {
        let layout = Self {
            stride,
            position_offset,
            encoding,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Records that hold nothing but the position.
    pub fn packed(encoding: PositionEncoding) -> Self {
        Self {
            stride: encoding.size(),
            position_offset: 0,
            encoding,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(EngineError::layout("stride must be positive"));
        }
        match self.position_offset.checked_add(self.encoding.size()) {
            Some(end) if end <= self.stride => Ok(()),
            _ => Err(EngineError::layout(format!(
                "position at offset {} ({} bytes) does not fit stride {}",
                self.position_offset,
                self.encoding.size(),
                self.stride
            ))),
        }
    }

    /// Minimum byte length holding `count` records. The last record only
    /// needs to reach the end of its position.
    pub fn required_bytes(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return Some(0);
        }
        (count - 1)
            .checked_mul(self.stride)?
            .checked_add(self.position_offset + self.encoding.size())
    }

    /// Build a zero-filled buffer of `points.len()` records with the given
    /// positions written in. Convenience for callers and tests.
    pub fn pack(&self, points: &[Vector2<f64>]) -> Vec<u8> {
        let mut bytes = vec![0u8; points.len() * self.stride];
        for (i, p) in points.iter().enumerate() {
            write_position(&mut bytes, self, i, *p);
        }
        bytes
    }

    #[inline]
    fn position_at(&self, i: usize) -> usize {
        i * self.stride + self.position_offset
    }
}

#[inline]
fn read_f32(bytes: &[u8], at: usize) -> Vector2<f32> {
    let [x, y]: [f32; 2] = bytemuck::pod_read_unaligned(&bytes[at..at + 8]);
    Vector2::new(x, y)
}

#[inline]
fn read_f64(bytes: &[u8], at: usize) -> Vector2<f64> {
    let [x, y]: [f64; 2] = bytemuck::pod_read_unaligned(&bytes[at..at + 16]);
    Vector2::new(x, y)
}

#[inline]
fn write_f32(bytes: &mut [u8], at: usize, p: Vector2<f32>) {
    bytes[at..at + 8].copy_from_slice(bytemuck::bytes_of(&[p.x, p.y]));
}

#[inline]
fn write_f64(bytes: &mut [u8], at: usize, p: Vector2<f64>) {
    bytes[at..at + 16].copy_from_slice(bytemuck::bytes_of(&[p.x, p.y]));
}

#[inline]
fn read_position(bytes: &[u8], layout: &VertexLayout, i: usize) -> Vector2<f64> {
    let at = layout.position_at(i);
    match layout.encoding {
        PositionEncoding::F32x2 => read_f32(bytes, at).cast::<f64>(),
        PositionEncoding::F64x2 => read_f64(bytes, at),
    }
}

#[inline]
fn write_position(bytes: &mut [u8], layout: &VertexLayout, i: usize, p: Vector2<f64>) {
    let at = layout.position_at(i);
    match layout.encoding {
        PositionEncoding::F32x2 => write_f32(bytes, at, p.cast::<f32>()),
        PositionEncoding::F64x2 => write_f64(bytes, at, p),
    }
}

fn check_len(len: usize, layout: &VertexLayout, count: usize) -> Result<()> {
    layout.validate()?;
    match layout.required_bytes(count) {
        Some(need) if need <= len => Ok(()),
        Some(need) => Err(EngineError::layout(format!(
            "{count} records need {need} bytes, buffer has {len}"
        ))),
        None => Err(EngineError::layout(format!(
            "{count} records overflow the address space"
        ))),
    }
}

/// Read-only view of `count` strided vertex records.
#[derive(Clone, Copy, Debug)]
pub struct VertexView<'a> {
    bytes: &'a [u8],
    layout: VertexLayout,
    count: usize,
}

impl<'a> VertexView<'a> {
    pub fn new(bytes: &'a [u8], layout: VertexLayout, count: usize) -> Result<Self> {
        check_len(bytes.len(), &layout, count)?;
        Ok(Self {
            bytes,
            layout,
            count,
        })
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Position of record `i`, widened to `f64`.
    ///
    /// # Panics
    /// If `i >= count`.
    #[inline]
    pub fn position(&self, i: usize) -> Vector2<f64> {
        assert!(i < self.count, "vertex {i} out of range");
        read_position(self.bytes, &self.layout, i)
    }

    /// Bit pattern of the stored position, so that equal keys mean equal
    /// bytes (`0.0` and `-0.0` differ).
    #[inline]
    pub fn position_bits(&self, i: usize) -> [u64; 2] {
        assert!(i < self.count, "vertex {i} out of range");
        let at = self.layout.position_at(i);
        match self.layout.encoding {
            PositionEncoding::F32x2 => {
                let p = read_f32(self.bytes, at);
                [u64::from(p.x.to_bits()), u64::from(p.y.to_bits())]
            }
            PositionEncoding::F64x2 => {
                let p = read_f64(self.bytes, at);
                [p.x.to_bits(), p.y.to_bits()]
            }
        }
    }

    /// Raw bytes of record `i`. The last record may be shorter than
    /// `stride` when the buffer ends right after its position.
    pub fn record(&self, i: usize) -> &'a [u8] {
        assert!(i < self.count, "vertex {i} out of range");
        let start = i * self.layout.stride;
        let end = (start + self.layout.stride).min(self.bytes.len());
        &self.bytes[start..end]
    }
}

/// Mutable view of `count` strided vertex records, transformed in place.
///
/// Exclusive borrowing of the byte slice is the no-aliasing precondition:
/// two views over the same memory cannot be handed to concurrent operations.
#[derive(Debug)]
pub struct VertexViewMut<'a> {
    bytes: &'a mut [u8],
    layout: VertexLayout,
    count: usize,
}

impl<'a> VertexViewMut<'a> {
    pub fn new(bytes: &'a mut [u8], layout: VertexLayout, count: usize) -> Result<Self> {
        check_len(bytes.len(), &layout, count)?;
        Ok(Self {
            bytes,
            layout,
            count,
        })
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Read-only reborrow.
    pub fn as_view(&self) -> VertexView<'_> {
        VertexView {
            bytes: &*self.bytes,
            layout: self.layout,
            count: self.count,
        }
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vector2<f64> {
        assert!(i < self.count, "vertex {i} out of range");
        read_position(&*self.bytes, &self.layout, i)
    }

    /// Store `p`, narrowing to `f32` for `F32x2` layouts.
    #[inline]
    pub fn set_position(&mut self, i: usize, p: Vector2<f64>) {
        assert!(i < self.count, "vertex {i} out of range");
        write_position(&mut *self.bytes, &self.layout, i, p);
    }

    /// Rewrite every position in its native precision.
    pub fn map_positions(
        &mut self,
        f32_map: impl Fn(Vector2<f32>) -> Vector2<f32>,
        f64_map: impl Fn(Vector2<f64>) -> Vector2<f64>,
    ) {
        let layout = self.layout;
        match layout.encoding {
            PositionEncoding::F32x2 => {
                for i in 0..self.count {
                    let at = layout.position_at(i);
                    let p = read_f32(&*self.bytes, at);
                    write_f32(&mut *self.bytes, at, f32_map(p));
                }
            }
            PositionEncoding::F64x2 => {
                for i in 0..self.count {
                    let at = layout.position_at(i);
                    let p = read_f64(&*self.bytes, at);
                    write_f64(&mut *self.bytes, at, f64_map(p));
                }
            }
        }
    }

    /// Split into disjoint sub-views, one per partition. `parts` must tile
    /// `[0, count)` in order.
    pub fn split_parts(&mut self, parts: &[Partition]) -> Result<Vec<VertexViewMut<'_>>> {
        if !is_exact_cover(parts, self.count) {
            return Err(EngineError::layout(
                "partitions do not tile the vertex range",
            ));
        }
        let mut out = Vec::new();
        out.try_reserve_exact(parts.len())?;
        let stride = self.layout.stride;
        let mut rest: &mut [u8] = &mut *self.bytes;
        for part in parts {
            let take = if part.end() == self.count {
                rest.len()
            } else {
                part.len * stride
            };
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(take);
            out.push(VertexViewMut {
                bytes: head,
                layout: self.layout,
                count: part.len,
            });
            rest = tail;
        }
        Ok(out)
    }
}

/// Width of index buffer elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexEncoding {
    U16,
    U32,
}

impl IndexEncoding {
    /// Primitive-restart sentinel: the maximum value of the element type.
    #[inline]
    pub const fn sentinel(self) -> u32 {
        match self {
            IndexEncoding::U16 => u16::MAX as u32,
            IndexEncoding::U32 => u32::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum IndexSlice<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

/// Index buffer describing triangle membership.
#[derive(Clone, Copy, Debug)]
pub struct IndexView<'a> {
    indices: IndexSlice<'a>,
    primitive_restart: bool,
}

impl<'a> IndexView<'a> {
    pub fn u16(indices: &'a [u16]) -> Self {
        Self {
            indices: IndexSlice::U16(indices),
            primitive_restart: false,
        }
    }

    pub fn u32(indices: &'a [u32]) -> Self {
        Self {
            indices: IndexSlice::U32(indices),
            primitive_restart: false,
        }
    }

    /// Enable or disable primitive restart.
    pub fn with_primitive_restart(mut self, enabled: bool) -> Self {
        self.primitive_restart = enabled;
        self
    }

    #[inline]
    pub fn encoding(&self) -> IndexEncoding {
        match self.indices {
            IndexSlice::U16(_) => IndexEncoding::U16,
            IndexSlice::U32(_) => IndexEncoding::U32,
        }
    }

    #[inline]
    pub fn primitive_restart(&self) -> bool {
        self.primitive_restart
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self.indices {
            IndexSlice::U16(s) => s.len(),
            IndexSlice::U32(s) => s.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i`, widened to `u32`.
    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        match self.indices {
            IndexSlice::U16(s) => u32::from(s[i]),
            IndexSlice::U32(s) => s[i],
        }
    }

    /// True when restart is enabled and `value` is the sentinel.
    #[inline]
    pub fn is_restart(&self, value: u32) -> bool {
        self.primitive_restart && value == self.encoding().sentinel()
    }
}
