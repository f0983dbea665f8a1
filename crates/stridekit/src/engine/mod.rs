//! The engine context and its public operations.
//!
//! Purpose
//! - Own the task runner and configuration explicitly, instead of a
//!   process-wide registered worker pool. Create one, share it by reference,
//!   drop it to join its workers.
//!
//! Execution
//! - Transforms and extraction: plain partition of the vertex range, one job
//!   per range, each with exclusive access to its sub-view or output slice.
//! - Area/centroid: plain partition (PointList) or grouped partition
//!   (triangles), one private [`Partial`] slot per job, summed after the join.
//! - Deduplication runs as a single pass on the calling thread.
//!
//! Every partitioned operation submits exactly `cfg.tasks` jobs, some of
//! which may have empty ranges. Triangle lists with primitive restart are the
//! exception: a restart shifts the 3-element phase, so they run as one job.

use nalgebra::Vector2;
use tracing::{debug, trace, warn};

use crate::cfg::EngineCfg;
use crate::dedup::{self, DedupCounts, IndexedMesh};
use crate::error::{EngineError, Result, TaskError};
use crate::metrics::{check_elements, element_count, partial_for, AreaCentroid, Partial};
use crate::partition::{grouped_partition, partition};
use crate::runner::{Job, TaskRunner, TaskStatus, WorkerPool};
use crate::topology::{Topology, TopologyWalker};
use crate::transform::{Affine2, Line2};
use crate::view::{IndexView, VertexView, VertexViewMut};

/// Owns a [`TaskRunner`] and the configuration every operation uses.
pub struct Engine {
    runner: Box<dyn TaskRunner>,
    cfg: EngineCfg,
}

impl Default for Engine {
    fn default() -> Self {
        let cfg = EngineCfg::default();
        Self {
            runner: Box::new(WorkerPool::from_cfg(&cfg)),
            cfg,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cfg", &self.cfg)
            .field("workers", &self.runner.worker_count())
            .finish()
    }
}

fn reserve_jobs<'env>(n: usize) -> Result<Vec<Job<'env>>> {
    let mut jobs = Vec::new();
    jobs.try_reserve_exact(n)?;
    Ok(jobs)
}

impl Engine {
    /// Engine backed by a [`WorkerPool`] of `cfg.tasks` threads.
    pub fn new(cfg: EngineCfg) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            runner: Box::new(WorkerPool::from_cfg(&cfg)),
            cfg,
        })
    }

    /// Engine backed by a caller-chosen runner.
    pub fn with_runner(cfg: EngineCfg, runner: Box<dyn TaskRunner>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { runner, cfg })
    }

    #[inline]
    pub fn cfg(&self) -> &EngineCfg {
        &self.cfg
    }

    #[inline]
    pub fn runner(&self) -> &dyn TaskRunner {
        self.runner.as_ref()
    }

    /// Run `jobs`, await all of them, and fold failures into one error.
    fn dispatch(&self, op: &'static str, jobs: Vec<Job<'_>>) -> Result<()> {
        let submitted = jobs.len();
        let statuses = self.runner.run_all(jobs);
        let mut failed = submitted.saturating_sub(statuses.len());
        let mut first = (failed > 0).then_some(TaskError::Lost);
        for (task, status) in statuses.into_iter().enumerate() {
            match status {
                Ok(()) => trace!(op, task, "task finished"),
                Err(e) => {
                    warn!(op, task, error = %e, "task failed");
                    failed += 1;
                    first.get_or_insert(e);
                }
            }
        }
        match first {
            None => Ok(()),
            Some(first) => Err(EngineError::TaskFailure { failed, first }),
        }
    }

    /// Apply `f` to every position of `view` in place.
    ///
    /// On `TaskFailure`, ranges of jobs that completed stay transformed.
    pub fn apply(&self, view: &mut VertexViewMut<'_>, f: &Affine2) -> Result<()> {
        self.apply_named("apply", view, *f)
    }

    fn apply_named(&self, op: &'static str, view: &mut VertexViewMut<'_>, f: Affine2) -> Result<()> {
        let parts = partition(view.count(), self.cfg.tasks)?;
        debug!(op, vertices = view.count(), tasks = parts.len(), "dispatching transform");
        let chunks = view.split_parts(&parts)?;
        let mut jobs = reserve_jobs(chunks.len())?;
        for mut chunk in chunks {
            jobs.push(Box::new(move || -> TaskStatus {
                f.apply_to(&mut chunk);
                Ok(())
            }));
        }
        self.dispatch(op, jobs)
    }

    /// `p' = p + offset`.
    pub fn translate_2d(&self, view: &mut VertexViewMut<'_>, offset: Vector2<f64>) -> Result<()> {
        self.apply_named("translate_2d", view, Affine2::translation(offset))
    }

    /// Counter-clockwise rotation by `radians` about `origin`.
    pub fn rotate_2d(
        &self,
        view: &mut VertexViewMut<'_>,
        radians: f64,
        origin: Vector2<f64>,
    ) -> Result<()> {
        self.apply_named("rotate_2d", view, Affine2::rotation_about(radians, origin))
    }

    /// Per-axis scale about `origin`.
    pub fn scale_2d(
        &self,
        view: &mut VertexViewMut<'_>,
        factor: Vector2<f64>,
        origin: Vector2<f64>,
    ) -> Result<()> {
        self.apply_named("scale_2d", view, Affine2::scale_about(factor, origin))
    }

    /// Sequential shear about `origin`: x first by `factor.x`, then y by
    /// `factor.y` using the new x.
    pub fn skew_2d(
        &self,
        view: &mut VertexViewMut<'_>,
        factor: Vector2<f64>,
        origin: Vector2<f64>,
    ) -> Result<()> {
        self.apply_named("skew_2d", view, Affine2::skew_about(factor, origin))
    }

    /// Reflection across `line`.
    pub fn mirror_2d(&self, view: &mut VertexViewMut<'_>, line: Line2) -> Result<()> {
        self.apply_named("mirror_2d", view, Affine2::mirror(line))
    }

    /// Area and centroid in one pass.
    ///
    /// `PointList` treats the vertices as one polygon (signed area) and
    /// ignores `indices`. Triangle topologies sum unsigned triangle areas.
    pub fn area_centroid(
        &self,
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
        let parts = match topology {
            Topology::PointList => partition(elements, self.cfg.tasks)?,
            _ if !topology.is_phase_stable(walker.primitive_restart()) => {
                debug!(?topology, "restart shifts list phase; decoding as one range");
                partition(elements, 1)?
            }
            _ => grouped_partition(elements, self.cfg.tasks, topology.group())?,
        };
        debug!(?topology, elements, tasks = parts.len(), "dispatching area/centroid");

        let mut slots: Vec<Option<Result<Partial>>> = Vec::new();
        slots.try_reserve_exact(parts.len())?;
        slots.resize_with(parts.len(), || None);
        {
            let mut jobs = reserve_jobs(parts.len())?;
            for (slot, part) in slots.iter_mut().zip(&parts) {
                let view = *view;
                let range = part.range();
                jobs.push(Box::new(move || -> TaskStatus {
                    *slot = Some(partial_for(&view, &walker, range));
                    Ok(())
                }));
            }
            self.dispatch("area_centroid", jobs)?;
        }

        let mut total = Partial::default();
        for slot in slots {
            match slot {
                Some(Ok(p)) => total += p,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(EngineError::TaskFailure {
                        failed: 1,
                        first: TaskError::Lost,
                    })
                }
            }
        }
        Ok(total.finish())
    }

    /// Signed polygon area (PointList) or total unsigned triangle area.
    pub fn signed_area(
        &self,
        view: &VertexView<'_>,
        indices: Option<&IndexView<'_>>,
        topology: Topology,
    ) -> Result<f64> {
        Ok(self.area_centroid(view, indices, topology)?.area)
    }

    /// Area-weighted centroid.
    pub fn centroid_2d(
        &self,
        view: &VertexView<'_>,
        indices: Option<&IndexView<'_>>,
        topology: Topology,
    ) -> Result<Vector2<f64>> {
        Ok(self.area_centroid(view, indices, topology)?.centroid)
    }

    /// Copy every position out, widened to `f64`.
    pub fn extract_positions_2d(&self, view: &VertexView<'_>) -> Result<Vec<Vector2<f64>>> {
        let mut out = Vec::new();
        out.try_reserve_exact(view.count())?;
        out.resize(view.count(), Vector2::zeros());
        self.extract_positions_2d_into(view, &mut out)?;
        Ok(out)
    }

    /// Size-checked extraction into `out`. Returns the number written.
    pub fn extract_positions_2d_into(
        &self,
        view: &VertexView<'_>,
        out: &mut [Vector2<f64>],
    ) -> Result<usize> {
        let n = view.count();
        if out.len() < n {
            return Err(EngineError::BufferTooSmall {
                required: n,
                provided: out.len(),
            });
        }
        let parts = partition(n, self.cfg.tasks)?;
        debug!(vertices = n, tasks = parts.len(), "dispatching extraction");
        let mut jobs = reserve_jobs(parts.len())?;
        let mut rest = &mut out[..n];
        for part in &parts {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(part.len);
            rest = tail;
            let view = *view;
            let start = part.start;
            jobs.push(Box::new(move || -> TaskStatus {
                for (k, slot) in head.iter_mut().enumerate() {
                    *slot = view.position(start + k);
                }
                Ok(())
            }));
        }
        self.dispatch("extract_positions_2d", jobs)?;
        Ok(n)
    }

    /// Merge records with identical positions into an indexed mesh.
    pub fn unindexed_to_indexed_2d(&self, view: &VertexView<'_>) -> Result<IndexedMesh> {
        dedup::dedupe(view)
    }

    /// [`unindexed_to_indexed_2d`](Self::unindexed_to_indexed_2d) into
    /// caller buffers, sized with
    /// [`distinct_position_count`](Self::distinct_position_count).
    pub fn unindexed_to_indexed_2d_into(
        &self,
        view: &VertexView<'_>,
        out_vertices: &mut [u8],
        out_indices: &mut [u32],
    ) -> Result<DedupCounts> {
        dedup::dedupe_into(view, out_vertices, out_indices)
    }

    pub fn distinct_position_count(&self, view: &VertexView<'_>) -> Result<usize> {
        dedup::distinct_count(view)
    }
}

#[cfg(test)]
mod tests;
