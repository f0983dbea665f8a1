use super::*;
use crate::metrics::area_centroid_seq;
use crate::runner::{Inline, ScopedThreads};
use crate::sample::{fan_list_indices, radial_polygon, RadialCfg, ReplayToken, VertexCount};
use crate::view::{PositionEncoding, VertexLayout};
use nalgebra::vector;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::time::Duration;

fn engines() -> Vec<Engine> {
    let mut out = Vec::new();
    for tasks in [1, 3, 4, 7] {
        let cfg = EngineCfg::with_tasks(tasks);
        out.push(Engine::new(cfg).unwrap());
        out.push(Engine::with_runner(cfg, Box::new(ScopedThreads)).unwrap());
        out.push(Engine::with_runner(cfg, Box::new(Inline)).unwrap());
    }
    out
}

/// Interleaved layout: 4 bytes of tag, position, 4 bytes of tag.
fn interleaved(enc: PositionEncoding) -> VertexLayout {
    VertexLayout::new(enc.size() + 8, 4, enc).unwrap()
}

fn square() -> Vec<Vector2<f64>> {
    vec![
        vector![0.0, 0.0],
        vector![1.0, 0.0],
        vector![1.0, 1.0],
        vector![0.0, 1.0],
    ]
}

fn convex_polygon(n: usize, seed: u64) -> Vec<Vector2<f64>> {
    let cfg = RadialCfg {
        vertices: VertexCount::Fixed(n),
        angle_jitter: 0.3,
        radius_jitter: 0.0,
        ..RadialCfg::default()
    };
    radial_polygon(cfg, ReplayToken { seed, index: 0 })
}

/// Runner that runs inline but reports the second job as failed.
struct FailSecond;

impl TaskRunner for FailSecond {
    fn worker_count(&self) -> usize {
        1
    }

    fn run_all<'env>(&self, jobs: Vec<Job<'env>>) -> Vec<TaskStatus> {
        jobs.into_iter()
            .enumerate()
            .map(|(i, job)| {
                let status = job();
                if i == 1 {
                    Err(TaskError::Failed("injected".into()))
                } else {
                    status
                }
            })
            .collect()
    }
}

#[test]
fn unit_square_area_and_centroid() {
    for enc in [PositionEncoding::F32x2, PositionEncoding::F64x2] {
        let layout = interleaved(enc);
        let bytes = layout.pack(&square());
        let view = VertexView::new(&bytes, layout, 4).unwrap();
        for engine in engines() {
            let area = engine.signed_area(&view, None, Topology::PointList).unwrap();
            assert!((area - 1.0).abs() < 1e-12, "{engine:?}");
            let c = engine.centroid_2d(&view, None, Topology::PointList).unwrap();
            assert!((c - vector![0.5, 0.5]).norm() < 1e-12);
        }
    }
}

#[test]
fn triangle_list_square_has_unit_area() {
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let bytes = layout.pack(&square());
    let view = VertexView::new(&bytes, layout, 4).unwrap();
    let idx = [0u32, 1, 2, 0, 2, 3];
    let iv = IndexView::u32(&idx);
    // Reversed winding still gives a positive total.
    let rev = [2u32, 1, 0, 3, 2, 0];
    let iv_rev = IndexView::u32(&rev);
    for engine in engines() {
        let r = engine
            .area_centroid(&view, Some(&iv), Topology::TriangleList)
            .unwrap();
        assert!((r.area - 1.0).abs() < 1e-12);
        assert!((r.centroid - vector![0.5, 0.5]).norm() < 1e-12);
        let a = engine
            .signed_area(&view, Some(&iv_rev), Topology::TriangleList)
            .unwrap();
        assert!((a - 1.0).abs() < 1e-12);
    }
}

#[test]
fn point_list_ignores_index_view() {
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let bytes = layout.pack(&square());
    let view = VertexView::new(&bytes, layout, 4).unwrap();
    let idx = [0u16];
    let iv = IndexView::u16(&idx);
    let engine = Engine::default();
    let area = engine.signed_area(&view, Some(&iv), Topology::PointList).unwrap();
    assert!((area - 1.0).abs() < 1e-12);
}

#[test]
fn insufficient_input_maps_to_minus_two() {
    let layout = VertexLayout::packed(PositionEncoding::F32x2);
    let bytes = layout.pack(&square()[..2]);
    let view = VertexView::new(&bytes, layout, 2).unwrap();
    let engine = Engine::default();
    for topo in [
        Topology::PointList,
        Topology::TriangleList,
        Topology::TriangleStrip,
        Topology::TriangleFan,
    ] {
        let err = engine.centroid_2d(&view, None, topo).unwrap_err();
        assert_eq!(err.status_code(), -2, "{topo:?}");
    }
}

#[test]
fn strip_and_fan_agree_with_polygon_area() {
    // A convex polygon: its fan, a zig-zag strip, and the shoelace must agree.
    let pts = convex_polygon(11, 3);
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let bytes = layout.pack(&pts);
    let n = pts.len();
    let view = VertexView::new(&bytes, layout, n).unwrap();
    let strip: Vec<u32> = (0..n)
        .map(|k| {
            let k = k as u32;
            if k % 2 == 0 {
                k / 2
            } else {
                n as u32 - 1 - k / 2
            }
        })
        .collect();
    let list = fan_list_indices(n);
    let strip_iv = IndexView::u32(&strip);
    let list_iv = IndexView::u32(&list);
    for engine in engines() {
        let poly = engine.area_centroid(&view, None, Topology::PointList).unwrap();
        let fan = engine.area_centroid(&view, None, Topology::TriangleFan).unwrap();
        let st = engine
            .area_centroid(&view, Some(&strip_iv), Topology::TriangleStrip)
            .unwrap();
        let li = engine
            .area_centroid(&view, Some(&list_iv), Topology::TriangleList)
            .unwrap();
        for r in [fan, st, li] {
            assert!((r.area - poly.area).abs() < 1e-12);
            assert!((r.centroid - poly.centroid).norm() < 1e-12);
        }
    }
}

#[test]
fn restart_list_matches_sequential_walk() {
    let pts = convex_polygon(8, 9);
    let layout = VertexLayout::packed(PositionEncoding::F32x2);
    let bytes = layout.pack(&pts);
    let view = VertexView::new(&bytes, layout, 8).unwrap();
    let r = u16::MAX;
    let idx = [0u16, 1, 2, r, 0, 2, 3, 0, 3, r, 4, 0, 4, 5, 0, 5, 6, 0, 6, 7];
    let iv = IndexView::u16(&idx).with_primitive_restart(true);
    let want = area_centroid_seq(&view, Some(&iv), Topology::TriangleList).unwrap();
    for engine in engines() {
        let got = engine
            .area_centroid(&view, Some(&iv), Topology::TriangleList)
            .unwrap();
        assert_eq!(got.area, want.area);
        assert_eq!(got.centroid, want.centroid);
    }
}

#[test]
fn restart_fan_splits_correctly() {
    let pts = convex_polygon(9, 5);
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let bytes = layout.pack(&pts);
    let view = VertexView::new(&bytes, layout, 9).unwrap();
    let r = u32::MAX;
    let fan = [0u32, 1, 2, 3, 4, r, 0, 4, 5, 6, r, 0, 6, 7, 8];
    let iv = IndexView::u32(&fan).with_primitive_restart(true);
    let poly = area_centroid_seq(&view, None, Topology::PointList).unwrap();
    for engine in engines() {
        let got = engine
            .area_centroid(&view, Some(&iv), Topology::TriangleFan)
            .unwrap();
        assert!((got.area - poly.area).abs() < 1e-12, "{engine:?}");
        assert!((got.centroid - poly.centroid).norm() < 1e-12);
    }
}

#[test]
fn out_of_range_index_is_reported() {
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let bytes = layout.pack(&square());
    let view = VertexView::new(&bytes, layout, 4).unwrap();
    let idx = [0u16, 1, 2, 0, 2, 9];
    let iv = IndexView::u16(&idx);
    for engine in engines() {
        let err = engine
            .area_centroid(&view, Some(&iv), Topology::TriangleList)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IndexOutOfRange { index: 9, count: 4 }
        ));
    }
}

#[test]
fn transforms_match_affine_reference() {
    let pts = convex_polygon(23, 1);
    let line = Line2 {
        dir: 0.4,
        center: vector![0.2, -0.1],
    };
    let origin = vector![0.3, 0.7];
    let ops: Vec<(&str, Affine2)> = vec![
        ("translate", Affine2::translation(vector![1.5, -2.0])),
        ("rotate", Affine2::rotation_about(0.8, origin)),
        ("scale", Affine2::scale_about(vector![2.0, -0.5], origin)),
        ("skew", Affine2::skew_about(vector![0.3, -1.2], origin)),
        ("mirror", Affine2::mirror(line)),
    ];
    let layout = interleaved(PositionEncoding::F64x2);
    for engine in engines() {
        for (name, f) in &ops {
            let mut bytes = layout.pack(&pts);
            let mut view = VertexViewMut::new(&mut bytes, layout, pts.len()).unwrap();
            let res = match *name {
                "translate" => engine.translate_2d(&mut view, vector![1.5, -2.0]),
                "rotate" => engine.rotate_2d(&mut view, 0.8, origin),
                "scale" => engine.scale_2d(&mut view, vector![2.0, -0.5], origin),
                "skew" => engine.skew_2d(&mut view, vector![0.3, -1.2], origin),
                _ => engine.mirror_2d(&mut view, line),
            };
            res.unwrap();
            for (i, p) in pts.iter().enumerate() {
                assert!((view.position(i) - f.apply(*p)).norm() < 1e-12, "{name} #{i}");
            }
        }
    }
}

#[test]
fn transforms_leave_other_bytes_alone() {
    let layout = interleaved(PositionEncoding::F32x2);
    let pts = convex_polygon(10, 2);
    let mut bytes = layout.pack(&pts);
    for i in 0..pts.len() {
        let rec = &mut bytes[i * layout.stride..(i + 1) * layout.stride];
        rec[..4].copy_from_slice(&[0xAB; 4]);
        rec[12..16].copy_from_slice(&[0xCD; 4]);
    }
    let engine = Engine::new(EngineCfg::with_tasks(4)).unwrap();
    let mut view = VertexViewMut::new(&mut bytes, layout, pts.len()).unwrap();
    engine.rotate_2d(&mut view, 1.0, Vector2::zeros()).unwrap();
    for i in 0..pts.len() {
        let rec = &bytes[i * layout.stride..(i + 1) * layout.stride];
        assert_eq!(&rec[..4], &[0xABu8; 4]);
        assert_eq!(&rec[12..16], &[0xCDu8; 4]);
    }
}

#[test]
fn failed_job_keeps_sibling_side_effects() {
    let layout = VertexLayout::packed(PositionEncoding::F64x2);
    let pts: Vec<_> = (0..8).map(|i| vector![i as f64, 0.0]).collect();
    let mut bytes = layout.pack(&pts);
    let engine = Engine::with_runner(EngineCfg::with_tasks(4), Box::new(FailSecond)).unwrap();
    let mut view = VertexViewMut::new(&mut bytes, layout, 8).unwrap();
    let err = engine.translate_2d(&mut view, vector![10.0, 0.0]).unwrap_err();
    assert_eq!(err.status_code(), -1);
    match err {
        EngineError::TaskFailure { failed, first } => {
            assert_eq!(failed, 1);
            assert_eq!(first, TaskError::Failed("injected".into()));
        }
        other => panic!("unexpected error {other:?}"),
    }
    // Every range, the "failed" one included, was actually transformed.
    for i in 0..8 {
        assert_eq!(view.position(i).x, i as f64 + 10.0);
    }
}

#[test]
fn extraction_plain_and_size_checked() {
    let layout = interleaved(PositionEncoding::F32x2);
    let pts = convex_polygon(13, 4);
    let bytes = layout.pack(&pts);
    let view = VertexView::new(&bytes, layout, pts.len()).unwrap();
    for engine in engines() {
        let out = engine.extract_positions_2d(&view).unwrap();
        assert_eq!(out.len(), pts.len());
        for (got, p) in out.iter().zip(&pts) {
            assert_eq!(*got, p.cast::<f32>().cast::<f64>());
        }
        let mut short = vec![Vector2::zeros(); pts.len() - 1];
        let err = engine.extract_positions_2d_into(&view, &mut short).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BufferTooSmall { required: 13, provided: 12 }
        ));
        assert_eq!(err.status_code(), -1);
        let mut roomy = vec![vector![-1.0, -1.0]; pts.len() + 2];
        assert_eq!(engine.extract_positions_2d_into(&view, &mut roomy).unwrap(), 13);
        assert_eq!(roomy[13], vector![-1.0, -1.0]);
    }
}

#[test]
fn dedup_four_vertices_with_one_repeat() {
    let layout = interleaved(PositionEncoding::F64x2);
    let pts = [
        vector![0.5, 0.5],
        vector![1.0, 0.0],
        vector![0.5, 0.5],
        vector![0.0, 2.0],
    ];
    let bytes = layout.pack(&pts);
    let view = VertexView::new(&bytes, layout, 4).unwrap();
    let engine = Engine::default();
    assert_eq!(engine.distinct_position_count(&view).unwrap(), 3);
    let mesh = engine.unindexed_to_indexed_2d(&view).unwrap();
    assert_eq!(mesh.vertex_count, 3);
    assert_eq!(mesh.indices.len(), 4);
    assert_eq!(mesh.expanded_positions().unwrap(), pts.to_vec());

    let mut verts = vec![0u8; 3 * layout.stride];
    let mut idx = vec![0u32; 4];
    let counts = engine
        .unindexed_to_indexed_2d_into(&view, &mut verts, &mut idx)
        .unwrap();
    assert_eq!(counts.vertex_count, 3);
    assert_eq!(verts, mesh.vertices);
    assert_eq!(idx, mesh.indices);
}

#[test]
fn invalid_config_rejected() {
    assert!(Engine::new(EngineCfg::with_tasks(0)).is_err());
    let cfg = EngineCfg {
        tasks: 2,
        join_timeout: Duration::ZERO,
    };
    assert!(Engine::with_runner(cfg, Box::new(Inline)).is_err());
}

#[test]
fn area_randomized_seeded() {
    // Random polygons and task counts: parallel sums match the sequential ones.
    let mut rng = StdRng::seed_from_u64(0xA11CE);
    for _ in 0..40 {
        let n = rng.gen_range(3..200);
        let tasks = rng.gen_range(1..9);
        let pts = radial_polygon(
            RadialCfg {
                vertices: VertexCount::Fixed(n),
                ..RadialCfg::default()
            },
            ReplayToken {
                seed: rng.gen(),
                index: 0,
            },
        );
        let layout = VertexLayout::packed(PositionEncoding::F64x2);
        let bytes = layout.pack(&pts);
        let view = VertexView::new(&bytes, layout, n).unwrap();
        let want = area_centroid_seq(&view, None, Topology::PointList).unwrap();
        let engine = Engine::new(EngineCfg::with_tasks(tasks)).unwrap();
        let got = engine.area_centroid(&view, None, Topology::PointList).unwrap();
        assert!((got.area - want.area).abs() < 1e-12 * want.area.abs().max(1.0));
        assert!((got.centroid - want.centroid).norm() < 1e-9);
        assert!(got.area > 0.0);
    }
}

fn coords() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 0..64)
}

proptest! {
    #[test]
    fn translate_round_trip(raw in coords(), dx in -1e3f64..1e3, dy in -1e3f64..1e3, tasks in 1usize..6) {
        let pts: Vec<Vector2<f64>> = raw.iter().map(|&(x, y)| vector![x, y]).collect();
        let engine = Engine::with_runner(EngineCfg::with_tasks(tasks), Box::new(ScopedThreads)).unwrap();
        for (enc, tol) in [(PositionEncoding::F64x2, 1e-9), (PositionEncoding::F32x2, 1e-3)] {
            let layout = interleaved(enc);
            let mut bytes = layout.pack(&pts);
            let before = VertexView::new(&bytes, layout, pts.len()).unwrap();
            let original: Vec<_> = (0..pts.len()).map(|i| before.position(i)).collect();
            let mut view = VertexViewMut::new(&mut bytes, layout, pts.len()).unwrap();
            engine.translate_2d(&mut view, vector![dx, dy]).unwrap();
            engine.translate_2d(&mut view, vector![-dx, -dy]).unwrap();
            for (i, p) in original.iter().enumerate() {
                prop_assert!((view.position(i) - p).norm() < tol);
            }
        }
    }

    #[test]
    fn full_turn_restores_positions(raw in coords(), ox in -10f64..10.0, oy in -10f64..10.0) {
        let pts: Vec<Vector2<f64>> = raw.iter().map(|&(x, y)| vector![x, y]).collect();
        let layout = VertexLayout::packed(PositionEncoding::F64x2);
        let mut bytes = layout.pack(&pts);
        let engine = Engine::with_runner(EngineCfg::default(), Box::new(Inline)).unwrap();
        let mut view = VertexViewMut::new(&mut bytes, layout, pts.len()).unwrap();
        engine.rotate_2d(&mut view, TAU, vector![ox, oy]).unwrap();
        for (i, p) in pts.iter().enumerate() {
            prop_assert!((view.position(i) - p).norm() < 1e-9);
        }
    }

    #[test]
    fn dedup_reconstructs_input(raw in prop::collection::vec((0u8..4, 0u8..4), 0..80)) {
        // Small coordinate alphabet so repeats are common.
        let pts: Vec<Vector2<f64>> = raw.iter().map(|&(x, y)| vector![x as f64, y as f64]).collect();
        let layout = interleaved(PositionEncoding::F32x2);
        let bytes = layout.pack(&pts);
        let view = VertexView::new(&bytes, layout, pts.len()).unwrap();
        let mesh = Engine::default().unindexed_to_indexed_2d(&view).unwrap();
        prop_assert!(mesh.vertex_count <= 16);
        prop_assert_eq!(mesh.expanded_positions().unwrap(), pts.clone());
        // First occurrence order: index values appear in increasing first use.
        let mut seen = 0u32;
        for &ix in &mesh.indices {
            prop_assert!(ix <= seen);
            if ix == seen {
                seen += 1;
            }
        }
        prop_assert_eq!(seen as usize, mesh.vertex_count);
    }

    #[test]
    fn parallel_matches_inline(raw in prop::collection::vec((-1e2f64..1e2, -1e2f64..1e2), 3..90), tasks in 1usize..9) {
        let pts: Vec<Vector2<f64>> = raw.iter().map(|&(x, y)| vector![x, y]).collect();
        let layout = VertexLayout::packed(PositionEncoding::F64x2);
        let bytes = layout.pack(&pts);
        let view = VertexView::new(&bytes, layout, pts.len()).unwrap();
        let cfg = EngineCfg::with_tasks(tasks);
        let inline = Engine::with_runner(cfg, Box::new(Inline)).unwrap();
        let pool = Engine::new(cfg).unwrap();
        for topo in [Topology::TriangleList, Topology::TriangleStrip, Topology::TriangleFan] {
            let a = inline.signed_area(&view, None, topo).unwrap();
            let b = pool.signed_area(&view, None, topo).unwrap();
            prop_assert_eq!(a, b);
        }
        let a = inline.extract_positions_2d(&view).unwrap();
        let b = pool.extract_positions_2d(&view).unwrap();
        prop_assert_eq!(a, b);
    }
}
