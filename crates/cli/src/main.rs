use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stridekit::prelude::*;
use tracing_subscriber::fmt::SubscriberBuilder;

mod provenance;
mod table;

use provenance::Payload;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Run stridekit operations on CSV vertex tables")]
struct Cmd {
    /// Jobs per partitioned operation
    #[arg(long, default_value_t = stridekit::cfg::DEFAULT_TASKS)]
    tasks: usize,

    /// How jobs are executed
    #[arg(long, value_enum, default_value_t = RunnerKind::Pool)]
    runner: RunnerKind,

    /// Seconds before a slow job is reported (it is still awaited)
    #[arg(long, default_value_t = 10)]
    join_timeout: u64,

    /// Store positions as f32 while processing
    #[arg(long = "f32")]
    single: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RunnerKind {
    Pool,
    Scoped,
    Inline,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransformOp {
    Translate,
    Rotate,
    Scale,
    Skew,
    Mirror,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TopologyArg {
    Points,
    List,
    Strip,
    Fan,
}

impl From<TopologyArg> for Topology {
    fn from(t: TopologyArg) -> Self {
        match t {
            TopologyArg::Points => Topology::PointList,
            TopologyArg::List => Topology::TriangleList,
            TopologyArg::Strip => Topology::TriangleStrip,
            TopologyArg::Fan => Topology::TriangleFan,
        }
    }
}

#[derive(Subcommand)]
enum Action {
    /// Apply an affine transform to a vertex CSV and write the result as CSV
    Transform {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum)]
        op: TransformOp,
        /// Offset (translate), factor (scale, skew)
        #[arg(long, num_args = 2, allow_negative_numbers = true)]
        by: Vec<f64>,
        /// Radians: rotation angle, or mirror line direction
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        angle: f64,
        /// Fixed point of rotate/scale/skew, or a point on the mirror line
        #[arg(long, num_args = 2, allow_negative_numbers = true)]
        origin: Vec<f64>,
    },
    /// Signed area and centroid of a polygon or triangle set, as JSON
    Metrics {
        #[arg(long)]
        input: PathBuf,
        /// Index CSV with column `i`
        #[arg(long)]
        indices: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = TopologyArg::Points)]
        topology: TopologyArg,
        /// Treat the maximum index value as a restart sentinel
        #[arg(long)]
        restart: bool,
        /// Use 16-bit index elements (sentinel 0xFFFF)
        #[arg(long = "u16")]
        narrow: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge equal positions and write an indexed mesh as JSON
    Dedupe {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write a random star-shaped polygon as CSV
    Sample {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 12)]
        vertices: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 0)]
        index: u64,
        /// Move the area centroid to the origin
        #[arg(long)]
        recenter: bool,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    let engine = build_engine(&cmd)?;
    let encoding = if cmd.single {
        PositionEncoding::F32x2
    } else {
        PositionEncoding::F64x2
    };
    let cfg = engine.cfg();
    let engine_json = json!({
        "tasks": cfg.tasks,
        "runner": format!("{:?}", cmd.runner),
        "workers": engine.runner().worker_count(),
        "join_timeout_s": cfg.join_timeout.as_secs_f64(),
        "encoding": format!("{encoding:?}"),
    });
    let ctx = Ctx {
        engine,
        encoding,
        engine_json,
    };
    match cmd.action {
        Action::Transform {
            input,
            out,
            op,
            by,
            angle,
            origin,
        } => transform(&ctx, &input, &out, op, &by, angle, &origin),
        Action::Metrics {
            input,
            indices,
            topology,
            restart,
            narrow,
            out,
        } => metrics(
            &ctx,
            &input,
            indices.as_deref(),
            topology,
            restart,
            narrow,
            out.as_deref(),
        ),
        Action::Dedupe { input, out } => dedupe(&ctx, &input, &out),
        Action::Sample {
            out,
            vertices,
            seed,
            index,
            recenter,
        } => sample(&out, vertices, seed, index, recenter),
        Action::Report => report(&ctx),
    }
}

struct Ctx {
    engine: Engine,
    encoding: PositionEncoding,
    engine_json: serde_json::Value,
}

fn build_engine(cmd: &Cmd) -> Result<Engine> {
    let cfg = EngineCfg {
        tasks: cmd.tasks,
        join_timeout: Duration::from_secs(cmd.join_timeout),
    };
    let runner: Box<dyn TaskRunner> = match cmd.runner {
        RunnerKind::Pool => Box::new(WorkerPool::from_cfg(&cfg)),
        RunnerKind::Scoped => Box::new(ScopedThreads),
        RunnerKind::Inline => Box::new(Inline),
    };
    Engine::with_runner(cfg, runner).context("invalid engine configuration")
}

fn pair(values: &[f64], name: &str) -> Result<Vec2<f64>> {
    match values {
        [] => Ok(Vec2::zeros()),
        [x, y] => Ok(Vec2::new(*x, *y)),
        _ => bail!("--{name} takes two numbers"),
    }
}

fn transform(
    ctx: &Ctx,
    input: &Path,
    out: &Path,
    op: TransformOp,
    by: &[f64],
    angle: f64,
    origin: &[f64],
) -> Result<()> {
    tracing::info!(input = %input.display(), out = %out.display(), ?op, "transform");
    if by.is_empty() && matches!(op, TransformOp::Scale) {
        bail!("--by is required for scale");
    }
    let pts = table::read_points(input)?;
    let by = pair(by, "by")?;
    let origin = pair(origin, "origin")?;
    let layout = VertexLayout::packed(ctx.encoding);
    let mut bytes = layout.pack(&pts);
    let mut view = VertexViewMut::new(&mut bytes, layout, pts.len())?;
    let engine = &ctx.engine;
    match op {
        TransformOp::Translate => engine.translate_2d(&mut view, by)?,
        TransformOp::Rotate => engine.rotate_2d(&mut view, angle, origin)?,
        TransformOp::Scale => engine.scale_2d(&mut view, by, origin)?,
        TransformOp::Skew => engine.skew_2d(&mut view, by, origin)?,
        TransformOp::Mirror => engine.mirror_2d(
            &mut view,
            Line2 {
                dir: angle,
                center: origin,
            },
        )?,
    }
    let moved = engine.extract_positions_2d(&view.as_view())?;
    table::write_points(out, &moved)?;
    let payload = Payload::new(
        "transform",
        json!({
            "input": input,
            "op": format!("{op:?}"),
            "by": [by.x, by.y],
            "angle": angle,
            "origin": [origin.x, origin.y],
            "vertices": pts.len(),
        }),
    )
    .with_engine(ctx.engine_json.clone());
    provenance::write_sidecar(out, payload)?;
    Ok(())
}

#[derive(Serialize)]
struct MetricsOut {
    topology: String,
    vertices: usize,
    elements: usize,
    area: f64,
    centroid: [f64; 2],
}

fn metrics(
    ctx: &Ctx,
    input: &Path,
    indices: Option<&Path>,
    topology: TopologyArg,
    restart: bool,
    narrow: bool,
    out: Option<&Path>,
) -> Result<()> {
    tracing::info!(input = %input.display(), ?topology, restart, "metrics");
    let pts = table::read_points(input)?;
    let layout = VertexLayout::packed(ctx.encoding);
    let bytes = layout.pack(&pts);
    let view = VertexView::new(&bytes, layout, pts.len())?;

    let idx32 = match indices {
        Some(p) => Some(table::read_indices(p)?),
        None => None,
    };
    let idx16: Option<Vec<u16>> = match (&idx32, narrow) {
        (Some(v), true) => Some(
            v.iter()
                .map(|&i| u16::try_from(i).context("index does not fit u16"))
                .collect::<Result<_>>()?,
        ),
        _ => None,
    };
    let iv = match (&idx16, &idx32) {
        (Some(v), _) => Some(IndexView::u16(v).with_primitive_restart(restart)),
        (None, Some(v)) => Some(IndexView::u32(v).with_primitive_restart(restart)),
        (None, None) => None,
    };

    let topo = Topology::from(topology);
    let r = ctx.engine.area_centroid(&view, iv.as_ref(), topo)?;
    let result = MetricsOut {
        topology: format!("{topo:?}"),
        vertices: pts.len(),
        elements: iv.map_or(pts.len(), |v| v.len()),
        area: r.area,
        centroid: [r.centroid.x, r.centroid.y],
    };
    let text = serde_json::to_string_pretty(&result)?;
    match out {
        Some(out) => {
            table::create_parent(out)?;
            std::fs::write(out, &text).with_context(|| format!("writing {}", out.display()))?;
            let payload = Payload::new(
                "metrics",
                json!({
                    "input": input,
                    "indices": indices,
                    "restart": restart,
                }),
            )
            .with_engine(ctx.engine_json.clone());
            provenance::write_sidecar(out, payload)?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct MeshOut {
    vertices: Vec<[f64; 2]>,
    indices: Vec<u32>,
}

fn dedupe(ctx: &Ctx, input: &Path, out: &Path) -> Result<()> {
    tracing::info!(input = %input.display(), out = %out.display(), "dedupe");
    let pts = table::read_points(input)?;
    let layout = VertexLayout::packed(ctx.encoding);
    let bytes = layout.pack(&pts);
    let view = VertexView::new(&bytes, layout, pts.len())?;
    let mesh = ctx.engine.unindexed_to_indexed_2d(&view)?;
    let positions = ctx.engine.extract_positions_2d(&mesh.view()?)?;
    tracing::info!(input = pts.len(), distinct = mesh.vertex_count, "deduplicated");
    let doc = MeshOut {
        vertices: positions.iter().map(|p| [p.x, p.y]).collect(),
        indices: mesh.indices,
    };
    table::create_parent(out)?;
    std::fs::write(out, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", out.display()))?;
    let payload = Payload::new(
        "dedupe",
        json!({ "input": input, "vertices_in": pts.len(), "vertices_out": doc.vertices.len() }),
    )
    .with_engine(ctx.engine_json.clone());
    provenance::write_sidecar(out, payload)?;
    Ok(())
}

fn sample(out: &Path, vertices: usize, seed: u64, index: u64, recenter: bool) -> Result<()> {
    tracing::info!(out = %out.display(), vertices, seed, index, "sample");
    let cfg = RadialCfg {
        vertices: VertexCount::Fixed(vertices),
        ..RadialCfg::default()
    };
    let mut pts = radial_polygon(cfg, ReplayToken { seed, index });
    if recenter {
        stridekit::sample::recenter(&mut pts)?;
    }
    table::write_points(out, &pts)?;
    let payload = Payload::new(
        "sample",
        json!({
            "vertices": pts.len(),
            "seed": seed,
            "index": index,
            "recenter": recenter,
        }),
    );
    provenance::write_sidecar(out, payload)?;
    Ok(())
}

fn report(ctx: &Ctx) -> Result<()> {
    let payload = Payload::new("report", json!({})).with_engine(ctx.engine_json.clone());
    let obj = provenance::document(&payload, &[], std::panic::Location::caller());
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
