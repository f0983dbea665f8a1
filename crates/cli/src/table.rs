//! CSV input/output for vertex and index tables (polars).
//!
//! - Vertex tables have numeric columns `x` and `y`; other columns are ignored.
//! - Index tables have one integer column `i`.

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use stridekit::prelude::Vec2;

fn read_frame(path: &Path, columns: &[&str]) -> Result<DataFrame> {
    let lf = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(100))
        .finish()
        .with_context(|| format!("opening {}", path.display()))?;
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| col(*c).cast(DataType::Float64))
        .collect();
    lf.select(exprs)
        .collect()
        .with_context(|| format!("reading columns {columns:?} from {}", path.display()))
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    df.column(name)?
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.ok_or_else(|| anyhow!("null `{name}` in row {row}")))
        .collect()
}

/// Read `(x, y)` rows.
pub fn read_points(path: &Path) -> Result<Vec<Vec2<f64>>> {
    let df = read_frame(path, &["x", "y"])?;
    let xs = column_values(&df, "x")?;
    let ys = column_values(&df, "y")?;
    Ok(xs.into_iter().zip(ys).map(|(x, y)| Vec2::new(x, y)).collect())
}

/// Read the `i` column as 32-bit indices.
pub fn read_indices(path: &Path) -> Result<Vec<u32>> {
    let df = read_frame(path, &["i"])?;
    column_values(&df, "i")?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&v) {
                Ok(v as u32)
            } else {
                Err(anyhow!("index {v} in row {row} is not a u32"))
            }
        })
        .collect()
}

/// Write `(x, y)` rows with a header.
pub fn write_points(path: &Path, points: &[Vec2<f64>]) -> Result<()> {
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    let mut df = df!("x" => xs, "y" => ys)?;
    create_parent(path)?;
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}
