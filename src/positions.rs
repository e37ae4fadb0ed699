//! Position files shared between the placement stages.
//! All files are space separated, headerless and overwritten on every write:
//! - `guide_camera_positions.txt`: 5 rows x 8 columns (c1x c1y .. c4x c4y), one row per outline vertex
//! - `camera_N_fiber_position.txt`: one row, fiber x y in degrees
//! - `fiber_N_change.txt`: one row, fiber move x y in mm

use anyhow::{Context, Result, bail, ensure};
use std::path::{Path, PathBuf};

use crate::camera::{CameraLayout, GuideCamera};
use crate::geometry::{BoxOutline, OffsetMm, SkyPoint};

pub const CAMERA_POSITIONS_FILE: &str = "guide_camera_positions.txt";

pub fn camera_positions_path(dir: &Path) -> PathBuf {
    dir.join(CAMERA_POSITIONS_FILE)
}

pub fn fiber_position_path(dir: &Path, camera: GuideCamera) -> PathBuf {
    dir.join(format!("camera_{}_fiber_position.txt", camera.number()))
}

pub fn fiber_change_path(dir: &Path, fiber: GuideCamera) -> PathBuf {
    dir.join(format!("fiber_{}_change.txt", fiber.number()))
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

fn write_rows(path: &Path, rows: &[Vec<f64>]) -> Result<()> {
    let mut writer = writer(path)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Reads every row of a space separated numeric file, requiring `width` columns.
fn read_rows(path: &Path, width: usize) -> Result<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed line {} in {}", line + 1, path.display()))?;
        let values = record
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Bad number on line {} of {}", line + 1, path.display()))?;
        ensure!(
            values.len() == width,
            "Expected {} columns on line {} of {}, found {}",
            width,
            line + 1,
            path.display(),
            values.len()
        );
        rows.push(values);
    }
    Ok(rows)
}

fn read_point(path: &Path) -> Result<SkyPoint> {
    let rows = read_rows(path, 2)?;
    match rows.first() {
        Some(row) => Ok(SkyPoint::new(row[0], row[1])),
        None => bail!("{} is empty", path.display()),
    }
}

pub fn write_camera_layout(dir: &Path, layout: &CameraLayout) -> Result<PathBuf> {
    let path = camera_positions_path(dir);
    let rows: Vec<Vec<f64>> = (0..5)
        .map(|vertex| {
            layout
                .outlines
                .iter()
                .flat_map(|outline| [outline.points[vertex].x, outline.points[vertex].y])
                .collect()
        })
        .collect();
    write_rows(&path, &rows)?;
    Ok(path)
}

pub fn read_camera_layout(dir: &Path) -> Result<CameraLayout> {
    let path = camera_positions_path(dir);
    let rows = read_rows(&path, 8)?;
    ensure!(
        rows.len() == 5,
        "Expected 5 rows in {}, found {}",
        path.display(),
        rows.len()
    );

    let outlines = GuideCamera::ALL.map(|camera| {
        let col = camera.index() * 2;
        let mut points = [SkyPoint::default(); 5];
        for (vertex, row) in rows.iter().enumerate() {
            points[vertex] = SkyPoint::new(row[col], row[col + 1]);
        }
        BoxOutline { points }
    });
    for (camera, outline) in GuideCamera::ALL.iter().zip(&outlines) {
        ensure!(
            outline.width() > 0.0 && outline.height() > 0.0,
            "{} outline in {} has no area",
            camera,
            path.display()
        );
    }
    Ok(CameraLayout { outlines })
}

pub fn write_fiber_position(dir: &Path, camera: GuideCamera, position: SkyPoint) -> Result<PathBuf> {
    let path = fiber_position_path(dir, camera);
    write_rows(&path, &[vec![position.x, position.y]])?;
    Ok(path)
}

pub fn read_fiber_position(dir: &Path, camera: GuideCamera) -> Result<SkyPoint> {
    read_point(&fiber_position_path(dir, camera))
}

pub fn write_fiber_change(dir: &Path, fiber: GuideCamera, offset: OffsetMm) -> Result<PathBuf> {
    let path = fiber_change_path(dir, fiber);
    write_rows(&path, &[vec![offset.x, offset.y]])?;
    Ok(path)
}

pub fn read_fiber_change(dir: &Path, fiber: GuideCamera) -> Result<OffsetMm> {
    let point = read_point(&fiber_change_path(dir, fiber))?;
    Ok(OffsetMm::new(point.x, point.y))
}
