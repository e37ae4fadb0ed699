//! PNG snapshot of a stage's final scene.
//! Uses `image` + `imageproc` to draw stars, footprints and markers (no text).
//! RA increases to the left, as in the interactive chart.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use std::path::Path;

use crate::geometry::SkyPoint;
use crate::scene::{MarkerKind, OutlineKind, Scene, star_area};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const MARGIN: f64 = 0.05; // fraction of the data span on each side

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 128, 0]);
const RED: Rgb<u8> = Rgb([220, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 220]);
const GOLD: Rgb<u8> = Rgb([255, 215, 0]);

/// Maps sky degrees onto image pixels.
struct Projection {
    lo: SkyPoint,
    hi: SkyPoint,
}

impl Projection {
    fn fit(scene: &Scene) -> Self {
        let (lo, hi) = scene
            .bounds()
            .unwrap_or((SkyPoint::new(0.0, 0.0), SkyPoint::new(1.0, 1.0)));
        let pad = |lo: f64, hi: f64| {
            let span = (hi - lo).max(1e-6);
            (lo - span * MARGIN, hi + span * MARGIN)
        };
        let (x0, x1) = pad(lo.x, hi.x);
        let (y0, y1) = pad(lo.y, hi.y);
        Self {
            lo: SkyPoint::new(x0, y0),
            hi: SkyPoint::new(x1, y1),
        }
    }

    fn to_pixel(&self, p: SkyPoint) -> (f32, f32) {
        let fx = (self.hi.x - p.x) / (self.hi.x - self.lo.x);
        let fy = (self.hi.y - p.y) / (self.hi.y - self.lo.y);
        ((fx * f64::from(WIDTH)) as f32, (fy * f64::from(HEIGHT)) as f32)
    }

    fn to_center(&self, p: SkyPoint) -> (i32, i32) {
        let (x, y) = self.to_pixel(p);
        (x.round() as i32, y.round() as i32)
    }
}

pub fn render(scene: &Scene) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);
    let proj = Projection::fit(scene);

    for star in &scene.stars {
        let radius = (star_area(star.mag).sqrt() / 2.0).round().max(1.0) as i32;
        draw_filled_circle_mut(&mut img, proj.to_center(SkyPoint::new(star.ra, star.dec)), radius, BLACK);
    }

    for outline in &scene.outlines {
        let color = match outline.kind {
            OutlineKind::Telescope => GREEN,
            OutlineKind::GuideCamera => RED,
        };
        for edge in outline.outline.points.windows(2) {
            draw_line_segment_mut(&mut img, proj.to_pixel(edge[0]), proj.to_pixel(edge[1]), color);
        }
    }

    for marker in &scene.markers {
        let center = proj.to_center(marker.position);
        match marker.kind {
            MarkerKind::Click => draw_filled_circle_mut(&mut img, center, 2, RED),
            MarkerKind::Fiber => draw_filled_circle_mut(&mut img, center, 4, BLUE),
            MarkerKind::Target => draw_hollow_circle_mut(&mut img, center, 8, GOLD),
        }
    }

    img
}

pub fn save(scene: &Scene, path: &Path) -> Result<()> {
    render(scene)
        .save(path)
        .with_context(|| format!("Failed to save snapshot to {}", path.display()))
}
