//! Interactive sky chart, one native window per stage.
//! Draws the stage's scene with egui_plot and forwards right clicks, in sky
//! coordinates, to the stage. egui_plot cannot flip an axis, so the plot's x
//! is -RA and the tick labels undo the sign; RA increases to the left. The terminal
//! prompt that follows a click blocks the window until it is answered.

use anyhow::{Result, anyhow};
use eframe::egui::{self, Align2, Color32};
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoint, PlotPoints, PlotUi, Points, Text};
use tracing::error;

use crate::geometry::SkyPoint;
use crate::scene::{MarkerKind, OutlineKind, Scene, star_area};
use crate::workflow::{CameraSelector, Stage};

const WINDOW_SIZE: [f32; 2] = [800.0, 600.0];

/// Sky point to plot space (x = -RA).
fn to_plot(p: SkyPoint) -> [f64; 2] {
    [-p.x, p.y]
}

fn from_plot(value: PlotPoint) -> SkyPoint {
    SkyPoint::new(-value.x, value.y)
}

fn plot_point(p: SkyPoint) -> PlotPoint {
    let [x, y] = to_plot(p);
    PlotPoint::new(x, y)
}

struct ChartApp<'a> {
    stage: &'a mut dyn Stage,
    selector: &'a mut dyn CameraSelector,
    scene: Scene,
}

impl<'a> ChartApp<'a> {
    fn new(stage: &'a mut dyn Stage, selector: &'a mut dyn CameraSelector) -> Self {
        let scene = stage.scene();
        Self { stage, selector, scene }
    }

    fn handle_click(&mut self, click: SkyPoint) {
        match self.stage.on_click(click, self.selector) {
            Ok(()) => self.scene = self.stage.scene(),
            Err(e) => error!("Click at ({:.6}, {:.6}) not applied: {:#}", click.x, click.y, e),
        }
    }
}

impl eframe::App for ChartApp<'_> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let plot = Plot::new("sky_chart")
                .legend(Legend::default())
                .x_axis_label("Right Ascension [deg]")
                .y_axis_label("Declination [deg]")
                .x_axis_formatter(|mark, _| format!("{:.3}", -mark.value))
                .allow_boxed_zoom(false);

            let response = plot.show(ui, |plot_ui| draw(plot_ui, &self.scene));

            if response.response.secondary_clicked() {
                if let Some(pos) = response.response.interact_pointer_pos() {
                    let value = response.transform.value_from_position(pos);
                    self.handle_click(from_plot(value));
                }
            }
        });
    }
}

fn draw(plot_ui: &mut PlotUi, scene: &Scene) {
    for star in &scene.stars {
        plot_ui.points(
            Points::new("Stars", vec![to_plot(SkyPoint::new(star.ra, star.dec))])
                .shape(MarkerShape::Asterisk)
                .radius((star_area(star.mag).sqrt() / 2.0) as f32)
                .color(Color32::BLACK),
        );
    }

    for outline in &scene.outlines {
        let (name, color) = match outline.kind {
            OutlineKind::Telescope => ("Telescope", Color32::DARK_GREEN),
            OutlineKind::GuideCamera => ("Guide Cameras", Color32::RED),
        };
        let points: Vec<[f64; 2]> = outline.outline.points.iter().map(|p| to_plot(*p)).collect();
        plot_ui.line(Line::new(name, PlotPoints::from(points)).color(color));

        if outline.kind == OutlineKind::GuideCamera {
            plot_ui.text(
                Text::new("", plot_point(outline.outline.anchor()), outline.label.as_str())
                    .anchor(Align2::LEFT_BOTTOM)
                    .color(Color32::BLACK),
            );
        }
    }

    for marker in &scene.markers {
        let point = vec![to_plot(marker.position)];
        let points = match marker.kind {
            MarkerKind::Click => Points::new("", point).radius(2.0).color(Color32::RED),
            MarkerKind::Fiber => Points::new("Fibers", point).radius(4.0).color(Color32::BLUE),
            MarkerKind::Target => Points::new("", point)
                .shape(MarkerShape::Circle)
                .filled(false)
                .radius(8.0)
                .color(Color32::GOLD),
        };
        plot_ui.points(points);

        if let Some(label) = &marker.label {
            plot_ui.text(
                Text::new("", plot_point(marker.position), label.as_str())
                    .anchor(Align2::LEFT_BOTTOM)
                    .color(Color32::BLACK),
            );
        }
    }

    for note in &scene.annotations {
        plot_ui.text(
            Text::new("", plot_point(note.position), note.text.as_str())
                .anchor(Align2::LEFT_TOP)
                .color(Color32::BLACK),
        );
    }
}

/// Opens the stage's chart window and blocks until the user closes it.
pub fn show(stage: &mut dyn Stage, selector: &mut dyn CameraSelector) -> Result<()> {
    let title = stage.kind().title();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(WINDOW_SIZE)
            .with_title(title),
        ..Default::default()
    };

    let app = ChartApp::new(stage, selector);
    eframe::run_native(
        title,
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow!("Chart window for {} failed: {}", title, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_mapping_puts_ra_increasing_left() {
        let east = to_plot(SkyPoint::new(348.55, 8.76));
        let west = to_plot(SkyPoint::new(348.45, 8.76));
        assert!(east[0] < west[0]);
        assert_eq!(east[1], 8.76);
    }

    #[test]
    fn test_plot_mapping_round_trip() {
        for p in [SkyPoint::new(348.4948229, 8.7612697), SkyPoint::new(0.0, -45.5), SkyPoint::new(359.9, 89.0)] {
            assert_eq!(from_plot(plot_point(p)), p);
        }
    }
}
