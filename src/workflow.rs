//! Placement workflow.
//! Three stages run back to back, each in its own chart window:
//! 1. cameras: right click a point, pick the camera, all four footprints are laid out and saved
//! 2. fibers: right click inside a camera, pick it, the fiber lands at click + configured offset
//! 3. targets: right click a star, pick a fiber, the mm move from fiber to star is reported and saved
//! Each stage owns its state; the chart only feeds it clicks. Stages hand data
//! to each other through the files in the analysis directory.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::camera::{CameraLayout, GuideCamera};
use crate::catalog::StarRecord;
use crate::config::Config;
use crate::geometry::{BoxOutline, OffsetMm, PlateScale, SkyPoint};
use crate::positions;
use crate::scene::{MarkerKind, OutlineKind, Scene};
use crate::{chart, snapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    Cameras,
    Fibers,
    Targets,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Cameras, StageKind::Fibers, StageKind::Targets];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Cameras => "cameras",
            StageKind::Fibers => "fibers",
            StageKind::Targets => "targets",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StageKind::Cameras => "DFPS: place guide cameras",
            StageKind::Fibers => "DFPS: place fibers",
            StageKind::Targets => "DFPS: move fibers to targets",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cameras" => Ok(StageKind::Cameras),
            "fibers" => Ok(StageKind::Fibers),
            "targets" => Ok(StageKind::Targets),
            other => bail!("Unknown stage '{}', expected cameras, fibers or targets", other),
        }
    }
}

/// Asks the observer which camera (or fiber) a click belongs to.
pub trait CameraSelector {
    fn select(&mut self, prompt: &str) -> Result<GuideCamera>;
}

/// Blocking terminal menu of the four cameras.
pub struct TerminalSelector;

impl CameraSelector for TerminalSelector {
    fn select(&mut self, prompt: &str) -> Result<GuideCamera> {
        let items: Vec<String> = GuideCamera::ALL.iter().map(|c| c.number().to_string()).collect();
        let choice = dialoguer::Select::new()
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact()
            .context("Failed to read camera selection")?;
        GuideCamera::from_index(choice).context("Selection out of range")
    }
}

/// One interactive stage: a scene to draw and a right-click handler.
pub trait Stage {
    fn kind(&self) -> StageKind;
    fn scene(&self) -> Scene;
    fn on_click(&mut self, click: SkyPoint, selector: &mut dyn CameraSelector) -> Result<()>;
}

fn backdrop(config: &Config, stars: &[StarRecord]) -> Scene {
    let fov = config.telescope_fov_deg();
    Scene::field(stars, BoxOutline::around(config.field_center(), fov, fov))
}

fn draw_cameras(scene: &mut Scene, layout: &CameraLayout) {
    for camera in GuideCamera::ALL {
        scene.outline(*layout.outline(camera), OutlineKind::GuideCamera, camera.to_string());
    }
}

// *************** Stage 1: guide cameras ***************

pub struct CameraPlacement {
    analysis_dir: PathBuf,
    spacing: f64,
    fov: (f64, f64),
    backdrop: Scene,
    layout: Option<CameraLayout>,
}

impl CameraPlacement {
    pub fn new(config: &Config, stars: &[StarRecord]) -> Self {
        Self {
            analysis_dir: config.analysis_directory(),
            spacing: config.guide_camera_spacing_deg(),
            fov: config.guide_camera_fov_deg(),
            backdrop: backdrop(config, stars),
            layout: None,
        }
    }
}

impl Stage for CameraPlacement {
    fn kind(&self) -> StageKind {
        StageKind::Cameras
    }

    fn scene(&self) -> Scene {
        let mut scene = self.backdrop.clone();
        if let Some(layout) = &self.layout {
            draw_cameras(&mut scene, layout);
        }
        scene
    }

    fn on_click(&mut self, click: SkyPoint, selector: &mut dyn CameraSelector) -> Result<()> {
        let camera = selector.select("Which camera center are you trying to place?")?;
        let layout = CameraLayout::anchored(click, camera, self.spacing, self.fov);
        let path = positions::write_camera_layout(&self.analysis_dir, &layout)?;
        info!(
            "{} centered at ({:.6}, {:.6}), layout written to {}",
            camera,
            click.x,
            click.y,
            path.display()
        );
        for other in GuideCamera::ALL {
            let center = layout.center(other);
            debug!("{} center ({:.6}, {:.6})", other, center.x, center.y);
        }
        self.layout = Some(layout);
        Ok(())
    }
}

// *************** Stage 2: fibers ***************

pub struct FiberPlacement {
    analysis_dir: PathBuf,
    plate: PlateScale,
    offsets: [OffsetMm; 4],
    backdrop: Scene,
    layout: CameraLayout,
    clicks: Vec<SkyPoint>,
    fibers: [Option<SkyPoint>; 4],
}

impl FiberPlacement {
    /// Fails if stage 1 never wrote a camera layout.
    pub fn new(config: &Config, stars: &[StarRecord]) -> Result<Self> {
        let analysis_dir = config.analysis_directory();
        let layout = positions::read_camera_layout(&analysis_dir)
            .context("Guide cameras have not been placed yet")?;
        Ok(Self {
            analysis_dir,
            plate: config.plate_scale(),
            offsets: GuideCamera::ALL.map(|camera| config.camera_offset(camera)),
            backdrop: backdrop(config, stars),
            layout,
            clicks: Vec::new(),
            fibers: [None; 4],
        })
    }

    pub fn fiber(&self, camera: GuideCamera) -> Option<SkyPoint> {
        self.fibers[camera.index()]
    }
}

impl Stage for FiberPlacement {
    fn kind(&self) -> StageKind {
        StageKind::Fibers
    }

    fn scene(&self) -> Scene {
        let mut scene = self.backdrop.clone();
        draw_cameras(&mut scene, &self.layout);
        for click in &self.clicks {
            scene.marker(*click, MarkerKind::Click, None);
        }
        for camera in GuideCamera::ALL {
            if let Some(fiber) = self.fiber(camera) {
                scene.marker(fiber, MarkerKind::Fiber, Some(format!("Fiber-{}", camera.number())));
            }
        }
        scene
    }

    fn on_click(&mut self, click: SkyPoint, selector: &mut dyn CameraSelector) -> Result<()> {
        let camera = selector.select("Which camera is the star you are trying to place in?")?;
        if self.layout.camera_at(click) != Some(camera) {
            warn!("Click ({:.6}, {:.6}) is outside the {} footprint", click.x, click.y, camera);
        }

        let fiber = click + self.offsets[camera.index()].to_degrees(self.plate);
        let path = positions::write_fiber_position(&self.analysis_dir, camera, fiber)?;
        info!(
            "Fiber-{} placed at ({:.6}, {:.6}), written to {}",
            camera.number(),
            fiber.x,
            fiber.y,
            path.display()
        );

        self.clicks.push(click);
        self.fibers[camera.index()] = Some(fiber);
        Ok(())
    }
}

// *************** Stage 3: targets ***************

/// Move needed to put a fiber on a chosen star.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiberChange {
    pub fiber: GuideCamera,
    pub target: SkyPoint,
    pub offset: OffsetMm,
}

impl FiberChange {
    pub fn label(&self) -> String {
        format!(
            "Fiber {} Offset X: {:.3}mm Y: {:.3}mm",
            self.fiber.number(),
            self.offset.x,
            self.offset.y
        )
    }
}

pub struct TargetSelection {
    analysis_dir: PathBuf,
    plate: PlateScale,
    backdrop: Scene,
    layout: CameraLayout,
    fibers: [Option<SkyPoint>; 4],
    changes: Vec<FiberChange>,
}

impl TargetSelection {
    /// Loads the camera layout, whichever fibers stage 2 placed, and any moves
    /// saved for those fibers by an earlier run.
    pub fn new(config: &Config, stars: &[StarRecord]) -> Result<Self> {
        let analysis_dir = config.analysis_directory();
        let layout = positions::read_camera_layout(&analysis_dir)
            .context("Guide cameras have not been placed yet")?;

        let mut fibers = [None; 4];
        for camera in GuideCamera::ALL {
            let path = positions::fiber_position_path(&analysis_dir, camera);
            if !path.exists() {
                warn!("No position for Fiber-{}; place it in the fibers stage first", camera.number());
                continue;
            }
            fibers[camera.index()] = Some(positions::read_fiber_position(&analysis_dir, camera)?);
        }

        let plate = config.plate_scale();
        let mut changes = Vec::new();
        for fiber in GuideCamera::ALL {
            let Some(position) = fibers[fiber.index()] else {
                continue;
            };
            if !positions::fiber_change_path(&analysis_dir, fiber).exists() {
                continue;
            }
            let offset = positions::read_fiber_change(&analysis_dir, fiber)?;
            changes.push(FiberChange {
                fiber,
                target: position + offset.to_degrees(plate),
                offset,
            });
        }

        Ok(Self {
            analysis_dir,
            plate,
            backdrop: backdrop(config, stars),
            layout,
            fibers,
            changes,
        })
    }
}

impl Stage for TargetSelection {
    fn kind(&self) -> StageKind {
        StageKind::Targets
    }

    fn scene(&self) -> Scene {
        let mut scene = self.backdrop.clone();
        draw_cameras(&mut scene, &self.layout);
        for camera in GuideCamera::ALL {
            if let Some(fiber) = self.fibers[camera.index()] {
                scene.marker(fiber, MarkerKind::Fiber, Some(format!("Fiber-{}", camera.number())));
            }
        }
        for change in &self.changes {
            scene.marker(change.target, MarkerKind::Target, None);
            scene.annotate(change.target, change.label());
        }
        scene
    }

    fn on_click(&mut self, click: SkyPoint, selector: &mut dyn CameraSelector) -> Result<()> {
        let fiber = selector.select("Which fiber do you want to move to this star?")?;
        let Some(position) = self.fibers[fiber.index()] else {
            warn!("Fiber-{} has no position, ignoring click", fiber.number());
            return Ok(());
        };

        let change = FiberChange {
            fiber,
            target: click,
            offset: OffsetMm::from_degrees(click - position, self.plate),
        };
        let path = positions::write_fiber_change(&self.analysis_dir, fiber, change.offset)?;
        info!("{}, written to {}", change.label(), path.display());

        self.changes.retain(|c| c.fiber != fiber);
        self.changes.push(change);
        Ok(())
    }
}

// *************** Driver ***************

/// Runs the stages from `first` onwards, each until its window is closed.
pub fn run(
    config: &Config,
    stars: &[StarRecord],
    first: StageKind,
    save_snapshots: bool,
    selector: &mut dyn CameraSelector,
) -> Result<()> {
    for kind in StageKind::ALL.into_iter().filter(|kind| *kind >= first) {
        info!("Starting {} stage; right click to place, close the window to continue", kind);
        let mut stage: Box<dyn Stage> = match kind {
            StageKind::Cameras => Box::new(CameraPlacement::new(config, stars)),
            StageKind::Fibers => Box::new(FiberPlacement::new(config, stars)?),
            StageKind::Targets => Box::new(TargetSelection::new(config, stars)?),
        };

        chart::show(stage.as_mut(), selector)?;

        if save_snapshots {
            let path = config.analysis_directory().join(format!("{}.png", kind.name()));
            snapshot::save(&stage.scene(), &path)?;
            info!("Saved {} snapshot to {}", kind, path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    /// Answers prompts from a script.
    struct ScriptedSelector(VecDeque<GuideCamera>);

    impl ScriptedSelector {
        fn new(answers: &[GuideCamera]) -> Self {
            Self(answers.iter().copied().collect())
        }
    }

    impl CameraSelector for ScriptedSelector {
        fn select(&mut self, _prompt: &str) -> Result<GuideCamera> {
            self.0.pop_front().context("no scripted answer left")
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.paths.working_directory = dir.path().to_path_buf();
        std::fs::create_dir_all(config.analysis_directory()).unwrap();
        config
    }

    fn stars() -> Vec<StarRecord> {
        vec![
            StarRecord { ra: 348.4948229, dec: 8.7612697, mag: 11.9 },
            StarRecord { ra: 348.51, dec: 8.74, mag: 14.2 },
        ]
    }

    #[test]
    fn test_stage_kind_parse_and_order() {
        assert_eq!("fibers".parse::<StageKind>().unwrap(), StageKind::Fibers);
        assert!("guides".parse::<StageKind>().is_err());
        assert!(StageKind::Cameras < StageKind::Targets);
        assert_eq!(StageKind::Targets.to_string(), "targets");
    }

    #[test]
    fn test_camera_stage_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let mut stage = CameraPlacement::new(&config, &stars());
        assert_eq!(stage.scene().outlines.len(), 1);

        let click = SkyPoint::new(348.48, 8.78);
        stage
            .on_click(click, &mut ScriptedSelector::new(&[GuideCamera::Three]))
            .unwrap();

        let saved = positions::read_camera_layout(&config.analysis_directory()).unwrap();
        assert_eq!(Some(&saved), stage.layout.as_ref());
        assert_relative_eq!(saved.center(GuideCamera::Three).x, click.x, epsilon = 1e-12);

        let scene = stage.scene();
        assert_eq!(scene.outlines.len(), 5);
        assert_eq!(scene.outlines[4].label, "Guide-4");
    }

    #[test]
    fn test_fiber_stage_needs_camera_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        assert!(FiberPlacement::new(&config, &stars()).is_err());
    }

    #[test]
    fn test_wasp52_fiber_offset() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let center = config.field_center();

        let mut cameras = CameraPlacement::new(&config, &stars());
        cameras
            .on_click(center, &mut ScriptedSelector::new(&[GuideCamera::One]))
            .unwrap();

        let mut fibers = FiberPlacement::new(&config, &stars()).unwrap();
        fibers
            .on_click(center, &mut ScriptedSelector::new(&[GuideCamera::One]))
            .unwrap();

        let fiber = positions::read_fiber_position(&config.analysis_directory(), GuideCamera::One).unwrap();
        assert_relative_eq!(fiber.x - center.x, 0.01004, epsilon = 1e-5);
        assert_relative_eq!(fiber.y - center.y, -0.01004, epsilon = 1e-5);
        assert_eq!(fibers.fiber(GuideCamera::One), Some(fiber));

        let scene = fibers.scene();
        assert_eq!(scene.markers.iter().filter(|m| m.kind == MarkerKind::Click).count(), 1);
        assert_eq!(scene.markers.iter().filter(|m| m.kind == MarkerKind::Fiber).count(), 1);
    }

    #[test]
    fn test_target_stage_reports_mm_move() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let analysis = config.analysis_directory();
        let plate = config.plate_scale();

        let layout = CameraLayout::anchored(
            config.field_center(),
            GuideCamera::One,
            config.guide_camera_spacing_deg(),
            config.guide_camera_fov_deg(),
        );
        positions::write_camera_layout(&analysis, &layout).unwrap();
        let fiber = SkyPoint::new(348.49, 8.76);
        positions::write_fiber_position(&analysis, GuideCamera::Two, fiber).unwrap();

        let mut stage = TargetSelection::new(&config, &stars()).unwrap();
        let target = fiber + OffsetMm::new(1.5, -2.25).to_degrees(plate);
        stage
            .on_click(target, &mut ScriptedSelector::new(&[GuideCamera::Two]))
            .unwrap();

        let saved = positions::read_fiber_change(&analysis, GuideCamera::Two).unwrap();
        assert_relative_eq!(saved.x, 1.5, epsilon = 1e-9);
        assert_relative_eq!(saved.y, -2.25, epsilon = 1e-9);

        assert_eq!(stage.changes.len(), 1);
        assert_eq!(stage.changes[0].label(), "Fiber 2 Offset X: 1.500mm Y: -2.250mm");
        assert_eq!(stage.scene().annotations.len(), 1);
    }

    #[test]
    fn test_target_stage_ignores_unplaced_fiber() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let analysis = config.analysis_directory();
        let layout = CameraLayout::anchored(config.field_center(), GuideCamera::One, 0.09, (0.01, 0.01));
        positions::write_camera_layout(&analysis, &layout).unwrap();

        let mut stage = TargetSelection::new(&config, &stars()).unwrap();
        stage
            .on_click(config.field_center(), &mut ScriptedSelector::new(&[GuideCamera::Four]))
            .unwrap();

        assert!(stage.changes.is_empty());
        assert!(!positions::fiber_change_path(&analysis, GuideCamera::Four).exists());
    }

    #[test]
    fn test_target_stage_reloads_saved_moves() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let analysis = config.analysis_directory();
        let layout = CameraLayout::anchored(config.field_center(), GuideCamera::One, 0.09, (0.01, 0.01));
        positions::write_camera_layout(&analysis, &layout).unwrap();
        let fiber = SkyPoint::new(348.49, 8.76);
        positions::write_fiber_position(&analysis, GuideCamera::Three, fiber).unwrap();
        positions::write_fiber_change(&analysis, GuideCamera::Three, OffsetMm::new(-4.0, 2.5)).unwrap();
        // A move for a fiber without a position is not shown.
        positions::write_fiber_change(&analysis, GuideCamera::Four, OffsetMm::new(1.0, 1.0)).unwrap();

        let stage = TargetSelection::new(&config, &stars()).unwrap();

        assert_eq!(stage.changes.len(), 1);
        let change = stage.changes[0];
        assert_eq!(change.fiber, GuideCamera::Three);
        let expected = fiber + OffsetMm::new(-4.0, 2.5).to_degrees(config.plate_scale());
        assert_relative_eq!(change.target.x, expected.x, epsilon = 1e-12);
        assert_relative_eq!(change.target.y, expected.y, epsilon = 1e-12);
        assert_eq!(stage.scene().annotations[0].text, "Fiber 3 Offset X: -4.000mm Y: 2.500mm");
    }

    #[test]
    fn test_fiber_stage_uses_configured_offset_per_camera() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.instrument.camera_offsets_mm[1] = OffsetMm::new(-2.0, 7.0);
        let layout = CameraLayout::anchored(config.field_center(), GuideCamera::One, 0.09, (0.01, 0.01));
        positions::write_camera_layout(&config.analysis_directory(), &layout).unwrap();

        let mut stage = FiberPlacement::new(&config, &stars()).unwrap();
        let click = SkyPoint::new(348.58, 8.76);
        stage
            .on_click(click, &mut ScriptedSelector::new(&[GuideCamera::Two]))
            .unwrap();

        let expected = click + config.camera_offset(GuideCamera::Two).to_degrees(config.plate_scale());
        assert_eq!(stage.fiber(GuideCamera::Two), Some(expected));
    }

    #[test]
    fn test_target_stage_replaces_previous_move() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let analysis = config.analysis_directory();
        let layout = CameraLayout::anchored(config.field_center(), GuideCamera::One, 0.09, (0.01, 0.01));
        positions::write_camera_layout(&analysis, &layout).unwrap();
        positions::write_fiber_position(&analysis, GuideCamera::One, config.field_center()).unwrap();

        let mut stage = TargetSelection::new(&config, &stars()).unwrap();
        let mut selector = ScriptedSelector::new(&[GuideCamera::One, GuideCamera::One]);
        stage.on_click(SkyPoint::new(348.50, 8.77), &mut selector).unwrap();
        stage.on_click(SkyPoint::new(348.48, 8.75), &mut selector).unwrap();

        assert_eq!(stage.changes.len(), 1);
        assert_eq!(stage.changes[0].target, SkyPoint::new(348.48, 8.75));
    }
}
