//! Guide camera module.
//! The four DFPS guide cameras sit on a fixed 2x2 grid. Clicking any one of
//! them pins the whole grid, so the layout only needs the click, which camera
//! was clicked and the center-to-center spacing.

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;

use crate::geometry::{BoxOutline, SkyPoint};

/// Guide camera (and the fiber mounted next to it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuideCamera {
    One,
    Two,
    Three,
    Four,
}

impl GuideCamera {
    pub const ALL: [GuideCamera; 4] = [
        GuideCamera::One,
        GuideCamera::Two,
        GuideCamera::Three,
        GuideCamera::Four,
    ];

    /// Zero-based position in per-camera arrays.
    pub fn index(self) -> usize {
        match self {
            GuideCamera::One => 0,
            GuideCamera::Two => 1,
            GuideCamera::Three => 2,
            GuideCamera::Four => 3,
        }
    }

    /// One-based number used in labels and file names.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Grid position in units of the camera spacing, relative to camera 1.
    /// Orientation follows the DFPS planning script: camera 3 sits below camera 1, not above.
    fn grid(self) -> (f64, f64) {
        match self {
            GuideCamera::One => (0.0, 0.0),
            GuideCamera::Two => (1.0, 0.0),
            GuideCamera::Three => (0.0, -1.0),
            GuideCamera::Four => (1.0, -1.0),
        }
    }
}

impl fmt::Display for GuideCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guide-{}", self.number())
    }
}

impl FromStr for GuideCamera {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(GuideCamera::One),
            "2" => Ok(GuideCamera::Two),
            "3" => Ok(GuideCamera::Three),
            "4" => Ok(GuideCamera::Four),
            other => bail!("Unknown guide camera '{}', expected 1-4", other),
        }
    }
}

/// Footprints of all four guide cameras, indexed by `GuideCamera::index`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraLayout {
    pub outlines: [BoxOutline; 4],
}

impl CameraLayout {
    /// Places `clicked` at `click` and the other cameras `spacing` degrees
    /// away on the grid. `fov` is the (x, y) footprint of one camera.
    pub fn anchored(click: SkyPoint, clicked: GuideCamera, spacing: f64, fov: (f64, f64)) -> Self {
        let (ax, ay) = clicked.grid();
        let outlines = GuideCamera::ALL.map(|camera| {
            let (gx, gy) = camera.grid();
            let center = SkyPoint::new(click.x + (gx - ax) * spacing, click.y + (gy - ay) * spacing);
            BoxOutline::around(center, fov.0, fov.1)
        });
        Self { outlines }
    }

    pub fn outline(&self, camera: GuideCamera) -> &BoxOutline {
        &self.outlines[camera.index()]
    }

    pub fn center(&self, camera: GuideCamera) -> SkyPoint {
        self.outline(camera).center()
    }

    /// Camera whose footprint contains `p`, if any.
    pub fn camera_at(&self, p: SkyPoint) -> Option<GuideCamera> {
        GuideCamera::ALL
            .into_iter()
            .find(|camera| self.outline(*camera).contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SPACING: f64 = 45.0 * 7.23 / 3600.0;
    const FOV: (f64, f64) = (0.0077, 0.0104);

    fn assert_point_eq(a: SkyPoint, b: SkyPoint) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-12);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
    }

    #[test]
    fn test_clicked_camera_is_centered_on_click() {
        let click = SkyPoint::new(348.5, 8.76);
        for camera in GuideCamera::ALL {
            let layout = CameraLayout::anchored(click, camera, SPACING, FOV);
            assert_point_eq(layout.center(camera), click);
        }
    }

    #[test]
    fn test_centers_are_spacing_apart_for_every_anchor() {
        let click = SkyPoint::new(348.5, 8.76);
        for camera in GuideCamera::ALL {
            let layout = CameraLayout::anchored(click, camera, SPACING, FOV);
            let c1 = layout.center(GuideCamera::One);
            let c2 = layout.center(GuideCamera::Two);
            let c3 = layout.center(GuideCamera::Three);
            let c4 = layout.center(GuideCamera::Four);

            // 1 -> 2 and 3 -> 4 step right, 1 -> 3 and 2 -> 4 step down.
            assert_point_eq(c2 - c1, SkyPoint::new(SPACING, 0.0));
            assert_point_eq(c4 - c3, SkyPoint::new(SPACING, 0.0));
            assert_point_eq(c3 - c1, SkyPoint::new(0.0, -SPACING));
            assert_point_eq(c4 - c2, SkyPoint::new(0.0, -SPACING));
        }
    }

    #[test]
    fn test_layout_is_independent_of_clicked_camera() {
        let click = SkyPoint::new(10.0, 20.0);
        let from_one = CameraLayout::anchored(click, GuideCamera::One, SPACING, FOV);
        let click_four = from_one.center(GuideCamera::Four);
        let from_four = CameraLayout::anchored(click_four, GuideCamera::Four, SPACING, FOV);

        for camera in GuideCamera::ALL {
            assert_point_eq(from_one.center(camera), from_four.center(camera));
        }
    }

    #[test]
    fn test_footprints_use_fov() {
        let layout = CameraLayout::anchored(SkyPoint::new(0.0, 0.0), GuideCamera::Two, SPACING, FOV);
        for outline in &layout.outlines {
            assert_relative_eq!(outline.width(), FOV.0, epsilon = 1e-12);
            assert_relative_eq!(outline.height(), FOV.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_camera_at() {
        let layout = CameraLayout::anchored(SkyPoint::new(0.0, 0.0), GuideCamera::One, SPACING, FOV);
        assert_eq!(layout.camera_at(SkyPoint::new(SPACING, -SPACING)), Some(GuideCamera::Four));
        assert_eq!(layout.camera_at(SkyPoint::new(SPACING / 2.0, 0.0)), None);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("3".parse::<GuideCamera>().unwrap(), GuideCamera::Three);
        assert_eq!(" 1\n".parse::<GuideCamera>().unwrap(), GuideCamera::One);
        assert!("5".parse::<GuideCamera>().is_err());
        assert!("two".parse::<GuideCamera>().is_err());
        assert_eq!(GuideCamera::Two.to_string(), "Guide-2");
        assert_eq!(GuideCamera::from_index(3), Some(GuideCamera::Four));
        assert_eq!(GuideCamera::from_index(4), None);
    }
}
