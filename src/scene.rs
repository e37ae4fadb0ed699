//! What a stage shows: stars, footprints, markers and text, in sky degrees.
//! Both the interactive chart and the PNG snapshot draw from this.

use crate::catalog::StarRecord;
use crate::geometry::{BoxOutline, SkyPoint};

/// Faintest magnitude that still gets a visible marker.
const FAINT_LIMIT: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutlineKind {
    Telescope,
    GuideCamera,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// Raw click position.
    Click,
    Fiber,
    /// Star a fiber is being moved to.
    Target,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outline {
    pub outline: BoxOutline,
    pub kind: OutlineKind,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub position: SkyPoint,
    pub kind: MarkerKind,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub position: SkyPoint,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub stars: Vec<StarRecord>,
    pub outlines: Vec<Outline>,
    pub markers: Vec<Marker>,
    pub annotations: Vec<Annotation>,
}

impl Scene {
    /// Stars plus the telescope field of view, the backdrop of every stage.
    pub fn field(stars: &[StarRecord], telescope: BoxOutline) -> Self {
        Self {
            stars: stars.to_vec(),
            outlines: vec![Outline {
                outline: telescope,
                kind: OutlineKind::Telescope,
                label: "Telescope".to_string(),
            }],
            ..Default::default()
        }
    }

    pub fn outline(&mut self, outline: BoxOutline, kind: OutlineKind, label: impl Into<String>) {
        self.outlines.push(Outline {
            outline,
            kind,
            label: label.into(),
        });
    }

    pub fn marker(&mut self, position: SkyPoint, kind: MarkerKind, label: Option<String>) {
        self.markers.push(Marker { position, kind, label });
    }

    pub fn annotate(&mut self, position: SkyPoint, text: impl Into<String>) {
        self.annotations.push(Annotation {
            position,
            text: text.into(),
        });
    }

    /// Smallest box holding everything in the scene, as (min, max).
    pub fn bounds(&self) -> Option<(SkyPoint, SkyPoint)> {
        let points = self
            .stars
            .iter()
            .map(|s| SkyPoint::new(s.ra, s.dec))
            .chain(self.outlines.iter().flat_map(|o| o.outline.points))
            .chain(self.markers.iter().map(|m| m.position))
            .chain(self.annotations.iter().map(|a| a.position));

        points.fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((
                SkyPoint::new(lo.x.min(p.x), lo.y.min(p.y)),
                SkyPoint::new(hi.x.max(p.x), hi.y.max(p.y)),
            )),
        })
    }
}

/// Marker area for a star, brighter stars are bigger. Never below 1.
pub fn star_area(mag: f64) -> f64 {
    ((FAINT_LIMIT - mag) * 10.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_scene_has_telescope() {
        let stars = [StarRecord { ra: 1.0, dec: 2.0, mag: 12.0 }];
        let scene = Scene::field(&stars, BoxOutline::around(SkyPoint::new(1.0, 2.0), 0.1, 0.1));
        assert_eq!(scene.stars.len(), 1);
        assert_eq!(scene.outlines.len(), 1);
        assert_eq!(scene.outlines[0].kind, OutlineKind::Telescope);
        assert_eq!(scene.outlines[0].label, "Telescope");
    }

    #[test]
    fn test_bounds_cover_everything() {
        let mut scene = Scene::field(
            &[StarRecord { ra: 10.0, dec: 5.0, mag: 9.0 }],
            BoxOutline::around(SkyPoint::new(10.0, 5.0), 1.0, 1.0),
        );
        scene.marker(SkyPoint::new(12.0, 4.0), MarkerKind::Fiber, None);
        scene.annotate(SkyPoint::new(9.0, 7.0), "note");

        let (lo, hi) = scene.bounds().unwrap();
        assert_eq!(lo, SkyPoint::new(9.0, 4.0));
        assert_eq!(hi, SkyPoint::new(12.0, 7.0));
        assert_eq!(Scene::default().bounds(), None);
    }

    #[test]
    fn test_star_area() {
        assert_eq!(star_area(10.0), 100.0);
        assert!(star_area(8.0) > star_area(15.0));
        assert_eq!(star_area(25.0), 1.0);
    }
}
