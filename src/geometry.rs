//! Geometry module.
//! Sky-plane points, rectangular footprints and the plate-scale conversion
//! between focal-plane millimeters and on-sky degrees.
//! Sky coordinates are plain (ra, dec) degrees treated as a flat plane; the
//! fields we plan are a few arcminutes across.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

const ARCSEC_PER_DEG: f64 = 3600.0;

/// A point on the sky plane in degrees (x = right ascension, y = declination).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkyPoint {
    pub x: f64,
    pub y: f64,
}

impl SkyPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for SkyPoint {
    type Output = SkyPoint;

    fn add(self, rhs: SkyPoint) -> SkyPoint {
        SkyPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for SkyPoint {
    type Output = SkyPoint;

    fn sub(self, rhs: SkyPoint) -> SkyPoint {
        SkyPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Telescope plate scale in arcsec per millimeter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlateScale(pub f64);

impl PlateScale {
    /// Focal-plane millimeters to sky degrees: `mm * scale / 3600`.
    pub fn mm_to_deg(self, mm: f64) -> f64 {
        mm * self.0 / ARCSEC_PER_DEG
    }

    /// Sky degrees to focal-plane millimeters: `deg * 3600 / scale`.
    pub fn deg_to_mm(self, deg: f64) -> f64 {
        deg * ARCSEC_PER_DEG / self.0
    }
}

/// Displacement on the focal plane in millimeters. Positive is right / up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetMm {
    pub x: f64,
    pub y: f64,
}

impl OffsetMm {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_degrees(self, scale: PlateScale) -> SkyPoint {
        SkyPoint::new(scale.mm_to_deg(self.x), scale.mm_to_deg(self.y))
    }

    /// Millimeter offset equivalent to a sky-plane displacement.
    pub fn from_degrees(delta: SkyPoint, scale: PlateScale) -> Self {
        Self::new(scale.deg_to_mm(delta.x), scale.deg_to_mm(delta.y))
    }
}

/// Closed rectangle outline: five vertices, first == last.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxOutline {
    pub points: [SkyPoint; 5],
}

impl BoxOutline {
    /// Outline of a `size_x` by `size_y` box centered on `center`, traced
    /// (x1,y1) (x1,y2) (x2,y2) (x2,y1) (x1,y1).
    pub fn around(center: SkyPoint, size_x: f64, size_y: f64) -> Self {
        let x1 = center.x - size_x / 2.0;
        let x2 = center.x + size_x / 2.0;
        let y1 = center.y - size_y / 2.0;
        let y2 = center.y + size_y / 2.0;

        Self {
            points: [
                SkyPoint::new(x1, y1),
                SkyPoint::new(x1, y2),
                SkyPoint::new(x2, y2),
                SkyPoint::new(x2, y1),
                SkyPoint::new(x1, y1),
            ],
        }
    }

    /// Where the outline's label is drawn.
    pub fn anchor(&self) -> SkyPoint {
        self.points[0]
    }

    pub fn center(&self) -> SkyPoint {
        let [a, _, c, _, _] = self.points;
        SkyPoint::new((a.x + c.x) / 2.0, (a.y + c.y) / 2.0)
    }

    pub fn width(&self) -> f64 {
        (self.points[2].x - self.points[0].x).abs()
    }

    pub fn height(&self) -> f64 {
        (self.points[2].y - self.points[0].y).abs()
    }

    pub fn contains(&self, p: SkyPoint) -> bool {
        let [a, _, c, _, _] = self.points;
        let (lo_x, hi_x) = (a.x.min(c.x), a.x.max(c.x));
        let (lo_y, hi_y) = (a.y.min(c.y), a.y.max(c.y));
        (lo_x..=hi_x).contains(&p.x) && (lo_y..=hi_y).contains(&p.y)
    }
}
