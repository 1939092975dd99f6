//! Piecewise-linear lookup for the population density effect on bites.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

impl CurvePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for CurvePoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("density curve needs at least one point")]
    Empty,
    #[error("density curve point {index} is not finite")]
    NonFinite { index: usize },
    #[error("density curve x values must strictly increase (point {index}: {current} after {previous})")]
    NotIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },
}

/// Immutable table of control points, x strictly increasing.
///
/// Points are validated as given and never re-sorted. An empty curve only
/// exists through [`DensityEffectCurve::neutral`] and looks up as 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DensityEffectCurve {
    points: Vec<CurvePoint>,
}

impl DensityEffectCurve {
    pub fn load<I, P>(points: I) -> Result<Self, CurveError>
    where
        I: IntoIterator<Item = P>,
        P: Into<CurvePoint>,
    {
        let points: Vec<CurvePoint> = points.into_iter().map(Into::into).collect();
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        for (index, point) in points.iter().enumerate() {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if index > 0 {
                let previous = points[index - 1].x;
                if point.x <= previous {
                    return Err(CurveError::NotIncreasing {
                        index,
                        previous,
                        current: point.x,
                    });
                }
            }
            tracing::debug!(index, x = point.x, y = point.y, "loaded density curve point");
        }
        Ok(Self { points })
    }

    /// Degraded-mode curve: every lookup returns the neutral multiplier.
    pub fn neutral() -> Self {
        Self { points: Vec::new() }
    }

    /// Single-point curve, constant `y` everywhere.
    pub fn flat(y: f64) -> Result<Self, CurveError> {
        Self::load([CurvePoint::new(0.0, y)])
    }

    /// Reference table for the density effect on zombie bites.
    pub fn standard() -> Self {
        let points = [
            (0.0, 0.014),
            (0.2, 0.041),
            (0.4, 0.101),
            (0.6, 0.189),
            (0.8, 0.433),
            (1.0, 1.0),
            (1.2, 1.217),
            (1.4, 1.282),
            (1.6, 1.3),
            (1.8, 1.3),
            (2.0, 1.3),
        ];
        Self {
            points: points.into_iter().map(CurvePoint::from).collect(),
        }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn is_neutral(&self) -> bool {
        self.points.is_empty()
    }

    /// Interpolated multiplier at `x`, clamped to the end points.
    /// A NaN input gets the neutral 1.0.
    pub fn lookup(&self, x: f64) -> f64 {
        if x.is_nan() {
            return 1.0;
        }
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 1.0,
        };
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        // first index with points[i].x >= x; in 1..len since x is a number strictly inside the table
        let i = self.points.partition_point(|p| p.x < x);
        let (p0, p1) = (self.points[i - 1], self.points[i]);
        let t = (x - p0.x) / (p1.x - p0.x);
        p0.y + t * (p1.y - p0.y)
    }
}
