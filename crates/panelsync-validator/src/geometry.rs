//! Element bounds

use serde_json::{Map, Value};

/// Axis-aligned element bounds in panel pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Read a four-field numeric position object
    ///
    /// Returns the names of missing or non-numeric fields on failure.
    pub fn from_position(position: &Map<String, Value>) -> Result<Self, Vec<&'static str>> {
        let field = |name: &'static str| position.get(name).and_then(Value::as_f64).ok_or(name);
        let (x, y, w, h) = (field("x"), field("y"), field("width"), field("height"));
        match (x, y, w, h) {
            (Ok(x), Ok(y), Ok(width), Ok(height)) => Ok(Self {
                x,
                y,
                width,
                height,
            }),
            (x, y, w, h) => Err([x.err(), y.err(), w.err(), h.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }

    /// Area of the intersection with another rectangle (0 when disjoint or touching)
    #[must_use]
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }

    /// Whether both sides reach `min`
    #[inline]
    #[must_use]
    pub fn fits_touch_target(&self, min: f64) -> bool {
        self.width >= min && self.height >= min
    }
}
