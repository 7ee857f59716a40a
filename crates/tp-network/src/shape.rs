//! Polyline geometry for lanes and edges.
//!
//! Offsets are measured along the polyline from its first point.  Lateral
//! offsets are perpendicular to the segment the offset falls on; positive
//! values lie to the right of the direction of travel.

use tp_core::Position;

/// An open polyline.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub points: Vec<Position>,
}

impl Shape {
    pub fn new(points: Vec<Position>) -> Self {
        Self { points }
    }

    /// Geometric length: the sum of segment lengths.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Locate the segment containing `pos`.
    ///
    /// Returns `(start, end, offset within segment)`.  `pos` is clamped to
    /// `[0, length]`.
    fn segment_at(&self, pos: f64) -> Option<(Position, Position, f64)> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let pos = pos.clamp(0.0, self.length());
        let mut travelled = 0.0;
        for (i, w) in self.points.windows(2).enumerate() {
            let seg_len = w[0].distance(w[1]);
            if pos <= travelled + seg_len || i == n - 2 {
                return Some((w[0], w[1], pos - travelled));
            }
            travelled += seg_len;
        }
        None
    }

    /// Point at `pos` along the shape, moved `lateral` metres to the right.
    ///
    /// Shapes with fewer than two points return their only point (or the
    /// origin when empty); zero-length segments ignore `lateral`.
    pub fn position_at_offset(&self, pos: f64, lateral: f64) -> Position {
        let Some((a, b, along)) = self.segment_at(pos) else {
            return self.points.first().copied().unwrap_or_default();
        };
        let seg_len = a.distance(b);
        if seg_len <= 0.0 {
            return a;
        }
        let p = a.lerp(b, along / seg_len);
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        p.offset(dy * lateral / seg_len, -dx * lateral / seg_len)
    }

    /// Heading of the segment containing `pos`, in radians.
    pub fn rotation_at_offset(&self, pos: f64) -> f64 {
        match self.segment_at(pos) {
            Some((a, b, _)) => a.angle_to(b),
            None => 0.0,
        }
    }

    /// A copy of this shape moved `amount` metres to the right of each
    /// segment.  Interior points use the average of the adjacent normals.
    pub fn shifted(&self, amount: f64) -> Shape {
        let n = self.points.len();
        if n < 2 || amount == 0.0 {
            return self.clone();
        }
        let normals: Vec<(f64, f64)> = self
            .points
            .windows(2)
            .map(|w| {
                let len = w[0].distance(w[1]);
                if len <= 0.0 {
                    (0.0, 0.0)
                } else {
                    ((w[1].y - w[0].y) / len, -(w[1].x - w[0].x) / len)
                }
            })
            .collect();
        let points = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let (nx, ny) = if i == 0 {
                    normals[0]
                } else if i == n - 1 {
                    normals[n - 2]
                } else {
                    let (ax, ay) = normals[i - 1];
                    let (bx, by) = normals[i];
                    ((ax + bx) / 2.0, (ay + by) / 2.0)
                };
                p.offset(nx * amount, ny * amount)
            })
            .collect();
        Shape { points }
    }
}
