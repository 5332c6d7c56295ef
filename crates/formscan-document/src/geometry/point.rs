// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain 2D value types: points, vectors with cached length, bounding boxes.

use serde::Serialize;

/// A point in continuous image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        self.vector_to(other).len
    }

    /// Vector from `self` to `other`.
    pub fn vector_to(&self, other: Point) -> Vector {
        Vector::new(other.x - self.x, other.y - self.y)
    }
}

/// A displacement with its length computed once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
    pub len: f64,
}

impl Vector {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            len: (dx * dx + dy * dy).sqrt(),
        }
    }

    /// Unit vector along the positive x axis.
    pub fn unit_x() -> Self {
        Self::new(1.0, 0.0)
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        self.dx * other.dx + self.dy * other.dy
    }

    pub fn cross(&self, other: &Vector) -> f64 {
        self.dx * other.dy - self.dy * other.dx
    }

    pub fn cos_between(&self, other: &Vector) -> f64 {
        self.dot(other) / (self.len * other.len)
    }

    pub fn sin_between(&self, other: &Vector) -> f64 {
        self.cross(other) / (self.len * other.len)
    }
}

/// Inclusive integer bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box containing every point, or `None` for no points.
    pub fn enclosing(points: impl IntoIterator<Item = (u32, u32)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bbox.include(x, y);
        }
        Some(bbox)
    }

    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Horizontal extent `max_x - min_x`.
    pub fn span_x(&self) -> u32 {
        self.max_x - self.min_x
    }

    /// Vertical extent `max_y - min_y`.
    pub fn span_y(&self) -> u32 {
        self.max_y - self.min_y
    }

    /// Covered area as `span_x * span_y`, the measure fields are filtered by.
    pub fn span_area(&self) -> u64 {
        self.span_x() as u64 * self.span_y() as u64
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}
