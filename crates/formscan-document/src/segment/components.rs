// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connected-component labeling by breadth-first flood fill, with an optional
// running-mean intensity tolerance and a pressure rule that keeps grown
// components from leaking through one-pixel bridges.

use std::collections::VecDeque;

use formscan_core::config::LabelingConfig;
use tracing::{debug, instrument};

use crate::geometry::{BoundingBox, Point};
use crate::raster::Raster;

const UNLABELED: u32 = u32::MAX;

/// Neighbourhood used when growing a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(1, 0), (0, 1), (0, -1), (-1, 0)];
        const EIGHT: [(i64, i64); 8] = [
            (1, 0),
            (0, 1),
            (0, -1),
            (-1, 0),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ];
        match self {
            Self::Four => &FOUR,
            Self::Eight => &EIGHT,
        }
    }
}

/// Pixels sharing connectivity under a predicate, in admission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    points: Vec<(u32, u32)>,
}

impl Component {
    pub fn new(points: Vec<(u32, u32)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(u32, u32)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(self.points.iter().copied())
    }

    /// Mean pixel position, or `None` for an empty component.
    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        Some(Point::new(sx / n, sy / n))
    }
}

/// Result of a labeling pass: components in discovery order plus the
/// per-pixel label map.
#[derive(Debug, Clone)]
pub struct Labeling {
    components: Vec<Component>,
    labels: Vec<u32>,
    width: u32,
}

impl Labeling {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn into_components(self) -> Vec<Component> {
        self.components
    }

    /// Component index of a pixel, `None` for unlabeled or out-of-bounds.
    pub fn label_at(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        match self.labels.get(idx) {
            Some(&UNLABELED) | None => None,
            Some(&label) => Some(label as usize),
        }
    }
}

/// Flood-fill labeler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Labeler {
    connectivity: Connectivity,
    /// `None` admits any foreground neighbour.
    tolerance: Option<f64>,
    capacity: u32,
    min_component_size: usize,
}

impl Labeler {
    /// Plain labeling: every foreground neighbour joins.
    pub fn exact(connectivity: Connectivity) -> Self {
        Self {
            connectivity,
            tolerance: None,
            capacity: 1,
            min_component_size: 0,
        }
    }

    /// Intensity-adaptive labeling with leak limiting.
    pub fn adaptive(connectivity: Connectivity, config: &LabelingConfig) -> Self {
        Self {
            connectivity,
            tolerance: Some(config.tolerance),
            capacity: config.capacity.max(1),
            min_component_size: config.min_component_size,
        }
    }

    /// Label every foreground pixel of `raster`.
    ///
    /// Seeds are taken in raster order (rows top to bottom, left to right).
    /// A neighbour joins the growing component when it is foreground,
    /// unlabeled and, with a tolerance set, within that tolerance of the
    /// component's running mean intensity. Once the component holds
    /// `min_component_size` pixels a neighbour must additionally be offered
    /// `capacity` times before it is admitted. Refused pixels stay unlabeled
    /// and seed their own component later, so every foreground pixel ends
    /// up in exactly one component.
    #[instrument(skip(self, raster, is_foreground), fields(width = raster.width(), height = raster.height()))]
    pub fn label(&self, raster: &Raster, is_foreground: impl Fn(u8) -> bool) -> Labeling {
        let (w, h) = (raster.width() as i64, raster.height() as i64);
        let pixels = raster.pixels();
        let mut labels = vec![UNLABELED; pixels.len()];
        let mut pressure = vec![0u32; if self.capacity > 1 { pixels.len() } else { 0 }];
        let mut pressured: Vec<usize> = Vec::new();
        let mut components: Vec<Component> = Vec::new();
        let mut queue: VecDeque<(i64, i64)> = VecDeque::new();

        for seed in 0..pixels.len() {
            if labels[seed] != UNLABELED || !is_foreground(pixels[seed]) {
                continue;
            }
            let current = components.len() as u32;
            let (sx, sy) = ((seed as i64) % w, (seed as i64) / w);
            let mut points = vec![(sx as u32, sy as u32)];
            let mut intensity_sum = pixels[seed] as f64;
            labels[seed] = current;
            queue.push_back((sx, sy));

            while let Some((x, y)) = queue.pop_front() {
                for &(ox, oy) in self.connectivity.offsets() {
                    let (nx, ny) = (x + ox, y + oy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let idx = (ny * w + nx) as usize;
                    let value = pixels[idx];
                    if labels[idx] != UNLABELED || !is_foreground(value) {
                        continue;
                    }
                    if let Some(tolerance) = self.tolerance {
                        let mean = intensity_sum / points.len() as f64;
                        if (value as f64 - mean).abs() >= tolerance {
                            continue;
                        }
                    }
                    let admit = points.len() < self.min_component_size
                        || self.capacity <= 1
                        || pressure[idx] + 1 >= self.capacity;
                    if admit {
                        labels[idx] = current;
                        intensity_sum += value as f64;
                        points.push((nx as u32, ny as u32));
                        queue.push_back((nx, ny));
                    } else {
                        if pressure[idx] == 0 {
                            pressured.push(idx);
                        }
                        pressure[idx] += 1;
                    }
                }
            }

            // Pressure is local to one component.
            for idx in pressured.drain(..) {
                pressure[idx] = 0;
            }
            components.push(Component::new(points));
        }

        debug!(components = components.len(), "Labeling complete");
        Labeling {
            components,
            labels,
            width: raster.width(),
        }
    }
}
