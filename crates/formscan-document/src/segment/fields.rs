// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field segmentation — find the bordered answer boxes on a rectified page.

use std::collections::VecDeque;

use formscan_core::config::{FieldLayout, SegmentationConfig};
use formscan_core::types::{FieldRole, SheetFormat};
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::components::{Component, Connectivity, Labeler, Labeling};
use super::union_find::UnionFind;
use crate::geometry::BoundingBox;
use crate::raster::Raster;
use crate::threshold::binarize_otsu;

// -- Preprocessing ------------------------------------------------------------

/// Grayscale copy with ink as the high value.
pub fn ink_image(rectified: &Raster) -> Raster {
    let mut ink = rectified.clone();
    ink.invert();
    ink
}

/// Flatten soft shading into the paper.
///
/// Every pixel at or below `seed_level` seeds a 4-neighbour fill that
/// crosses only steps smaller than `step` in the original intensities.
/// Everything the fill reaches becomes 0.
pub fn smooth_gradient(raster: &mut Raster, seed_level: u8, step: u8) {
    let original = raster.clone();
    let (w, h) = (raster.width() as i64, raster.height() as i64);
    let mut visited = vec![false; original.pixels().len()];
    let mut queue: VecDeque<(i64, i64)> = VecDeque::new();

    for (idx, &value) in original.pixels().iter().enumerate() {
        if value <= seed_level {
            visited[idx] = true;
            queue.push_back((idx as i64 % w, idx as i64 / w));
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        raster.set(x, y, 0);
        let here = original.get(x, y) as i16;
        for (dx, dy) in [(-1, 0), (0, -1), (0, 1), (1, 0)] {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            let idx = (ny * w + nx) as usize;
            if visited[idx] || (original.get(nx, ny) as i16 - here).abs() >= step as i16 {
                continue;
            }
            visited[idx] = true;
            queue.push_back((nx, ny));
        }
    }
}

/// Clear isolated ink in the left-hand margin: a 255 pixel with fewer than
/// two 255 4-neighbours becomes 0. Updates are visible to later pixels.
pub fn remove_margin_specks(raster: &mut Raster, margin_fraction: f64) {
    let margin = (raster.width() as f64 * margin_fraction) as i64;
    for x in 0..margin {
        for y in 0..raster.height() as i64 {
            if raster.get(x, y) != 255 {
                continue;
            }
            let lit = [(-1, 0), (0, -1), (0, 1), (1, 0)]
                .iter()
                .filter(|(dx, dy)| raster.get(x + dx, y + dy) == 255)
                .count();
            if lit < 2 {
                raster.set(x, y, 0);
            }
        }
    }
}

// -- Slicing ------------------------------------------------------------------

/// Half-open x ranges of the `blocks` equal-width slices of a field.
///
/// The width is rounded and every slice is clamped to `bounds.max_x`, so
/// when the span does not divide evenly the last slice is the odd one.
pub fn slice_bounds(bounds: &BoundingBox, blocks: usize) -> Vec<(u32, u32)> {
    if blocks == 0 {
        return Vec::new();
    }
    let width = (bounds.span_x() as f64 / blocks as f64).round() as u32;
    (0..blocks as u32)
        .map(|block| {
            let end = (bounds.min_x + width * (block + 1)).min(bounds.max_x);
            let start = (bounds.min_x + width * block).min(end);
            (start, end)
        })
        .collect()
}

/// Pixel rectangle of one character cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// The slice `block` of `bounds`, shrunk away from the field's own border
/// ink: twice the border on the left, the border (at least one pixel) on
/// the right, top and bottom.
pub fn cell_rect(bounds: &BoundingBox, block: usize, blocks: usize, border: u32) -> Option<CellRect> {
    let (start, finish) = *slice_bounds(bounds, blocks).get(block)?;
    let border = border as i64;
    let x0 = start as i64 + 2 * border;
    let x1 = finish as i64 - border.max(1);
    let y0 = bounds.min_y as i64 + border;
    let y1 = bounds.max_y as i64 - border;
    Some(CellRect {
        x: x0,
        y: y0,
        width: (x1 - x0).max(0) as u32,
        height: (y1 - y0).max(0) as u32,
    })
}

// -- Fields -------------------------------------------------------------------

/// A bordered box and the ink components that make it up.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub bounds: BoundingBox,
    pub role: FieldRole,
    pub components: Vec<Component>,
}

impl Field {
    pub fn layout<'a>(&self, config: &'a SegmentationConfig) -> &'a FieldLayout {
        match self.role {
            FieldRole::Header => &config.header,
            FieldRole::Answer => &config.answers,
        }
    }
}

#[derive(Debug)]
struct Group {
    bounds: BoundingBox,
    members: Vec<usize>,
}

/// Union components whose ink appears close together.
///
/// Rows are scanned top to bottom and columns left to right. For column `i`
/// of row `j` the window covers columns `(i - kernel_x, i]` and rows
/// `(j - kernel_y, j]`. Every component with ink in column `i` of the window
/// joins an accumulator; the accumulator resets whenever the window holds
/// no ink at all.
pub fn merge_nearby(labeling: &Labeling, width: u32, height: u32, kernel_x: usize, kernel_y: usize) -> UnionFind {
    let mut dsu = UnionFind::new(labeling.components().len());
    for j in 0..height as usize {
        let rows = (0..kernel_y.min(j + 1)).map(move |k| (j - k) as u32);
        let mut accumulator: Option<usize> = None;
        let mut inked = 0usize;
        for i in 0..width as usize {
            if i >= kernel_x {
                let leaving = (i - kernel_x) as u32;
                let gone = rows
                    .clone()
                    .filter(|&y| labeling.label_at(leaving, y).is_some())
                    .count();
                inked = inked.saturating_sub(gone);
            }
            if inked == 0 {
                accumulator = None;
            }
            for y in rows.clone() {
                if let Some(label) = labeling.label_at(i as u32, y) {
                    let root = match accumulator {
                        Some(acc) => dsu.union(acc, label),
                        None => dsu.find(label),
                    };
                    accumulator = Some(root);
                    inked += 1;
                }
            }
        }
    }
    dsu
}

/// Locates fields on rectified pages.
#[derive(Debug, Clone)]
pub struct FieldSegmenter {
    config: SegmentationConfig,
}

impl FieldSegmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Binary ink mask: invert, smooth shading, Otsu, clear margin specks.
    #[instrument(skip(self, rectified), fields(width = rectified.width(), height = rectified.height()))]
    pub fn ink_mask(&self, rectified: &Raster) -> Raster {
        let mut mask = ink_image(rectified);
        smooth_gradient(
            &mut mask,
            self.config.smoothing_seed_level,
            self.config.smoothing_step,
        );
        binarize_otsu(&mut mask);
        remove_margin_specks(&mut mask, self.config.speck_margin_fraction);
        mask
    }

    /// Segment a rectified page into fields, header fields first.
    ///
    /// Header fields are the first `header_fields` groups the header layout
    /// keeps, in discovery order: groups are found scanning rows top to
    /// bottom, so the topmost field comes first and fields starting on the
    /// same row go left to right. They are not re-sorted by x, so a header
    /// field sitting higher up wins over one further left. Answer fields are
    /// the groups the answer layout keeps that do not overlap a header field.
    #[instrument(skip(self, rectified), fields(width = rectified.width(), height = rectified.height()))]
    pub fn segment(&self, rectified: &Raster, format: SheetFormat) -> Vec<Field> {
        let mask = self.ink_mask(rectified);
        let labeling = Labeler::exact(Connectivity::Four).label(&mask, |v| v == 255);
        debug!(
            components = labeling.components().len(),
            "Ink components labeled"
        );

        let header_count = format.header_fields(self.config.header_fields);
        let mut fields: Vec<Field> = Vec::new();
        if header_count > 0 {
            let headers = self.groups(&labeling, &mask, &self.config.header);
            fields.extend(
                headers
                    .into_iter()
                    .take(header_count)
                    .map(|group| build_field(&labeling, group, FieldRole::Header)),
            );
        }

        let header_bounds: Vec<BoundingBox> = fields.iter().map(|f| f.bounds).collect();
        for group in self.groups(&labeling, &mask, &self.config.answers) {
            if header_bounds.iter().any(|b| b.intersects(&group.bounds)) {
                continue;
            }
            fields.push(build_field(&labeling, group, FieldRole::Answer));
        }

        info!(
            fields = fields.len(),
            header = header_bounds.len(),
            "Fields segmented"
        );
        fields
    }

    /// Merged groups large enough to be fields under `layout`, in order of
    /// first discovery.
    fn groups(&self, labeling: &Labeling, mask: &Raster, layout: &FieldLayout) -> Vec<Group> {
        let (w, h) = (mask.width(), mask.height());
        let (kernel_x, kernel_y) = (layout.kernel_x(w), layout.kernel_y(h));
        let min_area = layout.min_field_area(mask.pixel_count());

        let mut dsu = merge_nearby(labeling, w, h, kernel_x, kernel_y);
        let groups: Vec<Group> = dsu
            .groups()
            .into_iter()
            .filter_map(|members| {
                let bounds = members
                    .iter()
                    .filter_map(|&m| labeling.components()[m].bounding_box())
                    .reduce(|acc, b| acc.union(&b))?;
                Some(Group { bounds, members })
            })
            .filter(|group| group.bounds.span_area() >= min_area)
            .collect();
        debug!(kernel_x, kernel_y, min_area, kept = groups.len(), "Border groups merged");
        groups
    }
}

fn build_field(labeling: &Labeling, group: Group, role: FieldRole) -> Field {
    Field {
        bounds: group.bounds,
        role,
        components: group
            .members
            .iter()
            .map(|&m| labeling.components()[m].clone())
            .collect(),
    }
}
