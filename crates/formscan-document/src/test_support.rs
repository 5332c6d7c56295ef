// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic answer sheets for unit tests: white paper, black calibration
// squares, framed fields and bar-shaped "digits".

use formscan_core::config::PipelineConfig;

use crate::raster::Raster;

pub const PAPER: u8 = 255;
pub const INK: u8 = 0;

/// Fill the rectangle `[x, x+w) x [y, y+h)`.
pub fn fill_rect(raster: &mut Raster, x: u32, y: u32, w: u32, h: u32, value: u8) {
    for yy in y..y + h {
        for xx in x..x + w {
            raster.set(xx as i64, yy as i64, value);
        }
    }
}

/// Draw a rectangular frame of the given thickness whose outer edge covers
/// `[x, x+w) x [y, y+h)`.
pub fn draw_frame(raster: &mut Raster, x: u32, y: u32, w: u32, h: u32, thickness: u32) {
    fill_rect(raster, x, y, w, thickness, INK);
    fill_rect(raster, x, y + h - thickness, w, thickness, INK);
    fill_rect(raster, x, y, thickness, h, INK);
    fill_rect(raster, x + w - thickness, y, thickness, h, INK);
}

/// Blank page with three `side x side` markers inset by `margin`: top-left,
/// top-right and bottom-left.
pub fn page_with_markers(width: u32, height: u32, side: u32, margin: u32) -> Raster {
    let mut page = Raster::filled(width, height, PAPER);
    fill_rect(&mut page, margin, margin, side, side, INK);
    fill_rect(&mut page, width - margin - side, margin, side, side, INK);
    fill_rect(&mut page, margin, height - margin - side, side, side, INK);
    page
}

/// Rotate a raster by 180 degrees.
pub fn turned_upside_down(raster: &Raster) -> Raster {
    let (w, h) = (raster.width() as i64, raster.height() as i64);
    Raster::from_fn(raster.width(), raster.height(), |x, y| {
        raster.get(w - 1 - x as i64, h - 1 - y as i64)
    })
}

/// Surround a raster with `pad` pixels of paper.
pub fn padded(raster: &Raster, pad: u32) -> Raster {
    let pad_i = pad as i64;
    Raster::from_fn(raster.width() + 2 * pad, raster.height() + 2 * pad, |x, y| {
        let (sx, sy) = (x as i64 - pad_i, y as i64 - pad_i);
        if raster.contains(sx, sy) {
            raster.get(sx, sy)
        } else {
            PAPER
        }
    })
}

/// Resample `raster` through `map`, which takes destination coordinates
/// relative to the image centre to source coordinates relative to it.
/// Pixels mapped from outside the raster become paper.
fn resampled(raster: &Raster, map: impl Fn(f64, f64) -> (f64, f64)) -> Raster {
    let (cx, cy) = (raster.width() as f64 / 2.0, raster.height() as f64 / 2.0);
    Raster::from_fn(raster.width(), raster.height(), |x, y| {
        let (sx, sy) = map(x as f64 - cx, y as f64 - cy);
        let (sx, sy) = ((sx + cx).round() as i64, (sy + cy).round() as i64);
        if raster.contains(sx, sy) {
            raster.get(sx, sy)
        } else {
            PAPER
        }
    })
}

/// Turn a raster by `degrees` about its centre, keeping its size.
pub fn rotated(raster: &Raster, degrees: f64) -> Raster {
    let (sin, cos) = degrees.to_radians().sin_cos();
    resampled(raster, |x, y| (cos * x + sin * y, -sin * x + cos * y))
}

/// Slant a raster horizontally: row `y` (from the centre) moves by
/// `factor * y` pixels.
pub fn sheared(raster: &Raster, factor: f64) -> Raster {
    resampled(raster, |x, y| (x - factor * y, y))
}

/// One framed field on the synthetic sheet, in rectified coordinates.
#[derive(Debug, Clone, Copy)]
pub struct SheetField {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub blocks: u32,
    /// Cells holding a vertical bar.
    pub inked: &'static [u32],
}

/// Marker side on the synthetic sheet.
pub const SHEET_MARKER: u32 = 16;
/// Distance from the paper edge to the markers.
pub const SHEET_MARGIN: u32 = 20;
/// Rectified size of the synthetic sheet (marker span).
pub const SHEET_RECTIFIED: (u32, u32) = (440, 560);

/// Two 4-cell header fields and two 8-cell answer fields.
pub const SHEET_FIELDS: [SheetField; 4] = [
    SheetField {
        x: 40,
        y: 60,
        width: 161,
        height: 51,
        blocks: 4,
        inked: &[0, 2],
    },
    SheetField {
        x: 240,
        y: 60,
        width: 161,
        height: 51,
        blocks: 4,
        inked: &[1],
    },
    SheetField {
        x: 40,
        y: 200,
        width: 361,
        height: 61,
        blocks: 8,
        inked: &[0, 3, 7],
    },
    SheetField {
        x: 40,
        y: 320,
        width: 361,
        height: 61,
        blocks: 8,
        inked: &[],
    },
];

/// Expected reading of [`SHEET_FIELDS`] with a classifier that always
/// answers `digit`.
pub fn sheet_reading(digit: char, blank: char) -> Vec<String> {
    SHEET_FIELDS
        .iter()
        .map(|field| {
            (0..field.blocks)
                .map(|b| if field.inked.contains(&b) { digit } else { blank })
                .collect()
        })
        .collect()
}

/// A 480x600 photo-free sheet: markers, framed fields, bars in some cells.
/// Rectifying it yields the 440x560 marker span with fields at the
/// coordinates of [`SHEET_FIELDS`].
pub fn synthetic_sheet() -> Raster {
    let mut page = page_with_markers(480, 600, SHEET_MARKER, SHEET_MARGIN);
    for field in SHEET_FIELDS {
        let (fx, fy) = (field.x + SHEET_MARGIN, field.y + SHEET_MARGIN);
        draw_frame(&mut page, fx, fy, field.width, field.height, 2);
        let cell = (field.width - 1) / field.blocks;
        for &block in field.inked {
            let bar_x = fx + cell * block + cell / 2 - 2;
            let bar_h = field.height * 3 / 5;
            let bar_y = fy + (field.height - bar_h) / 2;
            fill_rect(&mut page, bar_x, bar_y, 4, bar_h, INK);
        }
    }
    page
}

/// Pipeline settings sized for [`synthetic_sheet`].
pub fn sheet_config() -> PipelineConfig {
    let mut config = PipelineConfig {
        canonical_size: 600,
        ..PipelineConfig::default()
    };
    config.segmentation.header.border_fraction = 0.000_02;
    config.segmentation.answers.border_fraction = 0.000_02;
    config
}

/// Paper added around the synthetic sheet before tilting it.
pub const TILT_PAD: u32 = 40;

/// The synthetic sheet padded by [`TILT_PAD`], for rotation and shear.
pub fn padded_sheet() -> Raster {
    padded(&synthetic_sheet(), TILT_PAD)
}

/// [`sheet_config`] with the canonical size matching [`padded_sheet`], so
/// the page is not rescaled.
pub fn padded_sheet_config() -> PipelineConfig {
    PipelineConfig {
        canonical_size: 600 + 2 * TILT_PAD,
        ..sheet_config()
    }
}
