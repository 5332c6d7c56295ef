// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation — connected components, union-find and field detection.

pub mod components;
pub mod fields;
pub mod union_find;

pub use components::{Component, Connectivity, Labeler, Labeling};
pub use fields::{CellRect, Field, FieldSegmenter};
pub use union_find::UnionFind;
