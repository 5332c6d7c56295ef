// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page extraction — pull the scanned raster out of each page of a
// multi-page scan using the `lopdf` crate.

use std::path::Path;

use formscan_core::error::{FormscanError, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

/// Guard against cyclic `/Parent` chains in malformed page trees.
const MAX_TREE_DEPTH: usize = 64;

/// Decode the scan image of every page of the PDF at `path`, in page order.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn page_images(path: impl AsRef<Path>) -> Result<Vec<Result<GrayImage>>> {
    let path_ref = path.as_ref();
    info!("Opening PDF: {}", path_ref.display());
    let document = Document::load(path_ref)?;
    Ok(extract_all(&document))
}

/// Same as [`page_images`], for a PDF already in memory.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn page_images_from_bytes(data: &[u8]) -> Result<Vec<Result<GrayImage>>> {
    let document = Document::load_mem(data)?;
    Ok(extract_all(&document))
}

fn extract_all(document: &Document) -> Vec<Result<GrayImage>> {
    let pages = document.get_pages();
    debug!(pages = pages.len(), "PDF loaded");
    pages
        .into_iter()
        .map(|(number, page_id)| page_image(document, number, page_id))
        .collect()
}

/// Decode the largest image XObject drawn on one page.
fn page_image(document: &Document, number: u32, page_id: ObjectId) -> Result<GrayImage> {
    let resources = inherited_resources(document, page_id)?
        .ok_or_else(|| FormscanError::PdfLayout(format!("page {number} has no /Resources")))?;

    let largest = image_streams(document, resources)
        .into_iter()
        .max_by_key(|stream| {
            let dict = &stream.dict;
            integer(dict, b"Width").unwrap_or(0) * integer(dict, b"Height").unwrap_or(0)
        })
        .ok_or_else(|| FormscanError::PdfLayout(format!("page {number} holds no image")))?;

    let image = decode_image(largest)?;
    debug!(
        page = number,
        width = image.width(),
        height = image.height(),
        "Page image decoded"
    );
    Ok(image)
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(document.get_object(*id)?),
        other => Ok(other),
    }
}

fn as_dictionary<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object).ok()? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// `/Resources` of a page, looked up through its `/Parent` chain.
fn inherited_resources(document: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>> {
    let mut node = document.get_dictionary(page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return Ok(as_dictionary(document, resources));
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node = document.get_dictionary(*parent)?,
            _ => return Ok(None),
        }
    }
    Err(FormscanError::PdfLayout("page tree too deep".into()))
}

fn image_streams<'a>(document: &'a Document, resources: &'a Dictionary) -> Vec<&'a Stream> {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| as_dictionary(document, obj))
    else {
        return Vec::new();
    };
    xobjects
        .iter()
        .filter_map(|(_, obj)| match resolve(document, obj).ok()? {
            Object::Stream(stream) if name(&stream.dict, b"Subtype") == Some(&b"Image"[..]) => {
                Some(stream)
            }
            _ => None,
        })
        .collect()
}

fn integer(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key).ok()? {
        Object::Integer(value) => Some(*value),
        _ => None,
    }
}

fn name<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match dict.get(key).ok()? {
        Object::Name(value) => Some(value.as_slice()),
        _ => None,
    }
}

/// Filter names of a stream, single or array form.
fn filters(dict: &Dictionary) -> Vec<&[u8]> {
    match dict.get(b"Filter") {
        Ok(Object::Name(value)) => vec![value.as_slice()],
        Ok(Object::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Object::Name(value) => Some(value.as_slice()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(stream: &Stream) -> Result<GrayImage> {
    let dict = &stream.dict;
    match filters(dict).as_slice() {
        [b"DCTDecode"] => Ok(image::load_from_memory(&stream.content)?.to_luma8()),
        [] => raw_samples(dict, stream.content.clone()),
        [b"FlateDecode"] => raw_samples(dict, stream.decompressed_content()?),
        other => Err(FormscanError::PdfLayout(format!(
            "unsupported image filter chain: {:?}",
            other
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
        ))),
    }
}

/// 8-bit DeviceGray / DeviceRGB samples to luma.
fn raw_samples(dict: &Dictionary, samples: Vec<u8>) -> Result<GrayImage> {
    let dimension = |key: &[u8]| {
        integer(dict, key)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| FormscanError::PdfLayout("image without valid dimensions".into()))
    };
    let (width, height) = (dimension(b"Width")?, dimension(b"Height")?);
    if integer(dict, b"BitsPerComponent") != Some(8) {
        return Err(FormscanError::PdfLayout(
            "only 8-bit image samples are supported".into(),
        ));
    }
    let short = || FormscanError::PdfLayout("image stream shorter than its dimensions".into());
    match name(dict, b"ColorSpace") {
        Some(b"DeviceGray") => GrayImage::from_raw(width, height, truncated(samples, width, height, 1))
            .ok_or_else(short),
        Some(b"DeviceRGB") => {
            let rgb = RgbImage::from_raw(width, height, truncated(samples, width, height, 3))
                .ok_or_else(short)?;
            Ok(DynamicImage::ImageRgb8(rgb).to_luma8())
        }
        other => Err(FormscanError::PdfLayout(format!(
            "unsupported colour space: {:?}",
            other.map(String::from_utf8_lossy)
        ))),
    }
}

fn truncated(mut samples: Vec<u8>, width: u32, height: u32, channels: usize) -> Vec<u8> {
    samples.truncate(width as usize * height as usize * channels);
    samples
}
