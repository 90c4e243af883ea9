//! Embedded-image rasterizer
//!
//! Pure Rust fallback for hosts without pdfium: each page is represented by
//! the largest image XObject it draws. Scanned templates work well this way;
//! pages made of vector text only have nothing to offer and come back empty,
//! as do pages whose images are CCITT or JBIG2 encoded.

use super::{PageRaster, PageRasterizer, PageVisitor};
use crate::error::PipelineError;
use crate::pdf;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use std::path::Path;

pub struct EmbeddedImageRasterizer;

impl PageRasterizer for EmbeddedImageRasterizer {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn rasterize(&self, pdf: &Path, visit: &mut PageVisitor<'_>) -> Result<usize, PipelineError> {
        let doc = Document::load(pdf).map_err(|e| PipelineError::Rasterization {
            page: 0,
            detail: format!("Failed to load {:?}: {}", pdf, e),
        })?;

        let pages = doc.get_pages();
        for (&number, &page_id) in &pages {
            let number = number as usize;
            let image = largest_page_image(&doc, page_id).map_err(|detail| {
                PipelineError::Rasterization {
                    page: number,
                    detail,
                }
            })?;
            if image.is_none() {
                tracing::debug!("Page {} has no embedded image", number);
            }
            visit(PageRaster { number, image })?;
        }

        Ok(pages.len())
    }
}

/// Decode the largest image XObject drawn by the page.
///
/// Candidates are tried from the largest pixel area down; a page whose images
/// all fail to decode has no raster.
fn largest_page_image(doc: &Document, page_id: ObjectId) -> Result<Option<DynamicImage>, String> {
    let mut candidates = page_image_streams(doc, page_id).map_err(|e| e.to_string())?;
    candidates.sort_by_key(|s| std::cmp::Reverse(pixel_area(s)));

    for stream in candidates {
        match decode_image(doc, stream) {
            Ok(image) => return Ok(Some(image)),
            Err(e) => tracing::warn!("Skipping undecodable image on {:?}: {}", page_id, e),
        }
    }
    Ok(None)
}

fn pixel_area(stream: &Stream) -> u64 {
    dimension(stream, b"Width")
        .unwrap_or(0)
        .saturating_mul(dimension(stream, b"Height").unwrap_or(0))
}

/// Image streams referenced from the page's (possibly inherited) XObject resources
fn page_image_streams(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<&Stream>> {
    let Some(resources) = pdf::page_attribute(doc, page_id, b"Resources")? else {
        return Ok(Vec::new());
    };
    let resources = pdf::resolve(doc, resources)?.as_dict()?;

    let xobjects = match resources.get(b"XObject") {
        Ok(xobjects) => pdf::resolve(doc, xobjects)?.as_dict()?,
        Err(_) => return Ok(Vec::new()),
    };

    let mut streams = Vec::new();
    for (_, value) in xobjects.iter() {
        let Ok(stream) = pdf::resolve(doc, value).and_then(|o| o.as_stream()) else {
            continue;
        };
        let is_image = matches!(
            stream.dict.get(b"Subtype").and_then(|s| s.as_name()),
            Ok(name) if name == b"Image"
        );
        if is_image {
            streams.push(stream);
        }
    }
    Ok(streams)
}

fn dimension(stream: &Stream, key: &[u8]) -> Option<u64> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .and_then(|v| u64::try_from(v).ok())
}

/// Names of the stream's filters, in application order
fn filter_names(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(filters)) => filters
            .iter()
            .filter_map(|f| f.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Filters whose output is not a plain sample array
const UNSUPPORTED_FILTERS: [&[u8]; 2] = [b"CCITTFaxDecode", b"JBIG2Decode"];

fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage, String> {
    let filters = filter_names(stream);

    // JPEG and JPEG 2000 payloads are complete image files
    if filters.last().is_some_and(|f| f == b"DCTDecode" || f == b"JPXDecode") {
        return image::load_from_memory(&stream.content)
            .map_err(|e| format!("Failed to decode embedded JPEG: {}", e));
    }
    if let Some(filter) = filters.iter().find(|f| UNSUPPORTED_FILTERS.contains(&f.as_slice())) {
        return Err(format!(
            "Unsupported image filter: {}",
            String::from_utf8_lossy(filter)
        ));
    }

    let width = pixel_dimension(stream, b"Width")?;
    let height = pixel_dimension(stream, b"Height")?;
    let is_mask = matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bits = if is_mask {
        1
    } else {
        dimension(stream, b"BitsPerComponent").unwrap_or(8)
    };
    let bits = match bits {
        1 | 2 | 4 | 8 => bits as u8,
        other => return Err(format!("Unsupported bits per component: {}", other)),
    };

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| format!("Failed to decompress image: {}", e))?
    };

    let space = if is_mask {
        "DeviceGray".to_string()
    } else {
        color_space(doc, stream)
    };
    match space.as_str() {
        "DeviceGray" | "CalGray" => {
            // Mask samples of 0 are painted, so both read 0 as black
            let mut samples = unpack_samples(&data, width, height, 1, bits)?;
            if decode_inverted(stream) {
                samples.iter_mut().for_each(|v| *v = 255 - *v);
            }
            GrayImage::from_raw(width, height, samples)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| "Invalid grayscale image data".to_string())
        }
        "DeviceRGB" | "CalRGB" | "ICCBased" => {
            let samples = unpack_samples(&data, width, height, 3, bits)?;
            RgbImage::from_raw(width, height, samples)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "Invalid RGB image data".to_string())
        }
        "DeviceCMYK" => {
            let samples = unpack_samples(&data, width, height, 4, bits)?;
            let rgb: Vec<u8> = samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "Invalid CMYK image data".to_string())
        }
        other => Err(format!("Unsupported color space: {}", other)),
    }
}

fn pixel_dimension(stream: &Stream, key: &[u8]) -> Result<u32, String> {
    let name = String::from_utf8_lossy(key);
    let value = dimension(stream, key).ok_or_else(|| format!("Missing image {}", name))?;
    u32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| format!("Invalid image {}: {}", name, value))
}

/// Expand packed samples into one byte per component, scaled to 0..=255.
///
/// Rows start on byte boundaries; trailing padding after the last row is
/// ignored and short buffers are refused.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bits: u8,
) -> Result<Vec<u8>, String> {
    let too_large = || format!("Image too large: {}x{}", width, height);
    let row_samples = (width as usize)
        .checked_mul(components)
        .ok_or_else(too_large)?;
    let row_bytes = row_samples
        .checked_mul(bits as usize)
        .map(|b| b.div_ceil(8))
        .ok_or_else(too_large)?;
    let expected = row_bytes
        .checked_mul(height as usize)
        .ok_or_else(too_large)?;

    if data.len() < expected {
        return Err(format!(
            "Image data too short: {} bytes, expected {}",
            data.len(),
            expected
        ));
    }
    if bits == 8 {
        return Ok(data[..expected].to_vec());
    }

    let max = (1u16 << bits) - 1;
    let per_byte = 8 / bits as usize;
    let mut samples = Vec::with_capacity(row_samples * height as usize);
    for row in data[..expected].chunks_exact(row_bytes) {
        for index in 0..row_samples {
            let byte = row[index / per_byte];
            let shift = 8 - bits as usize * (index % per_byte + 1);
            let value = (byte >> shift) as u16 & max;
            samples.push((value * 255 / max) as u8);
        }
    }
    Ok(samples)
}

/// `/Decode [1 0]` flips a single-component image
fn decode_inverted(stream: &Stream) -> bool {
    let Ok(Object::Array(range)) = stream.dict.get(b"Decode") else {
        return false;
    };
    let number = |v: Option<&Object>| match v {
        Some(Object::Integer(i)) => Some(*i as f64),
        Some(Object::Real(r)) => Some(*r as f64),
        _ => None,
    };
    match (number(range.first()), number(range.get(1))) {
        (Some(low), Some(high)) => low > high,
        _ => false,
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> [u8; 3] {
    let k = 1.0 - cmyk[3] as f32 / 255.0;
    let channel = |v: u8| ((1.0 - v as f32 / 255.0) * k * 255.0) as u8;
    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
}

/// Color space family name; indirect and array forms are resolved
fn color_space(doc: &Document, stream: &Stream) -> String {
    let Ok(object) = stream.dict.get(b"ColorSpace") else {
        return "DeviceRGB".to_string();
    };

    let resolved = pdf::resolve(doc, object).unwrap_or(object);
    let family = match resolved {
        Object::Array(parts) => parts.first(),
        other => Some(other),
    };

    family
        .and_then(|f| f.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// One page per entry; `Some(w, h)` pages draw a gray image of that size
    fn write_pdf(path: &Path, pages: &[Option<(u32, u32)>]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for page in pages {
            let mut resources = dictionary! {};
            if let Some((w, h)) = page {
                let pixels = vec![128u8; (*w * *h) as usize];
                let mut image = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => *w as i64,
                        "Height" => *h as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    pixels,
                );
                image.compress().unwrap();
                let image_id = doc.add_object(image);
                resources.set("XObject", dictionary! { "Im1" => image_id });
            }
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn collect(path: &Path) -> Vec<(usize, Option<(u32, u32)>)> {
        let mut seen = Vec::new();
        let count = EmbeddedImageRasterizer
            .rasterize(path, &mut |raster: PageRaster| {
                seen.push((
                    raster.number,
                    raster.image.map(|img| (img.width(), img.height())),
                ));
                Ok(())
            })
            .unwrap();
        assert_eq!(count, seen.len());
        seen
    }

    #[test]
    fn test_visits_pages_in_order_with_empty_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_pdf(&path, &[Some((4, 3)), None, Some((2, 2))]);

        assert_eq!(
            collect(&path),
            vec![(1, Some((4, 3))), (2, None), (3, Some((2, 2)))]
        );
    }

    #[test]
    fn test_visitor_error_stops_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_pdf(&path, &[None, None]);

        let mut calls = 0;
        let result = EmbeddedImageRasterizer.rasterize(&path, &mut |_raster: PageRaster| {
            calls += 1;
            Err(PipelineError::Recognition("boom".to_string()))
        });

        assert!(matches!(result, Err(PipelineError::Recognition(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_uncompressed_rgb_and_cmyk() {
        let doc = Document::with_version("1.5");

        let rgb = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        );
        let img = decode_image(&doc, &rgb).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);

        let cmyk = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceCMYK",
                "BitsPerComponent" => 8,
            },
            vec![0, 0, 0, 255],
        );
        let img = decode_image(&doc, &cmyk).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
    }

    /// One page drawing every stream in `images`
    fn write_page_with(path: &Path, images: Vec<Stream>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut xobjects = lopdf::Dictionary::new();
        for (index, image) in images.into_iter().enumerate() {
            let image_id = doc.add_object(image);
            xobjects.set(format!("Im{}", index + 1), image_id);
        }
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! { "XObject" => xobjects },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn gray_image(width: i64, height: i64, bits: i64, data: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => bits,
            },
            data,
        )
    }

    #[test]
    fn test_bilevel_scan_is_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        // 16x4, two bytes per row, alternating white and black pixels
        write_page_with(&path, vec![gray_image(16, 4, 1, vec![0b1010_1010; 8])]);

        let mut images = Vec::new();
        EmbeddedImageRasterizer
            .rasterize(&path, &mut |raster: PageRaster| {
                images.push(raster.image);
                Ok(())
            })
            .unwrap();

        let img = images[0].as_ref().unwrap().to_luma8();
        assert_eq!((img.width(), img.height()), (16, 4));
        assert_eq!(img.get_pixel(0, 0).0, [255]);
        assert_eq!(img.get_pixel(1, 0).0, [0]);
        assert_eq!(img.get_pixel(15, 3).0, [0]);
    }

    #[test]
    fn test_rows_are_byte_aligned() {
        let doc = Document::with_version("1.5");
        // 3 pixels at 4 bits: each row is two bytes, the last nibble is padding
        let stream = gray_image(3, 2, 4, vec![0xF0, 0x8F, 0x0F, 0x00]);

        let img = decode_image(&doc, &stream).unwrap().to_luma8();

        let row_0: Vec<u8> = (0..3).map(|x| img.get_pixel(x, 0).0[0]).collect();
        let row_1: Vec<u8> = (0..3).map(|x| img.get_pixel(x, 1).0[0]).collect();
        assert_eq!(row_0, vec![255, 0, 136]);
        assert_eq!(row_1, vec![0, 255, 0]);
    }

    #[test]
    fn test_inverted_decode_array() {
        let doc = Document::with_version("1.5");
        let mut stream = gray_image(8, 1, 1, vec![0b1111_0000]);
        stream
            .dict
            .set("Decode", Object::Array(vec![1.into(), 0.into()]));

        let img = decode_image(&doc, &stream).unwrap().to_luma8();

        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(7, 0).0, [255]);
    }

    #[test]
    fn test_undecodable_page_has_no_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fax.pdf");
        let mut fax = gray_image(64, 64, 1, vec![0; 16]);
        fax.dict.set("Filter", "CCITTFaxDecode");
        write_page_with(&path, vec![fax]);

        assert_eq!(collect(&path), vec![(1, None)]);
    }

    #[test]
    fn test_falls_back_to_next_largest_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.pdf");
        let mut fax = gray_image(64, 64, 1, vec![0; 16]);
        fax.dict.set("Filter", "JBIG2Decode");
        write_page_with(&path, vec![fax, gray_image(5, 2, 8, vec![200; 10])]);

        assert_eq!(collect(&path), vec![(1, Some((5, 2)))]);
    }

    #[test]
    fn test_oversized_dimensions_do_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.pdf");
        write_page_with(
            &path,
            vec![
                gray_image(i64::MAX, i64::MAX, 8, vec![0; 4]),
                gray_image(1 << 40, 2, 8, vec![0; 4]),
            ],
        );

        assert_eq!(collect(&path), vec![(1, None)]);
    }

    #[test]
    fn test_short_data_is_rejected() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 10,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0; 20],
        );

        assert!(decode_image(&doc, &stream).unwrap_err().contains("too short"));
    }
}
