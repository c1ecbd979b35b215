//! Multi-page PDF assembly with lopdf.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::ComposeError;
use crate::models::Orientation;

/// A4 in PDF points.
pub const PAGE_WIDTH_PT: f32 = 595.27;
pub const PAGE_HEIGHT_PT: f32 = 841.89;
pub const PAGE_MARGIN_PT: f32 = 36.0;

/// Content of one document page.
#[derive(Debug, Clone)]
pub enum PageContent {
    /// A baseline JPEG embedded as-is.
    Sheet {
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// Stand-in for a sheet that could not be loaded.
    Placeholder { label: String },
}

pub fn page_size(orientation: Orientation) -> (f32, f32) {
    match orientation {
        Orientation::Portrait => (PAGE_WIDTH_PT, PAGE_HEIGHT_PT),
        Orientation::Landscape => (PAGE_HEIGHT_PT, PAGE_WIDTH_PT),
    }
}

pub fn build_document(
    pages: &[PageContent],
    orientation: Orientation,
) -> Result<Vec<u8>, ComposeError> {
    if pages.is_empty() {
        return Err(ComposeError::NoSheets);
    }

    let (page_w, page_h) = page_size(orientation);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for content in pages {
        let (resources, body) = match content {
            PageContent::Sheet {
                jpeg,
                width,
                height,
            } => {
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => *width as i64,
                        "Height" => *height as i64,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    jpeg.clone(),
                ));
                (
                    dictionary! { "XObject" => dictionary! { "Im1" => image_id } },
                    image_operators((*width, *height), (page_w, page_h)),
                )
            }
            PageContent::Placeholder { label } => (
                dictionary! { "Font" => dictionary! { "F1" => font_id } },
                placeholder_operators(label, (page_w, page_h)),
            ),
        };

        let resources_id = doc.add_object(resources);
        let content_id = doc.add_object(Stream::new(dictionary! {}, body.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box(page_w, page_h),
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
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

    let catalog_id: ObjectId = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ComposeError::Pdf(e.to_string()))?;

    Ok(buffer)
}

fn media_box(width: f32, height: f32) -> Vec<Object> {
    vec![
        0.into(),
        0.into(),
        Object::Real(width.into()),
        Object::Real(height.into()),
    ]
}

/// Scales the image to fill the page inside the margin, centred.
fn image_operators(image: (u32, u32), page: (f32, f32)) -> String {
    let (iw, ih) = (image.0.max(1) as f32, image.1.max(1) as f32);
    let avail_w = page.0 - 2.0 * PAGE_MARGIN_PT;
    let avail_h = page.1 - 2.0 * PAGE_MARGIN_PT;
    let scale = (avail_w / iw).min(avail_h / ih);

    let (w, h) = (iw * scale, ih * scale);
    let (x, y) = ((page.0 - w) / 2.0, (page.1 - h) / 2.0);

    format!(
        "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im1 Do\nQ\n",
        w, h, x, y
    )
}

fn placeholder_operators(label: &str, page: (f32, f32)) -> String {
    let x = PAGE_MARGIN_PT + 20.0;
    let y = page.1 / 2.0;

    // Outline of the printable area.
    let mut content = format!(
        "q\n0.6 G\n1 w\n{:.2} {:.2} {:.2} {:.2} re\nS\nQ\n",
        PAGE_MARGIN_PT,
        PAGE_MARGIN_PT,
        page.0 - 2.0 * PAGE_MARGIN_PT,
        page.1 - 2.0 * PAGE_MARGIN_PT,
    );
    content.push_str("BT\n/F1 18 Tf\n");
    content.push_str(&format!("{:.2} {:.2} Td\n", x, y + 12.0));
    content.push_str("(Sheet unavailable) Tj\n");
    content.push_str("/F1 11 Tf\n0 -24 Td\n");
    content.push_str(&format!("({}) Tj\n", escape_pdf_text(label)));
    content.push_str("ET\n");
    content
}

/// Escapes a literal string for a content stream. Non-ASCII becomes `?`.
fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn jpeg_page(width: u32, height: u32) -> PageContent {
        let img = RgbImage::from_pixel(width, height, Rgb([20, 120, 200]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 80)
            .encode_image(&img)
            .unwrap();
        PageContent::Sheet {
            jpeg,
            width,
            height,
        }
    }

    fn page_streams(doc: &Document) -> Vec<String> {
        doc.get_pages()
            .values()
            .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn test_one_page_per_sheet() {
        let pages = vec![jpeg_page(62, 87), jpeg_page(62, 87), jpeg_page(62, 87)];
        let bytes = build_document(&pages, Orientation::Portrait).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn test_placeholder_page_names_sheet() {
        let pages = vec![
            jpeg_page(40, 40),
            PageContent::Placeholder {
                label: "sheet_(2).jpg".into(),
            },
        ];
        let bytes = build_document(&pages, Orientation::Landscape).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let streams = page_streams(&doc);
        assert_eq!(streams.len(), 2);
        assert!(streams[0].contains("/Im1 Do"));
        assert!(streams[1].contains("Sheet unavailable"));
        assert!(streams[1].contains("sheet_\\(2\\).jpg"));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(
            build_document(&[], Orientation::Portrait),
            Err(ComposeError::NoSheets)
        ));
    }

    #[test]
    fn test_image_fills_page_within_margin() {
        // A4 sheet pixels on an A4 page: width is the tighter axis.
        let ops = image_operators((2480, 3508), (PAGE_WIDTH_PT, PAGE_HEIGHT_PT));
        let numbers: Vec<f32> = ops
            .lines()
            .nth(1)
            .unwrap()
            .split_whitespace()
            .take(6)
            .map(|n| n.parse().unwrap())
            .collect();

        let (w, h, x, y) = (numbers[0], numbers[3], numbers[4], numbers[5]);
        assert!((w - (PAGE_WIDTH_PT - 72.0)).abs() < 0.01);
        assert!(h <= PAGE_HEIGHT_PT - 72.0 + 0.01);
        assert!((x - 36.0).abs() < 0.01);
        assert!(y >= 36.0 - 0.01);
    }

    #[test]
    fn test_escape_pdf_text() {
        assert_eq!(escape_pdf_text("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_pdf_text("café"), "caf?");
    }
}
