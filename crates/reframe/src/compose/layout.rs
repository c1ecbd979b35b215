//! Pixel geometry and rendering for A4 contact sheets at 300 DPI.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::imaging::calculations::fit_within;
use crate::models::{GridLayout, Orientation};

pub const SHEET_WIDTH_PX: u32 = 2480;
pub const SHEET_HEIGHT_PX: u32 = 3508;
pub const SHEET_MARGIN_PX: u32 = 150;
pub const CELL_PADDING_PX: u32 = 20;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Where one image lands on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub fn sheet_size(orientation: Orientation) -> (u32, u32) {
    match orientation {
        Orientation::Portrait => (SHEET_WIDTH_PX, SHEET_HEIGHT_PX),
        Orientation::Landscape => (SHEET_HEIGHT_PX, SHEET_WIDTH_PX),
    }
}

pub fn cell_size(sheet: (u32, u32), grid: &GridLayout) -> (u32, u32) {
    let usable_w = sheet.0.saturating_sub(2 * SHEET_MARGIN_PX);
    let usable_h = sheet.1.saturating_sub(2 * SHEET_MARGIN_PX);
    (usable_w / grid.columns.max(1), usable_h / grid.rows.max(1))
}

/// Fits an image into cell `index` (row-major) and centres it there.
pub fn place(index: usize, image: (u32, u32), grid: &GridLayout, sheet: (u32, u32)) -> Placement {
    let (cell_w, cell_h) = cell_size(sheet, grid);
    let columns = grid.columns.max(1) as usize;
    let (row, col) = ((index / columns) as u32, (index % columns) as u32);

    let bounds = (
        cell_w.saturating_sub(2 * CELL_PADDING_PX).max(1),
        cell_h.saturating_sub(2 * CELL_PADDING_PX).max(1),
    );
    let (width, height) = fit_within(image, bounds);

    Placement {
        x: SHEET_MARGIN_PX + col * cell_w + (cell_w.saturating_sub(width)) / 2,
        y: SHEET_MARGIN_PX + row * cell_h + (cell_h.saturating_sub(height)) / 2,
        width,
        height,
    }
}

/// Draws up to `grid.capacity()` images onto a white sheet. `None` leaves the
/// cell blank.
pub fn render_sheet(
    images: &[Option<DynamicImage>],
    grid: &GridLayout,
    orientation: Orientation,
) -> RgbImage {
    let sheet = sheet_size(orientation);
    let mut canvas = RgbImage::from_pixel(sheet.0, sheet.1, BACKGROUND);

    for (index, image) in images.iter().take(grid.capacity()).enumerate() {
        let Some(image) = image else { continue };
        let spot = place(index, (image.width(), image.height()), grid, sheet);
        let resized = imageops::resize(
            &image.to_rgb8(),
            spot.width,
            spot.height,
            FilterType::Lanczos3,
        );
        imageops::overlay(&mut canvas, &resized, spot.x as i64, spot.y as i64);
    }

    canvas
}
