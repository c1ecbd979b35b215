//! Pure crop and sizing calculations.
//!
//! Nothing here touches pixels or I/O, so every rule of the conversion
//! engine can be tested with plain numbers.

use super::params::{CropStrategy, FACE_CONFIDENCE_THRESHOLD, PERSON_CONFIDENCE_THRESHOLD};
use crate::models::{CropArea, Detection, DetectionResult};

/// Confidence attached to a crop that ignores detections.
pub const CENTER_CROP_CONFIDENCE: f64 = 0.5;

/// Largest window of the given ratio that fits inside `source`.
///
/// Sizes are truncated toward zero, so the window never exceeds the source.
///
/// ```
/// # use reframe::imaging::calculations::crop_window;
/// // 3:2 landscape to 2:3 portrait keeps the full height
/// assert_eq!(crop_window((3000, 2000), 2.0 / 3.0), (1333, 2000));
/// ```
pub fn crop_window(source: (u32, u32), ratio: f64) -> (u32, u32) {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let current = w as f64 / h as f64;

    let (cw, ch) = if current > ratio {
        // Wider than the target: full height, narrower width
        ((h as f64 * ratio) as u32, h)
    } else {
        // Taller than the target: full width, shorter height
        (w, (w as f64 / ratio) as u32)
    };

    (cw.clamp(1, w), ch.clamp(1, h))
}

/// Centered window at `ratio`.
pub fn center_crop(source: (u32, u32), ratio: f64) -> CropArea {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let (cw, ch) = crop_window(source, ratio);
    CropArea {
        x: (w - cw) / 2,
        y: (h - ch) / 2,
        width: cw,
        height: ch,
        confidence: CENTER_CROP_CONFIDENCE,
    }
}

/// Picks the crop window, biased toward detections according to `strategy`.
///
/// Falls back to [`center_crop`] when no detection clears its confidence
/// threshold. The result always lies inside the source bounds.
pub fn select_crop(
    source: (u32, u32),
    ratio: f64,
    detections: &DetectionResult,
    strategy: CropStrategy,
) -> CropArea {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let (cw, ch) = crop_window(source, ratio);

    let faces: Vec<&Detection> = detections
        .faces
        .iter()
        .filter(|d| d.confidence >= FACE_CONFIDENCE_THRESHOLD)
        .collect();
    let persons: Vec<&Detection> = detections
        .persons
        .iter()
        .filter(|d| d.confidence >= PERSON_CONFIDENCE_THRESHOLD)
        .collect();

    let (x, y, used) = match strategy {
        CropStrategy::Center => return center_crop(source, ratio),
        CropStrategy::CenterFaces => {
            let targets = if faces.is_empty() { persons } else { faces };
            if targets.is_empty() {
                return center_crop(source, ratio);
            }
            let (x, y) = centroid_position(&targets, (cw, ch), (w, h));
            (x, y, targets)
        }
        CropStrategy::PreserveAll => {
            let all: Vec<&Detection> = faces.into_iter().chain(persons).collect();
            if all.is_empty() {
                return center_crop(source, ratio);
            }
            let (x, y) = preserve_all_position(&all, (cw, ch));
            (x, y, all)
        }
    };

    let confidence = used.iter().map(|d| d.confidence).sum::<f64>() / used.len() as f64;

    CropArea {
        x: x.clamp(0, (w - cw) as i64) as u32,
        y: y.clamp(0, (h - ch) as i64) as u32,
        width: cw,
        height: ch,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Window origin centered on the confidence×area weighted centroid.
fn centroid_position(
    detections: &[&Detection],
    window: (u32, u32),
    source: (u32, u32),
) -> (i64, i64) {
    let mut total_x = 0.0;
    let mut total_y = 0.0;
    let mut total_weight = 0.0;

    for d in detections {
        let bbox = &d.bounding_box;
        let weight = d.confidence * bbox.area() as f64;
        total_x += (bbox.x + bbox.width / 2) as f64 * weight;
        total_y += (bbox.y + bbox.height / 2) as f64 * weight;
        total_weight += weight;
    }

    let (center_x, center_y) = if total_weight > 0.0 {
        ((total_x / total_weight) as i64, (total_y / total_weight) as i64)
    } else {
        ((source.0 / 2) as i64, (source.1 / 2) as i64)
    };

    (
        center_x - (window.0 / 2) as i64,
        center_y - (window.1 / 2) as i64,
    )
}

/// Window origin that keeps the union of `detections` inside when it fits.
fn preserve_all_position(detections: &[&Detection], window: (u32, u32)) -> (i64, i64) {
    let min_x = detections.iter().map(|d| d.bounding_box.x).min().unwrap_or(0) as i64;
    let min_y = detections.iter().map(|d| d.bounding_box.y).min().unwrap_or(0) as i64;
    let max_x = detections
        .iter()
        .map(|d| d.bounding_box.right())
        .max()
        .unwrap_or(0) as i64;
    let max_y = detections
        .iter()
        .map(|d| d.bounding_box.bottom())
        .max()
        .unwrap_or(0) as i64;

    let (cw, ch) = (window.0 as i64, window.1 as i64);
    let mut x = (min_x + max_x) / 2 - cw / 2;
    let mut y = (min_y + max_y) / 2 - ch / 2;

    if max_x - min_x > cw || max_y - min_y > ch {
        // Union is larger than the window; stay centered on it.
        return (x, y);
    }

    if x > min_x {
        x = min_x;
    }
    if y > min_y {
        y = min_y;
    }
    if x + cw < max_x {
        x = max_x - cw;
    }
    if y + ch < max_y {
        y = max_y - ch;
    }
    (x, y)
}

/// Forces an externally supplied rectangle into the source bounds.
pub fn clamp_crop(area: CropArea, source: (u32, u32)) -> CropArea {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let width = area.width.clamp(1, w);
    let height = area.height.clamp(1, h);
    CropArea {
        x: area.x.min(w - width),
        y: area.y.min(h - height),
        width,
        height,
        confidence: area.confidence.clamp(0.0, 1.0),
    }
}

/// True when `width × height` is within one pixel of `ratio`.
pub fn matches_ratio(width: u32, height: u32, ratio: f64) -> bool {
    let (w, h) = (width as f64, height as f64);
    (w - h * ratio).abs() <= 1.0 || (h - w / ratio).abs() <= 1.0
}

/// Output size for a crop of `crop` pixels at the target `ratio`.
///
/// A crop already at the ratio keeps its size unless its long side is under
/// `min_output`. Otherwise the limiting side is fixed and the other derived
/// from `ratio`. Neither axis ever exceeds `crop × max_upscale`.
pub fn target_dimensions(
    crop: (u32, u32),
    ratio: f64,
    min_output: u32,
    max_upscale: f64,
) -> (u32, u32) {
    let (crop_w, crop_h) = (crop.0.max(1), crop.1.max(1));
    if matches_ratio(crop_w, crop_h, ratio) && crop_w.max(crop_h) >= min_output {
        return (crop_w, crop_h);
    }

    let (cw, ch) = (crop_w as f64, crop_h as f64);
    let max_upscale = max_upscale.max(1.0);
    let max_w = (cw * max_upscale).floor().max(1.0);
    let max_h = (ch * max_upscale).floor().max(1.0);

    let (mut w, mut h) = if cw / ch > ratio {
        (ch * ratio, ch)
    } else {
        (cw, cw / ratio)
    };

    let long = w.max(h);
    if long < min_output as f64 {
        let scale = min_output as f64 / long;
        w *= scale;
        h *= scale;
    }

    let cap = (max_w / w).min(max_h / h);
    if cap < 1.0 {
        w *= cap;
        h *= cap;
    }

    // Whole pixels on the primary axis, the other rounded from the ratio and
    // stepped down until it fits under its cap.
    let (w, h) = if ratio >= 1.0 {
        let h = fit_primary(floor_px(h).min(max_h), max_w, |h| h * ratio);
        ((h * ratio).round().clamp(1.0, max_w), h)
    } else {
        let w = fit_primary(floor_px(w).min(max_w), max_h, |w| w / ratio);
        (w, (w / ratio).round().clamp(1.0, max_h))
    };

    (w as u32, h as u32)
}

/// Largest primary length `<= start` whose derived length rounds to at most
/// `derived_max`, never below one pixel.
fn fit_primary(start: f64, derived_max: f64, derive: impl Fn(f64) -> f64) -> f64 {
    let mut primary = start.max(1.0);
    while primary > 1.0 && derive(primary).round() > derived_max {
        primary -= 1.0;
    }
    primary
}

/// Floor that tolerates float error just under a whole pixel.
fn floor_px(value: f64) -> f64 {
    (value + 1e-6).floor()
}

/// Largest per-axis ratio of output to crop.
pub fn upscale_factor(crop: (u32, u32), output: (u32, u32)) -> f64 {
    let sx = output.0 as f64 / crop.0.max(1) as f64;
    let sy = output.1 as f64 / crop.1.max(1) as f64;
    sx.max(sy)
}

/// Diagnostic score in `[0, 100]`.
///
/// Loses up to 50 points for upscaling, up to 40 for keeping less than half
/// of the source, and gains up to 10 from crop confidence.
pub fn quality_score(upscale: f64, crop_fraction: f64, confidence: f64) -> f64 {
    let mut score = 100.0;

    if upscale.is_finite() && upscale > 1.0 {
        score -= ((upscale - 1.0) * 50.0).min(50.0);
    }

    if crop_fraction.is_finite() && crop_fraction < 0.5 {
        score -= (40.0 * (0.5 - crop_fraction.max(0.0)) / 0.5).min(40.0);
    }

    if confidence.is_finite() {
        score += (10.0 * confidence.clamp(0.0, 1.0)).min(10.0);
    }

    score.clamp(0.0, 100.0)
}

/// Scales `source` to fit inside `bounds`, preserving its ratio.
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let scale = (bounds.0 as f64 / sw).min(bounds.1 as f64 / sh);
    let w = (sw * scale).round().clamp(1.0, bounds.0.max(1) as f64);
    let h = (sh * scale).round().clamp(1.0, bounds.1.max(1) as f64);
    (w as u32, h as u32)
}
