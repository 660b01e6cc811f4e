//! Boosted Haar-feature cascade.
//!
//! Models are JSON documents holding the detection window, the feature pool
//! and the stages of stump classifiers. Evaluation scales the features over
//! integral images, so the frame is never resized.

use std::fs;
use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::group::{group_rectangles, GROUP_EPS};
use super::{DetectParams, FaceRect};
use crate::error::{StudioError, StudioResult};

/// Weighted rectangle of a Haar feature, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HaarRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarFeature {
    pub rects: Vec<HaarRect>,
}

/// Decision stump over a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarClassifier {
    /// Index into the cascade's feature pool.
    pub feature: usize,
    pub threshold: f32,
    /// Vote when the normalized feature value is below `threshold`.
    pub left: f32,
    /// Vote otherwise.
    pub right: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarStage {
    /// A window is rejected when the summed votes fall below this.
    pub threshold: f32,
    pub classifiers: Vec<HaarClassifier>,
}

/// A cascade of boosted stages over a fixed-size detection window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarCascade {
    /// Base window `(width, height)` the features are defined in.
    pub window: (u32, u32),
    pub stages: Vec<HaarStage>,
    pub features: Vec<HaarFeature>,
}

/// Summed-area tables of a grayscale image and of its squares.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl Integral {
    fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq_sum = vec![0u64; stride * (h + 1)];
        let raw = gray.as_raw();
        for y in 0..h {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = raw[y * w + x] as u64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[y * stride + x + 1] + row;
                sq_sum[idx] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    fn area(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }

    fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::area(&self.sum, self.stride, x, y, w, h)
    }

    fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::area(&self.sq_sum, self.stride, x, y, w, h)
    }
}

/// Feature rectangles resized for one detection scale.
struct ScaledFeature {
    rects: Vec<HaarRect>,
}

impl HaarCascade {
    /// Load a cascade from a JSON model file.
    pub fn load(path: &Path) -> StudioResult<Self> {
        let model_err = |reason: String| StudioError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| model_err(e.to_string()))?;
        let cascade: HaarCascade =
            serde_json::from_str(&text).map_err(|e| model_err(e.to_string()))?;
        cascade.validate().map_err(model_err)?;
        log::info!(
            "[DETECT] Loaded cascade {}: window {}x{}, {} stages, {} features",
            path.display(),
            cascade.window.0,
            cascade.window.1,
            cascade.stages.len(),
            cascade.features.len()
        );
        Ok(cascade)
    }

    /// Check internal consistency: every rectangle fits the window and every
    /// classifier points at an existing feature.
    pub fn validate(&self) -> Result<(), String> {
        let (ww, wh) = self.window;
        if ww == 0 || wh == 0 {
            return Err("detection window must be non-empty".to_string());
        }
        if self.stages.is_empty() {
            return Err("cascade has no stages".to_string());
        }
        for (i, feature) in self.features.iter().enumerate() {
            if feature.rects.is_empty() {
                return Err(format!("feature {} has no rectangles", i));
            }
            for r in &feature.rects {
                if r.x + r.width > ww || r.y + r.height > wh {
                    return Err(format!("feature {} exceeds the detection window", i));
                }
            }
        }
        for (s, stage) in self.stages.iter().enumerate() {
            for c in &stage.classifiers {
                if c.feature >= self.features.len() {
                    return Err(format!(
                        "stage {} references missing feature {}",
                        s, c.feature
                    ));
                }
            }
        }
        Ok(())
    }

    /// Scan the image at growing window sizes and return grouped detections.
    pub fn detect_multi_scale(&self, gray: &GrayImage, params: &DetectParams) -> Vec<FaceRect> {
        let (img_w, img_h) = gray.dimensions();
        let (win_w, win_h) = self.window;
        if img_w < win_w || img_h < win_h || params.scale_factor <= 1.0 {
            return Vec::new();
        }

        let integral = Integral::new(gray);
        let mut hits = Vec::new();
        let mut factor = 1.0f32;

        loop {
            let w = (win_w as f32 * factor).round() as u32;
            let h = (win_h as f32 * factor).round() as u32;
            if w > img_w || h > img_h {
                break;
            }
            if w >= params.min_size.0 && h >= params.min_size.1 {
                let scaled = self.scale_features(factor);
                let step = ((if factor > 2.0 { 1.0 } else { 2.0 }) * factor).round() as u32;
                let step = step.max(1);
                let mut y = 0;
                while y + h <= img_h {
                    let mut x = 0;
                    while x + w <= img_w {
                        if self.passes(&integral, &scaled, x, y, w, h) {
                            hits.push(FaceRect::new(x, y, w, h));
                        }
                        x += step;
                    }
                    y += step;
                }
            }
            factor *= params.scale_factor;
        }

        group_rectangles(&hits, params.min_neighbors, GROUP_EPS)
    }

    fn scale_features(&self, factor: f32) -> Vec<ScaledFeature> {
        self.features
            .iter()
            .map(|feature| {
                let mut rects: Vec<HaarRect> = feature
                    .rects
                    .iter()
                    .map(|r| HaarRect {
                        x: (r.x as f32 * factor).round() as u32,
                        y: (r.y as f32 * factor).round() as u32,
                        width: ((r.width as f32 * factor).round() as u32).max(1),
                        height: ((r.height as f32 * factor).round() as u32).max(1),
                        weight: r.weight,
                    })
                    .collect();
                // Rounding changes rectangle areas; rebalance the first weight
                // so a flat patch still scores zero.
                if rects.len() > 1 {
                    let rest: f32 = rects[1..]
                        .iter()
                        .map(|r| r.weight * (r.width * r.height) as f32)
                        .sum();
                    let first_area = (rects[0].width * rects[0].height) as f32;
                    rects[0].weight = -rest / first_area;
                }
                ScaledFeature { rects }
            })
            .collect()
    }

    fn passes(
        &self,
        integral: &Integral,
        features: &[ScaledFeature],
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> bool {
        let area = (w * h) as f64;
        let mean = integral.rect_sum(x, y, w, h) as f64 / area;
        let variance = integral.rect_sq_sum(x, y, w, h) as f64 / area - mean * mean;
        let std_dev = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        for stage in &self.stages {
            let mut votes = 0.0f32;
            for classifier in &stage.classifiers {
                let feature = &features[classifier.feature];
                let mut value = 0.0f64;
                for r in &feature.rects {
                    // Scaled rectangles may poke past the window after rounding.
                    let rw = r.width.min(w.saturating_sub(r.x));
                    let rh = r.height.min(h.saturating_sub(r.y));
                    if rw == 0 || rh == 0 {
                        continue;
                    }
                    value += r.weight as f64 * integral.rect_sum(x + r.x, y + r.y, rw, rh) as f64;
                }
                let normalized = value / area;
                votes += if normalized < classifier.threshold as f64 * std_dev {
                    classifier.left
                } else {
                    classifier.right
                };
            }
            if votes < stage.threshold {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-stage cascade that fires on a dark upper half over a bright lower half.
    fn edge_cascade() -> HaarCascade {
        HaarCascade {
            window: (8, 8),
            features: vec![HaarFeature {
                rects: vec![
                    HaarRect {
                        x: 0,
                        y: 0,
                        width: 8,
                        height: 4,
                        weight: -1.0,
                    },
                    HaarRect {
                        x: 0,
                        y: 4,
                        width: 8,
                        height: 4,
                        weight: 1.0,
                    },
                ],
            }],
            stages: vec![HaarStage {
                threshold: 0.5,
                classifiers: vec![HaarClassifier {
                    feature: 0,
                    threshold: 0.2,
                    left: 0.0,
                    right: 1.0,
                }],
            }],
        }
    }

    fn edge_image(size: u32, top: u32, left: u32, block: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, image::Luma([128]));
        for y in top..top + block {
            for x in left..left + block {
                let v = if y < top + block / 2 { 0 } else { 255 };
                img.put_pixel(x, y, image::Luma([v]));
            }
        }
        img
    }

    #[test]
    fn test_integral_sums() {
        let img = GrayImage::from_fn(4, 3, |x, y| image::Luma([(x + y * 4) as u8]));
        let integral = Integral::new(&img);
        // Whole image: 0..=11
        assert_eq!(integral.rect_sum(0, 0, 4, 3), 66);
        // Single pixel at (2,1) = 6
        assert_eq!(integral.rect_sum(2, 1, 1, 1), 6);
        assert_eq!(integral.rect_sq_sum(2, 1, 1, 1), 36);
        // 2x2 block at (1,1): 5+6+9+10
        assert_eq!(integral.rect_sum(1, 1, 2, 2), 30);
    }

    #[test]
    fn test_detects_edge_block() {
        let cascade = edge_cascade();
        cascade.validate().unwrap();
        let img = edge_image(64, 16, 16, 16);
        let params = DetectParams {
            scale_factor: 1.1,
            min_neighbors: 2,
            min_size: (0, 0),
        };
        let faces = cascade.detect_multi_scale(&img, &params);
        assert!(!faces.is_empty());
        // Every detection straddles the dark/bright edge of the block.
        for face in &faces {
            assert!(face.x < 32 && face.x + face.width > 16, "{:?}", face);
            assert!(face.y <= 24 && face.y + face.height >= 24, "{:?}", face);
        }
    }

    #[test]
    fn test_flat_image_has_no_hits() {
        let cascade = edge_cascade();
        let img = GrayImage::from_pixel(48, 48, image::Luma([90]));
        assert!(cascade
            .detect_multi_scale(&img, &DetectParams::default())
            .is_empty());
    }

    #[test]
    fn test_image_smaller_than_window() {
        let cascade = edge_cascade();
        let img = GrayImage::new(4, 4);
        assert!(cascade
            .detect_multi_scale(&img, &DetectParams::default())
            .is_empty());
    }

    #[test]
    fn test_load_missing_model_is_error() {
        let err = HaarCascade::load(Path::new("/nonexistent/faces.json")).unwrap_err();
        assert!(matches!(err, StudioError::ModelLoad { .. }));
    }

    #[test]
    fn test_load_round_trip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.json");
        fs::write(&path, serde_json::to_string(&edge_cascade()).unwrap()).unwrap();
        assert_eq!(HaarCascade::load(&path).unwrap(), edge_cascade());

        let mut broken = edge_cascade();
        broken.stages[0].classifiers[0].feature = 3;
        fs::write(&path, serde_json::to_string(&broken).unwrap()).unwrap();
        let err = HaarCascade::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing feature"));
    }
}
