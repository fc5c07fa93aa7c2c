use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cascade::Cascade;
use crate::error::VisionError;
use crate::grouping::{group_rectangles, GROUP_EPS};
use crate::integral::IntegralImage;

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Shifts a region found inside `self` back into the parent image.
    pub fn offset_from(&self, inner: Region) -> Region {
        Region::new(self.x + inner.x, self.y + inner.y, inner.width, inner.height)
    }

    /// Intersection with a `width x height` image, or `None` if empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = (self.x + self.width).min(width);
        let y1 = (self.y + self.height).min(height);
        (self.x < x1 && self.y < y1).then(|| Region::new(self.x, self.y, x1 - self.x, y1 - self.y))
    }
}

/// Finds objects of one kind in a grayscale image.
pub trait ObjectDetector {
    fn detect(&self, image: &GrayImage) -> Vec<Region>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Window growth between pyramid levels, strictly above 1.
    pub scale_factor: f64,
    /// Raw hits a merged detection needs beyond the first.
    pub min_neighbors: u32,
    /// Smallest window; the cascade window when zero.
    pub min_size: (u32, u32),
    /// Largest window; the whole image when `None`.
    pub max_size: Option<(u32, u32)>,
}

impl DetectParams {
    pub fn new(scale_factor: f64, min_neighbors: u32) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            min_size: (0, 0),
            max_size: None,
        }
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(VisionError::Parameters(format!(
                "scale factor must be greater than 1, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Multi-scale sliding-window detector backed by a Haar cascade.
#[derive(Clone, Debug)]
pub struct CascadeDetector {
    cascade: Cascade,
    params: DetectParams,
}

impl CascadeDetector {
    pub fn new(cascade: Cascade, params: DetectParams) -> Result<Self, VisionError> {
        params.validate()?;
        Ok(Self { cascade, params })
    }

    pub fn load(path: &Path, params: DetectParams) -> Result<Self, VisionError> {
        Self::new(Cascade::load(path)?, params)
    }

    pub fn params(&self) -> DetectParams {
        self.params
    }

    fn raw_hits(&self, image: &GrayImage) -> Vec<Region> {
        let (width, height) = image.dimensions();
        let (max_w, max_h) = self.params.max_size.unwrap_or((width, height));
        let integral = IntegralImage::new(image);
        let mut hits = Vec::new();

        let mut scale = 1.0f64;
        loop {
            let scaled = self.cascade.scaled(scale);
            let (win_w, win_h) = scaled.window();
            if win_w > width || win_h > height || win_w > max_w || win_h > max_h {
                break;
            }
            if win_w >= self.params.min_size.0 && win_h >= self.params.min_size.1 {
                let step = ((if scale > 2.0 { 1.0 } else { 2.0 }) * scale).round().max(1.0) as u32;
                let mut level_hits = 0usize;
                for y in (0..=height - win_h).step_by(step as usize) {
                    for x in (0..=width - win_w).step_by(step as usize) {
                        if scaled.evaluate(&integral, x, y) {
                            hits.push(Region::new(x, y, win_w, win_h));
                            level_hits += 1;
                        }
                    }
                }
                debug!(scale, win_w, win_h, step, level_hits, "scanned pyramid level");
            }
            scale *= self.params.scale_factor;
        }
        hits
    }
}

impl ObjectDetector for CascadeDetector {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn detect(&self, image: &GrayImage) -> Vec<Region> {
        let hits = self.raw_hits(image);
        let grouped = group_rectangles(&hits, self.params.min_neighbors, GROUP_EPS);
        debug!(raw = hits.len(), grouped = grouped.len(), "detection finished");
        grouped
    }
}
