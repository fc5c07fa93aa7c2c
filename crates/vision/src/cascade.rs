//! Boosted Haar cascades in OpenCV's XML storage format.
//!
//! Only the current `opencv-cascade-classifier` layout with `HAAR` features is
//! understood. Weak classifiers may be stumps or small trees; tilted features
//! are rejected. Evaluation follows the classic scaled-feature scheme: feature
//! rectangles are scaled to the window, the first rectangle's weight is
//! re-balanced for rounding, and responses are normalised by the window's
//! standard deviation.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::VisionError;
use crate::integral::IntegralImage;

/// Slack applied to stage thresholds, as in OpenCV.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

#[derive(Debug, Deserialize)]
struct StorageXml {
    cascade: CascadeXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CascadeXml {
    #[serde(default)]
    feature_type: Option<String>,
    width: String,
    height: String,
    stages: ListXml<StageXml>,
    features: ListXml<FeatureXml>,
}

#[derive(Debug, Deserialize)]
struct ListXml<T> {
    #[serde(rename = "_", default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageXml {
    stage_threshold: String,
    weak_classifiers: ListXml<WeakXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakXml {
    internal_nodes: String,
    leaf_values: String,
}

#[derive(Debug, Deserialize)]
struct FeatureXml {
    rects: ListXml<String>,
    #[serde(default)]
    tilted: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

impl WeightedRect {
    fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

#[derive(Clone, Copy, Debug)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Clone, Debug)]
struct WeakClassifier {
    nodes: Vec<Node>,
    leaves: Vec<f64>,
}

#[derive(Clone, Debug)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// A loaded, validated cascade at its training window size.
#[derive(Clone, Debug)]
pub struct Cascade {
    width: u32,
    height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, VisionError> {
    token
        .trim()
        .parse()
        .map_err(|_| VisionError::cascade(format!("bad {what} value {token:?}")))
}

fn parse_list<T: std::str::FromStr>(text: &str, what: &str) -> Result<Vec<T>, VisionError> {
    text.split_whitespace()
        .map(|token| parse_number(token, what))
        .collect()
}

impl Cascade {
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let text = std::fs::read_to_string(path).map_err(|source| VisionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cascade = Self::from_xml(&text)?;
        info!(
            path = %path.display(),
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            "cascade loaded"
        );
        Ok(cascade)
    }

    pub fn from_xml(text: &str) -> Result<Self, VisionError> {
        let storage: StorageXml = quick_xml::de::from_str(text)?;
        let xml = storage.cascade;
        if let Some(kind) = xml.feature_type.as_deref().map(str::trim) {
            if !kind.eq_ignore_ascii_case("HAAR") {
                return Err(VisionError::cascade(format!("unsupported feature type {kind}")));
            }
        }
        let width: u32 = parse_number(&xml.width, "width")?;
        let height: u32 = parse_number(&xml.height, "height")?;
        if width < 3 || height < 3 {
            return Err(VisionError::cascade(format!(
                "window {width}x{height} is too small"
            )));
        }

        let features = xml
            .features
            .items
            .iter()
            .enumerate()
            .map(|(index, feature)| parse_feature(index, feature, width, height))
            .collect::<Result<Vec<_>, _>>()?;
        let stages = xml
            .stages
            .items
            .iter()
            .enumerate()
            .map(|(index, stage)| parse_stage(index, stage, features.len()))
            .collect::<Result<Vec<_>, _>>()?;
        if stages.is_empty() {
            return Err(VisionError::cascade("cascade has no stages"));
        }
        debug!(width, height, stages = stages.len(), "parsed cascade");

        Ok(Self {
            width,
            height,
            stages,
            features,
        })
    }

    /// Training window `(width, height)`.
    pub fn window(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn features(&self) -> &[HaarFeature] {
        &self.features
    }

    /// Prepares the cascade for windows `scale` times the training size.
    pub fn scaled(&self, scale: f64) -> ScaledCascade<'_> {
        let round = |v: u32| (v as f64 * scale).round() as u32;
        let (win_w, win_h) = (round(self.width), round(self.height));
        let features = self
            .features
            .iter()
            .map(|feature| {
                let mut rects: Vec<WeightedRect> = feature
                    .rects
                    .iter()
                    .map(|r| {
                        // rounding may push a rect past the window edge
                        let x = round(r.x).min(win_w);
                        let y = round(r.y).min(win_h);
                        WeightedRect {
                            x,
                            y,
                            width: round(r.width).min(win_w - x),
                            height: round(r.height).min(win_h - y),
                            weight: r.weight,
                        }
                    })
                    .collect();
                // keep the feature zero-mean after rounding
                let area0 = rects[0].area();
                if area0 > 0.0 {
                    let rest: f64 = rects[1..].iter().map(|r| r.weight * r.area()).sum();
                    rects[0].weight = -rest / area0;
                }
                rects
            })
            .collect();
        let inset = (scale.round() as u32).min(win_w.min(win_h) / 2);
        ScaledCascade {
            cascade: self,
            window: (win_w, win_h),
            features,
            norm: (
                inset,
                inset,
                round(self.width - 2).clamp(1, win_w - inset),
                round(self.height - 2).clamp(1, win_h - inset),
            ),
        }
    }
}

fn parse_feature(
    index: usize,
    feature: &FeatureXml,
    width: u32,
    height: u32,
) -> Result<HaarFeature, VisionError> {
    if let Some(tilted) = feature.tilted.as_deref() {
        if tilted.trim() != "0" {
            return Err(VisionError::cascade(format!(
                "feature {index} is tilted, which is not supported"
            )));
        }
    }
    let rects = feature
        .rects
        .items
        .iter()
        .map(|text| {
            let values: Vec<f64> = parse_list(text, "rect")?;
            let [x, y, w, h, weight] = values[..] else {
                return Err(VisionError::cascade(format!(
                    "feature {index} rect needs 5 values, got {text:?}"
                )));
            };
            let rect = WeightedRect {
                x: x as u32,
                y: y as u32,
                width: w as u32,
                height: h as u32,
                weight,
            };
            if x < 0.0 || y < 0.0 || rect.x + rect.width > width || rect.y + rect.height > height {
                return Err(VisionError::cascade(format!(
                    "feature {index} rect {text:?} leaves the {width}x{height} window"
                )));
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rects.is_empty() {
        return Err(VisionError::cascade(format!("feature {index} has no rects")));
    }
    Ok(HaarFeature { rects })
}

fn parse_stage(index: usize, stage: &StageXml, n_features: usize) -> Result<Stage, VisionError> {
    let threshold = parse_number(&stage.stage_threshold, "stage threshold")?;
    let classifiers = stage
        .weak_classifiers
        .items
        .iter()
        .map(|weak| {
            let raw: Vec<f64> = parse_list(&weak.internal_nodes, "internal node")?;
            let leaves: Vec<f64> = parse_list(&weak.leaf_values, "leaf")?;
            if raw.is_empty() || raw.len() % 4 != 0 {
                return Err(VisionError::cascade(format!(
                    "stage {index}: internal nodes must come in groups of 4"
                )));
            }
            let nodes: Vec<Node> = raw
                .chunks(4)
                .map(|n| Node {
                    left: n[0] as i32,
                    right: n[1] as i32,
                    feature: n[2] as usize,
                    threshold: n[3],
                })
                .collect();
            for node in &nodes {
                let child_ok = |c: i32| {
                    if c > 0 {
                        (c as usize) < nodes.len()
                    } else {
                        (c.unsigned_abs() as usize) < leaves.len()
                    }
                };
                if node.feature >= n_features || !child_ok(node.left) || !child_ok(node.right) {
                    return Err(VisionError::cascade(format!(
                        "stage {index}: node references a missing feature or leaf"
                    )));
                }
            }
            Ok(WeakClassifier { nodes, leaves })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold,
        classifiers,
    })
}

/// A cascade with feature geometry fixed for one window size.
pub struct ScaledCascade<'a> {
    cascade: &'a Cascade,
    window: (u32, u32),
    features: Vec<Vec<WeightedRect>>,
    norm: (u32, u32, u32, u32),
}

impl ScaledCascade<'_> {
    pub fn window(&self) -> (u32, u32) {
        self.window
    }

    /// Runs every stage on the window whose top-left corner is `(x, y)`.
    pub fn evaluate(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let (nx, ny, nw, nh) = self.norm;
        let area = nw as f64 * nh as f64;
        let sum = integral.rect_sum(x + nx, y + ny, nw, nh);
        let sq_sum = integral.rect_sq_sum(x + nx, y + ny, nw, nh);
        let spread = area * sq_sum - sum * sum;
        let norm = if spread > 0.0 { spread.sqrt() } else { 1.0 };

        let response = |feature: usize| -> f64 {
            self.features[feature]
                .iter()
                .map(|r| r.weight * integral.rect_sum(x + r.x, y + r.y, r.width, r.height))
                .sum::<f64>()
                / norm
        };

        self.cascade.stages.iter().all(|stage| {
            let total: f64 = stage
                .classifiers
                .iter()
                .map(|weak| {
                    let mut index = 0usize;
                    loop {
                        let node = weak.nodes[index];
                        let next = if response(node.feature) < node.threshold {
                            node.left
                        } else {
                            node.right
                        };
                        if next <= 0 {
                            break weak.leaves[next.unsigned_abs() as usize];
                        }
                        index = next as usize;
                    }
                })
                .sum();
            total >= stage.threshold - STAGE_THRESHOLD_EPS
        })
    }
}
