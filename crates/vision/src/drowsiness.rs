//! Eyes-closed heuristic over still images: a face in which fewer than
//! `min_eyes_awake` eyes are found counts as drowsy.

use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};
use serde::Serialize;
use tracing::{debug, info, instrument};

use vigil_domain::DrowsinessSettings;

use crate::detector::{CascadeDetector, DetectParams, ObjectDetector, Region};
use crate::error::VisionError;

pub const DROWSY_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
pub const AWAKE_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceState {
    Awake,
    Drowsy,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceReport {
    pub region: Region,
    /// Eye boxes in image coordinates.
    pub eyes: Vec<Region>,
    pub state: FaceState,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    pub faces: Vec<FaceReport>,
    pub drowsy_count: usize,
}

impl DetectionResult {
    /// Headline count shown after every check, including zero.
    pub fn message(&self) -> String {
        format!("Sleeping people: {}", self.drowsy_count)
    }
}

pub struct DrowsinessDetector<F, E> {
    faces: F,
    eyes: E,
    min_eyes_awake: usize,
}

impl DrowsinessDetector<CascadeDetector, CascadeDetector> {
    /// Loads both cascades named in the settings.
    pub fn from_settings(settings: &DrowsinessSettings) -> Result<Self, VisionError> {
        let faces = CascadeDetector::load(
            &settings.face_cascade,
            DetectParams::new(
                settings.face_scale_factor as f64,
                settings.face_min_neighbors,
            ),
        )?;
        let eyes = CascadeDetector::load(
            &settings.eye_cascade,
            DetectParams::new(settings.eye_scale_factor as f64, settings.eye_min_neighbors),
        )?;
        Ok(Self::new(faces, eyes, settings.min_eyes_awake))
    }
}

impl<F: ObjectDetector, E: ObjectDetector> DrowsinessDetector<F, E> {
    pub fn new(faces: F, eyes: E, min_eyes_awake: usize) -> Self {
        Self {
            faces,
            eyes,
            min_eyes_awake,
        }
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn analyze(&self, image: &DynamicImage) -> DetectionResult {
        self.analyze_gray(&image.to_luma8())
    }

    pub fn analyze_gray(&self, gray: &GrayImage) -> DetectionResult {
        let (width, height) = gray.dimensions();
        let faces: Vec<FaceReport> = self
            .faces
            .detect(gray)
            .into_iter()
            .filter_map(|face| face.clamp_to(width, height))
            .map(|face| {
                let roi = imageops::crop_imm(gray, face.x, face.y, face.width, face.height)
                    .to_image();
                let eyes: Vec<Region> = self
                    .eyes
                    .detect(&roi)
                    .into_iter()
                    .map(|eye| face.offset_from(eye))
                    .collect();
                let state = if eyes.len() < self.min_eyes_awake {
                    FaceState::Drowsy
                } else {
                    FaceState::Awake
                };
                debug!(?face, eyes = eyes.len(), ?state, "face classified");
                FaceReport {
                    region: face,
                    eyes,
                    state,
                }
            })
            .collect();
        let drowsy_count = faces
            .iter()
            .filter(|face| face.state == FaceState::Drowsy)
            .count();
        info!(faces = faces.len(), drowsy_count, "drowsiness check done");
        DetectionResult {
            faces,
            drowsy_count,
        }
    }
}

/// RGB copy of `image` with each face boxed red when drowsy, green when awake.
pub fn annotate(image: &DynamicImage, result: &DetectionResult) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for face in &result.faces {
        let colour = match face.state {
            FaceState::Drowsy => DROWSY_COLOUR,
            FaceState::Awake => AWAKE_COLOUR,
        };
        draw_box(&mut canvas, face.region, colour, BOX_THICKNESS);
    }
    canvas
}

fn draw_box(canvas: &mut RgbImage, region: Region, colour: Rgb<u8>, thickness: u32) {
    let (width, height) = canvas.dimensions();
    let Some(region) = region.clamp_to(width, height) else {
        return;
    };
    let x1 = region.x + region.width - 1;
    let y1 = region.y + region.height - 1;
    let rings = thickness
        .min((region.width + 1) / 2)
        .min((region.height + 1) / 2);
    for inset in 0..rings {
        let (left, right) = (region.x + inset, x1 - inset);
        let (top, bottom) = (region.y + inset, y1 - inset);
        for x in left..=right {
            canvas.put_pixel(x, top, colour);
            canvas.put_pixel(x, bottom, colour);
        }
        for y in top..=bottom {
            canvas.put_pixel(left, y, colour);
            canvas.put_pixel(right, y, colour);
        }
    }
}
