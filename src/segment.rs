//! Background removal using a loaded segmentation model.
//!
//! The model scores every pixel with a background probability in `0..=1`.
//! Pixels scoring above the model threshold are replaced with a flat grey.
//!
//! Model files are YAML:
//!
//! ```yaml
//! kind: chroma_key
//! key: [0, 177, 64]
//! tolerance: 120.0
//! threshold: 0.2
//! ```

use image::{Rgb, RgbImage};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::processor::Transform;
use crate::{Result, StreamError};

/// Replacement colour for background pixels
pub const BACKGROUND_COLOUR: Rgb<u8> = Rgb([192, 192, 192]);

/// Default mask threshold above which a pixel counts as background
pub const DEFAULT_THRESHOLD: f32 = 0.2;

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

/// Supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Background probability falls off linearly with RGB distance to `key`
    ChromaKey,
}

/// Loaded segmentation model. Immutable after loading and shared by all workers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentationModel {
    pub kind: ModelKind,
    pub key: [u8; 3],
    pub tolerance: f32,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl SegmentationModel {
    /// Chroma-key model with the default threshold
    pub fn chroma_key(key: [u8; 3], tolerance: f32) -> Self {
        Self { kind: ModelKind::ChromaKey, key, tolerance, threshold: DEFAULT_THRESHOLD }
    }

    /// Load a model file. A missing or invalid model is fatal at startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| StreamError::file_error(path, e))?;
        let model = Self::from_yaml_str(&text)?;
        info!(
            "Loaded {:?} segmentation model from {} (threshold {})",
            model.kind,
            path.display(),
            model.threshold
        );
        Ok(model)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let model: Self = serde_yaml_ng::from_str(text)
            .map_err(|e| StreamError::config(format!("segmentation model: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(StreamError::config(format!(
                "model tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(StreamError::config(format!(
                "model threshold must be within 0..=1, got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Background probability of one pixel
    pub fn score(&self, pixel: &Rgb<u8>) -> f32 {
        match self.kind {
            ModelKind::ChromaKey => {
                let distance = pixel
                    .0
                    .iter()
                    .zip(self.key)
                    .map(|(&p, k)| {
                        let d = f32::from(p) - f32::from(k);
                        d * d
                    })
                    .sum::<f32>()
                    .sqrt();
                (1.0 - distance / self.tolerance).clamp(0.0, 1.0)
            }
        }
    }

    /// Per-pixel background probabilities in row-major order
    pub fn mask(&self, image: &RgbImage) -> Vec<f32> {
        image.pixels().map(|p| self.score(p)).collect()
    }
}

/// Transform replacing background pixels with [`BACKGROUND_COLOUR`]
#[derive(Debug, Clone)]
pub struct BackgroundRemover {
    model: SegmentationModel,
}

impl BackgroundRemover {
    pub fn new(model: SegmentationModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &SegmentationModel {
        &self.model
    }
}

impl Transform for BackgroundRemover {
    fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        let mut output = image.clone();
        for pixel in output.pixels_mut() {
            if self.model.score(pixel) > self.model.threshold {
                *pixel = BACKGROUND_COLOUR;
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: [u8; 3] = [0, 177, 64];

    #[test]
    fn keyed_pixels_become_background() {
        let remover = BackgroundRemover::new(SegmentationModel::chroma_key(GREEN, 120.0));

        let mut image = RgbImage::from_pixel(4, 1, Rgb(GREEN));
        image.put_pixel(0, 0, Rgb([230, 40, 40]));
        image.put_pixel(1, 0, Rgb([10, 170, 70]));

        let output = remover.apply(&image).unwrap();
        assert_eq!(output.get_pixel(0, 0), &Rgb([230, 40, 40]));
        assert_eq!(output.get_pixel(1, 0), &BACKGROUND_COLOUR);
        assert_eq!(output.get_pixel(3, 0), &BACKGROUND_COLOUR);
        assert_eq!(output.dimensions(), image.dimensions());
    }

    #[test]
    fn threshold_is_strict() {
        let mut model = SegmentationModel::chroma_key([0, 0, 0], 100.0);
        model.threshold = 0.5;
        let remover = BackgroundRemover::new(model);

        // Distance 50 scores exactly 0.5: kept
        let image = RgbImage::from_pixel(1, 1, Rgb([50, 0, 0]));
        assert_eq!(remover.apply(&image).unwrap().get_pixel(0, 0), &Rgb([50, 0, 0]));
    }

    #[test]
    fn mask_scores_stay_in_unit_range() {
        let model = SegmentationModel::chroma_key(GREEN, 60.0);
        let image = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 64]));
        assert!(model.mask(&image).iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn model_loads_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segmenter.yaml");
        std::fs::write(&path, "kind: chroma_key\nkey: [0, 177, 64]\ntolerance: 90\n").unwrap();

        let model = SegmentationModel::load(&path).unwrap();
        assert_eq!(model.kind, ModelKind::ChromaKey);
        assert_eq!(model.key, GREEN);
        assert_eq!(model.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn missing_model_is_fatal() {
        let err = SegmentationModel::load("/nonexistent/segmenter.yaml").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, StreamError::File { .. }));
    }

    #[test]
    fn invalid_models_are_rejected() {
        for yaml in [
            "kind: neural_net\nkey: [0, 0, 0]\ntolerance: 10\n",
            "kind: chroma_key\nkey: [0, 0, 0]\ntolerance: 0\n",
            "kind: chroma_key\nkey: [0, 0, 0]\ntolerance: 10\nthreshold: 1.5\n",
            "kind: chroma_key\nkey: [0, 0]\ntolerance: 10\n",
        ] {
            assert!(matches!(
                SegmentationModel::from_yaml_str(yaml),
                Err(StreamError::Config { .. })
            ));
        }
    }
}
