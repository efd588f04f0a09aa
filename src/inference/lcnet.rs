//! PP-LCNet orientation classifiers.
//!
//! Two ONNX models back [`LcNetOrientationDetector`]: a 4-class whole-page
//! classifier (0/90/180/270) at 224x224 and a 2-class text-line classifier
//! (0/180) at 160x80 whose upright probability serves as text confidence.

use std::path::{Path, PathBuf};

use image::{imageops, RgbImage};
use ort::{inputs, session::builder::PrepackedWeights, session::Session, value::Value};
use tracing::info;

use crate::inference::{InferenceError, SessionPool};
use crate::orientation::OrientationDetector;
use crate::utils::config::AppConfig;
use crate::utils::image_utils;

/// Locations and pool sizing for the orientation models.
#[derive(Debug, Clone)]
pub struct LcNetConfig {
    pub document_model: PathBuf,
    pub text_model: PathBuf,
    pub pool_size: usize,
    pub threads: usize,
}

impl LcNetConfig {
    const DOCUMENT_MODEL_PATH: &'static str = "onnx/document_orientation_classification.onnx";
    const TEXT_MODEL_PATH: &'static str = "onnx/text_orientation_classification.onnx";

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            document_model: config.model_path(Self::DOCUMENT_MODEL_PATH),
            text_model: config.model_path(Self::TEXT_MODEL_PATH),
            pool_size: 2,
            threads: config.inference_threads,
        }
    }
}

const INPUT_NAME: &str = "x";
const OUTPUT_NAME: &str = "fetch_name_0";

/// One LCNet classifier session with its input geometry.
struct LcNet {
    name: &'static str,
    session: Session,
    dst_width: u32,
    dst_height: u32,
}

impl LcNet {
    /// Inputs are scaled to [-1, 1].
    const MEAN: [f32; 3] = [127.5, 127.5, 127.5];
    const NORM: [f32; 3] = [1.0 / 127.5, 1.0 / 127.5, 1.0 / 127.5];

    fn new(
        name: &'static str,
        model_path: &Path,
        (dst_width, dst_height): (u32, u32),
        threads: usize,
        prepacked: &PrepackedWeights,
    ) -> Result<Self, InferenceError> {
        if !model_path.exists() {
            return Err(InferenceError::ModelFileMissing {
                path: model_path.to_path_buf(),
            });
        }

        let session = Session::builder()
            .map_err(|source| InferenceError::ModelFileLoadError {
                path: model_path.to_path_buf(),
                source,
            })?
            .with_intra_threads(threads)?
            .with_prepacked_weights(prepacked)?
            .commit_from_file(model_path)
            .map_err(|source| InferenceError::ModelFileLoadError {
                path: model_path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            name,
            session,
            dst_width,
            dst_height,
        })
    }

    /// Raw class scores for `src`, in the model's class order.
    fn classify(&mut self, src: &RgbImage) -> Result<Vec<f32>, InferenceError> {
        if src.width() < 2 || src.height() < 2 {
            return Err(InferenceError::InputTooSmall {
                model: self.name,
                width: src.width(),
                height: src.height(),
            });
        }

        let resized = imageops::resize(
            src,
            self.dst_width,
            self.dst_height,
            imageops::FilterType::Triangle,
        );
        let tensor = image_utils::subtract_mean_normalize(&resized, &Self::MEAN, &Self::NORM);

        let shape = tensor.shape().to_vec();
        let (data, _offset) = tensor.into_raw_vec_and_offset();
        let input = Value::from_array((shape.as_slice(), data)).map_err(|e| {
            InferenceError::TensorError {
                model: self.name,
                message: e.to_string(),
            }
        })?;

        let model = self.name;
        let outputs = self
            .session
            .run(inputs![INPUT_NAME => input])
            .map_err(|source| InferenceError::ModelExecutionError { model, source })?;

        let (_, scores) = outputs
            .get(OUTPUT_NAME)
            .ok_or(InferenceError::OutputMissing {
                model,
                name: OUTPUT_NAME,
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::TensorError {
                model,
                message: e.to_string(),
            })?;

        Ok(scores.to_vec())
    }
}

/// ORT-backed [`OrientationDetector`].
pub struct LcNetOrientationDetector {
    document: SessionPool<LcNet>,
    text: SessionPool<LcNet>,
}

impl LcNetOrientationDetector {
    pub fn new(config: &LcNetConfig) -> Result<Self, InferenceError> {
        let document = SessionPool::new(config.pool_size, |w| {
            LcNet::new("document orientation", &config.document_model, (224, 224), config.threads, w)
        })?;
        let text = SessionPool::new(config.pool_size, |w| {
            LcNet::new("text orientation", &config.text_model, (160, 80), config.threads, w)
        })?;

        info!(
            document_model = %config.document_model.display(),
            text_model = %config.text_model.display(),
            pool_size = config.pool_size,
            "Loaded orientation models"
        );

        Ok(Self { document, text })
    }

    /// Central horizontal strip with the text model's 2:1 aspect.
    fn text_strip(image: &RgbImage) -> RgbImage {
        let height = (image.width() / 2).max(1).min(image.height());
        let top = (image.height() - height) / 2;
        imageops::crop_imm(image, 0, top, image.width(), height).to_image()
    }
}

impl OrientationDetector for LcNetOrientationDetector {
    fn detect(&self, image: &RgbImage) -> Result<[f32; 4], InferenceError> {
        let scores = self.document.with(|model| model.classify(image))?;
        if scores.len() < 4 {
            return Err(InferenceError::UnexpectedScores {
                model: "document orientation",
                expected: 4,
                got: scores.len(),
            });
        }
        Ok([scores[0], scores[1], scores[2], scores[3]])
    }

    fn text_confidence(&self, image: &RgbImage) -> Result<f32, InferenceError> {
        let strip = Self::text_strip(image);
        let scores = self.text.with(|model| model.classify(&strip))?;
        match scores.as_slice() {
            [upright, inverted, ..] => {
                let max = upright.max(*inverted);
                let a = (upright - max).exp();
                let b = (inverted - max).exp();
                Ok(a / (a + b))
            }
            _ => Err(InferenceError::UnexpectedScores {
                model: "text orientation",
                expected: 2,
                got: scores.len(),
            }),
        }
    }
}
