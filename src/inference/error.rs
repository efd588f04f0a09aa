use std::path::PathBuf;

use ort::Error as OrtError;
use thiserror::Error;

/// Failures of the learned orientation models. The orientation oracle
/// absorbs all of them by falling back to the projection heuristic.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("ONNX Runtime error: {source}")]
    Ort {
        #[from]
        source: OrtError,
    },

    #[error("Model file not found: {path}")]
    ModelFileMissing { path: PathBuf },

    #[error("Failed to load model file: {path}")]
    ModelFileLoadError {
        path: PathBuf,
        #[source]
        source: OrtError,
    },

    #[error("{model} forward pass failed")]
    ModelExecutionError {
        model: &'static str,
        #[source]
        source: OrtError,
    },

    #[error("Image of {width}x{height} is too small for {model}")]
    InputTooSmall {
        model: &'static str,
        width: u32,
        height: u32,
    },

    #[error("{model} tensor conversion failed: {message}")]
    TensorError { model: &'static str, message: String },

    #[error("{model} produced no output named '{name}'")]
    OutputMissing {
        model: &'static str,
        name: &'static str,
    },

    #[error("{model} returned {got} scores, expected {expected}")]
    UnexpectedScores {
        model: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Orientation model unavailable: {message}")]
    Unavailable { message: String },
}
