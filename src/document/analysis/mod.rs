pub mod pipeline;

pub use pipeline::{FormPipeline, IngestOutcome};
