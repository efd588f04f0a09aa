use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use formsight::document::{PdfRasterizer, PdfiumBackend};
use formsight::geometry::GeometryCorrector;
use formsight::inference::{LcNetConfig, LcNetOrientationDetector};
use formsight::orientation::{OrientationDetector, OrientationOracle};
use formsight::quality::QualityAssessor;
use formsight::utils::{AppConfig, DebugDumper, LanguageDirection};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "formsight")]
#[command(about = "Normalize photographed forms and rasterize PDFs for form filling")]
struct Args {
    /// Configuration file; defaults to config/formsight.json when present
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured model directory
    #[arg(long, global = true)]
    models: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Correct a photographed page and print diagnostics with a quality verdict
    Correct {
        image: PathBuf,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long, short = 'd', default_value_t = LanguageDirection::Rtl)]
        direction: LanguageDirection,
    },

    /// Render every page of a PDF to PNG files
    Rasterize { pdf: PathBuf, out_dir: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formsight=info".into()),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => AppConfig::init_from(path)?.clone(),
        None => AppConfig::init()?.clone(),
    };
    if let Some(models) = args.models {
        config.model_directory = models.into();
    }

    match args.command {
        Command::Correct {
            image,
            output,
            direction,
        } => correct(&config, &image, output.as_ref(), direction),
        Command::Rasterize { pdf, out_dir } => rasterize(&config, &pdf, &out_dir),
    }
}

/// Loads the learned orientation models, falling back to the projection
/// heuristic alone when they are unavailable.
fn build_oracle(config: &AppConfig) -> OrientationOracle {
    if let Err(e) = setup_ort() {
        warn!(error = %e, "ONNX Runtime unavailable, using heuristic orientation");
        return OrientationOracle::heuristic_only();
    }

    match LcNetOrientationDetector::new(&LcNetConfig::from_app_config(config)) {
        Ok(detector) => {
            let detector: Arc<dyn OrientationDetector> = Arc::new(detector);
            OrientationOracle::new(Some(detector), config.geometry.decisiveness_margin)
        }
        Err(e) => {
            warn!(error = %e, "Orientation models unavailable, using heuristic orientation");
            OrientationOracle::heuristic_only()
        }
    }
}

fn setup_ort() -> Result<(), Box<dyn std::error::Error>> {
    let dylib_path =
        env::var("ORT_DYLIB_PATH").unwrap_or_else(|_| "/usr/lib/libonnxruntime.so".to_string());

    ort::init_from(dylib_path).with_name("formsight").commit()?;

    Ok(())
}

fn correct(
    config: &AppConfig,
    path: &PathBuf,
    output: Option<&PathBuf>,
    direction: LanguageDirection,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    config.check_upload_size(bytes.len())?;

    let corrector = GeometryCorrector::new(config.geometry.clone(), build_oracle(config));
    let (image, diagnostics) = corrector.correct_bytes(&bytes)?;
    let verdict = QualityAssessor::default().assess_localized(&image, direction);

    DebugDumper::new(config.debug_dump_directory.as_deref()).dump("cli", "corrected", &image);

    if let Some(output) = output {
        image.save(output)?;
        info!(path = %output.display(), "Wrote corrected image");
    }

    let report = json!({
        "diagnostics": diagnostics,
        "quality": verdict,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn rasterize(
    config: &AppConfig,
    path: &PathBuf,
    out_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    config.check_upload_size(bytes.len())?;

    let rasterized = PdfiumBackend::new(config.pdf.clone()).rasterize(&bytes)?;

    fs::create_dir_all(out_dir)?;
    for (i, page) in rasterized.pages.iter().enumerate() {
        let page_path = out_dir.join(format!("page_{:03}.png", i + 1));
        page.save(&page_path)?;
    }
    fs::write(
        out_dir.join("metadata.json"),
        serde_json::to_string_pretty(&rasterized.metadata)?,
    )?;

    info!(
        pages = rasterized.pages.len(),
        dir = %out_dir.display(),
        "Wrote rasterized pages"
    );
    Ok(())
}
