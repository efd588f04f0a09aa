pub mod config;
pub mod debug_dump;
pub mod error;
pub mod image_utils;
pub mod lang_utils;

pub use config::{AppConfig, GeometryConfig, PdfConfig, SessionConfig};
pub use debug_dump::DebugDumper;
pub use lang_utils::{LangUtils, LanguageDirection};
