//! In-memory session state.
//!
//! [`SessionStore`] tracks single-image sessions and [`PdfSessionStore`]
//! tracks multi-page workflows. Both are cheap `Clone` handles over one
//! shared map; build them at startup and pass them where needed.
//!
//! Mutations run as a single closure under the map lock against a draft of
//! the record, so callers never observe half-applied updates, and a session
//! deleted while work was in flight rejects the late result with
//! [`SessionError::NotFound`].

pub mod error;
mod map;
pub mod pdf_store;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use pdf_store::PdfSessionStore;
pub use store::SessionStore;
pub use types::{
    FieldBox, FieldKind, PageProgress, PageState, PdfMetadata, PdfProgress, PdfSession, Session,
    SessionId, Stage, UIField,
};
