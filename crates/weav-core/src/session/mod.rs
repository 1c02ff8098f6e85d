//! Session domain types and the backend session API seam.

pub mod api;
pub mod model;

pub use api::SessionApi;
pub use model::{ImageRecord, Message, Role, Session, SessionKind};
