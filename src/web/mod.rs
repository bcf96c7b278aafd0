//! Web front end: server-rendered pages, the toggle endpoint and image
//! uploads.

pub mod forms;
pub mod handlers;
pub mod media;
pub mod render;
mod server;
pub mod templates;

pub use media::{MediaStore, Upload};
pub use server::{AppState, MAX_UPLOAD_BYTES, ServerHandle, build_router, start_server};
