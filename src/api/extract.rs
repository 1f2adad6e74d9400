//! Request extractors that reject with the JSON error envelope.

use axum::extract::FromRequest;

use crate::Error;

/// `axum::Json` whose rejections become [`Error`] responses instead of
/// plain-text 4xx bodies.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);
