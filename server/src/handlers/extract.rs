//! Request extractors that reject with [`ApiError`]
//!
//! axum's own `Json`, `Path` and `Query` answer malformed input with a plain
//! text body and, for JSON, a 422. These wrappers route the rejection through
//! `ApiError` so clients always get the `ApiResponse` envelope and a 400.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
