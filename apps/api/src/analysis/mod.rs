// Body-photo analysis pipeline: model call, extraction, shape check,
// fallback synthesis, and persistence.
// All model calls go through vision_client; no direct API calls here.

pub mod envelope;
pub mod extractor;
pub mod fallback;
pub mod gateway;
pub mod handlers;
pub mod store;
pub mod validator;
