//! Extraction service client
//!
//! The coordinator reaches the extraction service through the
//! [`ExtractionService`] trait. [`HttpExtractionService`] is the production
//! implementation: it posts each file as multipart form data and decodes the
//! JSON result.

mod http;
mod traits;

pub use http::HttpExtractionService;
pub use traits::ExtractionService;
