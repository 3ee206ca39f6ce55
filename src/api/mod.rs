mod client;
mod multipart;
mod request;

pub use client::{ApiClient, ErrorObserver};
pub use multipart::{MultipartField, MultipartForm};
pub use request::{OutgoingRequest, RequestBody};
