pub mod client;
pub mod error;
pub mod models;

pub use client::{ApiClient, ClientConfig, PAGE_SIZE};
pub use error::{ApiError, ApiResult};
