// Library interface for testing

pub mod config;
pub mod constants;
pub mod media;
pub mod serve;
pub mod store;
pub mod validation;

pub use media::{MediaFile, MediaType};
pub use store::MetadataStore;
