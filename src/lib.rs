pub mod batch;
pub mod classifier;
pub mod config;
pub mod decoding;
pub mod error;
pub mod extraction;
pub mod gmail;
pub mod inbox;
pub mod message;
pub mod normalization;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::BatchFetcher;
pub use classifier::{Category, Classification, ClassificationMap, ClassificationOrchestrator};
pub use config::Config;
pub use decoding::ContentDecoder;
pub use error::{Result, TriageError};
pub use extraction::{BodyExtractor, ExtractionPolicy};
pub use inbox::{FetchToken, InboxState};
pub use message::{Part, RawMessage};
pub use normalization::{CanonicalRecord, MessageDetail, MessageNormalizer};
