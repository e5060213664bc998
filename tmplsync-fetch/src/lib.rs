pub mod client;
pub mod completion;
pub mod error;
pub mod listing;

pub use client::TemplateClient;
pub use completion::{ChatMessage, CompletionClient};
pub use error::FetchError;
pub use listing::{ListingPage, ListingSummary, unwrap_workflow_envelope};
