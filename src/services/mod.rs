//! Service layer: the completion API client, prompt construction,
//! JSON recovery from model output, and upload storage.

pub mod completion;
pub mod extract;
pub mod prompt;
pub mod storage;

pub use completion::CompletionClient;
pub use storage::ContractStore;
