// Library modules, shared by the server binary and the integration tests
pub mod chat;
pub mod config;
pub mod data_model;
pub mod error;
pub mod executor;
pub mod ingestion;
pub mod notifications;
pub mod pipeline;
pub mod processor;
pub mod providers;
pub mod server;
pub mod store;
pub mod utils;

pub use error::{DocFlowError, Result};
pub use executor::{PipelineExecutor, ProcessingStep};
