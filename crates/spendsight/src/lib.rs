pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod insight;
pub mod notify;
pub mod pipeline;
pub mod receipt;
pub mod secrets;
pub mod server;
pub mod storage;
pub mod text;
pub mod uploads;

pub use analytics::SpendingAnalytics;
pub use config::Config;
pub use error::{Result, SpendsightError};
pub use pipeline::{Pipeline, PipelineContext, RunResult};
pub use receipt::{LineItem, ObjectRef, Receipt};
