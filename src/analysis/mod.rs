pub mod amplitude;
pub mod error;
pub mod spectrum;
pub mod timeline;
pub mod types;
pub mod worker;

pub use error::AnalysisError;
pub use types::{AmplitudePoint, AnalysisRequest, AnalysisResult, FrequencyBar, RequestId};
pub use worker::AnalysisWorker;
