/// Pipeline services
pub mod audit;
pub mod completion;
pub mod ingest;
pub mod producer;
pub mod transform;
pub mod worker;

pub use audit::PendingAudit;
pub use completion::{CompletionHandler, CompletionReport, ObjectCleanup};
pub use ingest::{IngestRequest, IngestService};
pub use producer::TaskProducer;
pub use transform::{ImageTransformer, TransformConfig, TransformedImage};
pub use worker::TaskWorker;
