// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod error;
pub mod mail;
pub mod models;
pub mod pipeline;
pub mod setup;
pub mod status;
pub mod store;
pub mod utils;

pub use config::{ArtifactConfig, ColumnConfig, Config, MailConfig, StoreBackend, StoreConfig};
pub use error::{PipelineError, Result};
pub use mail::{EmailTemplate, Envelope, MailTransport, MessageComposer, PreviewTransport, SmtpMailer};
pub use models::{ColumnMap, Participant, RowState, Table};
pub use pipeline::{
    ArtifactGenerator, AssignReport, DeliveryDispatcher, DispatchOptions, DispatchReport,
    GenerateReport, IdentifierAssigner, PipelineCoordinator, PipelineReport,
};
pub use status::{ProjectStatus, check_configuration, check_prerequisites};
pub use store::{CsvRowStore, MemoryRowStore, RowStore, SheetsRowStore, open_store};
pub use utils::{HealthCheck, HealthReport, HealthStatus, OperationTimer, Validator};
