// file: src/pipeline/mod.rs
// description: pipeline stages and their coordinator
// reference: pipeline orchestration

pub mod artifacts;
pub mod coordinator;
pub mod dispatch;
pub mod ids;
mod progress;

pub use artifacts::{ArtifactGenerator, ArtifactNaming, ArtifactStatus, GenerateReport};
pub use coordinator::{PipelineCoordinator, PipelineReport};
pub use dispatch::{DeliveryDispatcher, DispatchOptions, DispatchReport};
pub use ids::{AssignReport, IdentifierAssigner};
pub use progress::{StageCounts, StageProgress};
