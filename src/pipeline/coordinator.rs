// file: src/pipeline/coordinator.rs
// description: sequences identifier assignment, artifact generation and delivery
// reference: stages share one row store and one config; nothing is rolled back

use crate::config::Config;
use crate::error::Result;
use crate::mail::{MailTransport, MessageComposer};
use crate::pipeline::artifacts::{ArtifactGenerator, GenerateReport};
use crate::pipeline::dispatch::{DeliveryDispatcher, DispatchOptions, DispatchReport};
use crate::pipeline::ids::{AssignReport, IdentifierAssigner};
use crate::store::RowStore;
use crate::utils::OperationTimer;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub assign: Option<AssignReport>,
    pub generate: Option<GenerateReport>,
    pub dispatch: Option<DispatchReport>,
}

pub struct PipelineCoordinator<'a> {
    store: &'a dyn RowStore,
    config: &'a Config,
}

impl<'a> PipelineCoordinator<'a> {
    pub fn new(store: &'a dyn RowStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    pub fn artifact_generator(&self) -> ArtifactGenerator {
        ArtifactGenerator::new(&self.config.artifacts)
    }

    pub async fn assign_ids(&self) -> Result<AssignReport> {
        let timer = OperationTimer::new("assign identifiers");
        let mut assigner = IdentifierAssigner::new(self.artifact_generator().naming());

        match assigner.assign(self.store, &self.config.columns).await {
            Ok(report) => {
                timer.finish_with_count(report.rows_total);
                Ok(report)
            }
            Err(e) => {
                timer.fail(&e.to_string());
                Err(e)
            }
        }
    }

    pub async fn generate_artifacts(&self, force: bool) -> Result<GenerateReport> {
        let timer = OperationTimer::new("generate QR codes");
        let generator = self.artifact_generator().with_force(force);

        match generator
            .generate_from_store(self.store, &self.config.columns)
            .await
        {
            Ok(report) => {
                timer.finish_with_count(report.rows_total);
                Ok(report)
            }
            Err(e) => {
                timer.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Template and shared document are read once here, then reused for
    /// every row of the batch.
    pub async fn send_deliveries(
        &self,
        transport: &dyn MailTransport,
        options: DispatchOptions,
    ) -> Result<DispatchReport> {
        let timer = OperationTimer::new("send emails");
        let composer = MessageComposer::load(&self.config.mail);
        let generator = self.artifact_generator();
        let dispatcher = DeliveryDispatcher::new(
            self.store,
            transport,
            &composer,
            &generator,
            &self.config.columns,
            options,
        );

        match dispatcher.run().await {
            Ok(report) => {
                timer.finish_with_count(report.rows_total);
                Ok(report)
            }
            Err(e) => {
                timer.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Stops at the first stage that returns an error; earlier stages keep
    /// their effects.
    pub async fn run_all(
        &self,
        transport: &dyn MailTransport,
        options: DispatchOptions,
    ) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();

        info!("Step 1/3: assigning identifiers");
        report.assign = Some(self.stage(self.assign_ids().await, &report)?);

        info!("Step 2/3: generating QR codes");
        report.generate = Some(self.stage(self.generate_artifacts(false).await, &report)?);

        info!("Step 3/3: sending emails");
        report.dispatch = Some(self.stage(self.send_deliveries(transport, options).await, &report)?);

        info!("Pipeline complete");
        Ok(report)
    }

    fn stage<T>(&self, result: Result<T>, completed: &PipelineReport) -> Result<T> {
        result.inspect_err(|e| {
            error!("Pipeline stopped: {}", e);
            if let Ok(json) = serde_json::to_string(completed) {
                info!("Completed stages: {}", json);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::mail::Envelope;
    use crate::store::MemoryRowStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MailTransport for CountingTransport {
        async fn send(&self, envelope: &Envelope) -> Result<()> {
            self.sent.lock().unwrap().push(envelope.to.clone());
            Ok(())
        }
    }

    fn config(temp: &TempDir) -> Config {
        let mut config = Config::default_config();
        config.artifacts.output_dir = temp.path().join("qr_codes");
        config.mail.template_path = temp.path().join("missing_template.html");
        config.mail.attachment_path = temp.path().join("missing.pdf");
        config
    }

    fn options() -> DispatchOptions {
        DispatchOptions {
            send_delay: Duration::ZERO,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn test_run_all_completes_every_stage() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let store = MemoryRowStore::from_rows(
            &["name", "email"],
            &[&["Ann", "ann@x.com"], &["Bo", "bo@x.com"]],
        );
        let transport = CountingTransport::default();

        let report = PipelineCoordinator::new(&store, &config)
            .run_all(&transport, options())
            .await
            .unwrap();

        assert_eq!(report.assign.unwrap().assigned, 2);
        assert_eq!(report.generate.unwrap().generated, 2);
        let dispatch = report.dispatch.unwrap();
        assert_eq!(dispatch.sent, 2);
        assert_eq!(dispatch.missing_artifacts, 0);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_stage_stops_later_stages() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let store = MemoryRowStore::from_rows(&["name", "email"], &[&["Ann", "ann@x.com"]]);
        store.set_unavailable(true);
        let transport = CountingTransport::default();

        let result = PipelineCoordinator::new(&store, &config)
            .run_all(&transport, options())
            .await;

        assert!(matches!(result, Err(PipelineError::RowStore(_))));
        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(!temp.path().join("qr_codes").exists());
    }

    #[tokio::test]
    async fn test_stages_run_individually() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let store = MemoryRowStore::from_rows(&["name", "email"], &[&["Ann", "ann@x.com"]]);
        let coordinator = PipelineCoordinator::new(&store, &config);

        let generate = coordinator.generate_artifacts(false).await;
        assert!(matches!(generate, Err(PipelineError::MissingColumn(_))));

        coordinator.assign_ids().await.unwrap();
        let generate = coordinator.generate_artifacts(false).await.unwrap();
        assert_eq!(generate.generated, 1);

        let again = coordinator.generate_artifacts(false).await.unwrap();
        assert_eq!(again.existing, 1);

        let forced = coordinator.generate_artifacts(true).await.unwrap();
        assert_eq!(forced.generated, 1);
    }
}
