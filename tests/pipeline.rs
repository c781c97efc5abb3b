// file: tests/pipeline.rs
// description: end-to-end runs of the three stages against an in-memory table

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use qr_mailer::pipeline::ArtifactNaming;
use qr_mailer::{
    ArtifactGenerator, Config, DispatchOptions, Envelope, MailTransport, MemoryRowStore,
    PipelineCoordinator, PipelineError, Result,
};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Records every envelope; fails once `budget` sends have gone through.
struct StubTransport {
    budget: usize,
    sent: Mutex<Vec<Envelope>>,
}

impl StubTransport {
    fn reliable() -> Self {
        Self::failing_after(usize::MAX)
    }

    fn failing_after(budget: usize) -> Self {
        Self {
            budget,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
    }
}

#[async_trait]
impl MailTransport for StubTransport {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(envelope.clone());
        if sent.len() > self.budget {
            return Err(PipelineError::Transport("421 service not available".to_string()));
        }
        Ok(())
    }
}

fn config(temp: &TempDir) -> Config {
    let mut config = Config::default_config();
    config.artifacts.output_dir = temp.path().join("qr_codes");
    config.mail.template_path = temp.path().join("email_template.html");
    config.mail.attachment_path = temp.path().join("event-schedule.pdf");
    std::fs::write(
        &config.mail.template_path,
        "<p>Hi {name}, your pass {unique_id}</p><img src=\"cid:qr_code\">",
    )
    .unwrap();
    std::fs::write(&config.mail.attachment_path, b"%PDF-1.4 schedule").unwrap();
    config
}

fn options() -> DispatchOptions {
    DispatchOptions {
        send_delay: Duration::ZERO,
        dry_run: false,
    }
}

fn ann_and_bo() -> MemoryRowStore {
    MemoryRowStore::from_rows(
        &["name", "email", "unique_id", "email_sent"],
        &[&["Ann", "ann@x.com", "", "no"], &["Bo", "bo@x.com", "", "no"]],
    )
}

#[tokio::test]
async fn test_end_to_end_two_participants() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let store = ann_and_bo();
    let transport = StubTransport::reliable();

    let report = PipelineCoordinator::new(&store, &config)
        .run_all(&transport, options())
        .await
        .unwrap();

    let table = store.snapshot();
    let ids: Vec<String> = (0..2).map(|row| table.cell(row, 2).to_string()).collect();
    assert!(ids.iter().all(|id| !id.is_empty()));
    assert_ne!(ids[0], ids[1]);

    let generator = ArtifactGenerator::new(&config.artifacts);
    let naming = ArtifactNaming::new(config.artifacts.id_prefix_len);
    for id in &ids {
        let path = generator.path_for(id);
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("qr_{}.png", naming.prefix(id))
        );
        assert!(ArtifactGenerator::is_valid(&path));
    }

    assert_eq!(transport.recipients(), vec!["ann@x.com", "bo@x.com"]);
    assert_eq!(table.cell(0, 3), "yes");
    assert_eq!(table.cell(1, 3), "yes");

    let envelopes = transport.sent.lock().unwrap().clone();
    assert_eq!(envelopes[0].html_body, format!("<p>Hi Ann, your pass {}</p><img src=\"cid:qr_code\">", ids[0]));
    assert!(envelopes.iter().all(|e| e.inline_image.is_some()));
    assert!(envelopes.iter().all(|e| e.attachment.is_some()));

    assert_eq!(report.assign.unwrap().assigned, 2);
    assert_eq!(report.generate.unwrap().generated, 2);
    assert_eq!(report.dispatch.unwrap().sent, 2);
}

#[tokio::test]
async fn test_rerun_sends_nothing_and_keeps_ids() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let store = ann_and_bo();
    let coordinator = PipelineCoordinator::new(&store, &config);

    coordinator
        .run_all(&StubTransport::reliable(), options())
        .await
        .unwrap();
    let before = store.snapshot();
    let column_writes = store.column_writes();

    let rerun = StubTransport::reliable();
    let report = coordinator.run_all(&rerun, options()).await.unwrap();

    assert_eq!(rerun.calls(), 0);
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.column_writes(), column_writes);
    assert_eq!(report.generate.unwrap().existing, 2);
    assert_eq!(report.dispatch.unwrap().skipped_delivered, 2);
}

#[tokio::test]
async fn test_row_with_empty_email_is_skipped_and_unmarked() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let store = MemoryRowStore::from_rows(
        &["name", "email"],
        &[&["Ann", "ann@x.com"], &["Cy", ""], &["Bo", "bo@x.com"]],
    );
    let transport = StubTransport::reliable();

    let report = PipelineCoordinator::new(&store, &config)
        .run_all(&transport, options())
        .await
        .unwrap();

    let table = store.snapshot();
    let delivered = table.column_index("email_sent").unwrap();
    assert_eq!(table.cell(1, delivered), "");
    assert_eq!(table.cell(0, delivered), "yes");
    assert_eq!(table.cell(2, delivered), "yes");
    assert_eq!(transport.recipients(), vec!["ann@x.com", "bo@x.com"]);

    let dispatch = report.dispatch.unwrap();
    assert_eq!(dispatch.skipped_incomplete, 1);
    assert_eq!(dispatch.sent, 2);
}

#[tokio::test]
async fn test_interrupted_batch_resumes_at_next_row() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let store = MemoryRowStore::from_rows(
        &["name", "email"],
        &[
            &["Ann", "ann@x.com"],
            &["Bo", "bo@x.com"],
            &["Cy", "cy@x.com"],
            &["Di", "di@x.com"],
        ],
    );
    let coordinator = PipelineCoordinator::new(&store, &config);

    let flaky = StubTransport::failing_after(2);
    let first = coordinator.run_all(&flaky, options()).await.unwrap();
    assert_eq!(first.dispatch.unwrap().failed, 2);

    let retry = StubTransport::reliable();
    let second = coordinator.send_deliveries(&retry, options()).await.unwrap();

    assert_eq!(retry.recipients(), vec!["cy@x.com", "di@x.com"]);
    assert_eq!(second.sent, 2);
    assert_eq!(second.skipped_delivered, 2);

    let table = store.snapshot();
    let delivered = table.column_index("email_sent").unwrap();
    assert!((0..4).all(|row| table.cell(row, delivered) == "yes"));
}

#[tokio::test]
async fn test_store_failure_while_marking_aborts_send_stage() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let store = ann_and_bo();
    let coordinator = PipelineCoordinator::new(&store, &config);
    coordinator.assign_ids().await.unwrap();
    coordinator.generate_artifacts(false).await.unwrap();

    store.fail_cell_writes_after(0);
    let transport = StubTransport::reliable();
    let result = coordinator.send_deliveries(&transport, options()).await;

    assert!(matches!(result, Err(PipelineError::RowStore(_))));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_identifiers_and_file_names_stay_unique() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let names: Vec<String> = (0..40).map(|i| format!("Guest {}", i)).collect();
    let emails: Vec<String> = (0..40).map(|i| format!("guest{}@x.com", i)).collect();
    let rows: Vec<Vec<&str>> = names
        .iter()
        .zip(&emails)
        .map(|(n, e)| vec![n.as_str(), e.as_str()])
        .collect();
    let row_refs: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
    let store = MemoryRowStore::from_rows(&["name", "email"], &row_refs);

    let coordinator = PipelineCoordinator::new(&store, &config);
    coordinator.assign_ids().await.unwrap();
    let report = coordinator.generate_artifacts(false).await.unwrap();

    assert_eq!(report.generated, 40);
    assert_eq!(report.prefix_collisions, 0);

    let table = store.snapshot();
    let id_column = table.column_index("unique_id").unwrap();
    let ids: HashSet<&str> = (0..40).map(|row| table.cell(row, id_column)).collect();
    assert_eq!(ids.len(), 40);
    assert_eq!(qr_mailer::status::list_artifacts(&config.artifacts.output_dir).len(), 40);
}
