// file: src/pipeline/dispatch.rs
// description: sends one notification per undelivered row and records delivery in the row store
// reference: rows are marked immediately after a successful send, before the next row

use crate::config::{ColumnConfig, MailConfig};
use crate::error::{PipelineError, Result};
use crate::mail::{MailTransport, MessageComposer};
use crate::models::{ColumnMap, DELIVERED_MARKER, Participant, RowState};
use crate::pipeline::artifacts::ArtifactGenerator;
use crate::pipeline::progress::StageProgress;
use crate::store::RowStore;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Pause after every send attempt to stay inside provider rate limits.
    pub send_delay: Duration,
    /// Hand envelopes to the transport but write no markers and skip the delay.
    pub dry_run: bool,
}

impl DispatchOptions {
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            send_delay: config.send_delay(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub rows_total: usize,
    pub sent: usize,
    pub skipped_delivered: usize,
    pub skipped_incomplete: usize,
    pub failed: usize,
    pub missing_artifacts: usize,
    pub marker_column_created: bool,
    pub dry_run: bool,
}

pub struct DeliveryDispatcher<'a> {
    store: &'a dyn RowStore,
    transport: &'a dyn MailTransport,
    composer: &'a MessageComposer,
    artifacts: &'a ArtifactGenerator,
    columns: &'a ColumnConfig,
    options: DispatchOptions,
}

impl<'a> DeliveryDispatcher<'a> {
    pub fn new(
        store: &'a dyn RowStore,
        transport: &'a dyn MailTransport,
        composer: &'a MessageComposer,
        artifacts: &'a ArtifactGenerator,
        columns: &'a ColumnConfig,
        options: DispatchOptions,
    ) -> Self {
        Self {
            store,
            transport,
            composer,
            artifacts,
            columns,
            options,
        }
    }

    /// Rows go out in table order. A row already marked is never handed to
    /// the transport again; a failed send leaves the row unmarked for the
    /// next run. Store failures abort the run.
    pub async fn run(&self) -> Result<DispatchReport> {
        let table = self.store.read_table().await?;
        let mut report = DispatchReport {
            dry_run: self.options.dry_run,
            ..DispatchReport::default()
        };

        if table.is_empty() {
            warn!("{} is empty, nothing to send", self.store.describe());
            return Ok(report);
        }

        let mut columns = ColumnMap::resolve(&table, self.columns)?;
        let marker_column = match columns.delivered {
            Some(index) => index,
            None => {
                let index = table.headers().len();
                if !self.options.dry_run {
                    self.store
                        .write_cell(1, index + 1, &self.columns.delivered)
                        .await?;
                    report.marker_column_created = true;
                    info!(
                        "Created '{}' column at column {}",
                        self.columns.delivered,
                        index + 1
                    );
                }
                index
            }
        };
        columns.delivered = Some(marker_column);

        report.rows_total = table.row_count();
        let progress = StageProgress::new("Sending emails", table.row_count());

        for index in 0..table.row_count() {
            let participant = Participant::from_row(&table, index, &columns);
            let row = participant.sheet_row;
            let artifact_path = self.artifacts.path_for(&participant.unique_id);
            let state = participant.state(artifact_path.is_file());

            if state == RowState::Delivered {
                report.skipped_delivered += 1;
                progress.skipped();
                info!("Row {}: already sent, skipping", row);
                continue;
            }

            let missing = participant.missing_fields();
            if !missing.is_empty() {
                report.skipped_incomplete += 1;
                progress.skipped();
                let reason = PipelineError::RowData {
                    row,
                    reason: format!("missing {}, skipping", missing.join(", ")),
                };
                debug!("{}", reason);
                continue;
            }

            let composed = self.composer.compose(&participant, &artifact_path);
            if state != RowState::ArtifactReady || !composed.artifact_attached {
                report.missing_artifacts += 1;
                warn!(
                    "Row {}: QR code image not found at {}, sending without it",
                    row,
                    artifact_path.display()
                );
            }

            progress.set_message(format!("→ {}", participant.email));

            match self.transport.send(&composed.envelope).await {
                Ok(()) if self.options.dry_run => {
                    report.sent += 1;
                    progress.succeeded();
                    continue;
                }
                Ok(()) => {
                    self.store
                        .write_cell(row, marker_column + 1, DELIVERED_MARKER)
                        .await?;
                    report.sent += 1;
                    progress.succeeded();
                    info!("Row {}: sent to {}", row, participant.email);
                }
                Err(e) if !e.is_row_level() => return Err(e),
                Err(e) => {
                    report.failed += 1;
                    progress.failed();
                    error!("Row {}: failed to send to {}: {}", row, participant.email, e);
                }
            }

            if !self.options.send_delay.is_zero() {
                tokio::time::sleep(self.options.send_delay).await;
            }
        }

        progress.finish();
        info!(
            "Emails sent: {} | already sent: {} | incomplete: {} | failed: {} | without QR: {}",
            report.sent,
            report.skipped_delivered,
            report.skipped_incomplete,
            report.failed,
            report.missing_artifacts
        );
        Ok(report)
    }
}
