// file: src/pipeline/artifacts.rs
// description: renders one QR-code PNG per identifier into the artifact directory
// reference: https://docs.rs/qrcode

use crate::config::{ArtifactConfig, ColumnConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::progress::StageProgress;
use crate::store::RowStore;
use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// Maps an identifier to its artifact file name. The mapping is a pure
/// function of the identifier and the prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactNaming {
    prefix_len: usize,
}

impl ArtifactNaming {
    pub fn new(prefix_len: usize) -> Self {
        Self { prefix_len }
    }

    pub fn prefix<'a>(&self, unique_id: &'a str) -> &'a str {
        if self.prefix_len == 0 {
            return unique_id;
        }
        match unique_id.char_indices().nth(self.prefix_len) {
            Some((end, _)) => &unique_id[..end],
            None => unique_id,
        }
    }

    pub fn file_name(&self, unique_id: &str) -> String {
        format!("qr_{}.png", self.prefix(unique_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Generated,
    Existing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
    pub rows_total: usize,
    pub generated: usize,
    pub existing: usize,
    pub failed: usize,
    pub rows_without_id: usize,
    pub prefix_collisions: usize,
}

impl GenerateReport {
    pub fn ready(&self) -> usize {
        self.generated + self.existing
    }
}

pub struct ArtifactGenerator {
    output_dir: PathBuf,
    naming: ArtifactNaming,
    box_size: u32,
    border: u32,
    force: bool,
}

impl ArtifactGenerator {
    pub fn new(config: &ArtifactConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            naming: ArtifactNaming::new(config.id_prefix_len),
            box_size: config.box_size.max(1),
            border: config.border,
            force: false,
        }
    }

    /// Regenerate even when a valid artifact is already on disk.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn naming(&self) -> ArtifactNaming {
        self.naming
    }

    pub fn path_for(&self, unique_id: &str) -> PathBuf {
        self.output_dir.join(self.naming.file_name(unique_id))
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        if !self.output_dir.is_dir() {
            fs::create_dir_all(&self.output_dir).map_err(|source| PipelineError::FileOperation {
                path: self.output_dir.clone(),
                source,
            })?;
            info!("Created directory: {}", self.output_dir.display());
        }
        Ok(())
    }

    /// An artifact counts as present only when it decodes as an image.
    pub fn is_valid(path: &Path) -> bool {
        path.is_file() && image::open(path).is_ok()
    }

    pub fn ensure(&self, unique_id: &str) -> Result<(PathBuf, ArtifactStatus)> {
        let path = self.path_for(unique_id);

        if !self.force && Self::is_valid(&path) {
            debug!("Artifact already present: {}", path.display());
            return Ok((path, ArtifactStatus::Existing));
        }

        self.ensure_output_dir()?;
        let image = self.render(unique_id, &path)?;
        self.write_atomic(&image, &path)?;
        Ok((path, ArtifactStatus::Generated))
    }

    fn render(&self, unique_id: &str, path: &Path) -> Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let code = QrCode::with_error_correction_level(unique_id.as_bytes(), EcLevel::M)
            .map_err(|e| PipelineError::Artifact {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let modules = code
            .render::<Luma<u8>>()
            .quiet_zone(false)
            .module_dimensions(self.box_size, self.box_size)
            .dark_color(Luma([0u8]))
            .light_color(Luma([255u8]))
            .build();

        let pad = self.border * self.box_size;
        let mut canvas = ImageBuffer::from_pixel(
            modules.width() + 2 * pad,
            modules.height() + 2 * pad,
            Luma([255u8]),
        );
        image::imageops::overlay(&mut canvas, &modules, i64::from(pad), i64::from(pad));
        Ok(canvas)
    }

    fn write_atomic(&self, image: &ImageBuffer<Luma<u8>, Vec<u8>>, path: &Path) -> Result<()> {
        let artifact_error = |message: String| PipelineError::Artifact {
            path: path.to_path_buf(),
            message,
        };

        let mut temp = NamedTempFile::new_in(&self.output_dir)
            .map_err(|e| artifact_error(e.to_string()))?;
        image
            .write_to(temp.as_file_mut(), ImageFormat::Png)
            .map_err(|e| artifact_error(e.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| artifact_error(e.to_string()))?;
        temp.persist(path)
            .map_err(|e| artifact_error(e.error.to_string()))?;
        Ok(())
    }

    /// Generates artifacts for every row carrying an identifier. A failing
    /// row is logged and counted; it never stops the batch.
    pub async fn generate_from_store(
        &self,
        store: &dyn RowStore,
        columns: &ColumnConfig,
    ) -> Result<GenerateReport> {
        let table = store.read_table().await?;
        let mut report = GenerateReport::default();

        if table.is_empty() {
            warn!("{} is empty, nothing to generate", store.describe());
            return Ok(report);
        }

        let id_column = table
            .column_index(&columns.unique_id)
            .ok_or_else(|| PipelineError::MissingColumn(columns.unique_id.clone()))?;

        self.ensure_output_dir()?;
        report.rows_total = table.row_count();

        let progress = StageProgress::new("Generating QR codes", table.row_count());
        let mut prefixes: HashMap<String, String> = HashMap::new();

        for index in 0..table.row_count() {
            let unique_id = table.cell(index, id_column).trim();
            if unique_id.is_empty() {
                report.rows_without_id += 1;
                progress.skipped();
                continue;
            }

            let file_name = self.naming.file_name(unique_id);
            if let Some(other) = prefixes.insert(file_name.clone(), unique_id.to_string())
                && other != unique_id
            {
                report.prefix_collisions += 1;
                warn!(
                    "Identifiers {} and {} share artifact {}",
                    other, unique_id, file_name
                );
            }

            match self.ensure(unique_id) {
                Ok((path, ArtifactStatus::Generated)) => {
                    report.generated += 1;
                    progress.succeeded();
                    info!("Generated: {}", path.display());
                }
                Ok((path, ArtifactStatus::Existing)) => {
                    report.existing += 1;
                    progress.skipped();
                    debug!("Kept: {}", path.display());
                }
                Err(e) => {
                    report.failed += 1;
                    progress.failed();
                    error!(
                        "Row {}: failed to generate artifact: {}",
                        crate::models::Table::sheet_row(index),
                        e
                    );
                }
            }
        }

        progress.finish();
        info!(
            "Artifacts in '{}': {} generated, {} kept, {} failed, {} rows without id",
            self.output_dir.display(),
            report.generated,
            report.existing,
            report.failed,
            report.rows_without_id
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryRowStore;
    use tempfile::TempDir;

    fn generator(dir: &Path) -> ArtifactGenerator {
        let mut config = Config::default_config().artifacts;
        config.output_dir = dir.join("qr_codes");
        config.box_size = 2;
        ArtifactGenerator::new(&config)
    }

    #[test]
    fn test_naming_prefix() {
        let naming = ArtifactNaming::new(8);
        let id = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";
        assert_eq!(naming.prefix(id), "1b4e28ba");
        assert_eq!(naming.file_name(id), "qr_1b4e28ba.png");
        assert_eq!(naming.prefix("abc"), "abc");
        assert_eq!(ArtifactNaming::new(0).prefix(id), id);
        assert_eq!(naming.prefix("ééééééééé"), "éééééééé");
    }

    #[test]
    fn test_same_id_same_path() {
        let temp = TempDir::new().unwrap();
        let generator = generator(temp.path());
        let id = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";

        let (first, status) = generator.ensure(id).unwrap();
        assert_eq!(status, ArtifactStatus::Generated);
        let (second, status) = generator.ensure(id).unwrap();
        assert_eq!(status, ArtifactStatus::Existing);

        assert_eq!(first, second);
        assert_eq!(first, generator.path_for(id));
        assert!(ArtifactGenerator::is_valid(&first));
    }

    #[test]
    fn test_force_overwrite_is_equivalent() {
        let temp = TempDir::new().unwrap();
        let id = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

        let (path, _) = generator(temp.path()).ensure(id).unwrap();
        let before = fs::read(&path).unwrap();

        let (path, status) = generator(temp.path()).with_force(true).ensure(id).unwrap();
        assert_eq!(status, ArtifactStatus::Generated);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_corrupt_artifact_is_replaced() {
        let temp = TempDir::new().unwrap();
        let generator = generator(temp.path());
        let id = "abcdef01-0000-4000-8000-000000000000";

        generator.ensure_output_dir().unwrap();
        fs::write(generator.path_for(id), b"not a png").unwrap();

        let (path, status) = generator.ensure(id).unwrap();
        assert_eq!(status, ArtifactStatus::Generated);
        assert!(ArtifactGenerator::is_valid(&path));
    }

    #[test]
    fn test_image_has_border() {
        let temp = TempDir::new().unwrap();
        let generator = generator(temp.path());
        let (path, _) = generator.ensure("hello").unwrap();

        let image = image::open(&path).unwrap().to_luma8();
        // version 1 symbol: 21 modules, 2px each, plus 2 modules of border per side
        assert_eq!(image.width(), (21 + 4) * 2);
        assert_eq!(image.get_pixel(0, 0), &Luma([255u8]));
        assert_eq!(image.get_pixel(4, 4), &Luma([0u8]));
    }

    #[tokio::test]
    async fn test_generate_from_store() {
        let temp = TempDir::new().unwrap();
        let generator = generator(temp.path());
        let config = Config::default_config();
        let store = MemoryRowStore::from_rows(
            &["name", "email", "unique_id"],
            &[
                &["Ann", "ann@x.com", "aaaaaaaa-1111"],
                &["Bo", "bo@x.com", ""],
                &["Cy", "cy@x.com", "aaaaaaaa-2222"],
            ],
        );

        let report = generator
            .generate_from_store(&store, &config.columns)
            .await
            .unwrap();

        assert_eq!(report.rows_total, 3);
        assert_eq!(report.rows_without_id, 1);
        assert_eq!(report.prefix_collisions, 1);
        assert_eq!(report.generated, 1);
        assert_eq!(report.existing, 1);
        assert!(generator.path_for("aaaaaaaa-1111").exists());
    }

    #[tokio::test]
    async fn test_failing_row_does_not_stop_batch() {
        let temp = TempDir::new().unwrap();
        let generator = generator(temp.path());
        let config = Config::default_config();
        let store = MemoryRowStore::from_rows(
            &["name", "email", "unique_id"],
            &[
                &["Ann", "ann@x.com", "11111111-aaaa"],
                &["Bo", "bo@x.com", "22222222-bbbb"],
                &["Cy", "cy@x.com", "33333333-cccc"],
            ],
        );

        // a directory where Bo's image belongs makes that write fail
        generator.ensure_output_dir().unwrap();
        fs::create_dir_all(generator.path_for("22222222-bbbb")).unwrap();

        let report = generator
            .generate_from_store(&store, &config.columns)
            .await
            .unwrap();

        assert_eq!(report.generated, 2);
        assert_eq!(report.failed, 1);
        assert!(ArtifactGenerator::is_valid(&generator.path_for("11111111-aaaa")));
        assert!(ArtifactGenerator::is_valid(&generator.path_for("33333333-cccc")));
    }

    #[tokio::test]
    async fn test_generate_requires_id_column() {
        let temp = TempDir::new().unwrap();
        let config = Config::default_config();
        let store = MemoryRowStore::from_rows(&["name", "email"], &[&["Ann", "ann@x.com"]]);

        let result = generator(temp.path())
            .generate_from_store(&store, &config.columns)
            .await;
        assert!(matches!(result, Err(PipelineError::MissingColumn(_))));
    }
}
