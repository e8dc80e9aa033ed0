//! Persistence: writes the summaries to a plain-text file.
//!
//! Each summary is one block followed by a blank line. The body goes to a
//! sibling temp file first and is renamed over the destination, so readers
//! never see a half-written artifact.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use researchflow_shared::{PersistReceipt, ResearchError, Result, SummaryRecord};

use crate::stage::{Stage, StageData, perceived, unexpected};

const NAME: &str = "persistence";

/// Separator written after every summary block.
const BLOCK_SEPARATOR: &str = "\n\n";

/// The artifact body, rendered but not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSummaries {
    pub body: String,
    pub blocks: usize,
}

/// Writes perceived summaries to `output_path`, replacing any previous file.
#[derive(Debug)]
pub struct PersistenceStage {
    output_path: PathBuf,
    input: Option<StageData>,
}

impl PersistenceStage {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            input: None,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[async_trait]
impl Stage for PersistenceStage {
    type Decision = RenderedSummaries;

    fn name(&self) -> &'static str {
        NAME
    }

    fn perceive(&mut self, input: StageData) {
        self.input = Some(input);
    }

    async fn decide(&self) -> Result<RenderedSummaries> {
        match perceived(&self.input, NAME)? {
            StageData::Summaries(summaries) => Ok(render_summaries(summaries)),
            other => Err(unexpected(NAME, "summaries", other)),
        }
    }

    #[instrument(skip_all, fields(path = %self.output_path.display()))]
    async fn act(&mut self) -> Result<StageData> {
        let rendered = self.decide().await?;

        write_artifact(&self.output_path, &rendered.body)?;

        let receipt = PersistReceipt {
            path: self.output_path.clone(),
            blocks: rendered.blocks,
            bytes_written: rendered.body.len(),
            sha256: sha256_hex(&rendered.body),
        };

        info!(
            blocks = receipt.blocks,
            bytes = receipt.bytes_written,
            "summaries saved"
        );

        Ok(StageData::Persisted(receipt))
    }
}

/// Render summaries as blank-line separated blocks, in order.
pub fn render_summaries(summaries: &[SummaryRecord]) -> RenderedSummaries {
    let mut body = String::new();
    for summary in summaries {
        body.push_str(&summary.text);
        body.push_str(BLOCK_SEPARATOR);
    }
    RenderedSummaries {
        body,
        blocks: summaries.len(),
    }
}

/// Write `body` to `path` via a temp file and rename.
///
/// The temp file is removed again if anything fails after it was created.
fn write_artifact(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ResearchError::persistence(parent, e))?;
    }

    let temp = temp_path(path);

    if let Err(e) = write_file(&temp, body) {
        let _ = std::fs::remove_file(&temp);
        return Err(ResearchError::persistence(path, e));
    }

    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        ResearchError::persistence(path, e)
    })
}

/// Scoped write; the file handle is released when this returns, on every path.
fn write_file(path: &Path, body: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(body.as_bytes())?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "summaries".into());
    path.with_file_name(format!(".{file_name}.tmp"))
}

fn sha256_hex(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}
