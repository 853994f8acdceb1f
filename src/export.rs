//! Writing a run's pages to disk.
//!
//! Each page becomes `<stem>_page_<n>.png` under the output directory and,
//! when its extraction produced text, a sibling `<stem>_page_<n>.txt`.
//! Every file is written to a temporary name and renamed into place so an
//! interrupted export never leaves a truncated image behind.

use crate::error::PipelineError;
use crate::output::PageRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files written for one page.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedPage {
    pub page_num: usize,
    pub image: PathBuf,
    /// `None` when the page has no extracted text.
    pub text: Option<PathBuf>,
}

/// Write every record's PNG (and text, if any) into `dir`.
///
/// The directory is created if needed. Records are written in order; the
/// first failure stops the export and is returned.
pub async fn write_outputs(
    records: &[PageRecord],
    dir: impl AsRef<Path>,
) -> Result<Vec<ExportedPage>, PipelineError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(records.len());
    for record in records {
        let image = dir.join(&record.filename);
        write_atomic(&image, record.image.png()).await?;

        let text = match record.text {
            Some(ref text) => {
                let path = image.with_extension("txt");
                write_atomic(&path, text.as_bytes()).await?;
                Some(path)
            }
            None => None,
        };

        debug!("Wrote page {} → {}", record.page_num(), image.display());
        written.push(ExportedPage {
            page_num: record.page_num(),
            image,
            text,
        });
    }
    Ok(written)
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    let fail = |e| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp, path).await.map_err(fail)
}
