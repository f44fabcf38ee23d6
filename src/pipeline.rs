//! The whole run: log in, count pages, validate the range, download and
//! assemble.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::address::{CollectionId, Tier};
use crate::assembler::DocumentAssembler;
use crate::auth::authenticate;
use crate::config::Settings;
use crate::discovery::discover_count;
use crate::error::{Error, Result};
use crate::range::PageRange;
use crate::retriever::{retrieve, Progress, RetrievedPage};
use crate::scratch::Scratch;
use crate::transport::Transport;

const STAGED_DOCUMENT: &str = "document.pdf";

/// What to download and where to put it.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub collection: CollectionId,
    pub first: Option<u32>,
    pub last: Option<u32>,
    pub tier: Tier,
    pub output: Option<PathBuf>,
    pub preserve_pages: bool,
}

/// Outcome of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub page_count: u32,
    pub range: PageRange,
    pub output: PathBuf,
    pub bytes: usize,
    pub pages_dir: Option<PathBuf>,
}

/// Logs in and counts the pages of `collection`.
pub async fn count_pages<T: Transport>(
    transport: T,
    settings: &Settings,
    collection: &CollectionId,
) -> Result<u32> {
    let session = authenticate(transport, settings.endpoint.clone(), &settings.credentials).await?;
    let count = discover_count(&session, collection, settings.tuning).await;
    session.close();
    count
}

/// Runs a full download and writes the assembled document to the job's
/// output. Nothing is written there unless every page was retrieved and
/// assembled.
pub async fn download<T, A, F>(
    transport: T,
    settings: &Settings,
    job: &DownloadJob,
    assembler: &A,
    on_progress: F,
) -> Result<Report>
where
    T: Transport,
    A: DocumentAssembler + ?Sized,
    F: FnMut(Progress),
{
    let session = authenticate(transport, settings.endpoint.clone(), &settings.credentials).await?;
    let page_count = discover_count(&session, &job.collection, settings.tuning).await?;
    info!("Note: printed page numbers usually lag page indices because of the preamble");

    let range = PageRange::with_defaults(job.first, job.last, page_count)?;
    let output = job
        .output
        .clone()
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or(Error::Destination)?;

    let scratch = Scratch::create(settings.scratch_dir.as_deref())?;

    let pages = retrieve(&session, &job.collection, range, job.tier, on_progress).await;
    session.close();
    let pages = pages?;

    let document = assembler.assemble(&pages)?;
    let staged = scratch.stage(STAGED_DOCUMENT, &document).await?;

    // The document lands at `output` only after every other write succeeded.
    let pages_dir = if job.preserve_pages {
        Some(write_pages(&output, &pages).await?)
    } else {
        None
    };

    scratch.persist(&staged, &output).await?;
    info!("Saved {} ({} bytes)", output.display(), document.len());

    Ok(Report {
        page_count,
        range,
        output,
        bytes: document.len(),
        pages_dir,
    })
}

/// Directory used for `--preserve-pages`: `<stem>_pages` next to `output`.
pub fn pages_dir_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output.with_file_name(format!("{stem}_pages"))
}

async fn write_pages(output: &Path, pages: &[RetrievedPage]) -> Result<PathBuf> {
    let dir = pages_dir_for(output);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| Error::io(&dir, e))?;

    for page in pages {
        let path = dir.join(format!("page_{}.png", page.index));
        fs::write(&path, &page.data)
            .await
            .map_err(|e| Error::io(&path, e))?;
    }

    info!("Preserved {} page images in {}", pages.len(), dir.display());
    Ok(dir)
}
