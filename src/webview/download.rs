use std::error::Error;
use std::path::PathBuf;

use tokio::sync::mpsc;
use url::Url;

use crate::webview::filename;
use crate::webview::session;
use crate::webview::storage;

/// File extensions that make a navigation downloadable.
pub const DOWNLOADABLE_EXTENSIONS: [&str; 4] = ["pdf", "jpeg", "jpg", "png"];

/// Path marker for the prescription endpoint; those responses are PDFs
/// regardless of how the URL looks.
pub const PRESCRIPTION_PATH_MARKER: &str = "/api/prescription-pdf";

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// Plain file download, named from the URL and response headers.
    File,
    /// Prescription endpoint download; the body must be a PDF.
    PrescriptionPdf,
}

/// One intercepted navigation to download instead of render.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: Url,
    pub kind: DownloadKind,
}

/// Shared state for the download worker.
pub struct DownloadContext {
    pub client: reqwest::Client,
    pub documents_dir: PathBuf,
    pub preview: bool,
}

/// Fetched bytes plus the name they should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Decide whether a navigation should become a download.
///
/// The extension check runs first: a recognized extension on the last
/// path segment, or, when the path has no extension at all, on the
/// `name` query parameter. A path extension that is present but
/// unrecognized never falls back to the query parameter. Only then is
/// the prescription path marker consulted.
pub fn classify_download(url: &Url) -> Option<DownloadKind> {
    if is_downloadable_file(url) {
        return Some(DownloadKind::File);
    }
    if url.path().contains(PRESCRIPTION_PATH_MARKER) {
        return Some(DownloadKind::PrescriptionPdf);
    }
    None
}

fn is_downloadable_file(url: &Url) -> bool {
    let segment = filename::last_path_segment(url).unwrap_or_default();
    if let Some(ext) = filename::extension_of(&segment) {
        return DOWNLOADABLE_EXTENSIONS.contains(&ext.as_str());
    }
    match filename::name_query_param(url)
        .as_deref()
        .and_then(query_extension_candidate)
    {
        Some(ext) => DOWNLOADABLE_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Extension candidate from a `name` query value: the text after the
/// last dot, or the whole value when it contains none.
fn query_extension_candidate(value: &str) -> Option<String> {
    value
        .rsplit('.')
        .find(|part| !part.is_empty())
        .map(str::to_lowercase)
}

/// Fetch one job out of band. `Ok(None)` means the download was
/// abandoned on purpose (bad status, non-PDF prescription body); those
/// cases are logged here and nothing else happens.
pub async fn fetch_artifact(
    client: &reqwest::Client,
    job: &DownloadJob,
    cookie_header: Option<&str>,
) -> Result<Option<FetchedArtifact>, Box<dyn Error + Send + Sync>> {
    let mut request = client.get(job.url.as_str());
    if let Some(cookies) = cookie_header {
        request = request.header(reqwest::header::COOKIE, cookies);
    }
    let response = request.send().await?;

    if response.status() != reqwest::StatusCode::OK {
        eprintln!(
            "[WEBVIEW] download from {} failed with status {}",
            job.url,
            response.status()
        );
        return Ok(None);
    }

    let content_disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await?;

    let filename = match job.kind {
        DownloadKind::PrescriptionPdf => {
            if !bytes.starts_with(PDF_MAGIC) {
                eprintln!("[WEBVIEW] response from {} is not a PDF; skipping save", job.url);
                return Ok(None);
            }
            filename::resolve_prescription_filename(content_disposition.as_deref())
        }
        DownloadKind::File => {
            filename::resolve_filename(&job.url, content_disposition.as_deref())
        }
    };

    Ok(Some(FetchedArtifact {
        filename,
        bytes: bytes.to_vec(),
    }))
}

/// Run queued downloads one at a time until every job sender is gone.
/// Failures are logged and the session carries on.
pub async fn run_download_worker(
    ctx: DownloadContext,
    page: chromiumoxide::Page,
    mut jobs: mpsc::UnboundedReceiver<DownloadJob>,
) {
    let mut worker = DownloadWorker {
        ctx,
        page,
        current_artifact: None,
    };
    while let Some(job) = jobs.recv().await {
        worker.handle(&job).await;
    }
}

/// Sequential worker state. At most one saved artifact is retained at a
/// time; each new download replaces it, and a preview always shows the
/// retained one.
struct DownloadWorker {
    ctx: DownloadContext,
    page: chromiumoxide::Page,
    current_artifact: Option<PathBuf>,
}

impl DownloadWorker {
    async fn handle(&mut self, job: &DownloadJob) {
        match self.fetch_and_save(job).await {
            Ok(Some(path)) => {
                self.current_artifact = Some(path);
                if self.ctx.preview {
                    self.preview_current();
                }
            }
            Ok(None) => {}
            Err(err) => {
                eprintln!("[WEBVIEW] download failed for {}: {err}", job.url);
            }
        }
    }

    async fn fetch_and_save(
        &self,
        job: &DownloadJob,
    ) -> Result<Option<PathBuf>, Box<dyn Error + Send + Sync>> {
        // 1. Read the session cookies for the target URL. A failure here
        //    is not fatal; the fetch just goes out without them.
        let cookie_header = match session::cookie_header(&self.page, &job.url).await {
            Ok(header) => header,
            Err(err) => {
                eprintln!("[WEBVIEW] could not read cookies for {}: {err}", job.url);
                None
            }
        };

        // 2. Fetch out of band with the session cookies attached.
        let artifact =
            match fetch_artifact(&self.ctx.client, job, cookie_header.as_deref()).await? {
                Some(artifact) => artifact,
                None => return Ok(None),
            };

        // 3. Persist into the documents directory.
        let path =
            storage::save_artifact(&self.ctx.documents_dir, &artifact.filename, &artifact.bytes)?;
        eprintln!("[WEBVIEW] saved {}", path.display());
        Ok(Some(path))
    }

    fn preview_current(&self) {
        if let Some(artifact) = self.current_artifact.as_deref() {
            storage::preview_artifact(artifact);
        }
    }
}
