//! Fetching per-stroke textures and re-hosting them next to the export.
//!
//! All fetch-and-upload tasks run concurrently and are joined as a group. The
//! join either yields every upload record, or fails as a whole on the first
//! task error, on timeout, or on cancellation.

use std::io::Cursor;
use std::time::Duration;

use image::ImageFormat;
use tokio::sync::watch;

use crate::asset_store::{AssetRecord, AssetStore};
use crate::error::{ExportError, Result};

/// Default per-request timeout for texture downloads.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of raw texture bytes.
#[allow(async_fn_in_trait)]
pub trait TextureFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Fetches `http(s)://` URLs with reqwest and reads everything else from disk.
#[derive(Debug, Clone)]
pub struct HttpTextureFetcher {
    client: reqwest::Client,
}

impl HttpTextureFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::fetch("http client", e))?;
        Ok(Self { client })
    }
}

/// Local filesystem path for a texture source, if it is not an HTTP URL.
fn local_path(source: &str) -> Option<&str> {
    if let Some(path) = source.strip_prefix("file://") {
        return Some(path);
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        None
    } else {
        Some(source)
    }
}

impl TextureFetcher for HttpTextureFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        if let Some(path) = local_path(source) {
            return tokio::fs::read(path)
                .await
                .map_err(|e| ExportError::fetch(source, e));
        }

        let response = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| ExportError::fetch(source, e))?;

        if !response.status().is_success() {
            return Err(ExportError::fetch(
                source,
                format!("HTTP status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::fetch(source, e))?;
        log::debug!("Fetched {} ({} bytes)", source, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Make sure a payload is PNG: PNG passes through, other images are re-encoded.
pub fn to_png(source: &str, data: Vec<u8>) -> Result<Vec<u8>> {
    if matches!(image::guess_format(&data), Ok(ImageFormat::Png)) {
        return Ok(data);
    }

    let decoded = image::load_from_memory(&data).map_err(|e| ExportError::TextureDecode {
        source_ref: source.to_string(),
        reason: e.to_string(),
    })?;

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| ExportError::TextureDecode {
            source_ref: source.to_string(),
            reason: e.to_string(),
        })?;
    Ok(out.into_inner())
}

/// One texture to fetch and store.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureJob {
    pub stroke_index: usize,
    /// URL or path to fetch from.
    pub source: String,
    /// Asset path to store the PNG at.
    pub target: String,
}

/// Triggers cancellation of an in-flight texture join.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes a [`CancelHandle`]. A token whose handle was dropped never fires.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_handle, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    async fn cancelled(mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked cancel handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

async fn upload_one<F, S>(job: &TextureJob, fetcher: &F, store: &S) -> Result<AssetRecord>
where
    F: TextureFetcher,
    S: AssetStore,
{
    let raw = fetcher.fetch(&job.source).await?;
    let png = to_png(&job.source, raw)?;
    let record = store.put(&job.target, png).await?;
    log::debug!(
        "Texture for stroke {} stored at {}",
        job.stroke_index,
        record.path
    );
    Ok(record)
}

/// Fetch and store every texture, waiting for all of them.
///
/// Records come back in job order regardless of completion order.
pub async fn gather_textures<F, S>(
    jobs: &[TextureJob],
    fetcher: &F,
    store: &S,
    timeout: Duration,
    cancel: CancelToken,
) -> Result<Vec<AssetRecord>>
where
    F: TextureFetcher,
    S: AssetStore,
{
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    log::info!("Uploading {} textures", jobs.len());
    let uploads = futures::future::try_join_all(
        jobs.iter().map(|job| upload_one(job, fetcher, store)),
    );

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            log::warn!("Texture upload cancelled");
            Err(ExportError::Cancelled)
        }
        result = tokio::time::timeout(timeout, uploads) => match result {
            Ok(records) => records,
            Err(_) => {
                log::warn!("Texture upload timed out after {:?}", timeout);
                Err(ExportError::Timeout(timeout))
            }
        },
    }
}
