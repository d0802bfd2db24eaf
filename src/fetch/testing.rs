//! Test double for [`Downloader`]

use super::{DownloadRequest, Downloader};
use crate::error::{NodeserveError, NodeserveResult};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Downloader that writes a canned `.tar.gz` or `.zip` and records, per
/// call, the request and what was already in the destination directory
pub(crate) struct FakeDownloader {
    pub(crate) file_name: String,
    pub(crate) zip: bool,
    pub(crate) entries: Vec<(String, Vec<u8>)>,
    pub(crate) calls: Mutex<Vec<(DownloadRequest, Vec<String>)>>,
}

impl FakeDownloader {
    pub(crate) fn new(file_name: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            file_name: file_name.to_string(),
            zip: file_name.ends_with(".zip"),
            entries: entries
                .iter()
                .map(|(n, d)| (n.to_string(), d.as_bytes().to_vec()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Write a zip whatever the file is called
    pub(crate) fn zipped(mut self) -> Self {
        self.zip = true;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        request: &DownloadRequest,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> NodeserveResult<PathBuf> {
        if cancel.is_cancelled() {
            return Err(NodeserveError::Cancelled);
        }
        let existing: Vec<String> = std::fs::read_dir(dest_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), existing));

        let path = dest_dir.join(&self.file_name);
        if self.zip {
            use std::io::Write;
            let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
            for (name, data) in &self.entries {
                writer
                    .start_file(name.as_str(), zip::write::SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        } else {
            let file = std::fs::File::create(&path).unwrap();
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
            for (name, data) in &self.entries {
                let mut header = tar::Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o755);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, data.as_slice())
                    .unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();
        }
        Ok(path)
    }
}

/// Sends nodejs.org requests to one fake and everything else to another
pub(crate) struct RoutingDownloader {
    pub(crate) node: FakeDownloader,
    pub(crate) source: FakeDownloader,
}

impl RoutingDownloader {
    /// Node archive carrying `npm`/`npx` scripts plus a small project zipball
    pub(crate) fn with_scripts(npm: &str, npx: &str) -> Self {
        Self {
            node: FakeDownloader::new(
                "node-v22.19.0-darwin-arm64.tar.gz",
                &[
                    ("node-v22.19.0-darwin-arm64/bin/npm", npm),
                    ("node-v22.19.0-darwin-arm64/bin/npx", npx),
                ],
            ),
            source: FakeDownloader::new(
                "acme-widgets-1a2b3c4.zip",
                &[
                    ("acme-widgets-1a2b3c4/package.json", r#"{"name":"widgets"}"#),
                    ("acme-widgets-1a2b3c4/index.html", "<h1>widgets</h1>"),
                ],
            ),
        }
    }
}

#[async_trait]
impl Downloader for RoutingDownloader {
    async fn download(
        &self,
        request: &DownloadRequest,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> NodeserveResult<PathBuf> {
        if request.url.starts_with("https://nodejs.org/") {
            self.node.download(request, dest_dir, cancel).await
        } else {
            self.source.download(request, dest_dir, cancel).await
        }
    }
}
