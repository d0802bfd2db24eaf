//! Archive extraction
//!
//! Node.js ships `.tar.xz` (Linux), `.tar.gz` (macOS) and `.zip` (Windows);
//! GitHub snapshots are `.zip`. Extraction overwrites existing entries and
//! creates the destination if needed.

use crate::error::{NodeserveError, NodeserveResult};
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path};
use tracing::debug;
use xz2::read::XzDecoder;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.tar.xz`
    TarXz,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.zip`
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Detect the format from the file's leading bytes
    pub fn sniff(path: &Path) -> Option<Self> {
        let mut magic = Vec::with_capacity(6);
        File::open(path).ok()?.take(6).read_to_end(&mut magic).ok()?;
        if magic.starts_with(b"PK\x03\x04") || magic.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else if magic.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if magic.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::TarXz)
        } else {
            None
        }
    }

    /// Extension without the leading dot, as used in download URLs
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarXz => "tar.xz",
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

/// Unpack `archive` into `dest`.
///
/// Returns the names of the archive's top-level entries, which callers use
/// to find the directory the archive unpacked into.
pub fn extract_archive(archive: &Path, dest: &Path) -> NodeserveResult<BTreeSet<String>> {
    let format = ArchiveFormat::from_path(archive)
        .or_else(|| ArchiveFormat::sniff(archive))
        .ok_or_else(|| NodeserveError::UnsupportedArchive(archive.to_path_buf()))?;

    std::fs::create_dir_all(dest)
        .map_err(|e| NodeserveError::io(format!("creating {}", dest.display()), e))?;

    let file = File::open(archive)
        .map_err(|e| NodeserveError::io(format!("opening {}", archive.display()), e))?;
    let reader = BufReader::new(file);

    debug!(
        "Extracting {} ({}) into {}",
        archive.display(),
        format.extension(),
        dest.display()
    );

    match format {
        ArchiveFormat::TarXz => unpack_tar(XzDecoder::new(reader), archive, dest),
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(reader), archive, dest),
        ArchiveFormat::Zip => unpack_zip(reader, archive, dest),
    }
}

fn unpack_tar(
    decoder: impl Read,
    archive_path: &Path,
    dest: &Path,
) -> NodeserveResult<BTreeSet<String>> {
    let mut archive = tar::Archive::new(decoder);
    archive.set_overwrite(true);
    archive.set_preserve_permissions(true);

    let mut roots = BTreeSet::new();
    let entries = archive
        .entries()
        .map_err(|e| NodeserveError::extract(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| NodeserveError::extract(archive_path, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| NodeserveError::extract(archive_path, e))?
            .into_owned();
        if let Some(root) = top_level(&entry_path) {
            roots.insert(root);
        }
        entry
            .unpack_in(dest)
            .map_err(|e| NodeserveError::extract(archive_path, e))?;
    }

    Ok(roots)
}

fn unpack_zip(
    reader: BufReader<File>,
    archive_path: &Path,
    dest: &Path,
) -> NodeserveResult<BTreeSet<String>> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| NodeserveError::extract(archive_path, e))?;

    let mut roots = BTreeSet::new();
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| NodeserveError::extract(archive_path, e))?;
        if let Some(root) = file.enclosed_name().as_deref().and_then(top_level) {
            roots.insert(root);
        }
    }

    archive
        .extract(dest)
        .map_err(|e| NodeserveError::extract(archive_path, e))?;

    Ok(roots)
}

fn top_level(path: &Path) -> Option<String> {
    path.components().find_map(|c| match c {
        Component::Normal(name) => name.to_str().map(str::to_string),
        _ => None,
    })
}
