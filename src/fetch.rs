use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Retrieves a raw regional extract into a local file.
pub trait Fetch {
    /// Copy `uri` to `destination`, overwriting any existing file.
    fn fetch(&self, uri: &str, destination: &Path) -> Result<PathBuf>;
}

/// Downloads `http(s)://` URIs and copies `file://` URIs or bare paths.
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    fn download(&self, uri: &str, destination: &Path) -> Result<u64> {
        let response = ureq::get(uri)
            .call()
            .map_err(|e| Error::Fetch(format!("{}: {}", uri, e)))?;

        let mut reader = response.into_reader();
        let mut file = File::create(destination)
            .map_err(|e| Error::Fetch(format!("cannot create {}: {}", destination.display(), e)))?;
        io::copy(&mut reader, &mut file)
            .map_err(|e| Error::Fetch(format!("transfer from {} failed: {}", uri, e)))
    }

    fn copy_local(&self, source: &Path, destination: &Path) -> Result<u64> {
        fs::copy(source, destination)
            .map_err(|e| Error::Fetch(format!("cannot copy {}: {}", source.display(), e)))
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, uri: &str, destination: &Path) -> Result<PathBuf> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Downloading {} to {}", uri, destination.display());
        let bytes = if uri.starts_with("http://") || uri.starts_with("https://") {
            self.download(uri, destination)?
        } else {
            let local = uri.strip_prefix("file://").unwrap_or(uri);
            self.copy_local(Path::new(local), destination)?
        };
        info!("Downloaded {} bytes to {}", bytes, destination.display());

        Ok(destination.to_path_buf())
    }
}

/// Staged file name for a region's extract.
pub fn staged_file_name(region: &str, uri: &str) -> String {
    let lower = uri.to_ascii_lowercase();
    if lower.ends_with(".geojson") || lower.ends_with(".json") {
        format!("{}-latest.geojson", region)
    } else {
        format!("{}-latest.osm.pbf", region)
    }
}
