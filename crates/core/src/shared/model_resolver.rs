use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::MODEL_RELEASE_URL;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("no user cache directory on this platform; pass a model directory")]
    NoCacheDir,
    #[error("failed to create cache directory {}: {source}", .path.display())]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where provider weights live on this machine.
///
/// A file is looked up in the explicit model directory, then the user cache.
/// [`ModelStore::fetch`] downloads missing files into the cache.
#[derive(Clone, Debug)]
pub struct ModelStore {
    model_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    base_url: String,
}

impl ModelStore {
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        Self {
            model_dir,
            cache_dir: default_cache_dir(),
            base_url: MODEL_RELEASE_URL.to_string(),
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = Some(cache_dir);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// An existing local copy of `file`, without touching the network.
    pub fn locate(&self, file: &str) -> Option<PathBuf> {
        [self.model_dir.as_deref(), self.cache_dir.as_deref()]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(file))
            .find(|path| path.is_file())
    }

    /// Like [`ModelStore::locate`], downloading into the cache on a miss.
    pub fn fetch(&self, file: &str) -> Result<PathBuf, ModelResolveError> {
        if let Some(path) = self.locate(file) {
            log::debug!("Using model {}", path.display());
            return Ok(path);
        }

        let cache_dir = self.cache_dir.as_deref().ok_or(ModelResolveError::NoCacheDir)?;
        fs::create_dir_all(cache_dir).map_err(|source| ModelResolveError::CacheDir {
            path: cache_dir.to_path_buf(),
            source,
        })?;
        let url = format!("{}/{file}", self.base_url.trim_end_matches('/'));
        let dest = cache_dir.join(file);
        log::info!("Downloading model {file} from {url}");
        download(&url, &dest)?;
        Ok(dest)
    }
}

/// `<user cache>/facefeat/models`; application data on macOS.
pub fn default_cache_dir() -> Option<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::data_dir()
    } else {
        dirs::cache_dir()
    };
    base.map(|d| d.join("facefeat").join("models"))
}

/// Streams `url` into `dest` through a `.part` file renamed on success.
fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let part = dest.with_extension("part");
    let result = stream_to(url, &part).and_then(|()| {
        fs::rename(&part, dest).map_err(|source| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn stream_to(url: &str, part: &Path) -> Result<(), ModelResolveError> {
    let write_err = |source: std::io::Error| ModelResolveError::Write {
        path: part.to_path_buf(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;
    let total = response.content_length().unwrap_or(0);

    let mut file = fs::File::create(part).map_err(write_err)?;
    let mut buf = vec![0u8; 1 << 20];
    let mut downloaded: u64 = 0;
    let mut next_report = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if total > 0 && downloaded * 100 / total >= next_report {
            log::info!("  {}% of {} MB", downloaded * 100 / total, total >> 20);
            next_report += 25;
        }
    }
    file.flush().map_err(write_err)
}
