use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{create_dir_all, read_to_string, write};
use tracing::debug;

use crate::error::AppError;

fn cache_path(cache_dir: &Path, prefix: &str, name: &str) -> PathBuf {
    cache_dir.join(format!("{}-{}.json", prefix, name))
}

/// Writes `data` as JSON to `<cache_dir>/<prefix>-<name>.json`
///
/// # Arguments
///
/// * 'cache_dir' - directory to store data in, created when missing
/// * 'prefix' - prefix to identify source
/// * 'name' - name identifying the request
/// * 'data' - data to store
pub async fn store_cache<T: Serialize>(cache_dir: &Path, prefix: &str, name: &str, data: &T) -> Result<(), AppError> {
    create_dir_all(cache_dir).await?;
    let path = cache_path(cache_dir, prefix, name);

    let json = serde_json::to_string(data)?;
    write(&path, json).await?;
    debug!("cache store: {}", path.display());

    Ok(())
}

/// Tries to read cached data; a missing or unreadable file is a miss
///
/// # Arguments
///
/// * 'cache_dir' - directory to read data from
/// * 'prefix' - prefix to identify source
/// * 'name' - name identifying the request
pub async fn read_cache<T: DeserializeOwned>(cache_dir: &Path, prefix: &str, name: &str) -> Result<Option<T>, AppError> {
    let path = cache_path(cache_dir, prefix, name);

    if let Ok(json) = read_to_string(&path).await {
        debug!("cache hit: {}", path.display());
        let result: T = serde_json::from_str(&json)?;
        Ok(Some(result))
    } else {
        Ok(None)
    }
}
