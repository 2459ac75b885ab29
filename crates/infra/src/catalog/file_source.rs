//! Directory-backed [`CatalogSource`].
//!
//! Layout under the catalog root:
//!
//! ```text
//! catalog.{toml,json}      optional manifest, `version = "..."`
//! sizes.{toml,json}        size tag → multiplier
//! profiles/*.{toml,json}   one CostProfile per file
//! services/*.{toml,json}   one ServiceCostDeclaration per file
//! ```
//!
//! Without a manifest version the snapshot is versioned by the newest file
//! modification time.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use costsync_core::CatalogSource;
use costsync_domain::{
    CatalogConfig, CatalogSnapshot, CostProfile, CostSyncError, Result, ServiceCostDeclaration,
    SizeTable,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task;
use tracing::{debug, info, instrument, warn};

use crate::errors::conversions::map_join_error;

const MANIFEST: &str = "catalog";
const SIZES: &str = "sizes";
const PROFILES_DIR: &str = "profiles";
const SERVICES_DIR: &str = "services";
const EXTENSIONS: [&str; 2] = ["toml", "json"];

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    root: PathBuf,
}

impl FileCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the whole catalog synchronously.
    ///
    /// # Errors
    /// Returns [`CostSyncError::Catalog`] when the root is missing, a document
    /// cannot be read or parsed, or two documents declare the same profile or
    /// service name.
    pub fn load_blocking(&self) -> Result<CatalogSnapshot> {
        if !self.root.is_dir() {
            return Err(CostSyncError::Catalog(format!(
                "catalog root {} is not a directory",
                self.root.display()
            )));
        }

        let mut newest = None;

        let sizes = match find_document(&self.root, SIZES) {
            Some(path) => {
                track_mtime(&path, &mut newest);
                read_document::<SizeTable>(&path)?
            }
            None => {
                warn!(root = %self.root.display(), "Catalog has no size table");
                SizeTable::new()
            }
        };

        let mut snapshot = CatalogSnapshot::new(sizes);

        for path in documents_in(&self.root.join(PROFILES_DIR))? {
            track_mtime(&path, &mut newest);
            let profile: CostProfile = read_document(&path)?;
            debug!(profile = %profile.name, path = %path.display(), "Loaded cost profile");
            snapshot.add_profile(profile).map_err(|e| at_path(&path, e))?;
        }

        for path in documents_in(&self.root.join(SERVICES_DIR))? {
            track_mtime(&path, &mut newest);
            let declaration: ServiceCostDeclaration = read_document(&path)?;
            snapshot.add_service(declaration).map_err(|e| at_path(&path, e))?;
        }

        let manifest = match find_document(&self.root, MANIFEST) {
            Some(path) => read_document::<Manifest>(&path)?,
            None => Manifest::default(),
        };
        snapshot.version = manifest.version.or_else(|| {
            newest.map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true))
        });

        Ok(snapshot)
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn load_snapshot(&self) -> Result<CatalogSnapshot> {
        let source = self.clone();
        let snapshot =
            task::spawn_blocking(move || source.load_blocking()).await.map_err(map_join_error)??;

        info!(
            version = snapshot.version.as_deref().unwrap_or("unversioned"),
            profiles = snapshot.profiles.len(),
            services = snapshot.services.len(),
            sizes = snapshot.sizes.len(),
            "Catalog snapshot loaded"
        );
        Ok(snapshot)
    }
}

/// `{dir}/{stem}.toml` or `{dir}/{stem}.json`, TOML first.
fn find_document(dir: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS.iter().map(|ext| dir.join(format!("{stem}.{ext}"))).find(|p| p.is_file())
}

/// Catalog documents directly under `dir`, sorted by file name. A missing
/// directory is empty.
fn documents_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        CostSyncError::Catalog(format!("failed to list {}: {e}", dir.display()))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| CostSyncError::Catalog(format!("failed to list {}: {e}", dir.display())))?
            .path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext));
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CostSyncError::Catalog(format!("failed to read {}: {e}", path.display())))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .map_err(|e| CostSyncError::Catalog(format!("invalid JSON in {}: {e}", path.display()))),
        _ => toml::from_str(&contents)
            .map_err(|e| CostSyncError::Catalog(format!("invalid TOML in {}: {e}", path.display()))),
    }
}

fn track_mtime(path: &Path, newest: &mut Option<SystemTime>) {
    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        if newest.map_or(true, |current| modified > current) {
            *newest = Some(modified);
        }
    }
}

fn at_path(path: &Path, error: CostSyncError) -> CostSyncError {
    match error {
        CostSyncError::Catalog(msg) => {
            CostSyncError::Catalog(format!("{msg} (in {})", path.display()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use costsync_domain::Environment;
    use tempfile::TempDir;

    use super::*;

    const PROFILE: &str = r##"
name = "web-service"

[budgets.int-stable]
base = 1000.0

[budgets.prod]
base = 3000.0
scaling_factor = 2.0

[[alerts]]
name = "{service}-critical"
threshold_pct = 100.0
severity = "critical"
frequency = "daily"
channels = [{ kind = "team", target = "#team-{service}" }]
"##;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn service_json(name: &str) -> String {
        format!(
            r#"{{"service": "{name}", "profile": "web-service", "size": "medium",
                "allocation": {{"cost_center": "CC-12345", "business_unit": "payments"}}}}"#
        )
    }

    fn catalog() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sizes.toml", "small = 0.5\nmedium = 1.0\n");
        write(dir.path(), "profiles/web-service.toml", PROFILE);
        write(dir.path(), "services/checkout.json", &service_json("checkout"));
        write(dir.path(), "services/README.md", "ignored");
        dir
    }

    #[test]
    fn loads_every_document_kind() {
        let dir = catalog();
        write(dir.path(), "catalog.toml", "version = \"2024.06.1\"\n");

        let snapshot = FileCatalogSource::new(dir.path()).load_blocking().unwrap();

        assert_eq!(snapshot.version.as_deref(), Some("2024.06.1"));
        assert_eq!(snapshot.sizes.multiplier("medium"), Some(1.0));
        let profile = snapshot.profile("web-service").unwrap();
        assert_eq!(profile.budget_for(Environment::Prod).unwrap().scaling_factor, 2.0);
        assert_eq!(profile.budget_for(Environment::IntStable).unwrap().scaling_factor, 1.0);
        assert_eq!(snapshot.services.len(), 1);
        assert_eq!(
            snapshot.service("checkout").unwrap().allocation.cost_center.as_deref(),
            Some("CC-12345")
        );
    }

    #[test]
    fn unversioned_catalog_uses_file_timestamp() {
        let dir = catalog();
        let snapshot = FileCatalogSource::new(dir.path()).load_blocking().unwrap();
        assert!(snapshot.version.unwrap().ends_with('Z'));
    }

    #[test]
    fn duplicate_service_names_are_rejected() {
        let dir = catalog();
        write(dir.path(), "services/checkout-copy.json", &service_json("checkout"));

        let err = FileCatalogSource::new(dir.path()).load_blocking().unwrap_err();
        let CostSyncError::Catalog(msg) = err else {
            panic!("expected catalog error, got {err:?}");
        };
        assert!(msg.contains("duplicate service declaration 'checkout'"));
        assert!(msg.contains("checkout.json"));
    }

    #[test]
    fn malformed_document_names_its_path() {
        let dir = catalog();
        write(dir.path(), "profiles/broken.toml", "name = ");

        let err = FileCatalogSource::new(dir.path()).load_blocking().unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let source = FileCatalogSource::new("/nonexistent/catalog");
        assert!(matches!(source.load_blocking(), Err(CostSyncError::Catalog(_))));
    }

    #[tokio::test]
    async fn async_load_matches_blocking_load() {
        let dir = catalog();
        let source = FileCatalogSource::new(dir.path());
        assert_eq!(source.load_snapshot().await.unwrap(), source.load_blocking().unwrap());
    }
}
