//! Shared fixtures for `costsync-infra` integration tests.

#![allow(dead_code)]

use std::path::Path;

use costsync_domain::Config;
use tempfile::TempDir;

pub const WEB_PROFILE: &str = r##"
name = "web-service"
description = "Stateless HTTP services"

[budgets.int-stable]
base = 1000.0

[budgets.pre-stable]
base = 2000.0

[budgets.prod]
base = 3000.0
scaling_factor = 2.0

[[alerts]]
name = "{service}-warning"
threshold_pct = 80.0
severity = "warning"
frequency = "daily"
channels = [{ kind = "team", target = "#team-{service}" }]

[[alerts]]
name = "{service}-critical"
threshold_pct = 100.0
severity = "critical"
frequency = "daily"
channels = [{ kind = "team", target = "#team-{service}" }]
"##;

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().expect("fixture path has a parent"))
        .expect("fixture directory should be created");
    std::fs::write(path, contents).expect("fixture should be written");
}

pub fn service_json(name: &str, size: &str) -> String {
    format!(
        r#"{{
            "service": "{name}",
            "profile": "web-service",
            "size": "{size}",
            "team": "payments-platform",
            "allocation": {{
                "cost_center": "CC-12345",
                "business_unit": "payments",
                "cost_owner": "owner@example.com"
            }}
        }}"#
    )
}

/// Catalog with one profile and the given `(service, size)` declarations,
/// plus a scratch directory for the sync state database.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(services: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("temp dir should be created");
        let catalog = dir.path().join("catalog");
        write(&catalog, "catalog.toml", "version = \"2024.06.1\"\n");
        write(&catalog, "sizes.toml", "small = 0.5\nmedium = 1.0\nlarge = 1.2\n");
        write(&catalog, "profiles/web-service.toml", WEB_PROFILE);
        for (name, size) in services {
            write(&catalog, &format!("services/{name}.json"), &service_json(name, size));
        }
        Self { dir }
    }

    pub fn catalog_root(&self) -> std::path::PathBuf {
        self.dir.path().join("catalog")
    }

    /// Config pointing at this workspace and at `base_url`, with fast retries.
    pub fn config(&self, base_url: &str) -> Config {
        let mut config = Config::default();
        config.catalog.root = self.catalog_root();
        config.budgeting.base_url = base_url.to_string();
        config.budgeting.request_timeout_secs = 5;
        config.database.path = self.dir.path().join("state.db").to_string_lossy().into_owned();
        config.sync.max_attempts = 2;
        config.sync.base_delay_ms = 10;
        config.sync.max_delay_ms = 20;
        config.sync.jitter = false;
        config
    }
}
