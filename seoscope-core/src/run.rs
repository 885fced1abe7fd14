// Per-run state: run id, run directory and the artifact manifest

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Pipeline stages that leave an artifact in the run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Crawl,
    Urls,
    Links,
    Seo,
    Audit,
    Sitemap,
}

impl Stage {
    pub fn file_name(&self) -> &'static str {
        match self {
            Stage::Crawl => "crawl.json",
            Stage::Urls => "urls.txt",
            Stage::Links => "links.json",
            Stage::Seo => "seo.json",
            Stage::Audit => "lighthouse.json",
            Stage::Sitemap => "sitemap-diff.json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<PathBuf>,
}

impl Artifacts {
    pub fn get(&self, stage: Stage) -> Option<&Path> {
        match stage {
            Stage::Crawl => self.crawl.as_deref(),
            Stage::Urls => self.urls.as_deref(),
            Stage::Links => self.links.as_deref(),
            Stage::Seo => self.seo.as_deref(),
            Stage::Audit => self.audit.as_deref(),
            Stage::Sitemap => self.sitemap.as_deref(),
        }
    }

    fn slot(&mut self, stage: Stage) -> &mut Option<PathBuf> {
        match stage {
            Stage::Crawl => &mut self.crawl,
            Stage::Urls => &mut self.urls,
            Stage::Links => &mut self.links,
            Stage::Seo => &mut self.seo,
            Stage::Audit => &mut self.audit,
            Stage::Sitemap => &mut self.sitemap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub artifacts: Artifacts,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self> {
        crate::report::load_json(path)
    }

    /// Artifact path for `stage`, if that stage ran.
    pub fn artifact(&self, stage: Stage) -> Option<&Path> {
        self.artifacts.get(stage)
    }
}

/// Everything one pipeline run owns. Two contexts never share a directory.
#[derive(Debug)]
pub struct RunContext {
    manifest: RunManifest,
}

impl RunContext {
    /// Create `<output_root>/<run id>` and write an empty manifest into it.
    pub fn create(output_root: &Path, target: Option<&str>) -> Result<Self> {
        let run_id = Uuid::new_v4();
        let output_dir = output_root.join(run_id.to_string());

        fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create run directory {}", output_dir.display())
        })?;
        // Manifest paths are absolute.
        let output_dir = fs::canonicalize(&output_dir).with_context(|| {
            format!("Failed to resolve run directory {}", output_dir.display())
        })?;

        let context = Self {
            manifest: RunManifest {
                run_id,
                started_at: Utc::now(),
                target: target.map(String::from),
                output_dir,
                artifacts: Artifacts::default(),
            },
        };
        context.save()?;
        Ok(context)
    }

    pub fn run_id(&self) -> Uuid {
        self.manifest.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.manifest.output_dir
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir().join(MANIFEST_FILE)
    }

    /// Where `stage` writes its artifact in this run.
    pub fn artifact_path(&self, stage: Stage) -> PathBuf {
        self.dir().join(stage.file_name())
    }

    /// Record a finished stage and rewrite the manifest.
    pub fn record(&mut self, stage: Stage, path: PathBuf) -> Result<()> {
        *self.manifest.artifacts.slot(stage) = Some(path);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.manifest).context("Failed to serialize manifest")?;
        crate::report::save_report(&content, &self.manifest_path()).with_context(|| {
            format!(
                "Failed to write manifest to {}",
                self.manifest_path().display()
            )
        })
    }
}
