//! `auditseal inspect`: summarise a package without judging it.

use std::path::PathBuf;

use anyhow::Context;
use auditseal_hardening::PackageContents;
use auditseal_manifest::format_instant;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::output::FormattedOutput;

/// Print the manifest summary of a package archive.
#[derive(Debug, Args)]
pub struct InspectCommand {
    /// Path to the package zip.
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    /// List every file with its hash.
    #[arg(long)]
    pub files: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub path: String,
    pub hash: String,
    pub size_bytes: u64,
}

/// Manifest, signature and timestamp metadata of one package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub export_id: String,
    pub organization_id: String,
    pub export_type: String,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub merkle_root: String,
    pub signature_algorithm: String,
    pub signed_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub timestamp_authority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileSummary>>,
}

impl PackageSummary {
    pub fn from_contents(contents: &PackageContents, with_files: bool) -> Self {
        let manifest = &contents.manifest;
        let files = with_files.then(|| {
            manifest
                .files_in_merkle_order()
                .into_iter()
                .map(|f| FileSummary {
                    path: f.path.clone(),
                    hash: f.hash.to_hex(),
                    size_bytes: f.size_bytes,
                })
                .collect()
        });
        Self {
            export_id: manifest.export_id().to_string(),
            organization_id: manifest.organization_id().to_string(),
            export_type: manifest.export_type().to_string(),
            created_at: manifest.created_at(),
            file_count: manifest.file_count(),
            total_size_bytes: manifest.total_size_bytes(),
            merkle_root: manifest.merkle_root().to_hex(),
            signature_algorithm: contents.signature.algorithm.clone(),
            signed_at: contents.signature.signed_at,
            timestamp: contents.timestamp.timestamp,
            timestamp_authority: contents.timestamp.authority.clone(),
            files,
        }
    }
}

impl FormattedOutput for PackageSummary {
    fn format_text(&self) -> String {
        let mut lines = vec![
            format!("Export:        {} ({})", self.export_id, self.export_type),
            format!("Organization:  {}", self.organization_id),
            format!("Created:       {}", format_instant(self.created_at)),
            format!("Files:         {} ({} bytes)", self.file_count, self.total_size_bytes),
            format!("Merkle root:   {}", self.merkle_root),
            format!(
                "Signed:        {} ({})",
                format_instant(self.signed_at),
                self.signature_algorithm
            ),
            format!(
                "Timestamped:   {} by {}",
                format_instant(self.timestamp),
                self.timestamp_authority
            ),
        ];
        if let Some(files) = &self.files {
            lines.push(String::new());
            for file in files {
                lines.push(format!("  {}  {:>10}  {}", file.hash, file.size_bytes, file.path));
            }
        }
        lines.join("\n")
    }
}

impl InspectCommand {
    pub fn run(&self) -> anyhow::Result<PackageSummary> {
        let bytes = std::fs::read(&self.package)
            .with_context(|| format!("cannot read {}", self.package.display()))?;
        let contents = PackageContents::open(&bytes).with_context(|| {
            format!("{} is not a readable audit package", self.package.display())
        })?;
        Ok(PackageSummary::from_contents(&contents, self.files))
    }
}
