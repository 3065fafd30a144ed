//! Writing interface artifacts to disk and checking them for staleness.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::ExportTier;
use crate::interface::InterfaceArtifact;
use crate::util::fs::write_atomic;
use crate::util::hash::{sha256_file, sha256_str};
use crate::util::QualifiedName;

/// On-disk artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Ruby interface stubs (`.rbi`)
    #[default]
    Stub,
    /// The artifact as JSON
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Stub => "stub",
            OutputFormat::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Stub => "rbi",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stub" | "rbi" => Ok(OutputFormat::Stub),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "invalid output format '{}', valid values: stub, json",
                s
            )),
        }
    }
}

/// Where the artifact of `package` at `tier` lives under `out`.
///
/// `Shop::Cart` at the test-only tier in stub format maps to
/// `<out>/Shop/Cart.test.rbi`.
pub fn artifact_path(
    out: &Path,
    package: QualifiedName,
    tier: ExportTier,
    format: OutputFormat,
) -> PathBuf {
    let mut path = out.to_path_buf();
    let segments: Vec<&str> = package.segments().collect();
    let (last, dirs) = segments
        .split_last()
        .map(|(l, d)| (*l, d))
        .unwrap_or((package.as_str(), &[]));
    for dir in dirs {
        path.push(dir);
    }

    let file = match tier {
        ExportTier::Public => format!("{}.{}", last, format.extension()),
        ExportTier::TestOnly => format!("{}.test.{}", last, format.extension()),
    };
    path.push(file);
    path
}

/// Render an artifact in the given format.
pub fn render(artifact: &InterfaceArtifact, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Stub => Ok(artifact.render_stub()),
        OutputFormat::Json => artifact
            .render_json()
            .with_context(|| format!("failed to serialize interface of {}", artifact.package)),
    }
}

/// What happened to a file during [`write_artifacts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Created,
    Updated,
    Unchanged,
    /// Left over from an earlier run for an interface that is now withheld
    Removed,
}

/// Write every artifact, skipping files whose content already matches.
pub fn write_artifacts<'a>(
    out: &Path,
    artifacts: impl IntoIterator<Item = &'a InterfaceArtifact>,
    format: OutputFormat,
) -> Result<Vec<(PathBuf, WriteStatus)>> {
    let mut written = Vec::new();

    for artifact in artifacts {
        let path = artifact_path(out, artifact.package, artifact.tier, format);
        let content = render(artifact, format)?;

        let status = if !path.exists() {
            WriteStatus::Created
        } else if sha256_file(&path)? == sha256_str(&content) {
            WriteStatus::Unchanged
        } else {
            WriteStatus::Updated
        };

        if status != WriteStatus::Unchanged {
            write_atomic(&path, &content)?;
        }
        tracing::debug!("{:?} {}", status, path.display());
        written.push((path, status));
    }

    Ok(written)
}

/// Delete the artifacts of interfaces that were withheld this run, so an
/// earlier version is not mistaken for the current one.
pub fn remove_artifacts(
    out: &Path,
    withheld: impl IntoIterator<Item = (QualifiedName, ExportTier)>,
    format: OutputFormat,
) -> Result<Vec<(PathBuf, WriteStatus)>> {
    let mut removed = Vec::new();

    for (package, tier) in withheld {
        let path = artifact_path(out, package, tier, format);
        if !path.is_file() {
            continue;
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
        tracing::debug!("removed withheld interface {}", path.display());
        removed.push((path, WriteStatus::Removed));
    }

    Ok(removed)
}

/// State of an artifact file relative to a fresh analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    Fresh,
    Stale,
    Missing,
    /// A file in the output directory that no package produces
    Orphaned,
}

impl ArtifactState {
    pub fn is_fresh(self) -> bool {
        self == ArtifactState::Fresh
    }
}

/// Compare the files under `out` with freshly computed artifacts.
///
/// Results are sorted by path.
pub fn check_artifacts<'a>(
    out: &Path,
    artifacts: impl IntoIterator<Item = &'a InterfaceArtifact>,
    format: OutputFormat,
) -> Result<Vec<(PathBuf, ArtifactState)>> {
    let mut states = Vec::new();
    let mut expected = BTreeSet::new();

    for artifact in artifacts {
        let path = artifact_path(out, artifact.package, artifact.tier, format);
        let content = render(artifact, format)?;

        let state = if !path.exists() {
            ArtifactState::Missing
        } else if sha256_file(&path)? == sha256_str(&content) {
            ArtifactState::Fresh
        } else {
            ArtifactState::Stale
        };

        expected.insert(path.clone());
        states.push((path, state));
    }

    if out.is_dir() {
        for entry in WalkDir::new(out).follow_links(false) {
            let entry =
                entry.with_context(|| format!("failed to walk directory: {}", out.display()))?;
            let path = entry.path();
            let is_artifact = path
                .extension()
                .is_some_and(|ext| ext == format.extension());
            if entry.file_type().is_file() && is_artifact && !expected.contains(path) {
                states.push((path.to_path_buf(), ArtifactState::Orphaned));
            }
        }
    }

    states.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::emit;
    use crate::test_support::rbi_gen;
    use tempfile::TempDir;

    fn artifacts() -> Vec<InterfaceArtifact> {
        let fixture = rbi_gen();
        ExportTier::ALL
            .into_iter()
            .map(|tier| {
                let closure = fixture.closure("RBIGen", tier);
                emit(&fixture.table, &fixture.graph, &closure)
            })
            .collect()
    }

    #[test]
    fn test_artifact_paths() {
        let out = Path::new("/out");
        assert_eq!(
            artifact_path(out, QualifiedName::new("RBIGen"), ExportTier::Public, OutputFormat::Stub),
            PathBuf::from("/out/RBIGen.rbi")
        );
        assert_eq!(
            artifact_path(out, QualifiedName::new("Shop::Cart"), ExportTier::TestOnly, OutputFormat::Stub),
            PathBuf::from("/out/Shop/Cart.test.rbi")
        );
        assert_eq!(
            artifact_path(out, QualifiedName::new("Shop::Cart"), ExportTier::Public, OutputFormat::Json),
            PathBuf::from("/out/Shop/Cart.json")
        );
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("stub".parse::<OutputFormat>().unwrap(), OutputFormat::Stub);
        assert_eq!("RBI".parse::<OutputFormat>().unwrap(), OutputFormat::Stub);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_then_rewrite_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let artifacts = artifacts();

        let first = write_artifacts(tmp.path(), &artifacts, OutputFormat::Stub).unwrap();
        assert!(first.iter().all(|(_, s)| *s == WriteStatus::Created));
        assert!(tmp.path().join("RBIGen.rbi").is_file());
        assert!(tmp.path().join("RBIGen.test.rbi").is_file());

        let second = write_artifacts(tmp.path(), &artifacts, OutputFormat::Stub).unwrap();
        assert!(second.iter().all(|(_, s)| *s == WriteStatus::Unchanged));

        let on_disk = std::fs::read_to_string(tmp.path().join("RBIGen.rbi")).unwrap();
        assert_eq!(on_disk, artifacts[0].render_stub());
    }

    #[test]
    fn test_check_reports_each_state() {
        let tmp = TempDir::new().unwrap();
        let artifacts = artifacts();

        let states = check_artifacts(tmp.path(), &artifacts, OutputFormat::Stub).unwrap();
        assert!(states.iter().all(|(_, s)| *s == ArtifactState::Missing));

        write_artifacts(tmp.path(), &artifacts, OutputFormat::Stub).unwrap();
        std::fs::write(tmp.path().join("RBIGen.test.rbi"), "# edited\n").unwrap();
        std::fs::create_dir_all(tmp.path().join("Gone")).unwrap();
        std::fs::write(tmp.path().join("Gone/Away.rbi"), "").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();

        let states = check_artifacts(tmp.path(), &artifacts, OutputFormat::Stub).unwrap();
        let by_name: Vec<_> = states
            .iter()
            .map(|(p, s)| (p.strip_prefix(tmp.path()).unwrap().to_path_buf(), *s))
            .collect();
        assert_eq!(
            by_name,
            vec![
                (PathBuf::from("Gone/Away.rbi"), ArtifactState::Orphaned),
                (PathBuf::from("RBIGen.rbi"), ArtifactState::Fresh),
                (PathBuf::from("RBIGen.test.rbi"), ArtifactState::Stale),
            ]
        );
    }

    #[test]
    fn test_remove_withheld_artifacts() {
        let tmp = TempDir::new().unwrap();
        let artifacts = artifacts();
        write_artifacts(tmp.path(), &artifacts, OutputFormat::Stub).unwrap();

        let package = QualifiedName::new("RBIGen");
        let removed = remove_artifacts(
            tmp.path(),
            [(package, ExportTier::Public), (QualifiedName::new("Gone"), ExportTier::Public)],
            OutputFormat::Stub,
        )
        .unwrap();

        assert_eq!(
            removed,
            vec![(tmp.path().join("RBIGen.rbi"), WriteStatus::Removed)]
        );
        assert!(!tmp.path().join("RBIGen.rbi").exists());
        assert!(tmp.path().join("RBIGen.test.rbi").is_file());
    }

    #[test]
    fn test_json_artifacts() {
        let tmp = TempDir::new().unwrap();
        let artifacts = artifacts();
        write_artifacts(tmp.path(), &artifacts, OutputFormat::Json).unwrap();

        let content = std::fs::read_to_string(tmp.path().join("RBIGen.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["package"], "RBIGen");
        assert_eq!(value["tier"], "public");
    }
}
