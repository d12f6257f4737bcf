//! Writing artifacts to disk and reporting what was written.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use probe_compiler::ArtifactMap;
use serde::Serialize;
use tracing::debug;

/// Report format for `--report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// One line per artifact
    Text,
    /// A single JSON document
    Json,
}

/// `out/a/b/C.ext` for binary name `a.b.C`.
pub fn artifact_path(out_dir: &Path, binary_name: &str, extension: &str) -> PathBuf {
    let mut segments: Vec<&str> = binary_name.split('.').collect();
    let last = segments.pop().unwrap_or(binary_name);
    let mut path = out_dir.to_path_buf();
    path.extend(segments);
    path.push(format!("{last}.{extension}"));
    path
}

#[derive(Debug, Serialize)]
pub struct WrittenArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size: usize,
    /// BLAKE3 digest of the artifact bytes, hex encoded.
    pub blake3: String,
}

/// Write every artifact below `out_dir`, creating package directories.
pub fn write_artifacts(
    artifacts: &ArtifactMap,
    out_dir: &Path,
    extension: &str,
) -> anyhow::Result<Vec<WrittenArtifact>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for (name, bytes) in artifacts {
        let path = artifact_path(out_dir, name, extension);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        fs::write(&path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
        debug!(binary_name = %name, path = %path.display(), "Wrote artifact");
        written.push(WrittenArtifact {
            name: name.clone(),
            blake3: blake3::hash(bytes).to_hex().to_string(),
            size: bytes.len(),
            path,
        });
    }
    Ok(written)
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub success: bool,
    pub artifacts: Vec<WrittenArtifact>,
    /// Classes examined by the verifier; empty when it was disabled.
    pub verified_classes: Vec<String>,
}

impl Report {
    pub fn print(&self, format: ReportFormat, out: &mut dyn Write) -> anyhow::Result<()> {
        match format {
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, self)?;
                writeln!(out)?;
            }
            ReportFormat::Text => {
                for artifact in &self.artifacts {
                    writeln!(
                        out,
                        "{} -> {} ({} bytes, blake3 {})",
                        artifact.name,
                        artifact.path.display(),
                        artifact.size,
                        &artifact.blake3[..16]
                    )?;
                }
                if !self.success {
                    writeln!(out, "compilation failed")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths() {
        let out = Path::new("out");
        assert_eq!(
            artifact_path(out, "a.b.C", "class"),
            Path::new("out").join("a").join("b").join("C.class")
        );
        assert_eq!(
            artifact_path(out, "p.Outer$In", "btrace"),
            Path::new("out").join("p").join("Outer$In.btrace")
        );
        assert_eq!(artifact_path(out, "Top", "class"), Path::new("out").join("Top.class"));
    }

    #[test]
    fn test_write_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = ArtifactMap::new();
        artifacts.insert("p.A".to_string(), b"PRB\0a".to_vec());
        artifacts.insert("B".to_string(), b"PRB\0b".to_vec());

        let written = write_artifacts(&artifacts, dir.path(), "class").unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read(dir.path().join("p/A.class")).unwrap(), b"PRB\0a");
        assert_eq!(fs::read(dir.path().join("B.class")).unwrap(), b"PRB\0b");
        assert_eq!(written[0].blake3, blake3::hash(b"PRB\0b").to_hex().to_string());
    }

    #[test]
    fn test_json_report() {
        let report = Report {
            success: false,
            artifacts: Vec::new(),
            verified_classes: vec!["p.Probe".to_string()],
        };
        let mut out = Vec::new();
        report.print(ReportFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["verified_classes"][0], "p.Probe");
    }
}
