use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT_V1: &str = "rollbook-workspace-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    version: u32,
    app_version: String,
    exported_at: u64,
    files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    dataset: String,
    entry: String,
    sha256: String,
    bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub datasets_restored: Vec<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Bundles the data files that exist; `files` pairs a dataset name with its path.
pub fn export_workspace_bundle(
    files: &[(&str, &Path)],
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let mut payloads: Vec<(ManifestFile, Vec<u8>)> = Vec::new();
    for (dataset, path) in files {
        if !path.is_file() {
            continue;
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        payloads.push((
            ManifestFile {
                dataset: dataset.to_string(),
                entry: format!("data/{}.txt", dataset),
                sha256: sha256_hex(&bytes),
                bytes: bytes.len() as u64,
            },
            bytes,
        ));
    }
    if payloads.is_empty() {
        return Err(anyhow!("workspace has no data files to back up"));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        version: 1,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at,
        files: payloads.iter().map(|(m, _)| m.clone()).collect(),
    };
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (meta, bytes) in &payloads {
        zip.start_file(meta.entry.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", meta.entry))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {}", meta.entry))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;
    tracing::info!(path = %out_path.display(), files = payloads.len(), "exported backup bundle");

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: payloads.len() + 1,
        datasets: payloads.into_iter().map(|(m, _)| m.dataset).collect(),
    })
}

/// Restores datasets named in `files` from a bundle.
///
/// Every entry is checksummed before any file is replaced.
pub fn import_workspace_bundle(
    in_path: &Path,
    files: &[(&str, &Path)],
) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        return Err(anyhow!(
            "not a backup bundle: {}",
            in_path.to_string_lossy()
        ));
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Manifest =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", manifest.format));
    }

    let mut verified: Vec<(String, PathBuf, Vec<u8>)> = Vec::new();
    for meta in &manifest.files {
        let Some((_, dst)) = files.iter().find(|(name, _)| *name == meta.dataset) else {
            return Err(anyhow!("bundle holds unknown dataset: {}", meta.dataset));
        };
        let mut bytes = Vec::new();
        archive
            .by_name(&meta.entry)
            .with_context(|| format!("bundle missing {}", meta.entry))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", meta.entry))?;
        if sha256_hex(&bytes) != meta.sha256 {
            return Err(anyhow!("checksum mismatch for {}", meta.entry));
        }
        verified.push((meta.dataset.clone(), dst.to_path_buf(), bytes));
    }

    let mut restored = Vec::new();
    for (dataset, dst, bytes) in verified {
        replace_file(&dst, &bytes)?;
        restored.push(dataset);
    }
    tracing::info!(path = %in_path.display(), files = restored.len(), "imported backup bundle");

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
        datasets_restored: restored,
    })
}

fn replace_file(dst: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let mut tmp_name = dst.as_os_str().to_owned();
    tmp_name.push(".importing");
    let tmp = PathBuf::from(tmp_name);

    let mut out = File::create(&tmp)
        .with_context(|| format!("failed to create temp file {}", tmp.to_string_lossy()))?;
    out.write_all(bytes)
        .with_context(|| format!("failed to write temp file {}", tmp.to_string_lossy()))?;
    out.flush()
        .with_context(|| format!("failed to flush temp file {}", tmp.to_string_lossy()))?;
    drop(out);

    std::fs::rename(&tmp, dst)
        .with_context(|| format!("failed to move restored data to {}", dst.to_string_lossy()))
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
