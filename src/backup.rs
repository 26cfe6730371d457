use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

// Same name as `db::DB_FILE_NAME` (checked in db's tests). The backup tests
// compile this file on its own, so it cannot import from `db`.
pub(crate) const DB_FILE_NAME: &str = "rollcall.sqlite3";
const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT_V1: &str = "rollcall-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Manifest {
    format: String,
    app_version: String,
    exported_at: String,
    db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

enum Source {
    Bundle,
    RawSqlite,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Zips the workspace database with a manifest carrying its checksum.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }
    let db_bytes =
        std::fs::read(&db_path).with_context(|| format!("failed to read {}", db_path.display()))?;
    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        db_sha256: sha256_hex(&db_bytes),
    };

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.display()))?;

    let entries: [(&str, Vec<u8>); 2] = [
        (
            MANIFEST_ENTRY,
            serde_json::to_vec_pretty(&manifest).context("failed to serialize manifest")?,
        ),
        (DB_FILE_NAME, db_bytes),
    ];
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in &entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start bundle entry {}", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write bundle entry {}", name))?;
    }
    zip.finish().context("failed to finalize bundle")?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: entries.len(),
        db_sha256: manifest.db_sha256,
    })
}

/// Replaces the workspace database with the one in `in_path`, which is either
/// a bundle or a bare SQLite file. Nothing in the workspace changes unless the
/// incoming database is verified. The caller must have closed any open
/// connection to it.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let (db_bytes, detected) = match sniff(in_path)? {
        Source::Bundle => (read_bundle_db(in_path)?, BUNDLE_FORMAT_V1),
        Source::RawSqlite => (
            std::fs::read(in_path)
                .with_context(|| format!("failed to read {}", in_path.display()))?,
            RAW_SQLITE_FORMAT,
        ),
    };
    if !db_bytes.starts_with(SQLITE_MAGIC) {
        bail!("bundled database is not a SQLite file");
    }

    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;
    replace_file(&db_bytes, &workspace_path.join(DB_FILE_NAME))?;

    Ok(ImportSummary {
        bundle_format_detected: detected.to_string(),
    })
}

fn sniff(path: &Path) -> anyhow::Result<Source> {
    let mut head = Vec::with_capacity(SQLITE_MAGIC.len());
    File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .take(SQLITE_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .context("failed to read file signature")?;
    if head.starts_with(ZIP_MAGIC) {
        Ok(Source::Bundle)
    } else if head.starts_with(SQLITE_MAGIC) {
        Ok(Source::RawSqlite)
    } else {
        bail!(
            "{} is neither a workspace bundle nor a SQLite database",
            path.display()
        )
    }
}

/// Database bytes from a bundle, after format and checksum checks.
fn read_bundle_db(path: &Path) -> anyhow::Result<Vec<u8>> {
    let file =
        File::open(path).with_context(|| format!("failed to open bundle {}", path.display()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;

    let manifest: Manifest = serde_json::from_reader(
        archive
            .by_name(MANIFEST_ENTRY)
            .context("bundle missing manifest.json")?,
    )
    .context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }
    if manifest.db_sha256.is_empty() {
        bail!("manifest has no dbSha256");
    }

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_FILE_NAME)
        .with_context(|| format!("bundle missing {}", DB_FILE_NAME))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database")?;
    let actual = sha256_hex(&db_bytes);
    if !actual.eq_ignore_ascii_case(&manifest.db_sha256) {
        bail!(
            "database checksum mismatch: expected {}, got {}",
            manifest.db_sha256,
            actual
        );
    }
    Ok(db_bytes)
}

/// Writes a sibling temp file, then renames it over `dst`.
fn replace_file(bytes: &[u8], dst: &Path) -> anyhow::Result<()> {
    let tmp = dst.with_extension("sqlite3.importing");
    let written = File::create(&tmp)
        .and_then(|mut f| f.write_all(bytes).and_then(|()| f.sync_all()))
        .with_context(|| format!("failed to write {}", tmp.display()));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, dst)
        .with_context(|| format!("failed to move imported database to {}", dst.display()))
}
