// Workflow module: the whole run, start to finish. Paths are checked
// first, then authenticate, create, upload, verify and publish, each step
// only after the previous one succeeded.

use crate::api::{Deposition, PublishedRecord, StoredFile, UploadClient};
use crate::checksum::Checksums;
use crate::config::ServiceConfig;
use crate::error::{Result, UploadError};
use crate::metadata::{MetadataInput, RecordMetadata};
use crate::ui::Reporter;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A local file that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Base name, used as the key in the bucket.
    pub name: String,
    pub size: u64,
}

impl UploadTarget {
    /// Resolve `raw` to an absolute path and make sure it is a regular file.
    pub fn resolve(raw: &Path) -> Result<Self> {
        let not_a_file =
            || UploadError::Validation(format!("{} is not a file or doesn't exist", raw.display()));
        let path = fs::canonicalize(raw).map_err(|_| not_a_file())?;
        let meta = fs::metadata(&path).map_err(|_| not_a_file())?;
        if !meta.is_file() {
            return Err(not_a_file());
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(not_a_file)?;
        Ok(Self {
            path,
            name,
            size: meta.len(),
        })
    }
}

/// Validate every input path, in order. Fails on the first bad one, on an
/// empty list, and when two files would land on the same bucket key.
pub fn resolve_targets(paths: &[PathBuf]) -> Result<Vec<UploadTarget>> {
    let mut targets = Vec::with_capacity(paths.len());
    let mut names = HashSet::new();
    for raw in paths {
        let target = UploadTarget::resolve(raw)?;
        if !names.insert(target.name.clone()) {
            return Err(UploadError::Validation(format!(
                "{} shares the file name {:?} with another input",
                target.path.display(),
                target.name
            )));
        }
        targets.push(target);
    }
    if targets.is_empty() {
        return Err(UploadError::Validation("No valid files to upload".into()));
    }
    Ok(targets)
}

/// A file that made it into the bucket.
#[derive(Debug, Clone)]
pub struct Uploaded {
    pub target: UploadTarget,
    pub sums: Checksums,
    /// What the bucket answered to the PUT.
    pub stored: StoredFile,
}

/// Compare a server-reported checksum with the local MD5. Only bare and
/// `md5:`-prefixed digests can be compared; other algorithms are skipped.
fn compare_md5(file: &str, local: &str, reported: &str, source: &'static str) -> Result<()> {
    let digest = match reported.split_once(':') {
        None => reported,
        Some((algo, digest)) if algo.eq_ignore_ascii_case("md5") => digest,
        Some((algo, _)) => {
            warn!(file, algo, source, "checksum algorithm not comparable, skipped");
            return Ok(());
        }
    };
    if digest.eq_ignore_ascii_case(local) {
        return Ok(());
    }
    Err(UploadError::Integrity {
        file: file.to_string(),
        local: format!("md5 {local}"),
        remote: format!("md5 {digest} ({source})"),
    })
}

fn compare_size(file: &str, local: u64, reported: u64, source: &'static str) -> Result<()> {
    if local == reported {
        return Ok(());
    }
    Err(UploadError::Integrity {
        file: file.to_string(),
        local: format!("{local} bytes"),
        remote: format!("{reported} bytes ({source})"),
    })
}

/// Make sure the deposition holds files, and that what the bucket
/// acknowledged and what the deposition lists agree with what was read
/// locally. Checksums and sizes are compared wherever the service reports
/// them.
pub fn verify_uploads(deposition: &Deposition, uploaded: &[Uploaded]) -> Result<()> {
    if deposition.files.is_empty() {
        return Err(UploadError::NoFilesAttached { id: deposition.id });
    }
    for Uploaded {
        target,
        sums,
        stored,
    } in uploaded
    {
        let name = target.name.as_str();
        if !stored.key.is_empty() && stored.key != target.name {
            warn!(file = name, key = %stored.key, "bucket stored the file under another key");
        }
        if let Some(size) = stored.size {
            compare_size(name, target.size, size, "upload")?;
        }
        if let Some(checksum) = stored.checksum.as_deref() {
            compare_md5(name, &sums.md5, checksum, "upload")?;
        }

        let Some(listed) = deposition.files.iter().find(|f| f.filename == target.name) else {
            warn!(file = name, "uploaded file missing from deposition listing");
            continue;
        };
        if let Some(size) = listed.filesize {
            compare_size(name, target.size, size, "listing")?;
        }
        if let Some(checksum) = listed.checksum.as_deref() {
            compare_md5(name, &sums.md5, checksum, "listing")?;
        }
    }
    Ok(())
}

/// Run the upload from local checks to the published record.
///
/// `config` is only called once the paths and metadata are known to be
/// good, so a bad invocation never reads the credential nor touches the
/// network. Errors are shown to `reporter` before being returned.
pub fn run<C>(
    files: &[PathBuf],
    metadata: &MetadataInput,
    config: C,
    reporter: &mut dyn Reporter,
) -> Result<PublishedRecord>
where
    C: FnOnce() -> Result<ServiceConfig>,
{
    let outcome = execute(files, metadata, config, reporter);
    if let Err(err) = &outcome {
        reporter.failed(err);
    }
    outcome
}

fn execute<C>(
    files: &[PathBuf],
    metadata: &MetadataInput,
    config: C,
    reporter: &mut dyn Reporter,
) -> Result<PublishedRecord>
where
    C: FnOnce() -> Result<ServiceConfig>,
{
    let targets = resolve_targets(files)?;
    let metadata = RecordMetadata::from_input(metadata)?;
    let config = config()?;
    info!(instance = ?config.instance, files = targets.len(), "starting upload");

    reporter.stage("Verifying token permissions...");
    let client = UploadClient::connect(&config)?;
    reporter.stage("Token verified successfully!");

    reporter.stage("Creating Zenodo deposit...");
    let id = client.create_deposit(&metadata)?;

    reporter.stage("Uploading files...");
    let mut uploaded = Vec::with_capacity(targets.len());
    for target in targets {
        reporter.stage(&format!("Uploading {}", target.path.display()));
        reporter.stage("Calculating checksums...");
        let sums = Checksums::compute(&target.path)?;
        reporter.checksums(&target, &sums);

        let on_progress = reporter.start_transfer(&target);
        let stored = client.upload_file(id, &target, on_progress)?;
        reporter.finish_transfer(&target);
        uploaded.push(Uploaded {
            target,
            sums,
            stored,
        });
    }

    let deposition = client.deposition(id)?;
    verify_uploads(&deposition, &uploaded)?;

    reporter.stage("Publishing deposit...");
    let record = client.publish(id)?;
    reporter.published(&record);
    Ok(record)
}
