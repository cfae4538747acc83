// UI layer: what the user sees while a run is in progress. The workflow
// talks to a `Reporter`; `Console` is the terminal implementation, with
// plain `println!` lines and an indicatif bar per transfer.

use crate::api::PublishedRecord;
use crate::checksum::Checksums;
use crate::error::UploadError;
use crate::workflow::UploadTarget;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress callback handed to the client for one transfer. Receives the
/// cumulative number of bytes sent.
pub type TransferProgress = Box<dyn FnMut(u64) + Send>;

/// Receives the events of a run, in the order they happen.
pub trait Reporter {
    /// A step of the workflow is starting or has finished.
    fn stage(&mut self, message: &str);

    /// Checksums of a file about to be uploaded.
    fn checksums(&mut self, target: &UploadTarget, sums: &Checksums);

    fn start_transfer(&mut self, target: &UploadTarget) -> TransferProgress;

    fn finish_transfer(&mut self, target: &UploadTarget);

    /// The run is aborting with `err`.
    fn failed(&mut self, err: &UploadError);

    fn published(&mut self, record: &PublishedRecord);
}

/// Lines printed under a failure: the service's answer when it rejected
/// the publish, then the remediation hints.
pub fn failure_lines(err: &UploadError) -> Vec<String> {
    let hints = err.hints();
    if hints.is_empty() {
        return hints;
    }
    let mut lines = Vec::with_capacity(hints.len() + 1);
    if let UploadError::Publish { detail, .. } = err {
        lines.push(format!("Response: {detail}"));
    }
    lines.extend(hints);
    lines
}

const BAR_TEMPLATE: &str =
    "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Terminal reporter.
#[derive(Default)]
pub struct Console {
    bar: Option<ProgressBar>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for Console {
    fn stage(&mut self, message: &str) {
        println!("{message}");
    }

    fn checksums(&mut self, _target: &UploadTarget, sums: &Checksums) {
        println!("MD5: {}", sums.md5);
        println!("SHA256: {}", sums.sha256);
    }

    fn start_transfer(&mut self, target: &UploadTarget) -> TransferProgress {
        let bar = ProgressBar::new(target.size);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        self.bar = Some(bar.clone());
        Box::new(move |sent: u64| bar.set_position(sent))
    }

    fn finish_transfer(&mut self, _target: &UploadTarget) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    fn failed(&mut self, err: &UploadError) {
        // Keep the partial bar on screen above the hints.
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
        let lines = failure_lines(err);
        if lines.is_empty() {
            return;
        }
        eprintln!();
        for line in lines {
            eprintln!("{line}");
        }
    }

    fn published(&mut self, record: &PublishedRecord) {
        println!();
        println!("Success! Dataset published:");
        println!("DOI: {}", record.doi);
        println!("URL: {}", record.html_url());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_rejection_shows_the_service_answer() {
        let lines = failure_lines(&UploadError::Publish {
            id: 3,
            detail: r#"{"message":"Missing files"}"#.into(),
        });
        assert_eq!(lines[0], r#"Response: {"message":"Missing files"}"#);
        assert!(lines.iter().any(|line| line.contains("required metadata")));
    }

    #[test]
    fn local_empty_listing_is_not_shown_as_a_response() {
        let lines = failure_lines(&UploadError::NoFilesAttached { id: 3 });
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|line| !line.starts_with("Response:")));
    }

    #[test]
    fn errors_without_hints_print_nothing_extra() {
        assert!(failure_lines(&UploadError::Validation("bad".into())).is_empty());
    }
}
