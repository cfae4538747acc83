// Library root
// -----------
// Everything the `zenodo-upload` binary does lives here, so the workflow
// can be driven against a mock service in tests.
//
// Module responsibilities:
// - `cli`: clap argument definitions.
// - `config`: instance selection, token lookup, endpoint URLs.
// - `metadata`: the record description and its CLI list parsing.
// - `checksum`: MD5/SHA-256 of the files before upload.
// - `progress`: byte-counting reader used as the upload body.
// - `api`: blocking HTTP client for the deposition REST API.
// - `ui`: console output and upload progress bars.
// - `workflow`: validates inputs and drives the client step by step.
// - `error`: the error type shared by all of the above.
pub mod api;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod progress;
pub mod ui;
pub mod workflow;

pub use error::{Result, UploadError};
