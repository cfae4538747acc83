// Command-line definition. Parsing is clap's job; this module only turns
// the parsed flags into the inputs the workflow takes.

use crate::config::{Instance, ServiceConfig};
use crate::error::Result;
use crate::metadata::{MetadataInput, DEFAULT_LICENSE};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Upload data to Zenodo and publish it as a dataset.
#[derive(Parser, Debug)]
#[command(name = "zenodo-upload", version, about)]
pub struct Args {
    /// Files to upload
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Dataset title
    #[arg(long)]
    pub title: String,

    /// Dataset description
    #[arg(long)]
    pub description: String,

    /// Authors ("LastName, FirstName; ...")
    #[arg(long)]
    pub creators: String,

    /// Use sandbox.zenodo.org
    #[arg(long)]
    pub sandbox: bool,

    /// Keywords (comma-separated)
    #[arg(long)]
    pub keywords: Option<String>,

    /// Zenodo communities (comma-separated)
    #[arg(long)]
    pub communities: Option<String>,

    /// Related DOIs (comma-separated)
    #[arg(long = "related-dois")]
    pub related_dois: Option<String>,

    /// License
    #[arg(long, default_value = DEFAULT_LICENSE)]
    pub license: String,

    /// Override the API base URL (e.g. a self-hosted instance)
    #[arg(long = "api-url", env = "ZENODO_API_URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds; no timeout when omitted
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn metadata(&self) -> MetadataInput {
        MetadataInput {
            title: self.title.clone(),
            description: self.description.clone(),
            creators: self.creators.clone(),
            license: Some(self.license.clone()),
            keywords: self.keywords.clone(),
            communities: self.communities.clone(),
            related_dois: self.related_dois.clone(),
        }
    }

    pub fn instance(&self) -> Instance {
        Instance::from_sandbox_flag(self.sandbox)
    }

    /// Resolve the service configuration from the environment.
    pub fn service_config(&self) -> Result<ServiceConfig> {
        Ok(ServiceConfig::from_env(self.instance(), self.api_url.clone())?
            .with_timeout(self.timeout))
    }

    /// Default log filter for the number of `-v` flags given.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_full_invocation() {
        let args = Args::try_parse_from([
            "zenodo-upload",
            "a.csv",
            "b.csv",
            "--title",
            "Survey",
            "--description",
            "Raw data",
            "--creators",
            "Doe, Jane; Roe, Richard",
            "--sandbox",
            "--keywords",
            "x,y",
            "--related-dois",
            "10.1/abc",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.files, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(args.instance(), Instance::Sandbox);
        assert_eq!(args.license, "cc-by-4.0");
        assert_eq!(args.log_level(), "debug");
        let metadata = args.metadata();
        assert_eq!(metadata.related_dois.as_deref(), Some("10.1/abc"));
        assert!(metadata.communities.is_none());
    }

    #[test]
    fn files_and_required_options_are_mandatory() {
        assert!(Args::try_parse_from(["zenodo-upload", "--title", "t"]).is_err());
        assert!(Args::try_parse_from([
            "zenodo-upload",
            "a.csv",
            "--title",
            "t",
            "--description",
            "d",
        ])
        .is_err());
    }
}
