// Metadata module: the record description sent with the deposition, and
// the parsing of the delimited lists the command line accepts.

use crate::error::{Result, UploadError};
use serde::Serialize;

pub const DEFAULT_LICENSE: &str = "cc-by-4.0";

/// Relation recorded for each related DOI.
pub const RELATION_REFERENCED_BY: &str = "isReferencedBy";

/// Descriptive metadata of a record. Optional lists are left out of the
/// JSON entirely when unset.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecordMetadata {
    pub title: String,
    pub upload_type: String,
    pub description: String,
    pub creators: Vec<Creator>,
    pub access_right: String,
    pub license: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communities: Option<Vec<Community>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_identifiers: Option<Vec<RelatedIdentifier>>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Creator {
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Community {
    pub identifier: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RelatedIdentifier {
    pub identifier: String,
    pub relation: String,
    pub scheme: String,
}

/// Raw metadata fields as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct MetadataInput {
    pub title: String,
    pub description: String,
    /// `"Last, First; Last, First"`
    pub creators: String,
    pub license: Option<String>,
    /// Comma-separated.
    pub keywords: Option<String>,
    /// Comma-separated community identifiers.
    pub communities: Option<String>,
    /// Comma-separated DOIs.
    pub related_dois: Option<String>,
}

/// Split on `delimiter`, trim each entry and drop the empty ones.
pub fn split_list(raw: &str, delimiter: char) -> Vec<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_list(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|raw| split_list(raw, ','))
        .filter(|entries| !entries.is_empty())
}

impl RecordMetadata {
    /// Build the metadata of a dataset record from user input.
    pub fn from_input(input: &MetadataInput) -> Result<Self> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(UploadError::Validation("title must not be empty".into()));
        }
        let description = input.description.trim();
        if description.is_empty() {
            return Err(UploadError::Validation("description must not be empty".into()));
        }

        let creators: Vec<Creator> = split_list(&input.creators, ';')
            .into_iter()
            .map(|name| Creator { name })
            .collect();
        if creators.is_empty() {
            return Err(UploadError::Validation(
                "at least one creator is required (\"Last, First; ...\")".into(),
            ));
        }

        let license = input
            .license
            .as_deref()
            .map(str::trim)
            .filter(|license| !license.is_empty())
            .unwrap_or(DEFAULT_LICENSE)
            .to_string();

        Ok(Self {
            title: title.to_string(),
            upload_type: "dataset".into(),
            description: description.to_string(),
            creators,
            access_right: "open".into(),
            license,
            keywords: optional_list(input.keywords.as_deref()),
            communities: optional_list(input.communities.as_deref()).map(|ids| {
                ids.into_iter()
                    .map(|identifier| Community { identifier })
                    .collect()
            }),
            related_identifiers: optional_list(input.related_dois.as_deref()).map(|dois| {
                dois.into_iter()
                    .map(|identifier| RelatedIdentifier {
                        identifier,
                        relation: RELATION_REFERENCED_BY.into(),
                        scheme: "doi".into(),
                    })
                    .collect()
            }),
        })
    }
}
