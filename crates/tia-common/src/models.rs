//! Wire models shared by the scheduler, harvester and retriever.
//!
//! Field names follow the camelCase JSON exchanged with the configuration
//! service and carried on the queues.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::{Result, TiaError};
use crate::status::DocumentStatus;

pub const SIMPLE_DOWNLOADER: &str = "SIMPLE_DOWNLOADER";
pub const SCOPUS_DOWNLOADER: &str = "SCOPUS_DOWNLOADER";

// ── Configuration entities ───────────────────────────────────────────────────

/// A harvestable external repository, as stored by the configuration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    /// Repository driver key (`jrc`, `scopus`, `open_alex`).
    pub driver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    /// Visiting frequency in seconds.
    pub frequency: u64,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
    /// Politeness delay in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_between_pages: Option<u64>,
    #[serde(default, with = "dates::optional", skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<NaiveDate>,
}

impl RepositoryConfig {
    /// Visiting frequency as a duration. Values chrono cannot represent are
    /// configuration errors.
    pub fn visit_interval(&self) -> Result<TimeDelta> {
        i64::try_from(self.frequency)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                TiaError::Configuration(format!(
                    "repository {} has an out of range frequency: {}",
                    self.id, self.frequency
                ))
            })
    }
}

/// Credential entry served separately from the repository list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub value: String,
}

/// Attach credentials to the repositories with the same id.
pub fn merge_credentials(repos: &mut [RepositoryConfig], credentials: &[Credential]) {
    for credential in credentials {
        for repo in repos.iter_mut().filter(|r| r.id == credential.id) {
            repo.credentials = Some(credential.value.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBinding {
    pub id: String,
    pub initiative_id: String,
    pub document_type_id: String,
    pub keyword_dictionary_id: String,
    #[serde(default)]
    pub document_repository_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordDictionary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub dictionary_definition: KeywordDictionaryNode,
}

/// One node of the boolean keyword taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordDictionaryNode {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub skip_keywords: bool,
    #[serde(default)]
    pub children: Vec<KeywordDictionaryNode>,
}

impl KeywordDictionaryNode {
    pub fn new(keywords: &[&str], skip_keywords: bool, children: Vec<KeywordDictionaryNode>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            skip_keywords,
            children,
        }
    }

    /// Label of a second-level node: its first keyword.
    pub fn mission_name(&self) -> Option<&str> {
        self.keywords.first().map(String::as_str)
    }

    /// Copy of this node restricted to its `index`-th child.
    pub fn with_only_child(&self, index: usize) -> Option<KeywordDictionaryNode> {
        self.children.get(index).map(|child| KeywordDictionaryNode {
            keywords: self.keywords.clone(),
            skip_keywords: self.skip_keywords,
            children: vec![child.clone()],
        })
    }
}

// ── Canonical document record ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfiguration {
    pub initiative: String,
    pub document_type: String,
    pub keyword_dictionary: String,
}

impl From<&SearchBinding> for SearchConfiguration {
    fn from(b: &SearchBinding) -> Self {
        Self {
            initiative: b.initiative_id.clone(),
            document_type: b.document_type_id.clone(),
            keyword_dictionary: b.keyword_dictionary_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub driver: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(rename = "type")]
    pub kind: String,
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub doi: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub doc_abstract: Option<String>,
    /// Base64 of gzip-compressed text when present.
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default, with = "dates::optional")]
    pub created_on: Option<NaiveDate>,
    #[serde(default, with = "dates::optional")]
    pub published_on: Option<NaiveDate>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Mission label attached by the harvester.
    #[serde(default)]
    pub keyword_dictionary_second_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub document_url: Vec<String>,
    /// Falls back to the URL count when unset.
    #[serde(default)]
    pub minimum_required: Option<u32>,
    pub download_driver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationType {
    JournalArticle,
    Book,
    Research,
    TechnicalReport,
    Errata,
    Review,
    Data,
    Letter,
    Unknown,
}

impl PublicationType {
    /// Classify a free-form provider type label. First match wins.
    pub fn from_type_string(value: &str) -> Self {
        let v = value.to_lowercase();
        if v.contains("article") {
            PublicationType::JournalArticle
        } else if v.contains("book") {
            PublicationType::Book
        } else if v.contains("research") {
            PublicationType::Research
        } else if v.contains("tech") && v.contains("report") {
            PublicationType::TechnicalReport
        } else if v.contains("errata") {
            PublicationType::Errata
        } else if v.contains("review") {
            PublicationType::Review
        } else if v.contains("data") {
            PublicationType::Data
        } else if v.contains("letter") {
            PublicationType::Letter
        } else {
            PublicationType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationType::JournalArticle  => "JOURNAL_ARTICLE",
            PublicationType::Book            => "BOOK",
            PublicationType::Research        => "RESEARCH",
            PublicationType::TechnicalReport => "TECHNICAL_REPORT",
            PublicationType::Errata          => "ERRATA",
            PublicationType::Review          => "REVIEW",
            PublicationType::Data            => "DATA",
            PublicationType::Letter          => "LETTER",
            PublicationType::Unknown         => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationDetails {
    #[serde(default)]
    pub is_open_access: Option<bool>,
    #[serde(default)]
    pub publication_type: Option<PublicationType>,
    #[serde(default)]
    pub publication_type_string: Option<String>,
    #[serde(default)]
    pub citation_count: Option<i64>,
    #[serde(default)]
    pub journal_titles: Option<Vec<String>>,
    #[serde(default)]
    pub journal_issns: Option<Vec<String>>,
    #[serde(default)]
    pub journal_impact_factor: Option<f32>,
    #[serde(default)]
    pub repository_score: Option<f32>,
}

impl PublicationDetails {
    pub fn with_type_string(mut self, type_string: Option<String>) -> Self {
        self.publication_type = type_string.as_deref().map(PublicationType::from_type_string);
        self.publication_type_string = type_string;
        self
    }
}

/// Canonical record produced by a repository driver and carried on the
/// document queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SearchConfiguration>,
    pub repository: RepositoryRef,
    pub document: Document,
    pub download_info: DownloadInfo,
    #[serde(default)]
    pub publication_details: PublicationDetails,
    #[serde(default)]
    pub raw_search_result_record: String,
}

impl DocumentRecord {
    pub fn mission(&self) -> &str {
        self.document.keyword_dictionary_second_level.as_deref().unwrap_or("")
    }

    /// Key of this record in the status store.
    pub fn status_id(&self) -> String {
        DocumentStatus::make_id(&self.group, &self.repository.driver, self.mission(), &self.id)
    }
}
