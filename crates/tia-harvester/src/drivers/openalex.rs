//! OpenAlex works API driver.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tia_common::models::{Document, DocumentRecord, DownloadInfo, PublicationDetails, RepositoryRef, SIMPLE_DOWNLOADER};
use tia_common::{HttpClient, Result, TiaError};
use tracing::{info, instrument};
use url::Url;

use super::json_path as jp;
use super::{get_json, request_url, QueryResult, RepositoryDriver};
use crate::access::RepositoryAccess;
use crate::query::{quoted, translate, Query};

pub const DRIVER_NAME: &str = "open_alex";

const FIXED_CONDITIONS: &str = "is_oa:true,type:article";

pub struct OpenAlexDriver {
    client: HttpClient,
}

impl OpenAlexDriver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

pub fn build_query(query: &Query) -> String {
    format!(
        "filter={FIXED_CONDITIONS},title_and_abstract.search:{}&page={}",
        translate(&query.keywords, &quoted),
        query.page_number + 1
    )
}

#[async_trait]
impl RepositoryDriver for OpenAlexDriver {
    fn name(&self) -> &str { DRIVER_NAME }

    #[instrument(skip(self, access, query), fields(repo = %access.url))]
    async fn query(&mut self, group: &str, access: &RepositoryAccess, query: &Query) -> Result<QueryResult> {
        let q = build_query(query);
        info!("query = {q}");

        let url = request_url(&format!("{}?{}", access.url, q))?;
        let (_, root) = get_json(&self.client, url, &[], access.url.as_str()).await?;
        translate_results(group, &root, access)
    }

    fn query_as_string(&self, query: &Query, _page_limit: Option<u32>) -> String {
        build_query(query)
    }
}

// ── Result translation ───────────────────────────────────────────────────────

pub fn translate_results(group: &str, root: &Value, access: &RepositoryAccess) -> Result<QueryResult> {
    let results = root
        .get("results")
        .ok_or_else(|| TiaError::Decode("missing required node \"results\" in response".into()))?
        .as_array()
        .ok_or_else(|| TiaError::Decode("\"results\" node is not an array".into()))?;

    let records = results
        .iter()
        .map(|r| translate_record(group, r, access))
        .collect::<Result<Vec<_>>>()?;
    Ok(QueryResult { records })
}

/// Rebuild the abstract text from `{word: [positions]}`.
pub fn unwrap_inverted_index(index: Option<&Value>) -> Result<Option<String>> {
    let map = match index {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(TiaError::Decode("error decoding abstract inverted index (not an object)".into()));
        }
    };

    let mut words: BTreeMap<i64, &str> = BTreeMap::new();
    for (word, positions) in map {
        let positions = positions
            .as_array()
            .ok_or_else(|| TiaError::Decode("error decoding abstract inverted index (not an array)".into()))?;
        for pos in positions {
            let pos = pos
                .as_i64()
                .ok_or_else(|| TiaError::Decode(format!("bad position for word \"{word}\"")))?;
            words.insert(pos, word);
        }
    }
    Ok(Some(words.into_values().collect::<Vec<_>>().join(" ")))
}

fn work_id(record: &Value) -> Result<String> {
    let raw = jp::required_string(record, "id")?;
    let uri = Url::parse(&raw).map_err(|e| TiaError::Decode(format!("bad work id {raw}: {e}")))?;
    Ok(uri.path().replace('/', ""))
}

fn translate_record(group: &str, record: &Value, access: &RepositoryAccess) -> Result<DocumentRecord> {
    let id = work_id(record)?;
    let doi = jp::string(record, "doi", false)?;

    let mut urls = Vec::new();
    if let Some(locations) = record.get("locations").and_then(Value::as_array) {
        for location in locations {
            if let Some(pdf) = jp::string(location, "pdf_url", false)? {
                urls.push(pdf);
            }
        }
    }

    let mut authors = Vec::new();
    if let Some(authorships) = record.get("authorships").and_then(Value::as_array) {
        for authorship in authorships {
            authors.push(jp::required_string(authorship, "author!display_name")?);
        }
    }

    let (journal_titles, journal_issns) = match record.get("primary_location").and_then(|p| p.get("source")) {
        Some(source) if source.is_object() => {
            let titles = jp::string_list(source, "display_name", false)?;
            let mut issns = jp::string_list(source, "issn_l", false)?;
            issns.extend(jp::string_list(source, "issn", false)?);
            issns.retain(|i| !i.is_empty());
            (Some(titles), Some(issns))
        }
        _ => (None, None),
    };

    let document = Document {
        doi: doi.into_iter().collect(),
        title: jp::required_string(record, "title")?,
        doc_abstract: unwrap_inverted_index(record.get("abstract_inverted_index"))?,
        language: jp::string(record, "language", false)?,
        authors,
        published_on: jp::date(record, "publication_date")?,
        created_on: jp::date(record, "created_date")?,
        ..Default::default()
    };

    let publication_details = PublicationDetails {
        is_open_access: jp::boolean(record, "open_access!is_oa")?,
        citation_count: jp::integer(record, "cited_by_count")?,
        journal_titles,
        journal_issns,
        ..Default::default()
    }
    .with_type_string(jp::string(record, "type", false)?);

    Ok(DocumentRecord {
        id,
        group: group.to_string(),
        configuration: None,
        repository: RepositoryRef {
            driver: DRIVER_NAME.to_string(),
            url: access.url.to_string(),
            credentials: access.credentials.clone(),
        },
        document,
        download_info: DownloadInfo {
            document_url: urls,
            minimum_required: Some(1),
            download_driver: SIMPLE_DOWNLOADER.to_string(),
            credentials: None,
        },
        publication_details,
        raw_search_result_record: record.to_string(),
    })
}
