//! JRC Publications Repository driver.
//!
//! Records are flat maps of DSpace attribute paths (`dc.title`,
//! `document.<n>.filename`, ...), each holding a scalar or a list.

use async_trait::async_trait;
use serde_json::Value;
use tia_common::models::{
    Citation, Document, DocumentRecord, DownloadInfo, PublicationDetails, RepositoryRef, SIMPLE_DOWNLOADER,
};
use tia_common::{HttpClient, Result, TiaError};
use tracing::{debug, info, instrument, warn};

use super::json_path as jp;
use super::{get_json, request_url, QueryResult, RepositoryDriver};
use crate::access::RepositoryAccess;
use crate::query::{quoted, translate, Query};

pub const DRIVER_NAME: &str = "jrc";

const DEFAULT_PAGE_SIZE: u32 = 10;
const TYPE_DOCUMENT: &str = "DOCUMENT";

pub struct JrcDriver {
    client: HttpClient,
}

impl JrcDriver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

/// `q={...}` argument of the JRC search API.
pub fn build_query(query: &Query, page_limit: Option<u32>) -> String {
    let condition = translate(&query.keywords, &quoted).replace('"', "\\\"");
    format!(
        "q={{\"criteria\":{{}},\"query\":\"{}\",\"sort\":\"date-desc\",\"page\":{},\"pageSize\":{}}}",
        condition,
        query.page_number + 1,
        page_limit.unwrap_or(DEFAULT_PAGE_SIZE)
    )
}

#[async_trait]
impl RepositoryDriver for JrcDriver {
    fn name(&self) -> &str { DRIVER_NAME }

    #[instrument(skip(self, access, query), fields(repo = %access.url))]
    async fn query(&mut self, group: &str, access: &RepositoryAccess, query: &Query) -> Result<QueryResult> {
        let q = build_query(query, access.page_limit);
        info!("query = {q}");

        let url = request_url(&format!("{}?{}", access.url, q))?;
        let (_, root) = get_json(&self.client, url, &[], access.url.as_str()).await?;
        translate_results(group, &root, access)
    }

    fn query_as_string(&self, query: &Query, page_limit: Option<u32>) -> String {
        build_query(query, page_limit)
    }
}

// ── Result translation ───────────────────────────────────────────────────────

pub fn translate_results(group: &str, root: &Value, access: &RepositoryAccess) -> Result<QueryResult> {
    let mut result = QueryResult::default();
    let Some(items) = root.get("items") else {
        return Ok(result);
    };
    let items = items
        .as_array()
        .ok_or_else(|| TiaError::Decode("\"items\" node is not an array".into()))?;

    for item in items {
        if let Some(record) = translate_record(group, item, access).map_err(with_context)? {
            result.records.push(record);
        }
    }
    Ok(result)
}

fn with_context(e: TiaError) -> TiaError {
    match e {
        TiaError::Decode(msg) => TiaError::Decode(format!("error decoding JRC document record: {msg}")),
        other => other,
    }
}

fn remove_medium(value: &str) -> String {
    value.replace("(online)", "").replace("(print)", "").trim().to_string()
}

fn translate_record(group: &str, record: &Value, access: &RepositoryAccess) -> Result<Option<DocumentRecord>> {
    let id = jp::required_string(record, "id")?;

    let dois: Vec<String> = jp::string_list(record, "dc.identifier.doi", false)?
        .iter()
        .map(|d| remove_medium(d))
        .collect();
    let issns: Vec<String> = jp::string_list(record, "dc.identifier.issn", false)?
        .iter()
        .map(|i| remove_medium(i))
        .filter(|i| !i.is_empty())
        .collect();

    let urls = download_urls(record, &id)?;
    if urls.is_empty() {
        warn!(doc_id = %id, "document does not have download-urls, skipping");
        return Ok(None);
    }

    let document = Document {
        doi: dois,
        title: jp::required_string(record, "dc.title")?,
        doc_abstract: jp::string(record, "dc.description.abstract", false)?,
        full_text: None,
        language: jp::string(record, "dc.language", false)?,
        authors: jp::string_list(record, "dc.contributor.author", false)?,
        contributors: jp::string_list(record, "search.contributors", false)?,
        editors: jp::string_list(record, "dc.contributor.editor", false)?,
        created_on: jp::date(record, "dc.date.created")?,
        published_on: jp::date(record, "dc.date.available")?,
        citations: citations(record)?,
        keyword_dictionary_second_level: None,
    };

    let publication_details = PublicationDetails {
        journal_issns: Some(issns),
        ..Default::default()
    }
    .with_type_string(jp::string(record, "dc.type", false)?);

    Ok(Some(DocumentRecord {
        id,
        group: group.to_string(),
        configuration: None,
        repository: RepositoryRef {
            driver: DRIVER_NAME.to_string(),
            url: access.url.to_string(),
            credentials: None,
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
    }))
}

/// Bitstream URL of every attachment typed `DOCUMENT`.
fn download_urls(record: &Value, record_id: &str) -> Result<Vec<String>> {
    let uris = jp::string_list(record, "dc.identifier.uri", true)?;
    let first = uris
        .first()
        .ok_or_else(|| TiaError::Decode("\"dc.identifier.uri\" is empty".into()))?;
    let base = match first.find("/handle") {
        Some(pos) => &first[..pos],
        None => first.as_str(),
    };

    let mut urls = Vec::new();
    for doc_id in jp::string_list(record, "document.id", false)? {
        let key = format!("document.{}", doc_id.trim());
        let doc_type = jp::required_string(record, &format!("{key}.type"))?;
        if doc_type == TYPE_DOCUMENT {
            let filename = jp::required_string(record, &format!("{key}.filename"))?;
            let url = format!("{base}/bitstream/{record_id}/{filename}");
            debug!(%url, attachment = %doc_id, "found pdf url");
            urls.push(url);
        }
    }
    Ok(urls)
}

fn citations(record: &Value) -> Result<Vec<Citation>> {
    jp::string_list(record, "data.id.citations", true)?
        .iter()
        .map(|id| {
            let key = format!("data.citation.{}", id.trim());
            Ok(Citation {
                kind: jp::required_string(record, &format!("{key}.type"))?,
                language: jp::required_string(record, &format!("{key}.language"))?,
                text: jp::required_string(record, &format!("{key}.text"))?,
            })
        })
        .collect()
}
