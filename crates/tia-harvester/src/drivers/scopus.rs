//! Elsevier Scopus Search API driver.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tia_common::models::{Document, DocumentRecord, DownloadInfo, PublicationDetails, RepositoryRef, SCOPUS_DOWNLOADER};
use tia_common::{HttpClient, Result, TiaError};
use tracing::{debug, info, instrument, warn};

use super::json_path as jp;
use super::{get_json, request_url, QueryResult, RepositoryDriver};
use crate::access::RepositoryAccess;
use crate::query::{translate, Query};

pub const DRIVER_NAME: &str = "scopus";

const HEADER_API_KEY: &str = "X-ELS-APIKey";
const QUERY_URL_PATH: &str = "/search/scopus";
const DOWNLOAD_URL_PATH: &str = "/article/doi/";
const DOI_RESOLVER_URL: &str = "https://www.doi.org/";
const RATE_LIMIT_PREFIX: &str = "x-ratelimit";

pub struct ScopusDriver {
    client: HttpClient,
}

impl ScopusDriver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

fn token(keyword: &str) -> String {
    format!("TITLE-ABS-KEY(\"{keyword}\")")
}

pub fn build_query(query: &Query) -> String {
    format!(
        "start={}&query=({}) AND OPENACCESS(1) AND DOCTYPE(\"ar\") AND NOT LANGUAGE(\"Russian\") AND NOT LANGUAGE(\"Chinese\")",
        query.record_offset,
        translate(&query.keywords, &token)
    )
}

fn log_rate_limit_headers(headers: &HeaderMap) {
    for (name, value) in headers {
        if name.as_str().starts_with(RATE_LIMIT_PREFIX) {
            debug!(header = %name, value = ?value, "response rate limit header");
        }
    }
}

#[async_trait]
impl RepositoryDriver for ScopusDriver {
    fn name(&self) -> &str { DRIVER_NAME }

    #[instrument(skip(self, access, query), fields(repo = %access.url))]
    async fn query(&mut self, group: &str, access: &RepositoryAccess, query: &Query) -> Result<QueryResult> {
        if access.page_limit.is_some() {
            warn!("configured page limit not implemented for Scopus");
        }
        let q = build_query(query);
        info!("query = {q}");

        let url = request_url(&format!("{}{}?{}", access.base_url(), QUERY_URL_PATH, q))?;
        let mut headers = Vec::new();
        if let Some(key) = access.credentials.as_deref() {
            headers.push((HEADER_API_KEY, key));
        }
        let (resp_headers, root) = get_json(&self.client, url, &headers, access.url.as_str()).await?;
        log_rate_limit_headers(&resp_headers);

        translate_results(group, &root, access)
    }

    fn query_as_string(&self, query: &Query, _page_limit: Option<u32>) -> String {
        build_query(query)
    }
}

// ── Result translation ───────────────────────────────────────────────────────

pub fn translate_results(group: &str, root: &Value, access: &RepositoryAccess) -> Result<QueryResult> {
    let results = root
        .get("search-results")
        .ok_or_else(|| TiaError::Decode("missing required node \"search-results\" in response".into()))?;
    if !results.is_object() {
        return Err(TiaError::Decode("\"search-results\" node is not an object".into()));
    }

    let mut out = QueryResult::default();
    if let Some(entries) = results.get("entry") {
        let entries = entries
            .as_array()
            .ok_or_else(|| TiaError::Decode("\"entry\" node is not an array".into()))?;
        for entry in entries.iter().filter(|e| e.get("error").is_none()) {
            let record = translate_record(group, entry, access).map_err(|e| match e {
                TiaError::Decode(msg) => TiaError::Decode(format!("error decoding Scopus entry: {msg}")),
                other => other,
            })?;
            out.records.extend(record);
        }
    }
    Ok(out)
}

/// Entries without a DOI have nothing to download from and are skipped.
fn translate_record(group: &str, entry: &Value, access: &RepositoryAccess) -> Result<Option<DocumentRecord>> {
    let id = jp::required_string(entry, "dc:identifier")?;
    let Some(doi) = jp::string(entry, "prism:doi", false)?.filter(|d| !d.trim().is_empty()) else {
        warn!(doc_id = %id, "document does not have a doi, skipping");
        return Ok(None);
    };

    let urls = vec![
        format!("{}{}{}", access.base_url(), DOWNLOAD_URL_PATH, doi),
        format!("{DOI_RESOLVER_URL}{doi}"),
    ];

    let mut issns = jp::string_list(entry, "prism:issn", false)?;
    issns.extend(jp::string_list(entry, "prism:eIssn", false)?);
    issns.retain(|i| !i.is_empty());

    let cover_date = jp::date(entry, "prism:coverDate")?;
    let citation_count = match jp::string(entry, "citedby-count", false)? {
        Some(count) => Some(
            count
                .trim()
                .parse::<i64>()
                .map_err(|_| TiaError::Decode(format!("\"citedby-count\" is not a number: {count}")))?,
        ),
        None => None,
    };

    let document = Document {
        doi: vec![doi],
        title: jp::required_string(entry, "dc:title")?,
        authors: jp::string(entry, "dc:creator", false)?.into_iter().collect(),
        created_on: cover_date,
        published_on: cover_date,
        ..Default::default()
    };

    let publication_details = PublicationDetails {
        is_open_access: jp::boolean(entry, "openaccessFlag")?,
        citation_count,
        journal_titles: Some(jp::string_list(entry, "prism:publicationName", false)?),
        journal_issns: Some(issns),
        ..Default::default()
    }
    .with_type_string(jp::string(entry, "subtypeDescription", false)?);

    Ok(Some(DocumentRecord {
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
            minimum_required: None,
            download_driver: SCOPUS_DOWNLOADER.to_string(),
            credentials: access.credentials.clone(),
        },
        publication_details,
        raw_search_result_record: entry.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use tia_common::models::{KeywordDictionaryNode, PublicationType};

    fn access() -> RepositoryAccess {
        RepositoryAccess {
            url: url::Url::parse("https://api.elsevier.com/content/").unwrap(),
            username: None,
            password: None,
            credentials: Some("api-key".into()),
            page_limit: None,
            pause_between_pages: None,
        }
    }

    fn entry() -> Value {
        json!({
            "dc:identifier": "SCOPUS_ID:85100000000",
            "dc:title": "Drought indices from Sentinel-2",
            "dc:creator": "Bianchi L.",
            "prism:doi": "10.1016/j.rse.2023.113000",
            "prism:publicationName": "Remote Sensing of Environment",
            "prism:issn": "00344257",
            "prism:eIssn": "",
            "prism:coverDate": "2023-03-01",
            "openaccessFlag": true,
            "subtypeDescription": "Article",
            "citedby-count": "12"
        })
    }

    #[test]
    fn test_query_string() {
        let mut q = Query::new(
            KeywordDictionaryNode::new(&["drought"], false, vec![]),
            None,
        );
        q.advance(1, 25);
        assert_eq!(
            build_query(&q),
            "start=25&query=(TITLE-ABS-KEY(\"drought\")) AND OPENACCESS(1) AND DOCTYPE(\"ar\") \
             AND NOT LANGUAGE(\"Russian\") AND NOT LANGUAGE(\"Chinese\")"
        );
    }

    #[test]
    fn test_translate_entry() {
        let root = json!({ "search-results": { "entry": [entry(), { "error": "Result set was empty" }] } });
        let result = translate_results("EO", &root, &access()).unwrap();
        assert_eq!(result.records.len(), 1);

        let r = &result.records[0];
        assert_eq!(r.document.authors, vec!["Bianchi L."]);
        assert_eq!(
            r.download_info.document_url,
            vec![
                "https://api.elsevier.com/content/article/doi/10.1016/j.rse.2023.113000",
                "https://www.doi.org/10.1016/j.rse.2023.113000",
            ]
        );
        assert_eq!(r.download_info.minimum_required, None);
        assert_eq!(r.download_info.credentials.as_deref(), Some("api-key"));
        assert_eq!(r.publication_details.citation_count, Some(12));
        assert_eq!(r.publication_details.is_open_access, Some(true));
        assert_eq!(r.publication_details.publication_type, Some(PublicationType::JournalArticle));
        assert_eq!(r.publication_details.journal_issns, Some(vec!["00344257".to_string()]));
        assert_eq!(r.document.published_on, NaiveDate::from_ymd_opt(2023, 3, 1));
    }

    #[test]
    fn test_entry_without_doi_is_skipped() {
        let mut missing = entry();
        missing.as_object_mut().unwrap().remove("prism:doi");
        let mut blank = entry();
        blank["prism:doi"] = json!("");
        let root = json!({ "search-results": { "entry": [missing, blank, entry()] } });

        let result = translate_results("EO", &root, &access()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].document.doi, vec!["10.1016/j.rse.2023.113000"]);
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(translate_results("EO", &json!({}), &access()), Err(TiaError::Decode(_))));
        assert!(translate_results("EO", &json!({ "search-results": [] }), &access()).is_err());
        assert!(translate_results("EO", &json!({ "search-results": { "entry": {} } }), &access()).is_err());
        assert!(translate_results("EO", &json!({ "search-results": {} }), &access()).unwrap().is_empty());
    }
}
