//! Dry-run modes: print the outgoing queries, or run them and report the
//! results as CSV without touching any queue or store.

use std::error::Error as _;
use std::io::Write;

use tia_common::models::{DocumentRecord, KeywordDictionary, RepositoryConfig};
use tia_common::{Result, TiaError};
use tracing::{error, info};

use crate::access::RepositoryAccess;
use crate::config::QueryModeRepository;
use crate::drivers::{continue_pagination, DriverRegistry, RepositoryDriver};
use crate::query::Query;

const REPORT_GROUP: &str = "reporter";
const PRINT_PAGE_LIMIT: u32 = 10;

pub const CSV_HEADER: [&str; 15] = [
    "repository", "mission", "doc_id", "dois", "language", "title", "abstract", "open_access", "type",
    "type_string", "cited_by_count", "publication_titles", "publication_issns", "journal_impact_factor",
    "repo_score",
];

pub struct Reporter {
    drivers: DriverRegistry,
    dictionary: KeywordDictionary,
}

impl Reporter {
    pub fn new(drivers: DriverRegistry, dictionary: KeywordDictionary) -> Self {
        Self { drivers, dictionary }
    }

    /// Log every mission's query as each registered driver would send it.
    /// Returns the rendered queries.
    pub fn print_queries(&self) -> Result<Vec<String>> {
        let mut rendered = Vec::new();
        for mission in &self.dictionary.dictionary_definition.children {
            let query = Query::new(mission.clone(), None);
            let name = mission.mission_name().unwrap_or_default();
            for driver_name in self.drivers.names() {
                let mut driver = self.drivers.create(driver_name)?;
                driver.initialize();
                let q = driver.query_as_string(&query, Some(PRINT_PAGE_LIMIT));
                info!("--- mission: {name}, repo: {driver_name} ---");
                info!("{q}");
                rendered.push(q);
            }
        }
        Ok(rendered)
    }

    /// Query every repository and write the CSV report to `out`.
    ///
    /// Contact and decode failures are written inline and the report moves
    /// on to the next repository; a configuration failure ends the report.
    pub async fn write_report<W: Write>(
        &self,
        repositories: &[QueryModeRepository],
        out: W,
        verbose: bool,
    ) -> Result<()> {
        let mut writer = report_writer(out);
        writer.write_record(CSV_HEADER).map_err(csv_error)?;

        for qm in repositories {
            let repo = qm.to_repository_config();
            match self.search_repository(&repo, &mut writer, verbose).await {
                Ok(_) => {}
                Err(e) if e.is_fatal_for_report() => {
                    write_error(&mut writer, &e)?;
                    writer.flush()?;
                    return Err(e);
                }
                Err(e) => {
                    error!(repo = %repo.name, error = %e, "cannot query repository");
                    write_error(&mut writer, &e)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub async fn search_repository<W: Write>(
        &self,
        repo: &RepositoryConfig,
        out: &mut csv::Writer<W>,
        verbose: bool,
    ) -> Result<usize> {
        info!(repo = %repo.name, "searching repository");
        let mut driver = self.drivers.create(&repo.driver)?;
        let access = RepositoryAccess::from_config(repo)?;
        let root = &self.dictionary.dictionary_definition;

        let mut grand_total = 0;
        for i in 0..root.children.len() {
            let Some(keywords) = root.with_only_child(i) else { continue };
            let mission = root.children[i].mission_name().unwrap_or_default();
            let query = Query::new(keywords, repo.last_visit);

            let rendered = driver.query_as_string(&query, access.page_limit);
            out.write_record([repo.name.as_str(), mission, "", "", "", rendered.as_str()])
                .map_err(csv_error)?;

            let found = self
                .search_mission(driver.as_mut(), &access, query, mission, out, verbose)
                .await?;
            info!(repo = %repo.name, %mission, found, "mission searched");
            grand_total += found;

            if i + 1 < root.children.len() {
                if let Some(pause) = access.pause() {
                    tokio::time::sleep(pause).await;
                }
            }
        }
        info!(repo = %repo.name, found = grand_total, "repository search finished");
        Ok(grand_total)
    }

    async fn search_mission<W: Write>(
        &self,
        driver: &mut dyn RepositoryDriver,
        access: &RepositoryAccess,
        mut query: Query,
        mission: &str,
        out: &mut csv::Writer<W>,
        verbose: bool,
    ) -> Result<usize> {
        driver.initialize();
        let mut pages = 0;
        let mut total = 0;

        loop {
            let page = driver.query(REPORT_GROUP, access, &query).await?;
            pages += 1;
            total += page.records.len();
            query.advance(pages, total as u32);

            for record in &page.records {
                let row = if verbose {
                    verbose_row(driver.name(), mission, record)
                } else {
                    short_row(driver.name(), mission, record)
                };
                out.write_record(&row).map_err(csv_error)?;
            }

            if !continue_pagination(driver, &page) {
                break;
            }
            if let Some(pause) = access.pause() {
                info!("pausing pagination for {} seconds", pause.as_secs());
                tokio::time::sleep(pause).await;
            }
        }
        Ok(total)
    }
}

// ── CSV formatting ───────────────────────────────────────────────────────────

/// Quotes only where needed, escaping embedded quotes with a backslash.
pub fn report_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .flexible(true)
        .escape(b'\\')
        .double_quote(false)
        .from_writer(out)
}

fn csv_error(e: csv::Error) -> TiaError {
    TiaError::Io(e.into())
}

/// One report line per record.
fn single_line(value: Option<&str>) -> String {
    match value {
        Some(v) => v.replace(['\r', '\n'], " "),
        None => "null".to_string(),
    }
}

fn or_null<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}

fn dois(record: &DocumentRecord) -> String {
    format!("[{}]", record.document.doi.join(", "))
}

fn short_row(driver: &str, mission: &str, record: &DocumentRecord) -> Vec<String> {
    vec![
        driver.to_string(),
        mission.to_string(),
        record.id.clone(),
        dois(record),
        or_null(record.document.language.as_deref()),
        single_line(Some(&record.document.title)),
    ]
}

fn verbose_row(driver: &str, mission: &str, record: &DocumentRecord) -> Vec<String> {
    let details = &record.publication_details;
    let mut row = short_row(driver, mission, record);
    row.extend([
        single_line(record.document.doc_abstract.as_deref()),
        or_null(details.is_open_access),
        or_null(details.publication_type.map(|t| t.as_str())),
        or_null(details.publication_type_string.as_deref()),
        or_null(details.citation_count),
        or_null(details.journal_titles.as_ref().map(|t| t.join(" / "))),
        or_null(details.journal_issns.as_ref().map(|i| i.join(" / "))),
        or_null(details.journal_impact_factor.map(|f| format!("{f:.2}"))),
        or_null(details.repository_score.map(|f| format!("{f:.2}"))),
    ]);
    row
}

fn write_error<W: Write>(out: &mut csv::Writer<W>, e: &TiaError) -> Result<()> {
    out.write_record([format!("error: {e}")]).map_err(csv_error)?;
    let mut source = e.source();
    while let Some(cause) = source {
        out.write_record([format!("caused by: {cause}")]).map_err(csv_error)?;
        source = cause.source();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tia_common::models::{KeywordDictionaryNode, PublicationDetails};
    use tia_test_utils::document_record;

    use crate::drivers::scripted::ScriptedDriver;

    fn dictionary() -> KeywordDictionary {
        KeywordDictionary {
            id: None,
            name: "EO".into(),
            dictionary_definition: KeywordDictionaryNode::new(
                &["satellite"],
                false,
                vec![
                    KeywordDictionaryNode::new(&["flood"], false, vec![]),
                    KeywordDictionaryNode::new(&["fire"], false, vec![]),
                ],
            ),
        }
    }

    fn qm(driver: &str) -> QueryModeRepository {
        QueryModeRepository {
            driver: driver.into(),
            url: "https://repo.example.org/api".into(),
            credentials: None,
            page_delay: None,
            page_size: None,
        }
    }

    fn reporter() -> Reporter {
        let mut drivers = DriverRegistry::new();
        let mut record = document_record("fake", "d1", NaiveDate::from_ymd_opt(2023, 1, 1));
        record.document.title = "Line one\nwith \"quotes\"".into();
        record.document.language = Some("en".into());
        drivers.register("fake", move || Box::new(ScriptedDriver::new("fake", vec![vec![record.clone()]])));
        drivers.register("down", || Box::new(ScriptedDriver::failing("down")));
        Reporter::new(drivers, dictionary())
    }

    fn render(row: &[String]) -> String {
        let mut buf = Vec::new();
        {
            let mut writer = report_writer(&mut buf);
            writer.write_record(row).unwrap();
            writer.flush().unwrap();
        }
        String::from_utf8(buf).unwrap().trim_end().to_string()
    }

    #[tokio::test]
    async fn test_short_report() {
        let mut out = Vec::new();
        reporter().write_report(&[qm("fake")], &mut out, false).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "fake,flood,,,,page=0 limit=None");
        assert_eq!(lines[2], "fake,flood,d1,[10.1234/d1],en,\"Line one with \\\"quotes\\\"\"");
        assert_eq!(lines[3], "fake,fire,,,,page=0 limit=None");
        assert_eq!(lines.len(), 5);
    }

    #[tokio::test]
    async fn test_contact_error_is_written_inline_and_report_continues() {
        let mut out = Vec::new();
        reporter().write_report(&[qm("down"), qm("fake")], &mut out, false).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("error: Contact error: cannot contact repository down"));
        assert!(text.contains("fake,fire,d1,"));
    }

    #[tokio::test]
    async fn test_configuration_error_aborts_report() {
        let mut out = Vec::new();
        let err = reporter()
            .write_report(&[qm("nope"), qm("fake")], &mut out, false)
            .await
            .unwrap_err();
        assert!(err.is_fatal_for_report());
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("d1"));
    }

    #[test]
    fn test_verbose_row() {
        let mut record = document_record("fake", "d9", None);
        record.document.doc_abstract = Some("An \"abstract\"".into());
        record.publication_details = PublicationDetails {
            is_open_access: Some(true),
            citation_count: Some(3),
            journal_titles: Some(vec!["A".into(), "B".into()]),
            journal_impact_factor: Some(2.5),
            ..Default::default()
        }
        .with_type_string(Some("Article".into()));

        assert_eq!(
            render(&verbose_row("open_alex", "fire", &record)),
            "open_alex,fire,d9,[10.1234/d9],null,Document d9,\"An \\\"abstract\\\"\",true,\
             JOURNAL_ARTICLE,Article,3,A / B,null,2.50,null"
        );
    }

    #[test]
    fn test_commas_stay_inside_their_column() {
        let mut record = document_record("open_alex", "W1,2", None);
        record.document.doi = vec!["10.1/a".into(), "10.1/b".into()];
        record.document.title = "Sea level, \"coastal\" risk".into();
        let line = render(&verbose_row("open_alex", "sea level, coastal", &record));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .escape(Some(b'\\'))
            .double_quote(false)
            .from_reader(line.as_bytes());
        let fields = reader.records().next().unwrap().unwrap();
        assert_eq!(fields.len(), CSV_HEADER.len());
        assert_eq!(&fields[1], "sea level, coastal");
        assert_eq!(&fields[2], "W1,2");
        assert_eq!(&fields[3], "[10.1/a, 10.1/b]");
        assert_eq!(&fields[5], "Sea level, \"coastal\" risk");
        assert_eq!(&fields[7], "null");
    }

    #[test]
    fn test_print_queries_covers_every_driver_and_mission() {
        let rendered = reporter().print_queries().unwrap();
        assert_eq!(rendered.len(), 4);
        assert_eq!(rendered[0], "page=0 limit=Some(10)");
    }
}
