#[cfg(test)]
mod tests {
    use super::super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_takes_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.store.is_none());
        assert!(config.store().is_err());
        assert_eq!(config.queues.repo, "repo");
        assert_eq!(config.query_mode.output_file, "query-report.csv");
        assert!(config.query_mode.repositories.is_empty());
    }

    #[test]
    fn test_query_mode_repositories() {
        let config = Config::parse(
            r#"
            [store]
            database_url = "postgres://localhost/tia"

            [query_mode]
            keywords_file = "keywords.json"

            [[query_mode.repositories]]
            driver = "scopus"
            url = "https://api.elsevier.com/content"
            credentials = "key"
            page_delay = 2

            [[query_mode.repositories]]
            driver = "open_alex"
            url = "https://api.openalex.org/works"
            page_size = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.store().unwrap().database_url, "postgres://localhost/tia");
        let repos: Vec<_> = config
            .query_mode
            .repositories
            .iter()
            .map(QueryModeRepository::to_repository_config)
            .collect();
        assert_eq!(repos[0].name, "scopus");
        assert_eq!(repos[0].pause_between_pages, Some(2));
        assert_eq!(repos[0].credentials.as_deref(), Some("key"));
        assert_eq!(repos[1].page_limit, Some(25));
        assert_eq!(repos[1].frequency, 60);
        assert!(repos[1].enabled);
    }

    #[test]
    fn test_load_dictionary_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name":"EO","dictionaryDefinition":{{"keywords":["satellite"],"children":[{{"keywords":["flood"]}}]}}}}"#
        )
        .unwrap();

        let settings = QueryModeSettings {
            keywords_file: Some(file.path().display().to_string()),
            ..Default::default()
        };
        let dictionary = settings.load_dictionary().unwrap();
        assert_eq!(dictionary.name, "EO");
        assert_eq!(dictionary.dictionary_definition.children[0].mission_name(), Some("flood"));
    }

    #[test]
    fn test_missing_keywords_file_is_an_error() {
        assert!(QueryModeSettings::default().load_dictionary().is_err());
    }
}
