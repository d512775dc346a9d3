#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_download_defaults() {
        let config = Config::parse(
            r#"
            [download]
            path = "/data/tia"
            "#,
        )
        .unwrap();
        assert_eq!(config.download.max_retry, 3);
        assert!(!config.download.unpaywall_fallback_enabled);
        assert!(config.enrichment.enabled_services().is_empty());
        assert_eq!(config.queues.metadata, "metadata");
        assert!(config.store().is_err());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [store]
            database_url = "postgres://tia@localhost/tia"
            max_connections = 2

            [queues]
            docs = "tia-docs"

            [download]
            path = "/data/tia"
            max_retry = 5
            unpaywall_fallback_enabled = true

            [enrichment]
            unpaywall_enabled = true
            unpaywall_email = "ops@example.org"
            opencitations_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.store().unwrap().max_connections, 2);
        assert_eq!(config.queues.docs, "tia-docs");
        assert_eq!(config.download.max_retry, 5);
        assert_eq!(config.enrichment.enabled_services().len(), 2);
        assert_eq!(config.enrichment.unpaywall().email, "ops@example.org");
    }

    #[test]
    fn test_download_section_is_required() {
        assert!(Config::parse("").is_err());
    }
}
