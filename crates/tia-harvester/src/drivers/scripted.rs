//! Driver replaying canned pages, for tests.

use async_trait::async_trait;
use tia_common::models::DocumentRecord;
use tia_common::{Result, TiaError};

use super::{QueryResult, RepositoryDriver};
use crate::access::RepositoryAccess;
use crate::query::Query;

pub struct ScriptedDriver {
    name: String,
    pages: Vec<Vec<DocumentRecord>>,
    fail: bool,
    /// When set, `proceed[n]` answers whether to continue after page `n`.
    proceed: Option<Vec<bool>>,
    last_page: usize,
}

impl ScriptedDriver {
    /// Serves `pages[query.page_number]`, then empty pages.
    pub fn new(name: &str, pages: Vec<Vec<DocumentRecord>>) -> Self {
        Self { name: name.to_string(), pages, fail: false, proceed: None, last_page: 0 }
    }

    pub fn failing(name: &str) -> Self {
        Self { fail: true, ..Self::new(name, Vec::new()) }
    }

    /// Let `proceed` decide pagination instead of the empty-page rule.
    pub fn with_custom_pagination(mut self, proceed: Vec<bool>) -> Self {
        self.proceed = Some(proceed);
        self
    }
}

#[async_trait]
impl RepositoryDriver for ScriptedDriver {
    fn name(&self) -> &str { &self.name }

    async fn query(&mut self, group: &str, _access: &RepositoryAccess, query: &Query) -> Result<QueryResult> {
        if self.fail {
            return Err(TiaError::Contact(format!("cannot contact repository {}", self.name)));
        }
        self.last_page = query.page_number as usize;
        let records = self
            .pages
            .get(query.page_number as usize)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut r| {
                r.group = group.to_string();
                r
            })
            .collect();
        Ok(QueryResult { records })
    }

    fn query_as_string(&self, query: &Query, page_limit: Option<u32>) -> String {
        format!("page={} limit={:?}", query.page_number, page_limit)
    }

    fn custom_pagination(&self) -> bool {
        self.proceed.is_some()
    }

    fn proceed_with_next_page(&self) -> bool {
        self.proceed
            .as_ref()
            .and_then(|p| p.get(self.last_page).copied())
            .unwrap_or(false)
    }
}
