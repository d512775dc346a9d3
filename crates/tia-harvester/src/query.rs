//! Canonical repository query and the boolean keyword-tree translation
//! shared by every repository driver.

use chrono::NaiveDate;
use tia_common::models::KeywordDictionaryNode;

/// Keyword tree plus the pagination cursor, advanced once per page.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub keywords: KeywordDictionaryNode,
    pub start_date: Option<NaiveDate>,
    pub page_number: u32,
    pub record_offset: u32,
}

impl Query {
    pub fn new(keywords: KeywordDictionaryNode, start_date: Option<NaiveDate>) -> Self {
        Self { keywords, start_date, page_number: 0, record_offset: 0 }
    }

    pub fn advance(&mut self, pages_done: u32, total_records: u32) {
        self.page_number = pages_done;
        self.record_offset = total_records;
    }
}

/// Render `node` as a boolean condition, wrapping each keyword with `token`.
///
/// Own keywords are OR-ed, children are OR-ed, and the two groups are AND-ed.
/// A group is parenthesized only when it holds more than one term. Empty
/// groups are dropped, so a node without own keywords never leaves a
/// dangling `AND`.
pub fn translate<F>(node: &KeywordDictionaryNode, token: &F) -> String
where
    F: Fn(&str) -> String,
{
    let own = if node.skip_keywords {
        String::new()
    } else {
        let terms: Vec<String> = node.keywords.iter().map(|k| token(k)).collect();
        disjunction(terms)
    };

    let children: Vec<String> = node
        .children
        .iter()
        .map(|child| translate(child, token))
        .filter(|clause| !clause.is_empty())
        .collect();
    let children = disjunction(children);

    match (own.is_empty(), children.is_empty()) {
        (true, _) => children,
        (false, true) => own,
        (false, false) => format!("{own} AND {children}"),
    }
}

fn disjunction(terms: Vec<String>) -> String {
    match terms.len() {
        0 => String::new(),
        1 => terms.into_iter().next().unwrap_or_default(),
        _ => format!("({})", terms.join(" OR ")),
    }
}

/// `"keyword"`
pub fn quoted(keyword: &str) -> String {
    format!("\"{keyword}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(k: &str) -> String { k.to_string() }

    #[test]
    fn test_keywords_and_single_child() {
        let node = KeywordDictionaryNode::new(
            &["a", "b"],
            false,
            vec![KeywordDictionaryNode::new(&["c"], false, vec![])],
        );
        assert_eq!(translate(&node, &plain), "(a OR b) AND c");
    }

    #[test]
    fn test_skip_keywords_renders_children_only() {
        let node = KeywordDictionaryNode::new(
            &["ignored"],
            true,
            vec![
                KeywordDictionaryNode::new(&["x"], false, vec![]),
                KeywordDictionaryNode::new(&["y", "z"], false, vec![]),
            ],
        );
        assert_eq!(translate(&node, &plain), "(x OR (y OR z))");
    }

    #[test]
    fn test_empty_node_yields_empty_clause() {
        let node = KeywordDictionaryNode::new(&[], false, vec![]);
        assert_eq!(translate(&node, &plain), "");

        let only_children = KeywordDictionaryNode::new(
            &[],
            false,
            vec![KeywordDictionaryNode::new(&["flood"], false, vec![])],
        );
        assert_eq!(translate(&only_children, &quoted), "\"flood\"");
    }

    #[test]
    fn test_nested_tree_with_token() {
        let node = KeywordDictionaryNode::new(
            &["earth observation"],
            false,
            vec![KeywordDictionaryNode::new(
                &["flood"],
                false,
                vec![
                    KeywordDictionaryNode::new(&["radar"], false, vec![]),
                    KeywordDictionaryNode::new(&["optical"], false, vec![]),
                ],
            )],
        );
        let scopus = |k: &str| format!("TITLE-ABS-KEY(\"{k}\")");
        assert_eq!(
            translate(&node, &scopus),
            "TITLE-ABS-KEY(\"earth observation\") AND TITLE-ABS-KEY(\"flood\") AND \
             (TITLE-ABS-KEY(\"radar\") OR TITLE-ABS-KEY(\"optical\"))"
        );
    }

    #[test]
    fn test_advance_moves_cursor() {
        let mut q = Query::new(KeywordDictionaryNode::default(), None);
        q.advance(2, 37);
        assert_eq!((q.page_number, q.record_offset), (2, 37));
    }
}
