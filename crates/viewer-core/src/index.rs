//! Per-page text index
//!
//! Holds the fragments of every extracted page in emission order, plus the
//! lowercase page search string used for the coarse existence check.

use doc_model::{PageNumber, TextFragment};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
struct PageEntry {
    fragments: Vec<TextFragment>,
    search_text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTextIndex {
    pages: BTreeMap<PageNumber, PageEntry>,
}

impl PageTextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the fragments of a page, replacing whatever the page had.
    ///
    /// Fragments are kept exactly as given, degenerate ones included.
    pub fn index(&mut self, page_number: PageNumber, fragments: Vec<TextFragment>) {
        let search_text = page_search_string(&fragments);
        tracing::trace!(page_number, fragments = fragments.len(), "indexed page");

        self.pages.insert(page_number, PageEntry { fragments, search_text });
    }

    pub fn fragments(&self, page_number: PageNumber) -> Option<&[TextFragment]> {
        self.pages.get(&page_number).map(|entry| entry.fragments.as_slice())
    }

    pub fn search_text(&self, page_number: PageNumber) -> Option<&str> {
        self.pages.get(&page_number).map(|entry| entry.search_text.as_str())
    }

    /// Indexed page numbers in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = PageNumber> + '_ {
        self.pages.keys().copied()
    }

    pub fn contains_page(&self, page_number: PageNumber) -> bool {
        self.pages.contains_key(&page_number)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.pages.values().map(|entry| entry.fragments.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

/// Lowercase fragment texts joined by a single space.
pub fn page_search_string(fragments: &[TextFragment]) -> String {
    fragments.iter().map(|fragment| fragment.text.to_lowercase()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::Point;

    fn fragment(page: PageNumber, text: &str, x: f32) -> TextFragment {
        TextFragment::new(page, text, Point::new(x, 20.0), 50.0, 15.0)
    }

    #[test]
    fn search_string_is_lowercase_and_space_joined() {
        let fragments = vec![fragment(1, "Hello", 10.0), fragment(1, "WORLD", 65.0)];
        assert_eq!(page_search_string(&fragments), "hello world");
    }

    #[test]
    fn empty_fragments_keep_their_separator() {
        let fragments = vec![fragment(1, "a", 0.0), fragment(1, "", 10.0), fragment(1, "b", 20.0)];
        assert_eq!(page_search_string(&fragments), "a  b");
    }

    #[test]
    fn reindexing_a_page_replaces_its_fragments() {
        let mut index = PageTextIndex::new();
        index.index(2, vec![fragment(2, "old", 0.0), fragment(2, "text", 60.0)]);
        index.index(2, vec![fragment(2, "new", 0.0)]);

        assert_eq!(index.page_count(), 1);
        assert_eq!(index.fragment_count(), 1);
        assert_eq!(index.search_text(2), Some("new"));
    }

    #[test]
    fn degenerate_fragments_are_stored_as_is() {
        let mut index = PageTextIndex::new();
        let spacer = TextFragment::new(1, "", Point::new(40.0, 20.0), 0.0, 0.0);
        index.index(1, vec![fragment(1, "a", 0.0), spacer.clone(), fragment(1, "b", 60.0)]);

        let stored = index.fragments(1).expect("page 1 should be indexed");
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1], spacer);
    }

    #[test]
    fn pages_iterate_in_ascending_order() {
        let mut index = PageTextIndex::new();
        for page in [5, 1, 3] {
            index.index(page, vec![fragment(page, "x", 0.0)]);
        }

        assert_eq!(index.pages().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(index.contains_page(3));
        assert!(!index.contains_page(2));
        assert!(index.fragments(2).is_none());
    }

    #[test]
    fn clear_empties_the_index() {
        let mut index = PageTextIndex::new();
        index.index(1, vec![fragment(1, "x", 0.0)]);
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.fragment_count(), 0);
    }
}
