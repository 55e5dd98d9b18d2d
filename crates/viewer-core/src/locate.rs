//! Phrase location over a [`PageTextIndex`]
//!
//! A phrase is first checked against the page search string, then resolved
//! to the run of fragments that produces it with a bounded sliding window.
//! The window joins fragment texts according to [`FragmentJoin`], which by
//! default differs from the page search string (fragments concatenated with
//! no separator). A phrase that only exists across a space-joined fragment
//! boundary therefore passes the page check but resolves to no run unless the
//! locator runs with [`FragmentJoin::Space`].

use crate::index::PageTextIndex;
use doc_model::{BoundingRect, MatchResult, PageNumber, PhraseConfig, ReferenceId, TextFragment};
use std::collections::VecDeque;
use std::ops::Range;

/// How fragment texts are joined inside the run-resolution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentJoin {
    /// Texts are appended with no separator.
    #[default]
    Concatenate,
    /// Texts are joined with one space, like the page search string.
    Space,
}

/// Tuning for [`PhraseLocator`]; the default matches fragments concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocatorOptions {
    pub fragment_join: FragmentJoin,
}

impl LocatorOptions {
    /// Sets how the run-resolution window joins fragment texts.
    pub fn with_fragment_join(mut self, fragment_join: FragmentJoin) -> Self {
        self.fragment_join = fragment_join;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocateMiss {
    #[error("reference {0} is not configured")]
    ReferenceNotConfigured(ReferenceId),
    #[error(
        "could not find \"{canonical}\" for reference {reference}; tried {}",
        quoted_list(.variations)
    )]
    PhraseNotFound {
        reference: ReferenceId,
        canonical: String,
        variations: Vec<String>,
        pages_searched: Vec<PageNumber>,
    },
}

fn quoted_list(values: &[String]) -> String {
    values.iter().map(|value| format!("\"{value}\"")).collect::<Vec<_>>().join(", ")
}

pub struct PhraseLocator<'a> {
    index: &'a PageTextIndex,
    config: &'a PhraseConfig,
    options: LocatorOptions,
}

impl<'a> PhraseLocator<'a> {
    pub fn new(index: &'a PageTextIndex, config: &'a PhraseConfig, options: LocatorOptions) -> Self {
        Self { index, config, options }
    }

    /// Finds the first page, then the first variation, whose fragment run
    /// contains the phrase configured for `reference`.
    pub fn locate(&self, reference: &ReferenceId) -> Result<MatchResult, LocateMiss> {
        let Some(spec) = self.config.get(reference) else {
            return Err(LocateMiss::ReferenceNotConfigured(reference.clone()));
        };

        let candidates: Vec<PageNumber> = match spec.page_hint {
            Some(page) => vec![page],
            None => self.index.pages().collect(),
        };

        let mut pages_searched = Vec::with_capacity(candidates.len());
        for page in candidates {
            let (Some(fragments), Some(search_text)) =
                (self.index.fragments(page), self.index.search_text(page))
            else {
                tracing::debug!(%reference, page, "page not indexed, skipping");
                continue;
            };
            if fragments.is_empty() {
                tracing::debug!(%reference, page, "page has no text, skipping");
                continue;
            }
            pages_searched.push(page);

            if let Some(found) = self.locate_on_page(page, fragments, search_text, &spec.variations)
            {
                return Ok(found);
            }
        }

        Err(LocateMiss::PhraseNotFound {
            reference: reference.clone(),
            canonical: spec.canonical.clone(),
            variations: spec.variations.clone(),
            pages_searched,
        })
    }

    fn locate_on_page(
        &self,
        page: PageNumber,
        fragments: &[TextFragment],
        search_text: &str,
        variations: &[String],
    ) -> Option<MatchResult> {
        let (variation, needle) = variations
            .iter()
            .filter(|variation| !variation.trim().is_empty())
            .map(|variation| (variation, variation.to_lowercase()))
            .find(|(_, needle)| search_text.contains(needle.as_str()))?;

        let Some(run) = scan_fragment_run(fragments, &needle, self.options.fragment_join).run
        else {
            tracing::debug!(page, variation = %variation, "phrase on page but no fragment run");
            return None;
        };

        let rect = bounding_rect(&fragments[run.clone()])?;
        Some(MatchResult {
            page,
            rect,
            variation: variation.clone(),
            first_fragment: run.start,
            fragment_count: run.len(),
        })
    }
}

/// Resolves the minimal run of fragments, ending at the first fragment that
/// completes a match, whose joined lowercase text contains `variation`.
pub fn resolve_fragment_run(
    fragments: &[TextFragment],
    variation: &str,
    join: FragmentJoin,
) -> Option<Range<usize>> {
    let needle = variation.to_lowercase();
    if needle.is_empty() {
        return None;
    }

    scan_fragment_run(fragments, &needle, join).run
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunScan {
    pub(crate) run: Option<Range<usize>>,
    /// Fragments pushed into the window.
    pub(crate) visited: usize,
    /// Largest window buffer seen, in bytes.
    pub(crate) peak_buffer: usize,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    fragment: usize,
    end: usize,
}

/// Sliding-window scan. `needle` must already be lowercase and non-empty.
///
/// Offsets in `spans` are absolute positions in the full joined text; `base`
/// is the absolute offset of `buffer[0]`. After a failed check the buffer is
/// trimmed from the front to at most three needle lengths, which always keeps
/// the `needle.len() - 1` trailing bytes a later match could start in.
pub(crate) fn scan_fragment_run(fragments: &[TextFragment], needle: &str, join: FragmentJoin) -> RunScan {
    let limit = needle.len() * 3;
    let mut buffer = String::new();
    let mut spans: VecDeque<Span> = VecDeque::new();
    let mut base = 0usize;
    let mut scan = RunScan { run: None, visited: 0, peak_buffer: 0 };

    for (position, fragment) in fragments.iter().enumerate() {
        if join == FragmentJoin::Space && position > 0 {
            buffer.push(' ');
        }
        buffer.push_str(&fragment.text.to_lowercase());
        spans.push_back(Span { fragment: position, end: base + buffer.len() });

        scan.visited += 1;
        scan.peak_buffer = scan.peak_buffer.max(buffer.len());

        if let Some(offset) = buffer.rfind(needle) {
            let start = base + offset;
            let first = spans
                .iter()
                .find(|span| span.end > start)
                .map_or(position, |span| span.fragment);
            scan.run = Some(first..position + 1);
            return scan;
        }

        if buffer.len() > limit {
            let mut cut = buffer.len() - limit;
            while !buffer.is_char_boundary(cut) {
                cut += 1;
            }
            buffer.drain(..cut);
            base += cut;

            while spans.front().is_some_and(|span| span.end <= base) {
                spans.pop_front();
            }
        }
    }

    scan
}

/// Smallest axis-aligned rectangle enclosing every fragment of `run`.
pub fn bounding_rect(run: &[TextFragment]) -> Option<BoundingRect> {
    let (first, rest) = run.split_first()?;

    let mut left = first.origin.x;
    let mut top = first.origin.y;
    let mut right = first.right();
    let mut bottom = first.bottom();
    for fragment in rest {
        left = left.min(fragment.origin.x);
        top = top.min(fragment.origin.y);
        right = right.max(fragment.right());
        bottom = bottom.max(fragment.bottom());
    }

    Some(BoundingRect::from_edges(left, top, right, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Point, PhraseSpec};

    fn fragment(page: PageNumber, text: &str, x: f32, y: f32) -> TextFragment {
        let width = text.chars().count() as f32 * 6.0;
        TextFragment::new(page, text, Point::new(x, y), width, 12.0)
    }

    fn line(page: PageNumber, texts: &[&str], y: f32) -> Vec<TextFragment> {
        let mut x = 72.0;
        texts
            .iter()
            .map(|text| {
                let fragment = fragment(page, text, x, y);
                x = fragment.right() + 6.0;
                fragment
            })
            .collect()
    }

    fn ebitda_config() -> PhraseConfig {
        PhraseConfig::new().with(
            "1",
            PhraseSpec::new("EBITDA of USD 2.3bn", ["ebitda of usd 2.3 bn", "ebitda"])
                .with_page_hint(3),
        )
    }

    fn report_index() -> PageTextIndex {
        let mut index = PageTextIndex::new();
        index.index(1, line(1, &["Annual report", "2023"], 80.0));
        index.index(2, line(2, &["Revenue rose", "by 12%"], 80.0));
        let mut page_three = line(3, &["Group results"], 80.0);
        page_three.extend(line(3, &["EBITDA of USD 2.3 bn", "was reported"], 100.0));
        index.index(3, page_three);
        index
    }

    #[test]
    fn locates_hinted_phrase_and_encloses_its_fragments() {
        let index = report_index();
        let config = ebitda_config();
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let found = locator.locate(&ReferenceId::from("1")).expect("phrase should be found");

        assert_eq!(found.page, 3);
        assert_eq!(found.variation, "ebitda of usd 2.3 bn");
        assert_eq!(found.first_fragment, 1);
        assert_eq!(found.fragment_count, 1);
        assert!(!found.rect.is_degenerate());

        let fragments = index.fragments(3).expect("page 3 is indexed");
        assert!(found.rect.encloses(&fragments[1]));
        assert_eq!(found.rect, BoundingRect::new(72.0, 100.0, 120.0, 12.0));
    }

    #[test]
    fn unknown_reference_is_a_miss_not_a_panic() {
        let index = report_index();
        let config = ebitda_config();
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        assert_eq!(
            locator.locate(&ReferenceId::from("99")),
            Err(LocateMiss::ReferenceNotConfigured(ReferenceId::from("99")))
        );
    }

    #[test]
    fn missing_phrase_reports_variations_tried() {
        let index = report_index();
        let config = PhraseConfig::new()
            .with("7", PhraseSpec::new("Net debt of EUR 1bn", ["net debt of eur 1bn", "net debt"]));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let miss = locator.locate(&ReferenceId::from("7")).expect_err("phrase is absent");

        match &miss {
            LocateMiss::PhraseNotFound { canonical, variations, pages_searched, .. } => {
                assert_eq!(canonical, "Net debt of EUR 1bn");
                assert_eq!(variations.len(), 2);
                assert_eq!(pages_searched, &vec![1, 2, 3]);
            }
            other => panic!("unexpected miss {other:?}"),
        }
        let message = miss.to_string();
        assert!(message.contains("Net debt of EUR 1bn"));
        assert!(message.contains("\"net debt of eur 1bn\", \"net debt\""));
    }

    #[test]
    fn matching_ignores_case() {
        let mut index = PageTextIndex::new();
        index.index(1, line(1, &["ebitda margin"], 80.0));
        let config = PhraseConfig::new().with("1", PhraseSpec::new("EBITDA", ["EBITDA"]));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let found = locator.locate(&ReferenceId::from("1")).expect("case should not matter");
        assert_eq!(found.page, 1);
        assert_eq!(found.variation, "EBITDA");
    }

    #[test]
    fn first_page_in_ascending_order_wins_without_hint() {
        let mut index = PageTextIndex::new();
        index.index(4, line(4, &["free cash flow"], 200.0));
        index.index(2, line(2, &["free cash flow"], 80.0));
        let config =
            PhraseConfig::new().with("fcf", PhraseSpec::new("Free cash flow", ["free cash flow"]));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let found = locator.locate(&ReferenceId::from("fcf")).expect("phrase should be found");
        assert_eq!(found.page, 2);
        assert_eq!(found.rect.top, 80.0);
    }

    #[test]
    fn first_variation_in_listed_order_wins() {
        let mut index = PageTextIndex::new();
        index.index(1, line(1, &["EBITDA", "of USD 2.3 bn"], 80.0));
        let config = PhraseConfig::new()
            .with("1", PhraseSpec::new("EBITDA", ["usd 2.3 bn", "ebitda"]));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let found = locator.locate(&ReferenceId::from("1")).expect("phrase should be found");
        assert_eq!(found.variation, "usd 2.3 bn");
        assert_eq!(found.first_fragment, 1);
    }

    #[test]
    fn hinted_page_that_is_not_indexed_is_skipped() {
        let index = report_index();
        let config = PhraseConfig::new()
            .with("1", PhraseSpec::new("Annual report", ["annual report"]).with_page_hint(9));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        match locator.locate(&ReferenceId::from("1")) {
            Err(LocateMiss::PhraseNotFound { pages_searched, .. }) => {
                assert!(pages_searched.is_empty())
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn hint_restricts_search_to_one_page() {
        let index = report_index();
        let config = PhraseConfig::new()
            .with("1", PhraseSpec::new("Annual report", ["annual report"]).with_page_hint(2));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        assert!(locator.locate(&ReferenceId::from("1")).is_err());
    }

    #[test]
    fn boundary_straddling_phrase_needs_space_join() {
        let mut index = PageTextIndex::new();
        index.index(3, line(3, &["EBITDA of USD", "2.3 bn"], 80.0));
        let config = ebitda_config().with(
            "2",
            PhraseSpec::new("EBITDA of USD 2.3bn", ["ebitda of usd 2.3 bn"]).with_page_hint(3),
        );
        let reference = ReferenceId::from("2");
        assert!(index.search_text(3).is_some_and(|text| text.contains("ebitda of usd 2.3 bn")));

        let concatenated = PhraseLocator::new(&index, &config, LocatorOptions::default());
        assert!(matches!(
            concatenated.locate(&reference),
            Err(LocateMiss::PhraseNotFound { .. })
        ));

        let spaced = PhraseLocator::new(
            &index,
            &config,
            LocatorOptions::default().with_fragment_join(FragmentJoin::Space),
        );
        let found = spaced.locate(&reference).expect("space join should find the phrase");
        assert_eq!(found.first_fragment, 0);
        assert_eq!(found.fragment_count, 2);
        // "EBITDA of USD" is 78 wide at x 72, "2.3 bn" starts at 156 and is 36 wide
        assert_eq!(found.rect, BoundingRect::new(72.0, 80.0, 120.0, 12.0));
    }

    #[test]
    fn failed_run_moves_to_next_page_without_retrying_variations() {
        let mut index = PageTextIndex::new();
        index.index(1, line(1, &["net", "debt"], 80.0));
        index.index(2, line(2, &["net debt"], 80.0));
        let config = PhraseConfig::new().with("1", PhraseSpec::new("Net debt", ["net debt", "net"]));
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let found = locator.locate(&ReferenceId::from("1")).expect("page 2 has the phrase");
        assert_eq!(found.page, 2);
        assert_eq!(found.variation, "net debt");
    }

    #[test]
    fn blank_variations_are_ignored() {
        let mut index = PageTextIndex::new();
        index.index(1, line(1, &["net debt"], 80.0));
        let spec = PhraseSpec { canonical: "Net debt".into(), variations: vec![" ".into(), "debt".into()], page_hint: None };
        let config = PhraseConfig::new().with("1", spec);
        let locator = PhraseLocator::new(&index, &config, LocatorOptions::default());

        let found = locator.locate(&ReferenceId::from("1")).expect("second variation matches");
        assert_eq!(found.variation, "debt");
    }

    #[test]
    fn run_is_minimal_and_ends_at_completing_fragment() {
        let fragments = line(1, &["xyz", "abc", "def", "abcdef"], 80.0);

        assert_eq!(resolve_fragment_run(&fragments, "CDE", FragmentJoin::Concatenate), Some(1..3));
        assert_eq!(resolve_fragment_run(&fragments, "c d", FragmentJoin::Space), Some(1..3));
        assert_eq!(resolve_fragment_run(&fragments, "abcdef", FragmentJoin::Space), Some(3..4));
    }

    #[test]
    fn match_completed_after_trimming_keeps_its_first_fragment() {
        let long = format!("{}nee", "x".repeat(40));
        let fragments = line(1, &[long.as_str(), "dle"], 80.0);

        assert_eq!(resolve_fragment_run(&fragments, "needle", FragmentJoin::Concatenate), Some(0..2));
    }

    #[test]
    fn empty_fragments_do_not_start_a_run() {
        let fragments = line(1, &["net", "", "debt"], 80.0);

        assert_eq!(resolve_fragment_run(&fragments, "debt", FragmentJoin::Concatenate), Some(2..3));
        assert_eq!(resolve_fragment_run(&fragments, "netdebt", FragmentJoin::Concatenate), Some(0..3));
    }

    #[test]
    fn window_visits_each_fragment_once_and_stays_bounded() {
        let texts: Vec<String> = (0..200).map(|i| format!("lorem ipsum {i} ")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let fragments = line(1, &refs, 80.0);
        let longest = texts.iter().map(String::len).max().unwrap_or(0);

        for join in [FragmentJoin::Concatenate, FragmentJoin::Space] {
            let scan = scan_fragment_run(&fragments, "needle", join);
            assert_eq!(scan.run, None);
            assert_eq!(scan.visited, 200);
            assert!(scan.peak_buffer <= 3 * "needle".len() + longest + 1, "{scan:?}");
        }
    }

    #[test]
    fn multibyte_text_is_trimmed_on_char_boundaries() {
        let fragments = line(1, &["ééééééééééééééé", "€€€€€", "prix net"], 80.0);

        assert_eq!(resolve_fragment_run(&fragments, "€prix", FragmentJoin::Concatenate), Some(1..3));
    }

    #[test]
    fn bounding_rect_is_min_max_reduction() {
        let run = vec![
            TextFragment::new(1, "a", Point::new(50.0, 30.0), 20.0, 10.0),
            TextFragment::new(1, "b", Point::new(10.0, 42.0), 15.0, 12.0),
            TextFragment::new(1, "c", Point::new(70.0, 35.0), 40.0, 5.0),
        ];

        let rect = bounding_rect(&run).expect("run is not empty");

        assert_eq!(rect, BoundingRect::new(10.0, 30.0, 100.0, 24.0));
        assert!(run.iter().all(|fragment| rect.left <= fragment.origin.x));
        assert!(run.iter().all(|fragment| rect.encloses(fragment)));
        assert_eq!(bounding_rect(&[]), None);
    }
}
