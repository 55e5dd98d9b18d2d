use doc_model::PageNumber;

/// Continuous-scroll layout of the rendered pages.
///
/// Page indices here are 0-based positions in `page_heights_px`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    pub viewport_width_px: f32,
    pub viewport_height_px: f32,
    pub scroll_offset_px: f32,
    pub page_heights_px: Vec<f32>,
    pub page_spacing_px: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            viewport_width_px: 1280.0,
            viewport_height_px: 800.0,
            scroll_offset_px: 0.0,
            page_heights_px: vec![1000.0],
            page_spacing_px: 16.0,
        }
    }
}

impl ViewportState {
    pub fn with_pages(page_heights_px: Vec<f32>, viewport_height_px: f32) -> Self {
        Self { page_heights_px, viewport_height_px, ..Self::default() }
    }
}

pub fn content_height(state: &ViewportState) -> f32 {
    let pages: f32 = state.page_heights_px.iter().sum();
    let gaps = state.page_heights_px.len().saturating_sub(1) as f32 * state.page_spacing_px;

    pages + gaps
}

pub fn max_scroll_offset(state: &ViewportState) -> f32 {
    (content_height(state) - state.viewport_height_px).max(0.0)
}

/// Scroll offset that puts `y_in_page` of the given page at the vertical
/// center of the viewport, clamped to the scrollable range.
pub fn centered_scroll_offset(state: &ViewportState, page_index: u32, y_in_page: f32) -> f32 {
    let target = page_start_offset(page_index, state) + y_in_page - state.viewport_height_px / 2.0;
    target.clamp(0.0, max_scroll_offset(state))
}

pub fn page_start_offset(page_index: u32, state: &ViewportState) -> f32 {
    let mut cursor = 0.0;

    for (index, page_height) in state.page_heights_px.iter().enumerate() {
        if index as u32 == page_index {
            return cursor;
        }
        cursor += page_height + state.page_spacing_px;
    }

    cursor
}

/// 1-based page under the vertical centre of the viewport.
///
/// The gap below a page counts as part of that page; a centre past the end
/// of the document lands on the last page.
pub fn page_at_viewport_center(state: &ViewportState) -> Option<PageNumber> {
    let center = state.scroll_offset_px + state.viewport_height_px / 2.0;
    let last = state.page_heights_px.len() as PageNumber;

    let mut page_bottom = 0.0;
    for (page, height) in (1..=last).zip(&state.page_heights_px) {
        page_bottom += height + state.page_spacing_px;
        if center < page_bottom {
            return Some(page);
        }
    }

    (last > 0).then_some(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_pages() -> ViewportState {
        ViewportState {
            viewport_height_px: 1000.0,
            page_heights_px: vec![1000.0, 1000.0, 1000.0],
            page_spacing_px: 100.0,
            ..ViewportState::default()
        }
    }

    #[test]
    fn centre_page_follows_scroll_offset() {
        let scrolled_to = |scroll_offset_px| ViewportState { scroll_offset_px, ..three_pages() };

        assert_eq!(page_at_viewport_center(&scrolled_to(0.0)), Some(1));
        assert_eq!(page_at_viewport_center(&scrolled_to(1200.0)), Some(2));
        // centre at 2650, past page 2 and its gap
        assert_eq!(page_at_viewport_center(&scrolled_to(2150.0)), Some(3));
        assert_eq!(page_at_viewport_center(&scrolled_to(9000.0)), Some(3));
    }

    #[test]
    fn gap_below_a_page_belongs_to_it() {
        // centre at 1050, inside the gap between pages 1 and 2
        let state = ViewportState { scroll_offset_px: 550.0, ..three_pages() };

        assert_eq!(page_at_viewport_center(&state), Some(1));
    }

    #[test]
    fn document_without_pages_has_no_centre_page() {
        let state = ViewportState::with_pages(Vec::new(), 800.0);

        assert_eq!(page_at_viewport_center(&state), None);
    }

    #[test]
    fn content_height_includes_gaps_between_pages() {
        assert_eq!(content_height(&three_pages()), 3200.0);
        assert_eq!(max_scroll_offset(&three_pages()), 2200.0);
    }

    #[test]
    fn centered_offset_puts_target_mid_viewport() {
        let state = three_pages();

        // page 2 starts at 1100; target 400 into it, minus half the viewport
        assert_eq!(centered_scroll_offset(&state, 1, 400.0), 1000.0);
    }

    #[test]
    fn centered_offset_is_clamped_at_document_edges() {
        let state = three_pages();

        assert_eq!(centered_scroll_offset(&state, 0, 10.0), 0.0);
        assert_eq!(centered_scroll_offset(&state, 2, 990.0), 2200.0);
    }

    #[test]
    fn short_documents_never_scroll() {
        let state = ViewportState::with_pages(vec![500.0], 800.0);

        assert_eq!(max_scroll_offset(&state), 0.0);
        assert_eq!(centered_scroll_offset(&state, 0, 450.0), 0.0);
    }
}
