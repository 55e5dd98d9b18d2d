use crate::viewport::{centered_scroll_offset, page_at_viewport_center, ViewportState};
use doc_model::{BoundingRect, Highlight, PageNumber};

/// Presentation layer the highlight is drawn on.
pub trait HighlightSurface {
    fn draw_highlight(&mut self, highlight: &Highlight);
    fn remove_highlight(&mut self);
    fn scroll_to_center(&mut self, highlight: &Highlight);

    /// Called once a document is indexed, with every page height in viewport
    /// space.
    fn set_page_heights(&mut self, _page_heights: &[f32]) {}
}

/// Single-slot highlight state.
#[derive(Debug)]
pub struct HighlightController<S> {
    surface: S,
    active: Option<Highlight>,
}

impl<S: HighlightSurface> HighlightController<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, active: None }
    }

    /// Replaces any active highlight and scrolls the new one into view.
    pub fn set_highlight(&mut self, page_number: PageNumber, rect: BoundingRect) {
        if self.active.take().is_some() {
            self.surface.remove_highlight();
        }

        let highlight = Highlight { page_number, rect };
        self.surface.draw_highlight(&highlight);
        self.surface.scroll_to_center(&highlight);
        self.active = Some(highlight);
    }

    pub fn clear_highlight(&mut self) {
        self.active = None;
        self.surface.remove_highlight();
    }

    pub fn active(&self) -> Option<&Highlight> {
        self.active.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

/// Surface backed by a continuous-scroll viewport.
///
/// Highlight rectangles are in page-viewport space, which must be the same
/// scale the page heights of `viewport` were measured at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportSurface {
    pub viewport: ViewportState,
    drawn: Option<Highlight>,
}

impl ViewportSurface {
    pub fn new(viewport: ViewportState) -> Self {
        Self { viewport, drawn: None }
    }

    pub fn drawn(&self) -> Option<&Highlight> {
        self.drawn.as_ref()
    }

    pub fn scroll_offset(&self) -> f32 {
        self.viewport.scroll_offset_px
    }

    /// Page the viewport is centred on after the last scroll.
    pub fn centered_page(&self) -> Option<PageNumber> {
        page_at_viewport_center(&self.viewport)
    }
}

impl HighlightSurface for ViewportSurface {
    fn draw_highlight(&mut self, highlight: &Highlight) {
        self.drawn = Some(*highlight);
    }

    fn remove_highlight(&mut self) {
        self.drawn = None;
    }

    fn scroll_to_center(&mut self, highlight: &Highlight) {
        let page_index = highlight.page_number.saturating_sub(1);
        self.viewport.scroll_offset_px =
            centered_scroll_offset(&self.viewport, page_index, highlight.rect.center().y);
    }

    fn set_page_heights(&mut self, page_heights: &[f32]) {
        self.viewport.page_heights_px = page_heights.to_vec();
        self.viewport.scroll_offset_px = 0.0;
    }
}
