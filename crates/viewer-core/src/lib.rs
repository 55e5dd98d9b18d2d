//! Phrase location for a rendered, paginated document
//!
//! Pages are indexed one at a time by a [`SessionLoader`] into a
//! [`PageTextIndex`]. The finished [`DocumentSession`] answers reference
//! lookups through the [`PhraseLocator`], and the [`Viewer`] turns hits into a
//! single highlight scrolled into view on a [`HighlightSurface`].

pub mod cancel;
pub mod highlight;
pub mod index;
pub mod locate;
pub mod session;
pub mod viewer;
pub mod viewport;

pub use cancel::CancellationToken;
pub use highlight::{HighlightController, HighlightSurface, ViewportSurface};
pub use index::{page_search_string, PageTextIndex};
pub use locate::{bounding_rect, resolve_fragment_run, FragmentJoin, LocateMiss, LocatorOptions, PhraseLocator};
pub use session::{DocumentSession, LoadError, LoadOptions, LoadStep, SessionLoader};
pub use viewer::{Activation, Viewer, ViewerError, ViewerStatus};
pub use viewport::{
    centered_scroll_offset, content_height, max_scroll_offset, page_at_viewport_center, page_start_offset,
    ViewportState,
};
