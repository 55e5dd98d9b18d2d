//! Document sessions and the page-by-page loader that builds them
//!
//! A [`SessionLoader`] owns the open document handle and the partially built
//! index. It only hands out a [`DocumentSession`] once every page has been
//! indexed; any failure or cancellation consumes the loader, so queries never
//! see a partial index.

use crate::cancel::CancellationToken;
use crate::index::PageTextIndex;
use crate::locate::{LocateMiss, LocatorOptions, PhraseLocator};
use doc_model::{ConfigError, MatchResult, PageNumber, PhraseConfig, ReferenceId};
use pdf_engine::{page_layout, AverageAdvance, DocumentHandle, OpenSource, PdfEngine, PdfEngineError};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Viewport scale fragments are measured at.
    pub scale: f32,
    pub measure: AverageAdvance,
    pub locator: LocatorOptions,
    /// References the shell renders; all must be configured.
    pub required_references: Vec<ReferenceId>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            measure: AverageAdvance::default(),
            locator: LocatorOptions::default(),
            required_references: Vec::new(),
        }
    }
}

impl LoadOptions {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_locator(mut self, locator: LocatorOptions) -> Self {
        self.locator = locator;
        self
    }

    pub fn require<I, R>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ReferenceId>,
    {
        self.required_references.extend(references.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open document: {0}")]
    Open(#[source] PdfEngineError),
    #[error("failed to extract text from page {page}: {source}")]
    Page { page: PageNumber, source: PdfEngineError },
    #[error("document load was cancelled")]
    Cancelled,
    #[error("invalid phrase configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Indexed document plus the configuration used to query it.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    index: PageTextIndex,
    config: Arc<PhraseConfig>,
    options: LocatorOptions,
    page_count: u32,
    page_heights: Vec<f32>,
}

impl DocumentSession {
    /// Session over an index built elsewhere. It carries no page heights.
    pub fn from_index(index: PageTextIndex, config: Arc<PhraseConfig>, options: LocatorOptions) -> Self {
        let page_count = index.page_count() as u32;
        Self { index, config, options, page_count, page_heights: Vec::new() }
    }

    pub fn locate(&self, reference: &ReferenceId) -> Result<MatchResult, LocateMiss> {
        PhraseLocator::new(&self.index, &self.config, self.options).locate(reference)
    }

    pub fn index(&self) -> &PageTextIndex {
        &self.index
    }

    pub fn config(&self) -> &PhraseConfig {
        &self.config
    }

    pub fn locator_options(&self) -> LocatorOptions {
        self.options
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Page heights in viewport space at the load scale, in page order.
    pub fn page_heights(&self) -> &[f32] {
        &self.page_heights
    }
}

#[derive(Debug)]
pub enum LoadStep {
    Pending(SessionLoader),
    Ready(DocumentSession),
}

#[derive(Debug)]
pub struct SessionLoader {
    handle: DocumentHandle,
    page_count: u32,
    next_page: PageNumber,
    index: PageTextIndex,
    page_heights: Vec<f32>,
    config: Arc<PhraseConfig>,
    options: LoadOptions,
    cancel: CancellationToken,
}

impl SessionLoader {
    /// Validates the configuration and opens the document. No page is
    /// extracted yet.
    pub fn begin<E: PdfEngine + ?Sized>(
        engine: &mut E,
        source: OpenSource,
        config: Arc<PhraseConfig>,
        options: LoadOptions,
    ) -> Result<Self, LoadError> {
        config.validate()?;
        config.require(&options.required_references)?;

        let handle = engine.open(source).map_err(LoadError::Open)?;
        let page_count = match engine.page_count(handle) {
            Ok(page_count) => page_count,
            Err(error) => {
                close_handle(engine, handle);
                return Err(LoadError::Open(error));
            }
        };
        tracing::debug!(handle = handle.raw(), page_count, "document opened");

        Ok(Self {
            handle,
            page_count,
            next_page: 1,
            index: PageTextIndex::new(),
            page_heights: Vec::with_capacity(page_count as usize),
            config,
            options,
            cancel: CancellationToken::new(),
        })
    }

    /// Extracts and indexes the next page. Returns the finished session once
    /// the last page is in the index.
    pub fn step<E: PdfEngine + ?Sized>(mut self, engine: &mut E) -> Result<LoadStep, LoadError> {
        if self.cancel.is_cancelled() {
            tracing::debug!(pages_indexed = self.pages_indexed(), "document load cancelled");
            close_handle(engine, self.handle);
            return Err(LoadError::Cancelled);
        }

        if self.next_page <= self.page_count {
            let page = self.next_page;
            let layout = match page_layout(
                &*engine,
                self.handle,
                page,
                self.options.scale,
                &self.options.measure,
            ) {
                Ok(layout) => layout,
                Err(source) => {
                    tracing::warn!(page, error = %source, "page extraction failed, load aborted");
                    close_handle(engine, self.handle);
                    return Err(LoadError::Page { page, source });
                }
            };

            tracing::debug!(page, fragments = layout.fragments.len(), "page indexed");
            self.page_heights.push(layout.viewport.height);
            self.index.index(page, layout.fragments);
            self.next_page += 1;
        }

        if self.next_page <= self.page_count {
            return Ok(LoadStep::Pending(self));
        }

        close_handle(engine, self.handle);
        tracing::info!(
            pages = self.page_count,
            fragments = self.index.fragment_count(),
            "document indexed"
        );
        Ok(LoadStep::Ready(DocumentSession {
            index: self.index,
            config: self.config,
            options: self.options.locator,
            page_count: self.page_count,
            page_heights: self.page_heights,
        }))
    }

    /// Steps until the session is ready.
    pub fn run_to_end<E: PdfEngine + ?Sized>(self, engine: &mut E) -> Result<DocumentSession, LoadError> {
        let mut loader = self;
        loop {
            match loader.step(engine)? {
                LoadStep::Pending(next) => loader = next,
                LoadStep::Ready(session) => return Ok(session),
            }
        }
    }

    /// Drops the partial index and closes the document.
    pub fn abort<E: PdfEngine + ?Sized>(self, engine: &mut E) {
        tracing::debug!(pages_indexed = self.pages_indexed(), "document load aborted");
        close_handle(engine, self.handle);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn pages_indexed(&self) -> u32 {
        self.next_page - 1
    }
}

fn close_handle<E: PdfEngine + ?Sized>(engine: &mut E, handle: DocumentHandle) {
    if let Err(error) = engine.close(handle) {
        tracing::warn!(handle = handle.raw(), %error, "failed to close document");
    }
}
