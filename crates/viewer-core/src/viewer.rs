//! Shell-facing viewer state machine
//!
//! The shell owns one [`Viewer`], drives document loads through it and
//! forwards reference activations (clicks) to it. Activations are rejected
//! until the document is fully indexed.

use crate::highlight::{HighlightController, HighlightSurface};
use crate::locate::LocateMiss;
use crate::session::{DocumentSession, LoadError, LoadOptions, LoadStep, SessionLoader};
use doc_model::{Highlight, MatchResult, PhraseConfig, ReferenceId};
use pdf_engine::{OpenSource, PdfEngine};
use std::mem;
use std::sync::Arc;

#[derive(Debug, Default)]
pub enum ViewerStatus {
    #[default]
    Empty,
    Loading(SessionLoader),
    Ready(DocumentSession),
    Failed(LoadError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("document is still loading ({indexed} of {page_count} pages indexed)")]
    LoadInProgress { indexed: u32, page_count: u32 },
    #[error("document failed to load: {0}")]
    LoadFailed(String),
}

/// Outcome of activating a reference on a ready document.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Highlighted(MatchResult),
    NotFound { message: String, variations: Vec<String> },
    UnknownReference(ReferenceId),
}

#[derive(Debug)]
pub struct Viewer<S> {
    status: ViewerStatus,
    highlight: HighlightController<S>,
    options: LoadOptions,
}

impl<S: HighlightSurface> Viewer<S> {
    pub fn new(surface: S, options: LoadOptions) -> Self {
        Self { status: ViewerStatus::Empty, highlight: HighlightController::new(surface), options }
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn session(&self) -> Option<&DocumentSession> {
        match &self.status {
            ViewerStatus::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Starts loading a new document, discarding the current one and its
    /// highlight. A load already in progress is aborted first.
    pub fn begin_load<E: PdfEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        source: OpenSource,
        config: Arc<PhraseConfig>,
    ) -> Result<(), ViewerError> {
        self.abort(engine);
        self.highlight.clear_highlight();

        match SessionLoader::begin(engine, source, config, self.options.clone()) {
            Ok(loader) => {
                self.status = ViewerStatus::Loading(loader);
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Indexes one more page. Returns `true` once the document is ready.
    pub fn pump<E: PdfEngine + ?Sized>(&mut self, engine: &mut E) -> Result<bool, ViewerError> {
        match mem::take(&mut self.status) {
            ViewerStatus::Loading(loader) => match loader.step(engine) {
                Ok(LoadStep::Pending(loader)) => {
                    self.status = ViewerStatus::Loading(loader);
                    Ok(false)
                }
                Ok(LoadStep::Ready(session)) => {
                    self.highlight.surface_mut().set_page_heights(session.page_heights());
                    self.status = ViewerStatus::Ready(session);
                    Ok(true)
                }
                Err(error) => Err(self.fail(error)),
            },
            ViewerStatus::Ready(session) => {
                self.status = ViewerStatus::Ready(session);
                Ok(true)
            }
            ViewerStatus::Failed(error) => {
                let message = error.to_string();
                self.status = ViewerStatus::Failed(error);
                Err(ViewerError::LoadFailed(message))
            }
            ViewerStatus::Empty => Err(ViewerError::NoDocument),
        }
    }

    pub fn load_to_end<E: PdfEngine + ?Sized>(&mut self, engine: &mut E) -> Result<(), ViewerError> {
        while !self.pump(engine)? {}
        Ok(())
    }

    /// Cancels a load in progress and returns to empty. Other states are
    /// left alone.
    pub fn abort<E: PdfEngine + ?Sized>(&mut self, engine: &mut E) {
        match mem::take(&mut self.status) {
            ViewerStatus::Loading(loader) => loader.abort(engine),
            other => self.status = other,
        }
    }

    pub fn activate_reference(&mut self, reference: &ReferenceId) -> Result<Activation, ViewerError> {
        let session = match &self.status {
            ViewerStatus::Ready(session) => session,
            ViewerStatus::Loading(loader) => {
                return Err(ViewerError::LoadInProgress {
                    indexed: loader.pages_indexed(),
                    page_count: loader.page_count(),
                })
            }
            ViewerStatus::Failed(error) => return Err(ViewerError::LoadFailed(error.to_string())),
            ViewerStatus::Empty => return Err(ViewerError::NoDocument),
        };

        let miss = match session.locate(reference) {
            Ok(found) => {
                self.highlight.set_highlight(found.page, found.rect);
                return Ok(Activation::Highlighted(found));
            }
            Err(miss) => miss,
        };

        tracing::info!(%reference, "{miss}");
        let message = miss.to_string();
        Ok(match miss {
            LocateMiss::PhraseNotFound { variations, .. } => Activation::NotFound { message, variations },
            LocateMiss::ReferenceNotConfigured(reference) => Activation::UnknownReference(reference),
        })
    }

    pub fn clear_highlight(&mut self) {
        self.highlight.clear_highlight();
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.active()
    }

    pub fn surface(&self) -> &S {
        self.highlight.surface()
    }

    fn fail(&mut self, error: LoadError) -> ViewerError {
        tracing::warn!(%error, "document load failed");
        let message = error.to_string();
        self.status = ViewerStatus::Failed(error);
        ViewerError::LoadFailed(message)
    }
}
