//! Dual-path search orchestration.
//!
//! With no theme, one search runs on the semantic prompt. With a theme,
//! two searches run concurrently: 70% of the requested count (floored)
//! on the semantic prompt and the remainder on the theme prompt. Either
//! path may fail alone; both failing fails the search. Cancellation drops
//! both in-flight calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pictor_core::defaults::SEMANTIC_SHARE_TENTHS;
use pictor_core::{
    CandidateImage, Error, ImageResolver, PromptAnalysisContext, Result, SearchBackend, Theme,
};

use crate::cancel::cancellable;
use crate::fusion::ResultFuser;

/// Which prompt a search path uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchPath {
    Semantic,
    Theme,
}

impl SearchPath {
    fn as_str(&self) -> &'static str {
        match self {
            SearchPath::Semantic => "semantic",
            SearchPath::Theme => "theme",
        }
    }
}

/// Issues semantic/theme searches and fuses their results.
#[derive(Clone)]
pub struct SearchOrchestrator {
    backend: Arc<dyn SearchBackend>,
    resolver: Arc<dyn ImageResolver>,
    fuser: ResultFuser,
}

impl SearchOrchestrator {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        resolver: Arc<dyn ImageResolver>,
        fuser: ResultFuser,
    ) -> Self {
        Self {
            backend,
            resolver,
            fuser,
        }
    }

    /// Split a requested count into (semantic, theme) shares.
    pub fn split_count(requested: usize) -> (usize, usize) {
        let semantic = requested * SEMANTIC_SHARE_TENTHS / 10;
        (semantic, requested - semantic)
    }

    /// Search for up to `requested` candidates. Ranks are not assigned.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        analysis: &PromptAnalysisContext,
        requested: usize,
        theme: Theme,
    ) -> Result<Vec<CandidateImage>> {
        let start = Instant::now();

        if theme.is_none() {
            let mut results = cancellable(cancel, async {
                self.run_path(SearchPath::Semantic, analysis.semantic_prompt(), requested)
                    .await
                    .map_err(|e| {
                        error!(
                            subsystem = "search",
                            component = "orchestrator",
                            path = "semantic",
                            error = %e,
                            "Search failed"
                        );
                        Error::Search(format!("semantic search failed: {}", e))
                    })
            })
            .await?;
            results.truncate(requested);

            info!(
                subsystem = "search",
                component = "orchestrator",
                op = "search",
                mode = "single",
                result_count = results.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Search complete"
            );
            return Ok(results);
        }

        let (semantic_k, theme_k) = Self::split_count(requested);

        let semantic = self.run_path(SearchPath::Semantic, analysis.semantic_prompt(), semantic_k);
        let themed = self.run_path(SearchPath::Theme, analysis.theme_prompt(), theme_k);

        let (semantic, themed) =
            cancellable(cancel, async { Ok(tokio::join!(semantic, themed)) }).await?;

        let (semantic, themed) = match (semantic, themed) {
            (Ok(s), Ok(t)) => (s, t),
            // With a count of 1 the theme path is the only one issued.
            (Ok(_), Err(e)) if semantic_k == 0 => {
                error!(
                    subsystem = "search",
                    component = "orchestrator",
                    path = "theme",
                    error = %e,
                    "Only search path failed"
                );
                return Err(Error::Search(format!("theme search failed: {}", e)));
            }
            (Ok(s), Err(e)) => {
                warn!(
                    subsystem = "search",
                    component = "orchestrator",
                    path = "theme",
                    error = %e,
                    "Theme search path failed, continuing with semantic results"
                );
                (s, Vec::new())
            }
            (Err(e), Ok(t)) => {
                warn!(
                    subsystem = "search",
                    component = "orchestrator",
                    path = "semantic",
                    error = %e,
                    "Semantic search path failed, continuing with theme results"
                );
                (Vec::new(), t)
            }
            (Err(semantic_err), Err(theme_err)) => {
                error!(
                    subsystem = "search",
                    component = "orchestrator",
                    semantic_error = %semantic_err,
                    theme_error = %theme_err,
                    "Both search paths failed"
                );
                return Err(Error::Search(format!(
                    "both search paths failed: semantic: {}; theme: {}",
                    semantic_err, theme_err
                )));
            }
        };

        let semantic_hits = semantic.len();
        let theme_hits = themed.len();
        let results = self.fuser.fuse(semantic, themed, theme, requested);

        info!(
            subsystem = "search",
            component = "orchestrator",
            op = "search",
            mode = "dual",
            theme = %theme,
            semantic_k,
            theme_k,
            semantic_hits,
            theme_hits,
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(results)
    }

    /// One search call plus path resolution. A zero share issues no call.
    async fn run_path(
        &self,
        path: SearchPath,
        prompt: &str,
        top_k: usize,
    ) -> Result<Vec<CandidateImage>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.backend.search(prompt, top_k).await?;
        let paths: Vec<String> = hits.iter().map(|h| h.image_path.clone()).collect();
        let resolved: HashMap<String, i64> = self.resolver.resolve_paths(&paths).await?;

        let mut dropped = 0usize;
        let candidates: Vec<CandidateImage> = hits
            .into_iter()
            .filter_map(|hit| match resolved.get(&hit.image_path) {
                Some(id) => Some(CandidateImage::from_search(
                    *id,
                    hit.image_path,
                    hit.similarity,
                )),
                None => {
                    dropped += 1;
                    debug!(
                        subsystem = "search",
                        component = "orchestrator",
                        path = path.as_str(),
                        image_path = %hit.image_path,
                        "Search hit has no catalog record, dropping"
                    );
                    None
                }
            })
            .collect();

        if dropped > 0 {
            warn!(
                subsystem = "search",
                component = "orchestrator",
                path = path.as_str(),
                dropped,
                kept = candidates.len(),
                "Dropped unresolved search hits"
            );
        }
        Ok(candidates)
    }
}
