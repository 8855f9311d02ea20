//! Result fusion for dual-path search.
//!
//! Semantic results come first, theme results are appended unless their
//! storage path was already seen. Each survivor is re-scored as
//! `0.7 * similarity + 0.3 * theme_relevance` and the list is stably sorted
//! by the new score, so equal scores keep input order.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use pictor_core::defaults::{FUSION_SIMILARITY_WEIGHT, FUSION_THEME_WEIGHT};
use pictor_core::{CandidateImage, Theme};

use crate::relevance::{KeywordThemeRelevance, ThemeRelevance};

/// Deduplicates and re-scores candidates from the two search paths.
#[derive(Clone)]
pub struct ResultFuser {
    relevance: Arc<dyn ThemeRelevance>,
}

impl Default for ResultFuser {
    fn default() -> Self {
        Self::new(Arc::new(KeywordThemeRelevance))
    }
}

impl ResultFuser {
    pub fn new(relevance: Arc<dyn ThemeRelevance>) -> Self {
        Self { relevance }
    }

    /// Fuse the two result lists and keep the best `limit`.
    ///
    /// Pure: the output depends only on the inputs and the relevance scorer.
    /// Ranks are left untouched.
    pub fn fuse(
        &self,
        semantic: Vec<CandidateImage>,
        themed: Vec<CandidateImage>,
        theme: Theme,
        limit: usize,
    ) -> Vec<CandidateImage> {
        let input_count = semantic.len() + themed.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(input_count);

        let mut fused: Vec<CandidateImage> = semantic
            .into_iter()
            .chain(themed)
            .filter(|c| seen.insert(c.path.clone()))
            .map(|mut c| {
                let relevance = self.relevance.score(&c.path, theme).clamp(0.0, 1.0);
                c.similarity = (FUSION_SIMILARITY_WEIGHT * c.similarity
                    + FUSION_THEME_WEIGHT * relevance)
                    .clamp(0.0, 1.0);
                c
            })
            .collect();

        let deduped = fused.len();

        // sort_by is stable
        fused.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        fused.truncate(limit);

        debug!(
            subsystem = "search",
            component = "fuser",
            theme = %theme,
            input_count,
            duplicates = input_count - deduped,
            result_count = fused.len(),
            "Result fusion complete"
        );

        fused
    }
}
