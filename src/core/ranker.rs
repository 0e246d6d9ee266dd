use crate::core::scoring::ScoredItem;

pub const DEFAULT_TOP_K: usize = 5;

/// Keeps the `top_k` best-scoring items.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    top_k: usize,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl Ranker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Highest score first. The sort is stable, so equal scores keep catalog order.
    pub fn rank(&self, mut scored: Vec<ScoredItem>) -> Vec<ScoredItem> {
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.top_k);
        scored
    }
}
