//! Combining ranked hits from the two strategies

use std::collections::HashSet;

use crate::types::PageHit;

/// Keep the first occurrence of every image path
pub fn dedup_by_path(hits: Vec<PageHit>) -> Vec<PageHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.path.clone()))
        .collect()
}

/// Best-of-each union
///
/// Takes the top `depth` hits of each ranking and returns their union,
/// summary hits first. Scores are not compared across strategies since
/// cosine and MaxSim live on different scales.
pub fn best_of_each(summary: Vec<PageHit>, visual: Vec<PageHit>, depth: usize) -> Vec<PageHit> {
    let union = summary
        .into_iter()
        .take(depth)
        .chain(visual.into_iter().take(depth))
        .collect();
    dedup_by_path(union)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RetrievalStrategy;
    use std::path::PathBuf;

    fn hit(page: u32, strategy: RetrievalStrategy) -> PageHit {
        PageHit {
            path: PathBuf::from(format!("/images/report/report_page{}.jpg", page)),
            document_id: "report".to_string(),
            page_number: page,
            score: 1.0 / page as f32,
            strategy,
        }
    }

    #[test]
    fn test_disagreeing_strategies_give_two_pages() {
        let fused = best_of_each(
            vec![
                hit(1, RetrievalStrategy::SummaryEmbedding),
                hit(3, RetrievalStrategy::SummaryEmbedding),
            ],
            vec![
                hit(2, RetrievalStrategy::VisualMultiVector),
                hit(1, RetrievalStrategy::VisualMultiVector),
            ],
            1,
        );
        let pages: Vec<u32> = fused.iter().map(|h| h.page_number).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_agreeing_strategies_give_one_page() {
        let fused = best_of_each(
            vec![hit(1, RetrievalStrategy::SummaryEmbedding)],
            vec![hit(1, RetrievalStrategy::VisualMultiVector)],
            1,
        );
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].strategy, RetrievalStrategy::SummaryEmbedding);
    }

    #[test]
    fn test_deeper_union() {
        let fused = best_of_each(
            vec![
                hit(1, RetrievalStrategy::SummaryEmbedding),
                hit(2, RetrievalStrategy::SummaryEmbedding),
            ],
            vec![
                hit(2, RetrievalStrategy::VisualMultiVector),
                hit(3, RetrievalStrategy::VisualMultiVector),
            ],
            2,
        );
        let pages: Vec<u32> = fused.iter().map(|h| h.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }
}
