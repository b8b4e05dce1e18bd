// BM25 scoring over a fixed corpus
use crate::distance::tokenize;
use ahash::AHashMap;

pub const DEFAULT_K1: f32 = 1.5;
pub const DEFAULT_B: f32 = 0.75;

#[derive(Debug, Clone)]
pub struct BM25Index {
    // term -> (doc index -> term frequency)
    inverted_index: AHashMap<String, AHashMap<usize, u32>>,
    // doc index -> document length
    doc_lengths: Vec<u32>,
    avg_doc_len: f32,
    k1: f32, // term frequency saturation parameter
    b: f32,  // length normalization parameter
}

impl BM25Index {
    /// Index `corpus` with the default k1/b
    pub fn new<S: AsRef<str>>(corpus: &[S]) -> Self {
        Self::with_params(corpus, DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params<S: AsRef<str>>(corpus: &[S], k1: f32, b: f32) -> Self {
        let mut inverted_index: AHashMap<String, AHashMap<usize, u32>> = AHashMap::new();
        let mut doc_lengths = Vec::with_capacity(corpus.len());

        for (doc, text) in corpus.iter().enumerate() {
            let tokens = tokenize(text.as_ref());
            doc_lengths.push(tokens.len() as u32);
            for token in tokens {
                *inverted_index.entry(token).or_default().entry(doc).or_insert(0) += 1;
            }
        }

        let avg_doc_len = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<u32>() as f32 / doc_lengths.len() as f32
        };

        Self {
            inverted_index,
            doc_lengths,
            avg_doc_len,
            k1,
            b,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    fn idf(&self, df: usize) -> f32 {
        let n = self.len() as f32;
        let df = df as f32;
        // +1 keeps terms present in most documents non-negative
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// One score per corpus document, in corpus order. Empty corpus yields no scores.
    pub fn score_all(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.len()];
        if self.is_empty() {
            return scores;
        }

        for term in tokenize(query) {
            let Some(postings) = self.inverted_index.get(&term) else {
                continue;
            };
            let idf = self.idf(postings.len());
            for (&doc, &tf) in postings {
                scores[doc] += self.term_score(tf, self.doc_lengths[doc], idf);
            }
        }
        scores
    }

    /// Top `limit` (doc index, score) pairs with a positive score, best first
    pub fn search(&self, query: &str, limit: usize) -> Vec<(usize, f32)> {
        let mut results: Vec<(usize, f32)> = self
            .score_all(query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results.truncate(limit);
        results
    }

    fn term_score(&self, tf: u32, doc_len: u32, idf: f32) -> f32 {
        let tf = tf as f32;
        let length_ratio = if self.avg_doc_len > 0.0 {
            doc_len as f32 / self.avg_doc_len
        } else {
            0.0
        };

        // BM25 formula: idf * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * (doc_len / avgdl)))
        let numerator = tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * length_ratio);
        idf * (numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        vec![
            "rust graph database engine",
            "python data analysis toolkit",
            "graph neural networks on graph data",
            "cooking recipes",
        ]
    }

    #[test]
    fn test_empty_corpus() {
        let index = BM25Index::new::<&str>(&[]);
        assert!(index.score_all("graph").is_empty());
        assert!(index.search("graph", 5).is_empty());
    }

    #[test]
    fn test_scores_follow_corpus_order() {
        let index = BM25Index::new(&corpus());
        let scores = index.score_all("graph");
        assert_eq!(scores.len(), 4);
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert!(scores[2] > 0.0);
        assert_eq!(scores[3], 0.0);
    }

    #[test]
    fn test_top_n() {
        let index = BM25Index::new(&corpus());
        let results = index.search("graph data", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 2);
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_custom_params_change_scores() {
        let docs = corpus();
        let default = BM25Index::new(&docs).score_all("graph");
        let flat = BM25Index::with_params(&docs, 1.2, 0.0).score_all("graph");
        assert_ne!(default[2], flat[2]);
    }
}
