//! Text similarity functions
//!
//! All similarity functions return a score in [0.0, 1.0] where 1.0 means identical.

use ahash::{AHashMap, AHashSet};

/// Lowercase and split on whitespace and punctuation
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Jaccard index over case-normalized token sets
///
/// Two empty texts are identical (1.0); empty against non-empty is 0.0.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let tokens_a: AHashSet<String> = tokenize(a).into_iter().collect();
    let tokens_b: AHashSet<String> = tokenize(b).into_iter().collect();

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f32 / union as f32
}

fn term_frequencies(text: &str) -> AHashMap<String, f32> {
    let mut tf = AHashMap::new();
    for token in tokenize(text) {
        *tf.entry(token).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine similarity between term-frequency vectors of two texts
pub fn term_cosine_similarity(a: &str, b: &str) -> f32 {
    let tf_a = term_frequencies(a);
    let tf_b = term_frequencies(b);
    if tf_a.is_empty() || tf_b.is_empty() {
        return 0.0;
    }

    let dot: f32 = tf_a
        .iter()
        .filter_map(|(term, wa)| tf_b.get(term).map(|wb| wa * wb))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }

    let norm_a = tf_a.values().map(|w| w * w).sum::<f32>().sqrt();
    let norm_b = tf_b.values().map(|w| w * w).sum::<f32>().sqrt();
    (dot / (norm_a * norm_b)).min(1.0)
}

/// Levenshtein edit distance over Unicode scalar values
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row dynamic programming table
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 1 - distance / max(len), case-insensitive
pub fn levenshtein_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(&a, &b) as f32 / max_len as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, World! a"), vec!["hello", "world", "a"]);
        assert!(tokenize("  ,, ").is_empty());
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard_similarity("", ""), 1.0);
        assert_eq!(jaccard_similarity("", "graph"), 0.0);
        assert_eq!(jaccard_similarity("Graph Search", "graph search"), 1.0);
        let sim = jaccard_similarity("knowledge graph", "graph database");
        assert!((sim - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_term_cosine() {
        assert!((term_cosine_similarity("rust graph engine", "rust graph engine") - 1.0).abs() < 1e-6);
        assert_eq!(term_cosine_similarity("apples oranges", "graph database"), 0.0);
        assert_eq!(term_cosine_similarity("", "graph"), 0.0);
        let partial = term_cosine_similarity("graph graph search", "graph");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert_eq!(levenshtein_similarity("", ""), 1.0);
        assert_eq!(levenshtein_similarity("IBM", "ibm"), 1.0);
        let sim = levenshtein_similarity("kitten", "sitting");
        assert!((sim - (1.0 - 3.0 / 7.0)).abs() < 1e-6);
    }
}
