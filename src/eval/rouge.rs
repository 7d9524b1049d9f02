// ============================================================
// ROUGE Scorer
// ============================================================
// F-measures for ROUGE-1, ROUGE-2, ROUGE-L and ROUGE-Lsum.
//
// Tokenisation lowercases, turns every non-alphanumeric character
// into a space, and (with stemming) stems tokens longer than three
// characters. ROUGE-Lsum treats newlines as sentence boundaries
// and scores the summary-level union LCS.

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

/// Per-example ROUGE F-measures, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RougeScores {
    pub rouge1:    f64,
    pub rouge2:    f64,
    pub rouge_l:   f64,
    pub rouge_lsum: f64,
}

pub struct RougeScorer {
    stemmer: Option<Stemmer>,
}

impl RougeScorer {
    pub fn new(use_stemmer: bool) -> Self {
        Self {
            stemmer: use_stemmer.then(|| Stemmer::create(Algorithm::English)),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalised: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
            .collect();

        normalised
            .split_whitespace()
            .map(|tok| match &self.stemmer {
                Some(stemmer) if tok.len() > 3 => stemmer.stem(tok).into_owned(),
                _ => tok.to_string(),
            })
            .collect()
    }

    pub fn score(&self, reference: &str, prediction: &str) -> RougeScores {
        let ref_tokens  = self.tokenize(reference);
        let pred_tokens = self.tokenize(prediction);

        let ref_sents: Vec<Vec<String>> = split_sentences(reference)
            .map(|s| self.tokenize(s))
            .filter(|t| !t.is_empty())
            .collect();
        let pred_sents: Vec<Vec<String>> = split_sentences(prediction)
            .map(|s| self.tokenize(s))
            .filter(|t| !t.is_empty())
            .collect();

        RougeScores {
            rouge1:     ngram_f(&ref_tokens, &pred_tokens, 1),
            rouge2:     ngram_f(&ref_tokens, &pred_tokens, 2),
            rouge_l:    lcs_f(&ref_tokens, &pred_tokens),
            rouge_lsum: summary_lcs_f(&ref_sents, &pred_sents),
        }
    }

    /// Mean scores over aligned reference/prediction pairs.
    pub fn score_corpus(&self, references: &[String], predictions: &[String]) -> RougeScores {
        let n = references.len().min(predictions.len());
        if n == 0 {
            return RougeScores::default();
        }
        let mut total = RougeScores::default();
        for (r, p) in references.iter().zip(predictions) {
            let s = self.score(r, p);
            total.rouge1     += s.rouge1;
            total.rouge2     += s.rouge2;
            total.rouge_l    += s.rouge_l;
            total.rouge_lsum += s.rouge_lsum;
        }
        let n = n as f64;
        RougeScores {
            rouge1:     total.rouge1 / n,
            rouge2:     total.rouge2 / n,
            rouge_l:    total.rouge_l / n,
            rouge_lsum: total.rouge_lsum / n,
        }
    }
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|s| !s.trim().is_empty())
}

fn f_measure(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

fn ngrams(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for w in tokens.windows(n) {
            *counts.entry(w).or_insert(0) += 1;
        }
    }
    counts
}

fn ngram_f(reference: &[String], prediction: &[String], n: usize) -> f64 {
    let ref_ngrams  = ngrams(reference, n);
    let pred_ngrams = ngrams(prediction, n);

    let overlap: usize = pred_ngrams
        .iter()
        .map(|(g, &c)| c.min(ref_ngrams.get(g).copied().unwrap_or(0)))
        .sum();
    let ref_total: usize  = ref_ngrams.values().sum();
    let pred_total: usize = pred_ngrams.values().sum();

    if ref_total == 0 || pred_total == 0 {
        return 0.0;
    }
    f_measure(overlap as f64 / pred_total as f64, overlap as f64 / ref_total as f64)
}

fn lcs_table(a: &[String], b: &[String]) -> Vec<Vec<usize>> {
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    dp
}

fn lcs_f(reference: &[String], prediction: &[String]) -> f64 {
    if reference.is_empty() || prediction.is_empty() {
        return 0.0;
    }
    let lcs = lcs_table(reference, prediction)[reference.len()][prediction.len()] as f64;
    f_measure(lcs / prediction.len() as f64, lcs / reference.len() as f64)
}

/// Indices into `reference` of one longest common subsequence with `candidate`.
fn lcs_indices(reference: &[String], candidate: &[String]) -> Vec<usize> {
    let dp = lcs_table(reference, candidate);
    let (mut i, mut j) = (reference.len(), candidate.len());
    let mut out = Vec::new();
    while i > 0 && j > 0 {
        if reference[i - 1] == candidate[j - 1] {
            out.push(i - 1);
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    out.reverse();
    out
}

/// Summary-level LCS: for each reference sentence, take the union of its
/// LCS with every predicted sentence; hits are clipped by token counts.
fn summary_lcs_f(reference: &[Vec<String>], prediction: &[Vec<String>]) -> f64 {
    let m: usize = reference.iter().map(Vec::len).sum();
    let n: usize = prediction.iter().map(Vec::len).sum();
    if m == 0 || n == 0 {
        return 0.0;
    }

    let mut ref_counts: HashMap<&str, usize> = HashMap::new();
    for t in reference.iter().flatten() {
        *ref_counts.entry(t.as_str()).or_insert(0) += 1;
    }
    let mut pred_counts: HashMap<&str, usize> = HashMap::new();
    for t in prediction.iter().flatten() {
        *pred_counts.entry(t.as_str()).or_insert(0) += 1;
    }

    let mut hits = 0usize;
    for ref_sent in reference {
        let mut union: Vec<usize> = prediction
            .iter()
            .flat_map(|cand| lcs_indices(ref_sent, cand))
            .collect();
        union.sort_unstable();
        union.dedup();

        for idx in union {
            let tok = ref_sent[idx].as_str();
            let (Some(r), Some(p)) = (ref_counts.get_mut(tok), pred_counts.get_mut(tok)) else {
                continue;
            };
            if *r > 0 && *p > 0 {
                hits += 1;
                *r -= 1;
                *p -= 1;
            }
        }
    }

    f_measure(hits as f64 / n as f64, hits as f64 / m as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_texts_score_one() {
        let s = RougeScorer::new(true).score("the patient was discharged", "the patient was discharged");
        assert!(approx(s.rouge1, 1.0));
        assert!(approx(s.rouge2, 1.0));
        assert!(approx(s.rouge_l, 1.0));
        assert!(approx(s.rouge_lsum, 1.0));
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        let s = RougeScorer::new(false).score("fever and cough", "normal chest film");
        assert_eq!(s, RougeScores::default());
    }

    #[test]
    fn test_partial_unigram_overlap() {
        // ref: a b c d, pred: a b e → overlap 2, P = 2/3, R = 2/4
        let s = RougeScorer::new(false).score("a b c d", "a b e");
        assert!(approx(s.rouge1, 2.0 * (2.0 / 3.0) * 0.5 / (2.0 / 3.0 + 0.5)));
        // bigrams: ref {ab, bc, cd}, pred {ab, be} → overlap 1, P = 1/2, R = 1/3
        assert!(approx(s.rouge2, 2.0 * 0.5 * (1.0 / 3.0) / (0.5 + 1.0 / 3.0)));
    }

    #[test]
    fn test_lcs_respects_order() {
        // LCS of "a b c d" and "d c b a" is 1
        let s = RougeScorer::new(false).score("a b c d", "d c b a");
        assert!(approx(s.rouge1, 1.0));
        assert!(approx(s.rouge_l, 0.25));
    }

    #[test]
    fn test_stemming_matches_inflections() {
        let plain   = RougeScorer::new(false).score("patients reported headaches", "patient reports headache");
        let stemmed = RougeScorer::new(true).score("patients reported headaches", "patient reports headache");
        assert!(stemmed.rouge1 > plain.rouge1);
        assert!(approx(stemmed.rouge1, 1.0));
    }

    #[test]
    fn test_tokenizer_drops_punctuation_and_case() {
        let toks = RougeScorer::new(false).tokenize("BP: 120/80, HR-72.");
        assert_eq!(toks, vec!["bp", "120", "80", "hr", "72"]);
    }

    #[test]
    fn test_lsum_uses_sentence_union() {
        // Sentence order swapped: plain LCS loses one sentence, summary LCS does not.
        let reference  = "a b\nc d";
        let prediction = "c d\na b";
        let s = RougeScorer::new(false).score(reference, prediction);
        assert!(approx(s.rouge_lsum, 1.0));
        assert!(s.rouge_l < 1.0);
    }

    #[test]
    fn test_corpus_is_mean_of_examples() {
        let scorer = RougeScorer::new(false);
        let refs   = vec!["a b".to_string(), "c d".to_string()];
        let preds  = vec!["a b".to_string(), "x y".to_string()];
        let s = scorer.score_corpus(&refs, &preds);
        assert!(approx(s.rouge1, 0.5));
        assert_eq!(scorer.score_corpus(&[], &[]), RougeScores::default());
    }
}
