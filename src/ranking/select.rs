use std::cmp::Ordering;

/// Descending by score; ties keep the lower gene index first.
#[inline]
fn by_score_desc(scores: &[f64]) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |a: &usize, b: &usize| scores[*b].total_cmp(&scores[*a]).then(a.cmp(b))
}

/// Select the `k` highest scores, returned as `(gene_index, score)` in descending order.
///
/// The bulk of the genes is only partitioned (`select_nth_unstable_by`), after which the
/// `k` winners alone are sorted, so the cost is O(n + k log k). Equal scores are ordered
/// by gene index, which keeps the output identical across runs.
pub fn top_k(scores: &[f64], k: usize) -> Vec<(usize, f64)> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let cmp = by_score_desc(scores);
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, &cmp);
        indices.truncate(k);
    }
    indices.sort_by(&cmp);

    indices.into_iter().map(|i| (i, scores[i])).collect()
}
