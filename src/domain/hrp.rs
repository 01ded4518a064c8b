//! Hierarchical risk parity.
//!
//! Assets are clustered by correlation distance with single linkage, laid out
//! in the dendrogram's leaf order, and weighted by recursive bisection of
//! that order with inverse-variance cluster risk.

use nalgebra::{DMatrix, DVector};

use super::error::AllocatorError;
use super::estimators::{correlation, sample_cov};

/// `sqrt((1 - ρ) / 2)`, clipped to `[0, 1]`.
pub fn correlation_distance(corr: &DMatrix<f64>) -> DMatrix<f64> {
    corr.map(|rho| ((1.0 - rho) / 2.0).clamp(0.0, 1.0).sqrt())
}

/// Leaf order of the single-linkage dendrogram over `dist`.
///
/// Clusters are numbered like a linkage matrix: leaves `0..n`, the cluster
/// formed at merge `k` is `n + k`. Each merge puts the lower-numbered cluster
/// on the left; leaves are read out left to right.
pub fn single_linkage_order(dist: &DMatrix<f64>) -> Vec<usize> {
    let n = dist.nrows();
    if n <= 1 {
        return (0..n).collect();
    }

    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut children: Vec<(usize, usize)> = Vec::with_capacity(n - 1);
    let mut active: Vec<usize> = (0..n).collect();

    let linkage = |a: &[usize], b: &[usize]| {
        a.iter()
            .flat_map(|&i| b.iter().map(move |&j| dist[(i, j)]))
            .fold(f64::INFINITY, f64::min)
    };

    while active.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for x in 0..active.len() {
            for y in (x + 1)..active.len() {
                let d = linkage(&members[active[x]], &members[active[y]]);
                if d < best.2 {
                    best = (x, y, d);
                }
            }
        }
        let (x, y, _) = best;
        let (left, right) = (active[x].min(active[y]), active[x].max(active[y]));

        let mut merged = members[left].clone();
        merged.extend_from_slice(&members[right]);
        members.push(merged);
        children.push((left, right));

        let new_id = n + children.len() - 1;
        active.retain(|&c| c != left && c != right);
        active.push(new_id);
    }

    let mut order = Vec::with_capacity(n);
    let mut stack = vec![active[0]];
    while let Some(node) = stack.pop() {
        if node < n {
            order.push(node);
        } else {
            let (left, right) = children[node - n];
            stack.push(right);
            stack.push(left);
        }
    }
    order
}

/// Variance of a cluster held in inverse-variance proportions.
fn cluster_variance(cov: &DMatrix<f64>, items: &[usize]) -> f64 {
    let inv: Vec<f64> = items
        .iter()
        .map(|&i| 1.0 / cov[(i, i)].max(f64::MIN_POSITIVE))
        .collect();
    let total: f64 = inv.iter().sum();
    let mut variance = 0.0;
    for (a, &i) in items.iter().enumerate() {
        for (b, &j) in items.iter().enumerate() {
            variance += inv[a] / total * cov[(i, j)] * inv[b] / total;
        }
    }
    variance
}

/// Recursive bisection of `order`, splitting weight by inverse cluster variance.
pub fn recursive_bisection(cov: &DMatrix<f64>, order: &[usize]) -> DVector<f64> {
    let mut weights = DVector::from_element(cov.nrows(), 1.0);
    let mut clusters: Vec<&[usize]> = vec![order];

    while !clusters.is_empty() {
        let mut next = Vec::new();
        for cluster in clusters {
            if cluster.len() <= 1 {
                continue;
            }
            let (first, second) = cluster.split_at(cluster.len() / 2);
            let v1 = cluster_variance(cov, first);
            let v2 = cluster_variance(cov, second);
            let alpha = if v1 + v2 > 0.0 { 1.0 - v1 / (v1 + v2) } else { 0.5 };
            for &i in first {
                weights[i] *= alpha;
            }
            for &i in second {
                weights[i] *= 1.0 - alpha;
            }
            next.push(first);
            next.push(second);
        }
        clusters = next;
    }
    weights
}

/// HRP weights from a `T x N` daily returns matrix.
pub fn hrp_weights(returns: &DMatrix<f64>) -> Result<DVector<f64>, AllocatorError> {
    if returns.ncols() == 0 {
        return Err(AllocatorError::invalid_request("HRP needs at least one asset"));
    }
    let cov = sample_cov(returns);
    let dist = correlation_distance(&correlation(returns));
    let order = single_linkage_order(&dist);
    Ok(recursive_bisection(&cov, &order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn distance_of_perfect_correlation_is_zero() {
        let corr = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
        let d = correlation_distance(&corr);
        assert_abs_diff_eq!(d[(0, 0)], 0.0);
        assert_abs_diff_eq!(d[(0, 1)], 1.0);
    }

    #[test]
    fn linkage_groups_close_pairs() {
        // 0~2 and 1~3 are tight pairs
        let dist = DMatrix::from_row_slice(
            4,
            4,
            &[
                0.0, 0.9, 0.1, 0.8, //
                0.9, 0.0, 0.85, 0.2, //
                0.1, 0.85, 0.0, 0.7, //
                0.8, 0.2, 0.7, 0.0,
            ],
        );
        let order = single_linkage_order(&dist);
        assert_eq!(order.len(), 4);
        let pos = |x: usize| order.iter().position(|&o| o == x).unwrap();
        assert_eq!((pos(0) as i32 - pos(2) as i32).abs(), 1);
        assert_eq!((pos(1) as i32 - pos(3) as i32).abs(), 1);
    }

    #[test]
    fn two_assets_get_inverse_variance_split() {
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.01]);
        let w = recursive_bisection(&cov, &[0, 1]);
        assert_abs_diff_eq!(w[0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn weights_are_long_only_and_sum_to_one() {
        let returns = DMatrix::from_fn(60, 5, |t, j| {
            let phase = (t as f64 * (0.3 + 0.1 * j as f64)).sin();
            0.01 * phase * (1.0 + j as f64 * 0.5) + 0.0005
        });
        let w = hrp_weights(&returns).unwrap();
        assert!(w.iter().all(|x| *x > 0.0));
        assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn single_asset_takes_everything() {
        let returns = DMatrix::from_row_slice(3, 1, &[0.01, -0.01, 0.02]);
        let w = hrp_weights(&returns).unwrap();
        assert_abs_diff_eq!(w[0], 1.0);
    }
}
