use ndarray::{ArrayView1, ArrayView2};
use num_traits::Float;
use std::{cmp::Ordering, fmt::Display};

/// Tolerance used when checking that a probability row sums to one.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Assert two float values are the same up to `eps`.
#[allow(dead_code)]
pub fn assert_float_eq<T>(left: T, right: T, eps: T)
where
    T: Float + Display,
{
    if left.is_nan() {
        assert!(right.is_nan(), "left is NaN, but right is not");
    } else {
        let diff = (left - right).abs();
        assert!(
            diff < eps,
            "values |{} - {}| ≥ {} (diff: {})",
            left,
            right,
            eps,
            diff
        );
    }
}

/// Assert two float slices are elementwise the same up to `eps`.
#[allow(dead_code)]
pub fn assert_floats_eq<T>(left: &[T], right: &[T], eps: T)
where
    T: Float + Display,
{
    assert_eq!(left.len(), right.len());
    for (l, r) in left.iter().zip(right.iter()) {
        assert_float_eq(*l, *r, eps)
    }
}

/// Where a query value falls relative to a sorted slice.
#[derive(Debug, PartialEq)]
pub enum SearchResult {
    /// The value is present at this index.
    Exact(usize),
    /// The value is smaller than every element.
    LowerBound,
    /// The value is larger than every element.
    UpperBound,
    /// The value lies strictly between elements `idx - 1` and `idx`.
    LeftOf(usize),
}

/// Binary search of `vec` (sorted, no duplicates) for `new_val`.
pub fn search_sorted<T: Ord>(vec: &[T], new_val: &T) -> SearchResult {
    let mut left = 0;
    let mut right = vec.len();
    while left < right {
        let mid = left + (right - left) / 2;
        match vec[mid].cmp(new_val) {
            Ordering::Less => left = mid + 1,
            Ordering::Greater => right = mid,
            Ordering::Equal => return SearchResult::Exact(mid),
        }
    }

    if left == 0 {
        SearchResult::LowerBound
    } else if left < vec.len() {
        SearchResult::LeftOf(left)
    } else {
        SearchResult::UpperBound
    }
}

/// Linear interpolation of `y` at `x0`, clamped to the end values outside
/// the range of `x`.
///
/// Returns `None` only when `x` is empty or `x` and `y` differ in length.
pub fn interp1d_clamped(x: &[u64], y: &[f64], x0: u64) -> Option<f64> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    match search_sorted(x, &x0) {
        SearchResult::Exact(idx) => Some(y[idx]),
        SearchResult::LowerBound => y.first().copied(),
        SearchResult::UpperBound => y.last().copied(),
        SearchResult::LeftOf(idx) => {
            let (x1, x2) = (x[idx - 1] as f64, x[idx] as f64);
            let (y1, y2) = (y[idx - 1], y[idx]);
            Some(y1 + (y2 - y1) / (x2 - x1) * (x0 as f64 - x1))
        }
    }
}

/// Scale `values` in place so they sum to one, returning the original sum.
///
/// Returns `None` (leaving `values` untouched) if the sum is zero or not finite.
pub fn normalize_in_place(values: &mut [f64]) -> Option<f64> {
    let total: f64 = values.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    for v in values.iter_mut() {
        *v /= total;
    }
    Some(total)
}

/// Index of the largest value, with ties going to the lowest index.
pub fn argmax(values: ArrayView1<f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((idx, v));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index of the first row of `matrix` that is not a probability distribution,
/// i.e. has a negative or non-finite entry or does not sum to one within `tol`.
pub fn first_invalid_row(matrix: ArrayView2<f64>, tol: f64) -> Option<usize> {
    matrix.outer_iter().position(|row| {
        let total: f64 = row.sum();
        row.iter().any(|&p| !p.is_finite() || p < 0.0) || (total - 1.0).abs() > tol
    })
}
