//! Collapsing SNP positions into classification windows.
//!
//! Upstream classification works on `W` windows of consecutive SNPs; here we
//! recover those windows from the SNP positions alone and place each window
//! on the genetic map at the mean genetic position of its SNPs.

use log::debug;

use crate::error::AncestryError;
use crate::genetic_map::{GeneticMap, Position};

/// Number of SNPs per window, `ceil(n_snps / n_windows)`.
///
/// Fails with [`AncestryError::Configuration`] if there are fewer SNPs than
/// windows, or if ceiling-sized bins cannot yield exactly `n_windows`
/// non-empty bins (i.e. `(n_windows - 1) * bin_size >= n_snps`).
pub fn bin_size(n_snps: usize, n_windows: usize) -> Result<usize, AncestryError> {
    if n_windows == 0 {
        return Err(AncestryError::Configuration(
            "number of windows must be at least 1".to_string(),
        ));
    }
    if n_snps < n_windows {
        return Err(AncestryError::Configuration(format!(
            "{} SNP positions cannot be split into {} windows",
            n_snps, n_windows
        )));
    }
    let size = n_snps.div_ceil(n_windows);
    if (n_windows - 1) * size >= n_snps {
        return Err(AncestryError::Configuration(format!(
            "{} SNP positions in bins of {} give fewer than {} windows",
            n_snps, size, n_windows
        )));
    }
    Ok(size)
}

/// The representative genetic position (cM) of each of `n_windows` windows.
///
/// `snp_positions` must be strictly increasing. The last window may hold
/// fewer SNPs than the others.
pub fn window_genetic_positions(
    genetic_map: &GeneticMap,
    snp_positions: &[Position],
    n_windows: usize,
) -> Result<Vec<f64>, AncestryError> {
    if let Some(i) = snp_positions.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(AncestryError::Data(format!(
            "SNP positions not strictly increasing at index {} ({} after {})",
            i + 1,
            snp_positions[i + 1],
            snp_positions[i]
        )));
    }
    let size = bin_size(snp_positions.len(), n_windows)?;
    debug!(
        "binning {} SNPs into {} windows of {} SNPs",
        snp_positions.len(),
        n_windows,
        size
    );

    let window_pos = snp_positions
        .chunks(size)
        .map(|bin| {
            let total: f64 = bin.iter().map(|&p| genetic_map.lookup(p)).sum();
            total / bin.len() as f64
        })
        .collect::<Vec<_>>();
    debug_assert_eq!(window_pos.len(), n_windows);
    Ok(window_pos)
}
