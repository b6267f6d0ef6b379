use log::debug;
use ndarray::Array1;

use crate::error::AncestryError;
use crate::file::InputFile;
use crate::numeric::interp1d_clamped;

/// The integer type for physical (base-pair) positions.
pub type Position = u64;

/// A physical-to-genetic position table for one chromosome.
///
/// Physical positions are strictly increasing; genetic positions are in
/// centiMorgans. The table is read-only once built, so lookups can be shared
/// freely across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneticMap {
    positions: Vec<Position>,
    map_pos: Vec<f64>,
}

impl GeneticMap {
    /// Build a map from parallel vectors of physical and genetic positions.
    ///
    /// Fails with [`AncestryError::Lookup`] if the table is empty, the vectors
    /// differ in length, physical positions are not strictly increasing, or a
    /// genetic position is not finite.
    pub fn new(positions: Vec<Position>, map_pos: Vec<f64>) -> Result<Self, AncestryError> {
        if positions.is_empty() {
            return Err(AncestryError::Lookup("genetic map is empty".to_string()));
        }
        if positions.len() != map_pos.len() {
            return Err(AncestryError::Lookup(format!(
                "genetic map has {} physical positions but {} genetic positions",
                positions.len(),
                map_pos.len()
            )));
        }
        if let Some(i) = positions.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(AncestryError::Lookup(format!(
                "genetic map physical positions not strictly increasing at entry {} ({} after {})",
                i + 1,
                positions[i + 1],
                positions[i]
            )));
        }
        if let Some(i) = map_pos.iter().position(|g| !g.is_finite()) {
            return Err(AncestryError::Lookup(format!(
                "genetic map position at entry {} is not finite",
                i
            )));
        }
        Ok(Self { positions, map_pos })
    }

    /// Read a genetic map from a whitespace-delimited table.
    ///
    /// The table looks like (HapMap per-chromosome maps):
    ///
    /// ```text
    /// position COMBINED_rate(cM/Mb) Genetic_Map(cM)
    /// 14431347 8.096992 0.000000
    /// 14432618 8.131520 0.010291
    /// 14433624 8.131967 0.018472
    /// ```
    ///
    /// The first line is a header and is always skipped. Column 0 is the
    /// physical position and column 2 the genetic position; other columns are
    /// ignored. Gzip-compressed files are read transparently.
    pub fn from_file(filepath: &str) -> Result<Self, AncestryError> {
        let input_file = InputFile::new(filepath);
        let lines = input_file.data_lines(true)?;

        let mut positions = Vec::with_capacity(lines.len());
        let mut map_pos = Vec::with_capacity(lines.len());
        for (line_num, line) in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(AncestryError::parse(
                    line_num,
                    format!("expected at least 3 columns, got {}", fields.len()),
                ));
            }
            let position: Position = fields[0].parse().map_err(|_| {
                AncestryError::parse(
                    line_num,
                    format!("failed to parse physical position from '{}'", fields[0]),
                )
            })?;
            let genetic: f64 = fields[2].parse().map_err(|_| {
                AncestryError::parse(
                    line_num,
                    format!("failed to parse genetic position from '{}'", fields[2]),
                )
            })?;
            positions.push(position);
            map_pos.push(genetic);
        }

        let map = Self::new(positions, map_pos)?;
        debug!(
            "read genetic map '{}': {} entries, {:.4} cM",
            filepath,
            map.len(),
            map.total_length()
        );
        Ok(map)
    }

    /// Number of tabulated entries.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false for a constructed map; provided alongside [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Genetic length covered by the table, in centiMorgans.
    pub fn total_length(&self) -> f64 {
        match (self.map_pos.first(), self.map_pos.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Genetic position (cM) of a physical position.
    ///
    /// Exact matches return the tabulated value, positions outside the table
    /// return the nearest end value, and anything else is linearly
    /// interpolated between the two bracketing entries.
    pub fn lookup(&self, position: Position) -> f64 {
        // construction guarantees a non-empty table of matching lengths
        interp1d_clamped(&self.positions, &self.map_pos, position).unwrap_or(f64::NAN)
    }

    /// Look up many physical positions at once.
    pub fn lookup_many(&self, positions: &[Position]) -> Array1<f64> {
        positions.iter().map(|&p| self.lookup(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{assert_float_eq, assert_floats_eq};
    use std::io::Write;
    use tempfile::tempdir;

    fn small_map() -> GeneticMap {
        GeneticMap::new(vec![1000, 2000, 4000], vec![0.5, 1.0, 3.0]).unwrap()
    }

    #[test]
    fn test_exact_lookup() {
        let gm = small_map();
        assert_eq!(gm.lookup(1000), 0.5);
        assert_eq!(gm.lookup(2000), 1.0);
        assert_eq!(gm.lookup(4000), 3.0);
    }

    #[test]
    fn test_out_of_range_lookup() {
        let gm = small_map();
        assert_eq!(gm.lookup(0), 0.5);
        assert_eq!(gm.lookup(999), 0.5);
        assert_eq!(gm.lookup(4001), 3.0);
        assert_eq!(gm.lookup(u64::MAX), 3.0);
    }

    #[test]
    fn test_interpolated_lookup() {
        let gm = GeneticMap::new(vec![10, 30], vec![2.0, 7.0]).unwrap();
        let expected = 2.0 + (7.0 - 2.0) / (30.0 - 10.0) * (17.0 - 10.0);
        assert_eq!(gm.lookup(17), expected);

        let gm = small_map();
        assert_floats_eq(
            gm.lookup_many(&[1500, 3000]).as_slice().unwrap(),
            &[0.75, 2.0],
            1e-12,
        );
    }

    #[test]
    fn test_single_entry_map() {
        let gm = GeneticMap::new(vec![500], vec![1.25]).unwrap();
        assert_eq!(gm.lookup(1), 1.25);
        assert_eq!(gm.lookup(500), 1.25);
        assert_eq!(gm.lookup(501), 1.25);
        assert_eq!(gm.total_length(), 0.0);
    }

    #[test]
    fn test_malformed_maps() {
        assert!(matches!(
            GeneticMap::new(vec![], vec![]),
            Err(AncestryError::Lookup(_))
        ));
        assert!(matches!(
            GeneticMap::new(vec![10, 10], vec![0.0, 1.0]),
            Err(AncestryError::Lookup(_))
        ));
        assert!(matches!(
            GeneticMap::new(vec![20, 10], vec![0.0, 1.0]),
            Err(AncestryError::Lookup(_))
        ));
        assert!(matches!(
            GeneticMap::new(vec![10], vec![f64::NAN]),
            Err(AncestryError::Lookup(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let gm = GeneticMap::from_file("tests/data/genetic_map_test.txt").unwrap();
        assert_eq!(gm.len(), 8);
        assert!(!gm.is_empty());
        assert_eq!(gm.lookup(14431347), 0.0);
        assert_float_eq(gm.total_length(), 38.0, 1e-9);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempdir().unwrap();

        let short = dir.path().join("short.txt");
        let mut f = std::fs::File::create(&short).unwrap();
        writeln!(f, "position rate map").unwrap();
        writeln!(f, "100 1.0").unwrap();
        drop(f);
        assert!(matches!(
            GeneticMap::from_file(short.to_str().unwrap()),
            Err(AncestryError::Parse { line: 2, .. })
        ));

        let header_only = dir.path().join("header_only.txt");
        let mut f = std::fs::File::create(&header_only).unwrap();
        writeln!(f, "position rate map").unwrap();
        drop(f);
        assert!(matches!(
            GeneticMap::from_file(header_only.to_str().unwrap()),
            Err(AncestryError::Lookup(_))
        ));
    }
}
