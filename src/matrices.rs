//! Reading the classifier's outputs and writing smoothed calls.
//!
//! Raw and smoothed call matrices are tab-delimited, one row per window and
//! one column per sample. SNP positions and success rates are single-column
//! tables, one value per line.

use csv::ReaderBuilder;
use ndarray::{Array2, Array3};
use std::io::Write;

use crate::error::AncestryError;
use crate::file::{writer_or_stdout, InputFile};
use crate::genetic_map::Position;

fn first_field(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Read strictly increasing SNP physical positions, one per line.
pub fn read_positions(filepath: &str) -> Result<Vec<Position>, AncestryError> {
    let lines = InputFile::new(filepath).data_lines(false)?;
    let mut positions: Vec<Position> = Vec::with_capacity(lines.len());
    for (line_num, line) in lines {
        let field = first_field(&line);
        let position: Position = field.parse().map_err(|_| {
            AncestryError::parse(line_num, format!("failed to parse SNP position '{}'", field))
        })?;
        if let Some(&last) = positions.last() {
            if position <= last {
                return Err(AncestryError::Data(format!(
                    "SNP positions not strictly increasing at line {} ({} after {})",
                    line_num, position, last
                )));
            }
        }
        positions.push(position);
    }
    Ok(positions)
}

/// Read per-window classifier success rates, one per line, each in `[0, 1]`.
pub fn read_success_rates(filepath: &str) -> Result<Vec<f64>, AncestryError> {
    let lines = InputFile::new(filepath).data_lines(false)?;
    lines
        .into_iter()
        .map(|(line_num, line)| {
            let field = first_field(&line);
            let rate: f64 = field.parse().map_err(|_| {
                AncestryError::parse(line_num, format!("failed to parse success rate '{}'", field))
            })?;
            if !(rate.is_finite() && (0.0..=1.0).contains(&rate)) {
                return Err(AncestryError::parse(
                    line_num,
                    format!("success rate {} is outside [0, 1]", rate),
                ));
            }
            Ok(rate)
        })
        .collect()
}

/// Read a tab-delimited `W x S` matrix of raw calls.
pub fn read_calls(filepath: &str) -> Result<Array2<usize>, AncestryError> {
    let reader = InputFile::new(filepath).reader()?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut values = Vec::new();
    let mut n_samples: Option<usize> = None;
    let mut n_windows = 0;
    for result in rdr.records() {
        let record = result?;
        let line_num = record.position().map_or(n_windows + 1, |p| p.line() as usize);
        match n_samples {
            None => n_samples = Some(record.len()),
            Some(n) if n != record.len() => {
                return Err(AncestryError::parse(
                    line_num,
                    format!("expected {} samples, got {}", n, record.len()),
                ))
            }
            Some(_) => {}
        }
        for field in record.iter() {
            let call: usize = field.trim().parse().map_err(|_| {
                AncestryError::parse(line_num, format!("failed to parse call '{}'", field))
            })?;
            values.push(call);
        }
        n_windows += 1;
    }

    let n_samples = n_samples
        .ok_or_else(|| AncestryError::Data(format!("call matrix '{}' is empty", filepath)))?;
    Array2::from_shape_vec((n_windows, n_samples), values)
        .map_err(|e| AncestryError::Data(format!("call matrix '{}': {}", filepath, e)))
}

/// Write a `W x S` call matrix, tab-delimited, to a file or standard out.
pub fn write_calls(calls: &Array2<usize>, filepath: Option<&str>) -> Result<(), AncestryError> {
    let mut writer = writer_or_stdout(filepath, None)?;
    for row in calls.outer_iter() {
        let fields: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `S x W x K` posteriors as one row per (sample, window).
pub fn write_posteriors(
    posteriors: &Array3<f64>,
    filepath: Option<&str>,
    header: bool,
) -> Result<(), AncestryError> {
    let precision = 6;
    let n_classes = posteriors.dim().2;
    let header = header.then(|| {
        let mut columns = vec!["sample".to_string(), "window".to_string()];
        columns.extend((0..n_classes).map(|k| format!("p{}", k)));
        columns
    });
    let mut writer = writer_or_stdout(filepath, header)?;
    for (sample, windows) in posteriors.outer_iter().enumerate() {
        for (window, probs) in windows.outer_iter().enumerate() {
            let fields: Vec<String> = probs.iter().map(|p| format!("{:.*}", precision, p)).collect();
            writeln!(writer, "{}\t{}\t{}", sample, window, fields.join("\t"))?;
        }
    }
    writer.flush()?;
    Ok(())
}
