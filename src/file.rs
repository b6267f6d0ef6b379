//! Plaintext and gzip-compressed table input and output.
//!
//! Every table this crate consumes (genetic maps, SNP positions, success
//! rates, raw call matrices) goes through [`InputFile`], which detects gzip
//! input by its magic number. [`OutputFile`] compresses when the path ends
//! in `.gz`.
//!
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("File '{0}' is empty")]
    Empty(String),
}

/// Check if a file is gzipped by looking for the magic numbers.
fn is_gzipped_file(file_path: &str) -> io::Result<bool> {
    let mut file = File::open(file_path)?;
    let mut buffer = [0; 2];
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled == 2 && buffer == [0x1f, 0x8b])
}

/// A table on disk to be read line by line.
pub struct InputFile {
    pub filepath: String,
}

impl InputFile {
    pub fn new(filepath: &str) -> Self {
        Self {
            filepath: filepath.to_string(),
        }
    }

    /// Opens the file and returns a buffered reader, decompressing gzip input.
    pub fn reader(&self) -> Result<BufReader<Box<dyn Read>>, FileError> {
        let file = File::open(&self.filepath)?;
        let reader: Box<dyn Read> = if is_gzipped_file(&self.filepath)? {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }

    /// Read all data lines, paired with their 1-based line numbers.
    ///
    /// Blank lines and lines starting with `#` are dropped. If `skip_header` is
    /// set, the first line of the file is dropped unconditionally.
    ///
    /// # Returns
    ///
    /// The retained lines, or [`FileError::Empty`] if the file has no lines at all.
    pub fn data_lines(&self, skip_header: bool) -> Result<Vec<(usize, String)>, FileError> {
        let reader = self.reader()?;
        let mut lines = Vec::new();
        let mut seen_any = false;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            seen_any = true;
            if skip_header && idx == 0 {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            lines.push((idx + 1, trimmed.to_string()));
        }
        if !seen_any {
            return Err(FileError::Empty(self.filepath.clone()));
        }
        Ok(lines)
    }
}

/// A table to be written to disk.
pub struct OutputFile {
    pub filepath: String,
    /// Optional column names, written tab-separated as the first line.
    pub header: Option<Vec<String>>,
}

impl OutputFile {
    /// Constructs a new `OutputFile`.
    ///
    /// # Arguments
    ///
    /// * `filepath` - Path of the output. A `.gz` extension turns on gzip compression.
    /// * `header` - Optional column names written before any rows.
    pub fn new(filepath: &str, header: Option<Vec<String>>) -> Self {
        Self {
            filepath: filepath.to_string(),
            header,
        }
    }

    /// Create the file and return a buffered writer, with the header (if any)
    /// already written.
    pub fn writer(&self) -> Result<Box<dyn Write>, io::Error> {
        let outfile = &self.filepath;
        let mut writer: Box<dyn Write> = if outfile.ends_with(".gz") {
            Box::new(BufWriter::new(GzEncoder::new(
                File::create(outfile)?,
                Compression::default(),
            )))
        } else {
            Box::new(BufWriter::new(File::create(outfile)?))
        };
        if let Some(columns) = &self.header {
            writeln!(writer, "{}", columns.join("\t"))?;
        }
        Ok(writer)
    }
}

/// Open `filepath` for writing, or standard out if no path is given.
pub fn writer_or_stdout(
    filepath: Option<&str>,
    header: Option<Vec<String>>,
) -> Result<Box<dyn Write>, io::Error> {
    match filepath {
        Some(path) => OutputFile::new(path, header).writer(),
        None => {
            let mut writer: Box<dyn Write> = Box::new(BufWriter::new(io::stdout()));
            if let Some(columns) = header {
                writeln!(writer, "{}", columns.join("\t"))?;
            }
            Ok(writer)
        }
    }
}
