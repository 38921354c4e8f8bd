//! Line-oriented event feed reader.
//!
//! The first line of a feed is a comma-separated header naming the fields.
//! Every following non-blank line is one record, split on commas and zipped
//! with the header. Trailing fields a line omits read as empty strings.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lineplay_core::record::{RawRecord, RecordError, field, parse_timestamp};
use lineplay_core::time::SimTime;
use tracing::debug;

/// Errors raised while reading a feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("feed is empty: no header line")]
    MissingHeader,

    #[error("feed header has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("line {line}: {found} fields, header declares {expected}")]
    ExtraFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: RecordError,
    },
}

/// Iterator of [`RawRecord`]s read from a header-prefixed feed.
#[derive(Debug)]
pub struct FeedReader<R> {
    reader: R,
    header: Vec<String>,
    line_no: usize,
    pending: Option<RawRecord>,
    buf: String,
}

impl FeedReader<BufReader<File>> {
    /// Open a feed file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> FeedReader<R> {
    /// Read the header line and prepare to yield records.
    pub fn new(mut reader: R) -> Result<Self, FeedError> {
        let mut buf = String::new();
        if reader.read_line(&mut buf)? == 0 {
            return Err(FeedError::MissingHeader);
        }
        let header: Vec<String> = buf
            .trim_end()
            .split(',')
            .map(|name| name.trim().to_string())
            .collect();
        if !header.iter().any(|name| name == field::TIMESTAMP) {
            return Err(FeedError::MissingColumn(field::TIMESTAMP));
        }

        Ok(Self {
            reader,
            header,
            line_no: 1,
            pending: None,
            buf,
        })
    }

    /// Field names declared by the header, in column order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Line number of the most recently read line (the header is line 1).
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    /// Discard records up to the first one whose Timestamp is present and at
    /// or past `floor`. Untimed records before it are discarded as well.
    ///
    /// Returns the number of records discarded.
    pub fn skip_to(&mut self, floor: SimTime) -> Result<u64, FeedError> {
        let mut skipped = 0u64;
        while let Some(raw) = self.read_record()? {
            if let Some(text) = raw.timestamp_text() {
                let time = parse_timestamp(text).map_err(|source| FeedError::Record {
                    line: self.line_no,
                    source,
                })?;
                if time >= floor {
                    self.pending = Some(raw);
                    break;
                }
            }
            skipped += 1;
        }
        debug!(floor = %floor, skipped, "feed skip complete");
        Ok(skipped)
    }

    fn read_record(&mut self) -> Result<Option<RawRecord>, FeedError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<&str> = line.split(',').collect();
            if values.len() > self.header.len() {
                return Err(FeedError::ExtraFields {
                    line: self.line_no,
                    expected: self.header.len(),
                    found: values.len(),
                });
            }
            let raw = self
                .header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), values.get(i).copied().unwrap_or("")))
                .collect();
            return Ok(Some(raw));
        }
    }
}

impl<R: BufRead> Iterator for FeedReader<R> {
    type Item = Result<RawRecord, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(raw) = self.pending.take() {
            return Some(Ok(raw));
        }
        self.read_record().transpose()
    }
}
