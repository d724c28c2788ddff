//! Bounded-memory streaming document
//!
//! Reads forward through any `BufRead` source, keeping only the most
//! recent `buffer_capacity` instructions. Memory use is constant in the
//! file size.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::GcodeDocument;
use crate::config::DocumentOptions;
use crate::error::{DocumentError, Result};
use crate::instruction::Instruction;
use crate::tracker::KinematicTracker;

/// Rough bytes per G-code line, used before the stream has been read
const ESTIMATED_BYTES_PER_LINE: u64 = 14;

/// A document read lazily through a ring buffer
///
/// Instruction `i` lives in slot `i % capacity`. Indices older than
/// `count - capacity` have been overwritten and are reported as
/// [`DocumentError::EvictedHistory`].
#[derive(Debug)]
pub struct StreamedDocument<R: BufRead> {
    reader: R,
    line_buffer: String,
    byte_length: u64,
    bytes_consumed: u64,
    ring: Vec<Option<Instruction>>,
    count: usize,
    finished: bool,
    /// Strict-mode rejection that stopped the stream
    rejected: Option<(usize, String)>,
    tracker: KinematicTracker,
}

impl StreamedDocument<BufReader<File>> {
    /// Stream a file from disk
    pub fn open(path: impl AsRef<Path>, options: &DocumentOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let byte_length = file.metadata()?.len();
        Ok(Self::new(BufReader::new(file), byte_length, options))
    }
}

impl<R: BufRead> StreamedDocument<R> {
    /// Wrap a reader; `byte_length` drives the progress and line estimates
    pub fn new(reader: R, byte_length: u64, options: &DocumentOptions) -> Self {
        let capacity = options.buffer_capacity.max(1);
        Self {
            reader,
            line_buffer: String::new(),
            byte_length,
            bytes_consumed: 0,
            ring: vec![None; capacity],
            count: 0,
            finished: false,
            rejected: None,
            tracker: KinematicTracker::new(options.strict),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Lines parsed so far
    pub fn lines_read(&self) -> usize {
        self.count
    }

    /// Whether the end of the input has been reached
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Smallest index still held by the ring buffer
    pub fn oldest_available(&self) -> usize {
        self.count.saturating_sub(self.capacity())
    }

    pub fn instruction(&mut self, index: usize) -> Result<&Instruction> {
        let oldest_available = self.oldest_available();
        if index < oldest_available {
            return Err(DocumentError::EvictedHistory {
                index,
                oldest_available,
            });
        }

        while index >= self.count && !self.finished {
            if let Some((line_number, text)) = &self.rejected {
                return Err(DocumentError::StrictModeViolation {
                    line_number: *line_number,
                    text: text.clone(),
                });
            }
            self.read_next()?;
        }

        let len = self.count;
        if index >= len {
            return Err(DocumentError::IndexOutOfRange { index, len });
        }

        let slot = index % self.capacity();
        self.ring[slot]
            .as_ref()
            .ok_or(DocumentError::IndexOutOfRange { index, len })
    }

    pub fn line_count(&self) -> usize {
        if self.finished {
            return self.count;
        }
        let estimate = (self.byte_length / ESTIMATED_BYTES_PER_LINE) as usize;
        estimate.max(self.count + 1)
    }

    /// Bytes consumed as a share of the input size
    pub fn percent_complete(&self) -> f64 {
        if self.finished || self.byte_length == 0 {
            return 100.0;
        }
        (self.bytes_consumed as f64 / self.byte_length as f64 * 100.0).min(100.0)
    }

    /// Parse one more line into the ring, or mark the stream finished
    ///
    /// A line rejected in strict mode stops the stream: every later read
    /// past the buffered lines reports the same violation.
    fn read_next(&mut self) -> Result<()> {
        self.line_buffer.clear();
        let read = self.reader.read_line(&mut self.line_buffer)?;
        if read == 0 {
            self.finished = true;
            log::debug!("stream finished after {} lines", self.tracker.lines_seen());
            return Ok(());
        }
        self.bytes_consumed += read as u64;

        let instruction = match self.tracker.process(&self.line_buffer) {
            Ok(instruction) => instruction,
            Err(DocumentError::StrictModeViolation { line_number, text }) => {
                log::debug!("stream stopped at rejected line {}", line_number);
                self.rejected = Some((line_number, text.clone()));
                return Err(DocumentError::StrictModeViolation { line_number, text });
            }
            Err(e) => return Err(e),
        };
        let slot = self.count % self.ring.len();
        self.ring[slot] = Some(instruction);
        self.count += 1;
        Ok(())
    }
}

impl<R: BufRead> GcodeDocument for StreamedDocument<R> {
    fn instruction(&mut self, index: usize) -> Result<&Instruction> {
        StreamedDocument::instruction(self, index)
    }

    fn line_count(&self) -> usize {
        StreamedDocument::line_count(self)
    }

    fn percent_complete(&self, _index: usize) -> f64 {
        StreamedDocument::percent_complete(self)
    }
}
