//! Streaming record extraction
//!
//! `RecordStream` walks the source document with an event-based XML reader and
//! yields one `RawRecord` per qualifying `<Record>` element, in document
//! order. The event buffer is cleared before every read, so peak memory stays
//! independent of document size. The stream is forward-only and not
//! restartable.
//!
//! Recovery policy: permissive by default. A malformed fragment is counted,
//! logged, and skipped; extraction continues with the next event. A reader
//! error that repeats without the reader advancing is treated as fatal, since
//! no further progress is possible. Strict mode turns the first malformed
//! fragment into a fatal `DocumentParse` error instead.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::config::RecoveryPolicy;
use crate::error::PipelineError;
use crate::types::RawRecord;

/// Element name that qualifies for extraction.
const RECORD_TAG: &[u8] = b"Record";

/// Lazy, forward-only stream of raw record attribute sets
pub struct RecordStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    recovery: RecoveryPolicy,
    skipped_fragments: u64,
    finished: bool,
    last_error_pos: Option<u64>,
}

impl RecordStream<BufReader<File>> {
    /// Open a source document from disk. An unreadable file is fatal in
    /// either recovery mode.
    pub fn open(path: &Path, recovery: RecoveryPolicy) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| {
            PipelineError::DocumentParse(format!("cannot open {}: {e}", path.display()))
        })?;
        Ok(Self::new(BufReader::new(file), recovery))
    }
}

impl<R: BufRead> RecordStream<R> {
    /// Wrap any buffered reader producing the source document.
    pub fn new(source: R, recovery: RecoveryPolicy) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            recovery,
            skipped_fragments: 0,
            finished: false,
            last_error_pos: None,
        }
    }

    /// Malformed fragments skipped so far (permissive mode only).
    pub fn skipped_fragments(&self) -> u64 {
        self.skipped_fragments
    }

    fn skip_fragment(&mut self, detail: &str) {
        self.skipped_fragments += 1;
        warn!(detail, "skipping malformed fragment");
    }

    fn fatal(&mut self, message: String) -> Option<Result<RawRecord, PipelineError>> {
        self.finished = true;
        Some(Err(PipelineError::DocumentParse(message)))
    }
}

/// Owned outcome of reading one event, so the event buffer borrow ends
/// before any stream state changes.
enum Step {
    Record(IndexMap<String, String>),
    Malformed(String),
    ReadError(String),
    Eof,
    Other,
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<RawRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(ref element)) | Ok(Event::Empty(ref element))
                    if element.local_name().as_ref() == RECORD_TAG =>
                {
                    match collect_attributes(element) {
                        Ok(attrs) => Step::Record(attrs),
                        Err(detail) => Step::Malformed(detail),
                    }
                }
                Ok(Event::Eof) => Step::Eof,
                // Metadata children, text, and foreign elements are not records.
                Ok(_) => Step::Other,
                Err(e) => Step::ReadError(e.to_string()),
            };

            match step {
                Step::Record(attrs) => return Some(Ok(RawRecord { attrs })),
                Step::Other => continue,
                Step::Eof => {
                    self.finished = true;
                    return None;
                }
                Step::Malformed(detail) => match self.recovery {
                    RecoveryPolicy::Permissive => self.skip_fragment(&detail),
                    RecoveryPolicy::Strict => {
                        return self.fatal(format!("malformed record element: {detail}"));
                    }
                },
                Step::ReadError(detail) => {
                    let pos = self.reader.buffer_position() as u64;
                    match self.recovery {
                        RecoveryPolicy::Permissive => {
                            if self.last_error_pos == Some(pos) {
                                // Reader is stuck; nothing left to salvage.
                                return self.fatal(format!(
                                    "cannot recover from XML error at byte {pos}: {detail}"
                                ));
                            }
                            self.last_error_pos = Some(pos);
                            self.skip_fragment(&format!("XML error at byte {pos}: {detail}"));
                        }
                        RecoveryPolicy::Strict => {
                            return self.fatal(format!("XML error at byte {pos}: {detail}"));
                        }
                    }
                }
            }
        }
    }
}

/// Decode an element's attributes into an ordered map.
fn collect_attributes(element: &BytesStart) -> Result<IndexMap<String, String>, String> {
    let mut attrs = IndexMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}
