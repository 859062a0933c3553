//! NDJSON ingestion: one event object per line.

use super::Event;
use crate::error::InputError;
use std::io::BufRead;

/// Parse one line; `line_no` is 1-based and only used in the error.
pub fn parse_event_line(line: &str, line_no: usize) -> Result<Event, InputError> {
    serde_json::from_str::<Event>(line).map_err(|e| InputError::Malformed {
        line: line_no,
        reason: e.to_string(),
    })
}

/// Iterates events from a reader, skipping blank lines. I/O failures surface as malformed lines.
pub struct EventReader<R> {
    inner: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            self.line_no += 1;
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = self.buf.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(parse_event_line(line, self.line_no));
                }
                Err(e) => {
                    return Some(Err(InputError::Malformed {
                        line: self.line_no,
                        reason: e.to_string(),
                    }))
                }
            }
        }
    }
}
