use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use bstr::ByteSlice;

use crate::error::{Error, Result};
use crate::event::{Event, EventStream};

/// Reads events from a line-oriented text source
///
/// Each non-blank line holds one event: the outcome followed by its
/// predicates, separated by whitespace. In real-valued mode a predicate may
/// be written as `name=value`.
#[derive(Debug)]
pub struct FileEventStream<R> {
    reader: R,
    real_valued: bool,
    line: usize,
    buf: Vec<u8>,
}

impl FileEventStream<BufReader<File>> {
    /// Open an event file
    pub fn open<P: AsRef<Path>>(path: P, real_valued: bool) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(if real_valued {
            Self::real_valued(reader)
        } else {
            Self::new(reader)
        })
    }
}

impl<R: BufRead + Seek> FileEventStream<R> {
    /// Create a stream of binary events
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            real_valued: false,
            line: 0,
            buf: Vec::new(),
        }
    }

    /// Create a stream that parses `name=value` predicates
    pub fn real_valued(reader: R) -> Self {
        Self {
            real_valued: true,
            ..Self::new(reader)
        }
    }

    fn parse_line(&self, line: &[u8]) -> Result<Event> {
        let mut fields = line.fields();
        let outcome = match fields.next() {
            Some(outcome) => self.field_str(outcome)?,
            None => return Err(self.error("empty event")),
        };
        let mut context = Vec::new();
        let mut values = Vec::new();
        for field in fields {
            let field = self.field_str(field)?;
            if self.real_valued {
                let (name, value) = split_value(field);
                context.push(name.to_string());
                values.push(value);
            } else {
                context.push(field.to_string());
            }
        }
        if self.real_valued {
            Event::with_values(outcome, context, values)
        } else {
            Ok(Event::new(outcome, context))
        }
    }

    fn field_str<'b>(&self, field: &'b [u8]) -> Result<&'b str> {
        field
            .to_str()
            .map_err(|e| self.error(format!("invalid UTF-8: {}", e)))
    }

    fn error<S: Into<String>>(&self, message: S) -> Error {
        Error::Event {
            line: self.line,
            message: message.into(),
        }
    }
}

/// Split `name=value` at the last `=`, falling back to value 1.0
fn split_value(field: &str) -> (&str, f64) {
    if let Some(pos) = field.rfind('=') {
        if let Ok(value) = field[pos + 1..].parse::<f64>() {
            return (&field[..pos], value);
        }
    }
    (field, 1.0)
}

impl<R: BufRead + Seek> EventStream for FileEventStream<R> {
    fn read(&mut self) -> Result<Option<Event>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return self.parse_line(trimmed).map(Some);
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.line = 0;
        Ok(())
    }
}
