//! Streaming MBOX splitter.
//!
//! Reads an MBOX file line by line and yields one raw RFC 5322 message at a
//! time, without the `From ` separator line and with one level of
//! `>From ` quoting removed. Never loads the whole file into memory.
//! Tolerant of:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - Truncated messages at EOF
//! - UTF-8 BOM at the start of the file

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ExportError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Messages larger than this are truncated (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Iterator over the raw messages of an MBOX stream.
pub struct MboxReader<R> {
    reader: R,
    path: PathBuf,
    line_buf: Vec<u8>,
    message_buf: Vec<u8>,
    offset: u64,
    message_start: u64,
    prev_line_was_empty: bool,
    first_line: bool,
    oversized: bool,
    done: bool,
    max_message_size: usize,
}

impl MboxReader<BufReader<File>> {
    /// Open an MBOX file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::SourceNotFound(path.to_path_buf())
            } else {
                ExportError::io(path, e)
            }
        })?;
        Ok(Self::new(
            BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path,
        ))
    }
}

impl<R: BufRead> MboxReader<R> {
    /// Wrap an already open reader. `path` is only used in errors and logs.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line_buf: Vec::with_capacity(4096),
            message_buf: Vec::with_capacity(64 * 1024),
            offset: 0,
            message_start: 0,
            prev_line_was_empty: true,
            first_line: true,
            oversized: false,
            done: false,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Read the next line into `line_buf`. Returns `Ok(false)` at EOF.
    fn read_line(&mut self) -> Result<bool> {
        self.line_buf.clear();
        let buf = self
            .reader
            .fill_buf()
            .map_err(|e| ExportError::io(&self.path, e))?;
        if buf.is_empty() {
            return Ok(false);
        }
        let consume_len = match memchr_newline(buf) {
            Some(pos) => pos + 1,
            None => buf.len(),
        };
        self.line_buf.extend_from_slice(&buf[..consume_len]);
        self.reader.consume(consume_len);

        // A line longer than the buffer arrives in pieces.
        while !self.line_buf.ends_with(b"\n") {
            let buf = self
                .reader
                .fill_buf()
                .map_err(|e| ExportError::io(&self.path, e))?;
            if buf.is_empty() {
                break;
            }
            let consume_len = match memchr_newline(buf) {
                Some(pos) => pos + 1,
                None => buf.len(),
            };
            self.line_buf.extend_from_slice(&buf[..consume_len]);
            self.reader.consume(consume_len);
        }
        Ok(true)
    }

    /// Hand out the buffered message if it holds anything besides blank lines.
    fn take_message(&mut self) -> Option<Vec<u8>> {
        self.oversized = false;
        if is_blank_line(&self.message_buf) {
            self.message_buf.clear();
            return None;
        }
        let mut message = std::mem::take(&mut self.message_buf);
        trim_separator_blank(&mut message);
        Some(message)
    }

    fn append_line(&mut self) {
        let line = unescape_from_line(&self.line_buf);
        if self.message_buf.len() + line.len() <= self.max_message_size {
            self.message_buf.extend_from_slice(line);
        } else if !self.oversized {
            warn!(
                path = %self.path.display(),
                offset = self.message_start,
                max_size = self.max_message_size,
                "Message exceeds maximum size, truncating body"
            );
            self.oversized = true;
        }
    }
}

impl<R: BufRead> Iterator for MboxReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.read_line() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return self.take_message().map(Ok);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            let line_len = self.line_buf.len() as u64;
            let mut emitted = None;

            if is_mbox_separator(&self.line_buf) {
                if !self.first_line && !self.prev_line_was_empty {
                    warn!(
                        path = %self.path.display(),
                        offset = self.offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                emitted = self.take_message();
                self.message_start = self.offset;
            } else {
                self.append_line();
            }

            self.prev_line_was_empty = is_blank_line(&self.line_buf);
            self.first_line = false;
            self.offset += line_len;

            if let Some(message) = emitted {
                return Some(Ok(message));
            }
        }
    }
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

/// Remove one `>` from `>From `, `>>From `, ... lines.
fn unescape_from_line(line: &[u8]) -> &[u8] {
    let quotes = line.iter().take_while(|&&b| b == b'>').count();
    if quotes > 0 && line[quotes..].starts_with(b"From ") {
        &line[1..]
    } else {
        line
    }
}

/// Drop the blank line that precedes the next separator.
fn trim_separator_blank(message: &mut Vec<u8>) {
    if message.ends_with(b"\r\n\r\n") {
        message.truncate(message.len() - 2);
    } else if message.ends_with(b"\n\n") {
        message.truncate(message.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(data: &[u8]) -> Vec<Vec<u8>> {
        MboxReader::new(data, "test.mbox")
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_mbox_separator_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_split_two_messages() {
        let data = b"From a@example.com Mon Jan 01 00:00:00 2024\n\
Subject: One\n\
\n\
First body\n\
\n\
From b@example.com Tue Jan 02 00:00:00 2024\n\
Subject: Two\n\
\n\
Second body\n";
        let messages = split(data);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], b"Subject: One\n\nFirst body\n");
        assert_eq!(messages[1], b"Subject: Two\n\nSecond body\n");
    }

    #[test]
    fn test_unescapes_quoted_from() {
        let data = b"From a@example.com Mon Jan 01 00:00:00 2024\r\n\
Subject: Quote\r\n\
\r\n\
>From the archive\r\n\
>>From deeper\r\n";
        let messages = split(data);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            b"Subject: Quote\r\n\r\nFrom the archive\r\n>From deeper\r\n"
        );
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split(b"").is_empty());
        assert!(split(b"\n\n").is_empty());
    }

    #[test]
    fn test_missing_blank_before_separator_still_splits() {
        let data = b"From a Mon Jan 01 00:00:00 2024\nSubject: A\n\nx\nFrom b Mon Jan 01 00:00:00 2024\nSubject: B\n\ny\n";
        assert_eq!(split(data).len(), 2);
    }

    #[test]
    fn test_truncated_last_message() {
        let data = b"From a Mon Jan 01 00:00:00 2024\nSubject: Cut\n\npartial";
        let messages = split(data);
        assert_eq!(messages, vec![b"Subject: Cut\n\npartial".to_vec()]);
    }
}
