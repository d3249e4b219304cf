// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Line-capped writer for the event log file.
//!
//! Once `max_lines` newline-terminated lines have gone through, further
//! output is dropped while still reporting success, so a full log never
//! turns into a logging error.

use std::io;
use std::io::Write;

#[derive(Debug)]
pub struct LineCappedWriter<W: Write> {
    inner: W,
    max_lines: usize,
    lines: usize,
}

impl<W: Write> LineCappedWriter<W> {
    pub fn new(inner: W, max_lines: usize) -> Self {
        LineCappedWriter {
            inner,
            max_lines,
            lines: 0,
        }
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn is_capped(&self) -> bool {
        self.lines >= self.max_lines
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LineCappedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.is_capped() {
            return Ok(buf.len());
        }

        // Cut right after the newline that completes the last allowed line.
        let room = self.max_lines - self.lines;
        let mut end = buf.len();
        let mut seen = 0;
        for (i, b) in buf.iter().enumerate() {
            if *b == b'\n' {
                seen += 1;
                if seen == room {
                    end = i + 1;
                    break;
                }
            }
        }

        self.inner.write_all(&buf[..end])?;
        self.lines += seen;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_lines_past_cap() {
        let mut w = LineCappedWriter::new(Vec::new(), 2);
        writeln!(w, "one").unwrap();
        write!(w, "tw").unwrap();
        writeln!(w, "o").unwrap();
        writeln!(w, "three").unwrap();
        assert!(w.is_capped());
        assert_eq!(w.lines_written(), 2);
        assert_eq!(w.into_inner(), b"one\ntwo\n");
    }

    #[test]
    fn test_cuts_chunk_at_boundary() {
        let mut w = LineCappedWriter::new(Vec::new(), 2);
        w.write_all(b"a\nb\nc\nd\n").unwrap();
        assert_eq!(w.into_inner(), b"a\nb\n");
    }

    #[test]
    fn test_zero_cap_writes_nothing() {
        let mut w = LineCappedWriter::new(Vec::new(), 0);
        writeln!(w, "dropped").unwrap();
        assert!(w.into_inner().is_empty());
    }

    #[test]
    fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.log");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut w = LineCappedWriter::new(io::BufWriter::new(file), 3);
            for i in 0..10 {
                writeln!(w, "line {}", i).unwrap();
            }
            w.flush().unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.lines().last(), Some("line 2"));
    }
}
