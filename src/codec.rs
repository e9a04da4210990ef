//! Line-oriented record encoding shared by every on-disk file of a run.
//!
//! A record is written as `"<key> <value>\n"`: a single space, no quoting.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};

use crate::error::{Error, IoContext, Result};
use crate::Record;

/// Appends the encoded form of `record` to `buf`.
pub fn encode_into(record: &Record, buf: &mut BytesMut) {
    buf.put_slice(record.key.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(record.value.to_string().as_bytes());
    buf.put_u8(b'\n');
}

/// Number of bytes `record` occupies on disk, terminator included.
pub fn encoded_len(record: &Record) -> u64 {
    (record.key.len() + record.value.to_string().len() + 2) as u64
}

/// Parses one line (without its terminator).
///
/// Returns [`None`] unless the line is exactly a valid key, one space and an
/// integer.
pub fn decode_line(line: &str) -> Option<Record> {
    let (key, value) = line.split_once(' ')?;
    let record = Record::new(key, value.parse().ok()?);
    record.has_valid_key().then_some(record)
}

/// Buffered writer that tracks how many bytes it has produced.
pub struct RecordWriter {
    path: PathBuf,
    out: BufWriter<File>,
    buf: BytesMut,
    written: u64,
    records: u64,
}

impl RecordWriter {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).with_path(&path)?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            buf: BytesMut::with_capacity(64),
            written: 0,
            records: 0,
        })
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        encode_into(record, &mut self.buf);
        self.out.write_all(&self.buf).with_path(&self.path)?;
        self.written += self.buf.len() as u64;
        self.records += 1;
        self.buf.clear();
        Ok(())
    }

    /// Bytes written so far, equal to the file size once flushed.
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    #[inline]
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flushes the file and returns the number of bytes written.
    pub fn finish(mut self) -> Result<u64> {
        self.out.flush().with_path(&self.path)?;
        Ok(self.written)
    }
}

/// Reads records back one line at a time.
///
/// [`RecordReader::next_record`] distinguishes the three cursor states
/// explicitly: `Ok(Some(_))` holds a record, `Ok(None)` means the input is
/// exhausted and `Err(_)` reports an unreadable or malformed line.
pub struct RecordReader<R = BufReader<File>> {
    path: PathBuf,
    inner: R,
    line: String,
    line_no: usize,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).with_path(&path)?;
        Ok(Self::from_reader(path, BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Wraps an arbitrary reader. `path` is only used in error reports.
    pub fn from_reader(path: impl Into<PathBuf>, inner: R) -> Self {
        Self {
            path: path.into(),
            inner,
            line: String::new(),
            line_no: 0,
        }
    }

    pub fn next_record(&mut self) -> Result<Option<Record>> {
        self.line.clear();
        let n = self.inner.read_line(&mut self.line).with_path(&self.path)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let line = self
            .line
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(&self.line);
        match decode_line(line) {
            Some(record) => Ok(Some(record)),
            None => Err(Error::MalformedRecord {
                path: self.path.clone(),
                line: self.line_no,
                content: line.to_string(),
            }),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encodes_key_space_value_newline() {
        let mut buf = BytesMut::new();
        encode_into(&Record::new("apple", 2), &mut buf);
        encode_into(&Record::new("pear", -10), &mut buf);
        assert_eq!(&buf[..], b"apple 2\npear -10\n");
        assert_eq!(encoded_len(&Record::new("apple", 2)), 8);
        assert_eq!(encoded_len(&Record::new("pear", -10)), 9);
    }

    #[test]
    fn decode_rejects_malformed_lines() {
        assert_eq!(decode_line("apple 2"), Some(Record::new("apple", 2)));
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("apple"), None);
        assert_eq!(decode_line(" 2"), None);
        assert_eq!(decode_line("apple two"), None);
        assert_eq!(decode_line("apple 2 3"), None);
    }

    #[test]
    fn reader_reports_exhaustion_separately_from_errors() {
        let data = "a 1\r\nb 2\n";
        let mut reader = RecordReader::from_reader("mem", Cursor::new(data));
        assert_eq!(reader.next_record().unwrap(), Some(Record::new("a", 1)));
        assert_eq!(reader.next_record().unwrap(), Some(Record::new("b", 2)));
        assert_eq!(reader.next_record().unwrap(), None);
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn reader_reports_line_number_of_bad_record() {
        let data = "a 1\n\nc 3\n";
        let err = RecordReader::from_reader("mem", Cursor::new(data))
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        match err {
            Error::MalformedRecord { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn writer_counts_bytes_like_the_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let mut writer = RecordWriter::create(&path).unwrap();
        writer.write(&Record::new("x", 10)).unwrap();
        writer.write(&Record::new("yy", 1)).unwrap();
        assert_eq!(writer.records_written(), 2);
        let written = writer.finish().unwrap();
        assert_eq!(written, std::fs::metadata(&path).unwrap().len());

        let back = RecordReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(back, vec![Record::new("x", 10), Record::new("yy", 1)]);
    }
}
