//! Lazy reader over gzip-compressed NDJSON files.
//!
//! Yields one `Result<Record, ReadError>` per non-empty line, in file order
//! and then line order. A bad line or a bad file is reported once and the
//! stream moves on; it never stops early on its own.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use thiserror::Error;

use crate::record::Record;

const READ_BUFFER: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to initialise gzip stream for {}: {source}", path.display())]
    Decompress {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("read error in {} after line {line}: {source}", path.display())]
    Read {
        path: PathBuf,
        line: usize,
        source: std::io::Error,
    },

    #[error("invalid JSON in {} line {line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

impl ReadError {
    pub fn path(&self) -> &Path {
        match self {
            ReadError::Open { path, .. }
            | ReadError::Decompress { path, .. }
            | ReadError::Read { path, .. }
            | ReadError::Parse { path, .. } => path,
        }
    }
}

struct OpenFile {
    path: PathBuf,
    reader: BufReader<MultiGzDecoder<File>>,
    line: usize,
    buf: Vec<u8>,
}

impl OpenFile {
    fn open(path: PathBuf) -> Result<Self, ReadError> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(source) => return Err(ReadError::Open { path, source }),
        };
        let mut reader = BufReader::with_capacity(READ_BUFFER, MultiGzDecoder::new(file));

        // Pull the first block so a missing or corrupt gzip header is reported
        // as a file-level failure instead of as a bogus line.
        if let Err(source) = reader.fill_buf() {
            return Err(ReadError::Decompress { path, source });
        }

        Ok(Self {
            path,
            reader,
            line: 0,
            buf: Vec::with_capacity(4096),
        })
    }

    /// Next non-empty line parsed as a record, `None` at end of file.
    fn next_record(&mut self) -> Option<Result<Record, ReadError>> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    if self.buf.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(serde_json::from_slice::<Record>(&self.buf).map_err(|source| {
                        ReadError::Parse {
                            path: self.path.clone(),
                            line: self.line,
                            source,
                        }
                    }));
                }
                Err(source) => {
                    return Some(Err(ReadError::Read {
                        path: self.path.clone(),
                        line: self.line,
                        source,
                    }))
                }
            }
        }
    }
}

type FileHook = Box<dyn FnMut(&Path) + Send>;

/// Sequential record stream over a list of `.gz` files.
///
/// Dropping the stream closes the file it is currently reading; files are
/// opened one at a time, so nothing else is held open.
pub struct RecordStream<I> {
    paths: I,
    current: Option<OpenFile>,
    on_file_done: Option<FileHook>,
}

impl<I, P> RecordStream<I>
where
    I: Iterator<Item = P>,
    P: AsRef<Path>,
{
    pub fn new<T>(paths: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            paths: paths.into_iter(),
            current: None,
            on_file_done: None,
        }
    }

    /// Called with each path once the stream is finished with it, whether it
    /// was read to the end or failed.
    pub fn on_file_done(mut self, hook: impl FnMut(&Path) + Send + 'static) -> Self {
        self.on_file_done = Some(Box::new(hook));
        self
    }

    fn file_done(&mut self, path: &Path) {
        if let Some(hook) = self.on_file_done.as_mut() {
            hook(path);
        }
    }
}

impl<I, P> Iterator for RecordStream<I>
where
    I: Iterator<Item = P>,
    P: AsRef<Path>,
{
    type Item = Result<Record, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.current.as_mut() {
                match file.next_record() {
                    Some(Err(err @ ReadError::Read { .. })) => {
                        // The decoder cannot resynchronise after a stream error.
                        if let Some(file) = self.current.take() {
                            self.file_done(&file.path);
                        }
                        return Some(Err(err));
                    }
                    Some(item) => return Some(item),
                    None => {
                        if let Some(file) = self.current.take() {
                            self.file_done(&file.path);
                        }
                    }
                }
            }

            let path = self.paths.next()?.as_ref().to_path_buf();
            match OpenFile::open(path.clone()) {
                Ok(file) => self.current = Some(file),
                Err(err) => {
                    self.file_done(&path);
                    return Some(Err(err));
                }
            }
        }
    }
}
