// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Discovery and reading of web server log files.
//!
//! Files are found by matching their name against a glob pattern anywhere below a root
//! directory. Rotated files compressed with gzip are decompressed transparently, and all
//! files are read as one concatenated stream of lines, opening each file only when the
//! previous one is exhausted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, trace, warn};

use crate::errors::LogSourceError;

const GZIP_EXTENSION: &str = "gz";

#[derive(Debug, Clone)]
pub struct LogSource {
    root: PathBuf,
    file_pattern: String,
}

impl LogSource {
    /// `file_pattern` is matched against file names only, e.g. `access.*`.
    pub fn new(root: impl Into<PathBuf>, file_pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_pattern: file_pattern.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file below the root whose name matches the pattern, in sorted order.
    pub fn discover(&self) -> Result<Vec<PathBuf>, LogSourceError> {
        let pattern = format!(
            "{}/**/{}",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            self.file_pattern
        );
        let entries = glob::glob(&pattern).map_err(|source| LogSourceError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(path) => trace!("Ignoring non-file match {}", path.display()),
                Err(e) => warn!("Skipping unreadable log path: {e}"),
            }
        }
        debug!(
            "Found {} files matching {} under {}",
            paths.len(),
            self.file_pattern,
            self.root.display()
        );
        Ok(paths)
    }

    /// Lazily yields the lines of all discovered files, in discovery order.
    pub fn lines(&self) -> Result<Lines, LogSourceError> {
        Ok(Lines::new(self.discover()?))
    }
}

/// One line read from a log file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub path: PathBuf,
    /// 1-based physical line number within `path`, counting skipped lines.
    pub number: usize,
    pub text: String,
}

impl LogLine {
    pub fn new(path: impl Into<PathBuf>, number: usize, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            number,
            text: text.into(),
        }
    }
}

struct OpenLog {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
    line_number: usize,
}

/// Single-pass iterator over the concatenated lines of several log files.
///
/// Line terminators are stripped and lines that are not valid UTF-8 are skipped.
pub struct Lines {
    paths: std::vec::IntoIter<PathBuf>,
    current: Option<OpenLog>,
    buf: Vec<u8>,
}

impl Lines {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
            current: None,
            buf: Vec::new(),
        }
    }

    fn open_next(&mut self) -> Option<Result<(), LogSourceError>> {
        let path = self.paths.next()?;
        match open_log_file(&path) {
            Ok(reader) => {
                debug!("Reading log file {}", path.display());
                self.current = Some(OpenLog {
                    path,
                    reader,
                    line_number: 0,
                });
                Some(Ok(()))
            }
            Err(source) => Some(Err(LogSourceError::Open { path, source })),
        }
    }
}

impl Iterator for Lines {
    type Item = Result<LogLine, LogSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if let Err(e) = self.open_next()? {
                    return Some(Err(e));
                }
            }

            let log = self.current.as_mut()?;
            self.buf.clear();
            match log.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.current = None;
                }
                Ok(_) => {
                    log.line_number += 1;
                    trim_line_ending(&mut self.buf);
                    match String::from_utf8(std::mem::take(&mut self.buf)) {
                        Ok(text) => {
                            return Some(Ok(LogLine {
                                path: log.path.clone(),
                                number: log.line_number,
                                text,
                            }));
                        }
                        Err(_) => trace!(
                            "Skipping non UTF-8 line {} in {}",
                            log.line_number,
                            log.path.display()
                        ),
                    }
                }
                Err(source) => {
                    let path = log.path.clone();
                    self.current = None;
                    return Some(Err(LogSourceError::Read { path, source }));
                }
            }
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == GZIP_EXTENSION) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn trim_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gzip(path: &Path, contents: &[u8]) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(contents).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_discover_matches_names_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), "a\n").unwrap();
        std::fs::write(dir.path().join("error.log"), "e\n").unwrap();
        std::fs::create_dir(dir.path().join("old")).unwrap();
        std::fs::write(dir.path().join("old").join("access.log.1"), "b\n").unwrap();

        let paths = LogSource::new(dir.path(), "access.*").discover().unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("access.log"), PathBuf::from("old/access.log.1")]
        );
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = LogSource::new(dir.path().join("nope"), "access.*");
        assert!(source.discover().unwrap().is_empty());
        assert_eq!(source.lines().unwrap().count(), 0);
    }

    #[test]
    fn test_lines_concatenates_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), "one\r\ntwo\n").unwrap();
        write_gzip(&dir.path().join("access.log.2.gz"), b"three\nfour");

        let lines: Vec<String> = LogSource::new(dir.path(), "access.*")
            .lines()
            .unwrap()
            .map(|line| line.unwrap().text)
            .collect();
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_lines_skips_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), b"good\n\xff\xfe bad\nalso good\n").unwrap();

        let lines: Vec<String> = LogSource::new(dir.path(), "access.*")
            .lines()
            .unwrap()
            .map(|line| line.unwrap().text)
            .collect();
        assert_eq!(lines, vec!["good", "also good"]);
    }

    #[test]
    fn test_lines_number_physical_lines_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), b"\xff\n\xfe\n\xfd\nok\n").unwrap();
        std::fs::write(dir.path().join("access.log.1"), "a\nb\nc\n").unwrap();

        let lines: Vec<LogLine> = LogSource::new(dir.path(), "access.*")
            .lines()
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            lines,
            vec![
                LogLine::new(dir.path().join("access.log"), 4, "ok"),
                LogLine::new(dir.path().join("access.log.1"), 1, "a"),
                LogLine::new(dir.path().join("access.log.1"), 2, "b"),
                LogLine::new(dir.path().join("access.log.1"), 3, "c"),
            ]
        );
    }

    #[test]
    fn test_lines_reads_multi_member_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log.1.gz");
        let mut file = File::create(&path).unwrap();
        for member in [&b"one\n"[..], &b"two\n"[..]] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(member).unwrap();
            file.write_all(&encoder.finish().unwrap()).unwrap();
        }
        drop(file);

        let lines: Vec<(usize, String)> = LogSource::new(dir.path(), "access.*")
            .lines()
            .unwrap()
            .map(|line| {
                let line = line.unwrap();
                (line.number, line.text)
            })
            .collect();
        assert_eq!(lines, vec![(1, "one".to_string()), (2, "two".to_string())]);
    }

    #[test]
    fn test_lines_reports_corrupt_gzip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log.gz"), b"definitely not gzip").unwrap();

        let mut lines = LogSource::new(dir.path(), "access.*").lines().unwrap();
        assert!(matches!(
            lines.next(),
            Some(Err(LogSourceError::Read { .. }))
        ));
        assert!(lines.next().is_none());
    }
}
