// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-topic append-only persistence of received messages.
//!
//! Each run writes into a fresh directory named after the local start time. Every topic
//! gets its own file, opened lazily on its first message and kept open for the rest of
//! the run. Messages are written unbuffered, one line each.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use tracing::{debug, info};
use ustr::Ustr;

use crate::constants::RUN_DIR_FORMAT;
use crate::errors::SinkError;
use crate::util::output_file_name;

/// Destination for routed messages.
pub trait MessageSink: Send {
    fn write(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError>;
}

pub struct PersistentSink {
    run_dir: PathBuf,
    files: HashMap<Ustr, File, FnvBuildHasher>,
}

impl PersistentSink {
    /// Creates a run directory below `output_root`, named after the current local time.
    pub fn create(output_root: &Path) -> Result<Self, SinkError> {
        let name = chrono::Local::now().format(RUN_DIR_FORMAT).to_string();
        Self::create_named(output_root, &name)
    }

    /// Creates `output_root/name`, appending `-1`, `-2`, ... while that name is taken.
    pub fn create_named(output_root: &Path, name: &str) -> Result<Self, SinkError> {
        std::fs::create_dir_all(output_root).map_err(|source| SinkError::CreateDir {
            path: output_root.to_path_buf(),
            source,
        })?;

        let mut suffix = 0u32;
        loop {
            let candidate = if suffix == 0 {
                output_root.join(name)
            } else {
                output_root.join(format!("{name}-{suffix}"))
            };
            match std::fs::create_dir(&candidate) {
                Ok(()) => {
                    info!("Writing received messages to {}", candidate.display());
                    return Ok(Self {
                        run_dir: candidate,
                        files: HashMap::with_hasher(FnvBuildHasher::default()),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Run directory {} already exists", candidate.display());
                    suffix += 1;
                }
                Err(source) => {
                    return Err(SinkError::CreateDir {
                        path: candidate,
                        source,
                    })
                }
            }
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn path_for(&self, topic: &str) -> PathBuf {
        self.run_dir.join(output_file_name(topic))
    }

    fn file_for(&mut self, topic: &str) -> io::Result<&mut File> {
        let key = Ustr::from(topic);
        if !self.files.contains_key(&key) {
            let path = self.path_for(topic);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!("Opened {} for topic {topic}", path.display());
            self.files.insert(key, file);
        }
        self.files
            .get_mut(&key)
            .ok_or_else(|| io::Error::other("output file missing after insert"))
    }
}

impl MessageSink for PersistentSink {
    fn write(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        let result = self.file_for(topic).and_then(|file| {
            let mut line = Vec::with_capacity(payload.len() + 1);
            line.extend_from_slice(payload);
            line.push(b'\n');
            file.write_all(&line)?;
            file.flush()
        });
        result.map_err(|source| SinkError::Write {
            topic: topic.to_string(),
            path: self.path_for(topic),
            source,
        })
    }
}
