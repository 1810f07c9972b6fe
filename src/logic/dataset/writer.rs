//! JSONL capture files
//!
//! One `NewCapture` per line. Used by the CLI to import benchmark data and
//! to persist live captures between runs.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;

use super::record::NewCapture;
use crate::error::Result;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

pub struct CaptureWriter {
    file: Mutex<Option<File>>,
    base_dir: PathBuf,
}

impl CaptureWriter {
    pub fn from_path(base_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            file: Mutex::new(None),
            base_dir,
        })
    }

    /// Append a capture, rotating to a new file past `MAX_FILE_SIZE`.
    pub fn append(&self, capture: &NewCapture) -> Result<()> {
        let mut guard = self.file.lock();

        if guard.is_none() {
            let file = match self.find_latest_file()? {
                Some(path) => {
                    let f = OpenOptions::new().create(true).append(true).open(&path)?;
                    if f.metadata()?.len() < MAX_FILE_SIZE {
                        f
                    } else {
                        self.create_new_file()?
                    }
                }
                None => self.create_new_file()?,
            };
            *guard = Some(file);
        }

        let should_rotate = match guard.as_ref() {
            Some(f) => f.metadata()?.len() >= MAX_FILE_SIZE,
            None => false,
        };
        if should_rotate {
            *guard = Some(self.create_new_file()?);
        }

        if let Some(file) = guard.as_mut() {
            let json = serde_json::to_string(capture)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    /// All `.jsonl` files in name (= creation time) order.
    pub fn files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.base_dir)?
            .filter_map(|res| res.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "jsonl"))
            .collect::<Vec<_>>();
        entries.sort();
        Ok(entries)
    }

    fn create_new_file(&self) -> io::Result<File> {
        let filename = format!("captures-{}.jsonl", Utc::now().format("%Y-%m-%d-%H%M%S%3f"));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.base_dir.join(filename))
    }

    fn find_latest_file(&self) -> io::Result<Option<PathBuf>> {
        Ok(self.files()?.pop())
    }
}

/// Read every capture from a JSONL file. Blank lines are skipped; a
/// malformed line is an error.
pub fn read_captures(path: &Path) -> Result<Vec<NewCapture>> {
    let reader = BufReader::new(File::open(path)?);
    let mut captures = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        captures.push(serde_json::from_str(&line)?);
    }

    log::debug!("Read {} captures from {}", captures.len(), path.display());
    Ok(captures)
}
