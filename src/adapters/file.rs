use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

use super::{canonical_dir, location, Adapter, AdapterFactory, OpenHandles};
use crate::{KeyvError, Result};

/// Stale bytes tolerated before the log is compacted.
const COMPACTION_THRESHOLD: u64 = 1024 * 1024;

/// A record appended to the log.
#[derive(Serialize, Deserialize, Debug)]
enum Record {
    Set { key: String, value: String },
    Remove { key: String },
}

/// Location of a `Set` record in the log.
#[derive(Debug, Clone, Copy)]
struct RecordPos {
    gen: u64,
    pos: u64,
    len: u64,
}

type Index = HashMap<String, RecordPos>;

/// A log-structured adapter storing values in `<gen>.log` files.
///
/// Every write appends a JSON record to the active generation and
/// updates an in-memory index of key to record position. The log is
/// replayed on open. Once more than [`COMPACTION_THRESHOLD`] bytes are
/// stale, live records are copied into a fresh generation and older
/// files are deleted.
///
/// Writes are serialized by a mutex; lookups only take the index read
/// lock and a separate reader cache.
pub struct FileAdapter {
    dir: PathBuf,
    index: RwLock<Index>,
    writer: Mutex<LogWriter>,
    readers: LogReaders,
}

/// Writer-side state.
struct LogWriter {
    current_gen: u64,
    log: BufWriterWithPos<File>,
    /// Readers over every live generation, used to copy records during compaction.
    readers: HashMap<u64, BufReader<File>>,
    /// Bytes of records superseded by later writes.
    uncompacted: u64,
}

/// Lazily opened read handles for lookups.
struct LogReaders {
    /// Lowest generation still on disk.
    safe_point: AtomicU64,
    handles: Mutex<HashMap<u64, BufReader<File>>>,
}

impl LogReaders {
    fn read_value(&self, dir: &Path, pos: RecordPos) -> Result<String> {
        let safe_point = self.safe_point.load(Ordering::Acquire);
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|&gen, _| gen >= safe_point);

        let reader = match handles.entry(pos.gen) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(BufReader::new(File::open(log_path(dir, pos.gen))?))
            }
        };
        reader.seek(SeekFrom::Start(pos.pos))?;
        match serde_json::from_reader(reader.take(pos.len))? {
            Record::Set { value, .. } => Ok(value),
            Record::Remove { .. } => Err(KeyvError::UnexpectedCommandType),
        }
    }
}

impl FileAdapter {
    /// Opens a `FileAdapter` in `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut readers = HashMap::new();
        let mut index = HashMap::new();
        let mut uncompacted = 0u64;

        let gen_list = sorted_gen_list(&dir)?;
        for &gen in &gen_list {
            let mut reader = BufReader::new(File::open(log_path(&dir, gen))?);
            uncompacted += load(gen, &mut reader, &mut index)?;
            readers.insert(gen, reader);
        }

        let current_gen = gen_list.last().copied().unwrap_or(0) + 1;
        let log = new_log_file(&dir, current_gen, &mut readers)?;
        info!(
            "Opened file store at {} ({} keys, generation {})",
            dir.display(),
            index.len(),
            current_gen
        );

        Ok(Self {
            dir,
            index: RwLock::new(index),
            writer: Mutex::new(LogWriter {
                current_gen,
                log,
                readers,
                uncompacted,
            }),
            readers: LogReaders {
                safe_point: AtomicU64::new(0),
                handles: Mutex::new(HashMap::new()),
            },
        })
    }

    fn append_remove(&self, writer: &mut LogWriter, key: &str) -> Result<()> {
        let record = Record::Remove {
            key: key.to_owned(),
        };
        let pos = writer.log.pos;
        serde_json::to_writer(&mut writer.log, &record)?;
        writer.log.flush()?;
        writer.uncompacted += writer.log.pos - pos;

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = index.remove(key) {
            writer.uncompacted += old.len;
        }
        Ok(())
    }

    fn maybe_compact(&self, writer: &mut LogWriter) -> Result<()> {
        if writer.uncompacted > COMPACTION_THRESHOLD {
            self.compact(writer)?;
        }
        Ok(())
    }

    /// Copies live records into a new generation and deletes older logs.
    fn compact(&self, writer: &mut LogWriter) -> Result<()> {
        let compaction_gen = writer.current_gen + 1;
        writer.current_gen += 2;
        writer.log = new_log_file(&self.dir, writer.current_gen, &mut writer.readers)?;

        let mut compacted = new_log_file(&self.dir, compaction_gen, &mut writer.readers)?;
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let mut new_pos = 0u64;
        for pos in index.values_mut() {
            let reader = writer
                .readers
                .get_mut(&pos.gen)
                .ok_or(KeyvError::LogFileNotFound(pos.gen))?;
            reader.seek(SeekFrom::Start(pos.pos))?;
            let len = io::copy(&mut reader.take(pos.len), &mut compacted)?;
            *pos = RecordPos {
                gen: compaction_gen,
                pos: new_pos,
                len,
            };
            new_pos += len;
        }
        compacted.flush()?;
        drop(index);

        let stale: Vec<u64> = writer
            .readers
            .keys()
            .filter(|&&gen| gen < compaction_gen)
            .copied()
            .collect();
        for gen in stale {
            writer.readers.remove(&gen);
            fs::remove_file(log_path(&self.dir, gen))?;
        }
        writer.uncompacted = 0;
        self.readers.safe_point.store(compaction_gen, Ordering::Release);
        debug!(
            "Compacted {} into generation {}",
            self.dir.display(),
            compaction_gen
        );
        Ok(())
    }
}

impl Adapter for FileAdapter {
    fn has(&self, key: String) -> bool {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        let pos = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied();
        match pos {
            Some(pos) => self.readers.read_value(&self.dir, pos).map(Some),
            None => Ok(None),
        }
    }

    fn set(&self, key: String, value: String) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = writer.log.pos;
        let record = Record::Set {
            key: key.clone(),
            value,
        };
        serde_json::to_writer(&mut writer.log, &record)?;
        writer.log.flush()?;
        let entry = RecordPos {
            gen: writer.current_gen,
            pos,
            len: writer.log.pos - pos,
        };

        let previous = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        if let Some(old) = previous {
            writer.uncompacted += old.len;
        }
        self.maybe_compact(&mut writer)
    }

    fn remove(&self, key: String) -> Result<()> {
        // The writer lock is held across the existence check so a
        // concurrent remove cannot log the same key twice.
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.has(key.clone()) {
            return Ok(());
        }
        self.append_remove(&mut writer, &key)?;
        self.maybe_compact(&mut writer)
    }

    fn clear(&self, prefix: String) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let doomed: Vec<String> = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        debug!("Clearing {} keys under {:?}", doomed.len(), prefix);
        for key in &doomed {
            self.append_remove(&mut writer, key)?;
        }
        self.maybe_compact(&mut writer)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        Ok(index.keys().cloned().collect())
    }
}

/// Factory for `file://<dir>` connection strings.
///
/// A directory is only ever opened once per factory: connections to the
/// same directory share one [`FileAdapter`] while any of them is alive.
/// Separate processes must not open one directory concurrently.
#[derive(Default)]
pub struct FileFactory {
    open: OpenHandles<PathBuf, FileAdapter>,
}

impl FileFactory {
    /// Scheme this factory is registered under by default.
    pub const SCHEME: &'static str = "file";
}

impl AdapterFactory for FileFactory {
    fn connect(&self, uri: &str) -> Result<Box<dyn Adapter>> {
        let dir = canonical_dir(uri, location(uri)?)?;
        let adapter = self.open.get_or_open(dir.clone(), || {
            FileAdapter::open(dir).map_err(|e| KeyvError::connection_failed(uri, e))
        })?;
        Ok(Box::new(adapter))
    }
}

/// Returns the sorted generation numbers of the log files in `dir`.
fn sorted_gen_list(dir: &Path) -> Result<Vec<u64>> {
    let mut gen_list: Vec<u64> = fs::read_dir(dir)?
        .flat_map(|res| -> Result<_> { Ok(res?.path()) })
        .filter(|path| path.is_file() && path.extension() == Some("log".as_ref()))
        .filter_map(|path| {
            path.file_name()
                .and_then(OsStr::to_str)
                .map(|s| s.trim_end_matches(".log"))
                .map(str::parse::<u64>)
        })
        .flatten()
        .collect();
    gen_list.sort_unstable();
    Ok(gen_list)
}

/// Replays one log file into `index`, returning its stale byte count.
fn load(gen: u64, reader: &mut BufReader<File>, index: &mut Index) -> Result<u64> {
    let mut pos = reader.seek(SeekFrom::Start(0))?;
    let mut stream = Deserializer::from_reader(reader).into_iter::<Record>();
    let mut uncompacted = 0u64;

    while let Some(record) = stream.next() {
        let new_pos = stream.byte_offset() as u64;
        match record? {
            Record::Set { key, .. } => {
                let entry = RecordPos {
                    gen,
                    pos,
                    len: new_pos - pos,
                };
                if let Some(old) = index.insert(key, entry) {
                    uncompacted += old.len;
                }
            }
            Record::Remove { key } => {
                if let Some(old) = index.remove(&key) {
                    uncompacted += old.len;
                }
                uncompacted += new_pos - pos;
            }
        }
        pos = new_pos;
    }

    Ok(uncompacted)
}

/// Creates the log file for `gen` and registers a reader for it.
fn new_log_file(
    dir: &Path,
    gen: u64,
    readers: &mut HashMap<u64, BufReader<File>>,
) -> Result<BufWriterWithPos<File>> {
    let path = log_path(dir, gen);
    let writer = BufWriterWithPos::new(
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?,
    )?;
    readers.insert(gen, BufReader::new(File::open(&path)?));
    Ok(writer)
}

fn log_path(dir: &Path, gen: u64) -> PathBuf {
    dir.join(format!("{gen}.log"))
}

struct BufWriterWithPos<W: Write + Seek> {
    writer: BufWriter<W>,
    pos: u64,
}

impl<W: Write + Seek> BufWriterWithPos<W> {
    fn new(mut inner: W) -> Result<Self> {
        let pos = inner.seek(SeekFrom::End(0))?;
        Ok(Self {
            writer: BufWriter::new(inner),
            pos,
        })
    }
}

impl<W: Write + Seek> Write for BufWriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.writer.write(buf)?;
        self.pos += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write + Seek> Seek for BufWriterWithPos<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.writer.seek(pos)?;
        Ok(self.pos)
    }
}
