//! Binary persistence for the registry and the waiting queue.
//!
//! State is kept in two files under [`CoreConfig::data_dir`]:
//!
//! ```text
//! data/
//! ├── registry.bin   # every registered patient
//! └── queue.bin      # patients waiting to be called, in dispatch order
//! ```
//!
//! # Framing
//!
//! Every integer is a little-endian `u32`. Every text field is `[u32 byte length][UTF-8 bytes]`
//! with no terminator. Both files open with a header:
//!
//! ```text
//! [4 bytes magic][u32 format version][u32 record count]
//! ```
//!
//! Registry record: `id`, `name`, `u32 history count`, each procedure oldest first, then the
//! last ticket as `u32 0` (never triaged) or `u32 1`, `u32 level`, `u32 ticket sequence`.
//!
//! Queue record: `id`, `u32 level`, `u32 ticket sequence`.
//!
//! # Save
//!
//! Both files are encoded in memory first: the queue in dispatch order, the registry smallest
//! CPF first. Each is written to a temporary sibling, then the queue and finally the registry are
//! renamed into place. Only once both renames succeed are the registry and the queue emptied, so
//! a failed save leaves the in-memory state untouched.
//!
//! # Load
//!
//! The registry file is read first so queue records can be resolved against it. A missing file
//! means there is nothing to load. A malformed record stops the read of that file; records
//! decoded before it are kept and the problem is listed in the [`LoadReport`]. Well-formed records
//! that cannot be applied (duplicate CPF, queued patient that is not registered) are skipped
//! one at a time.

use crate::config::CoreConfig;
use crate::constants::{FORMAT_VERSION, HISTORY_CAPACITY, QUEUE_MAGIC, REGISTRY_MAGIC};
use crate::dispatch::DispatchQueue;
use crate::patient::Patient;
use crate::registry::Registry;
use crate::ticket::{Level, Ticket};
use crate::{TriageError, TriageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use triage_cpf::Cpf;

const HEADER_LEN: usize = 12;

/// Counts written by a successful save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub patients: usize,
    pub queued: usize,
}

/// Outcome of a load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Patients inserted into the registry.
    pub patients: usize,
    /// Patients restored to the waiting queue.
    pub queued: usize,
    /// Records that were skipped and files whose read was cut short.
    pub problems: Vec<TriageError>,
}

impl LoadReport {
    /// True if every record in both files was applied.
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Writes `queue` and `registry` to the files named by `cfg`, then empties both.
///
/// # Errors
///
/// - [`TriageError::DataDirCreation`] if the data directory cannot be created,
/// - [`TriageError::FileWrite`] if either file cannot be written,
/// - [`TriageError::Allocation`] if the encode buffers cannot grow.
///
/// On error neither structure is modified.
pub fn save(
    registry: &mut Registry,
    queue: &mut DispatchQueue,
    cfg: &CoreConfig,
) -> TriageResult<SaveReport> {
    let (queue_bytes, queued) = encode_queue(queue, registry)?;
    let (registry_bytes, patients) = encode_registry(registry)?;

    if let Err(err) = write_artifacts(cfg, &registry_bytes, &queue_bytes) {
        tracing::warn!("save failed, in-memory state kept: {}", err);
        return Err(err);
    }

    queue.clear();
    registry.clear();

    tracing::info!(
        "saved {} patients and {} queued to {}",
        patients,
        queued,
        cfg.data_dir().display()
    );
    Ok(SaveReport { patients, queued })
}

/// Rebuilds `registry` and then `queue` from the files named by `cfg`.
///
/// Both structures are expected to be empty; loaded records are added to whatever they hold.
///
/// # Errors
///
/// Returns [`TriageError::FileRead`] if a file exists but cannot be read. Corrupt content is not
/// an error; it is reported through [`LoadReport::problems`].
pub fn load(
    registry: &mut Registry,
    queue: &mut DispatchQueue,
    cfg: &CoreConfig,
) -> TriageResult<LoadReport> {
    let mut report = LoadReport::default();

    let registry_path = cfg.registry_path();
    if let Some(bytes) = read_optional(&registry_path)? {
        decode_registry(&bytes, &registry_path, registry, &mut report);
    }
    for ticket in registry.iter().filter_map(Patient::ticket) {
        queue.observe(ticket);
    }

    let queue_path = cfg.queue_path();
    if let Some(bytes) = read_optional(&queue_path)? {
        decode_queue(&bytes, &queue_path, registry, queue, &mut report);
    }

    tracing::info!(
        "loaded {} patients and {} queued from {} ({} problems)",
        report.patients,
        report.queued,
        cfg.data_dir().display(),
        report.problems.len()
    );
    Ok(report)
}

fn read_optional(path: &Path) -> TriageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(TriageError::FileRead(err)),
    }
}

/// Writes both temporary files before renaming either, so a failed write leaves the previous
/// pair of files in place.
fn write_artifacts(cfg: &CoreConfig, registry_bytes: &[u8], queue_bytes: &[u8]) -> TriageResult<()> {
    fs::create_dir_all(cfg.data_dir()).map_err(TriageError::DataDirCreation)?;

    let registry_path = cfg.registry_path();
    let queue_path = cfg.queue_path();
    let registry_tmp = registry_path.with_extension("tmp");
    let queue_tmp = queue_path.with_extension("tmp");

    let written = fs::write(&registry_tmp, registry_bytes)
        .and_then(|()| fs::write(&queue_tmp, queue_bytes));
    if let Err(err) = written {
        let _ = fs::remove_file(&registry_tmp);
        let _ = fs::remove_file(&queue_tmp);
        return Err(TriageError::FileWrite(err));
    }

    fs::rename(&queue_tmp, &queue_path).map_err(TriageError::FileWrite)?;
    fs::rename(&registry_tmp, &registry_path).map_err(TriageError::FileWrite)
}

fn encode_queue(queue: &DispatchQueue, registry: &Registry) -> TriageResult<(Vec<u8>, usize)> {
    let mut writer = Writer::with_header(QUEUE_MAGIC)?;
    for (level, id) in queue.iter() {
        let Some(patient) = registry.get(id) else {
            tracing::warn!(cpf = %id, "queued patient is no longer registered, not saved");
            continue;
        };
        let sequence = patient.ticket().map_or(0, |ticket| ticket.sequence());

        writer.put_str(id.as_str())?;
        writer.put_u32(level.index() as u32)?;
        writer.put_u32(sequence)?;
        writer.records += 1;
    }
    Ok(writer.finish())
}

fn encode_registry(registry: &Registry) -> TriageResult<(Vec<u8>, usize)> {
    let mut writer = Writer::with_header(REGISTRY_MAGIC)?;
    for patient in registry {
        writer.put_str(patient.id().as_str())?;
        writer.put_str(patient.name())?;
        writer.put_u32(patient.history().len() as u32)?;
        for procedure in patient.history().oldest_first() {
            writer.put_str(procedure)?;
        }
        match patient.ticket() {
            Some(ticket) => {
                writer.put_u32(1)?;
                writer.put_u32(ticket.level().index() as u32)?;
                writer.put_u32(ticket.sequence())?;
            }
            None => writer.put_u32(0)?,
        }
        writer.records += 1;
    }
    Ok(writer.finish())
}

fn decode_registry(bytes: &[u8], path: &Path, registry: &mut Registry, report: &mut LoadReport) {
    let mut reader = Reader::new(bytes);
    let count = match reader.header(REGISTRY_MAGIC) {
        Ok(count) => count,
        Err(reason) => return report.corrupt(path, 0, reason),
    };

    for record in 1..=count as usize {
        let patient = match read_patient(&mut reader) {
            Ok(patient) => patient,
            Err(reason) => return report.corrupt(path, record, reason),
        };
        match registry.insert(patient) {
            Ok(()) => report.patients += 1,
            Err(err) => report.skip(path, record, err),
        }
    }

    if !reader.is_at_end() {
        report.corrupt(path, count as usize + 1, "unexpected bytes after last record");
    }
}

fn decode_queue(
    bytes: &[u8],
    path: &Path,
    registry: &mut Registry,
    queue: &mut DispatchQueue,
    report: &mut LoadReport,
) {
    let mut reader = Reader::new(bytes);
    let count = match reader.header(QUEUE_MAGIC) {
        Ok(count) => count,
        Err(reason) => return report.corrupt(path, 0, reason),
    };

    for record in 1..=count as usize {
        let (id, ticket) = match read_queue_entry(&mut reader) {
            Ok(entry) => entry,
            Err(reason) => return report.corrupt(path, record, reason),
        };
        let Some(patient) = registry.get_mut(&id) else {
            report.skip(path, record, TriageError::PatientNotFound(id));
            continue;
        };
        match queue.restore(patient, ticket) {
            Ok(()) => report.queued += 1,
            Err(err) => report.skip(path, record, err),
        }
    }

    if !reader.is_at_end() {
        report.corrupt(path, count as usize + 1, "unexpected bytes after last record");
    }
}

fn read_patient(reader: &mut Reader<'_>) -> Result<Patient, String> {
    let id = Cpf::parse(&reader.string()?).map_err(|e| e.to_string())?;
    let name = reader.string()?;
    let mut patient = Patient::new(id, &name).map_err(|e| e.to_string())?;

    let entries = reader.u32()? as usize;
    if entries > HISTORY_CAPACITY {
        return Err(format!(
            "history has {entries} entries, the limit is {HISTORY_CAPACITY}"
        ));
    }
    for _ in 0..entries {
        let procedure = reader.string()?;
        patient
            .history_mut()
            .push(&procedure)
            .map_err(|e| e.to_string())?;
    }

    match reader.u32()? {
        0 => {}
        1 => {
            let ticket = read_ticket(reader)?;
            patient.restore_ticket(ticket);
        }
        flag => return Err(format!("ticket flag {flag} is neither 0 nor 1")),
    }
    Ok(patient)
}

fn read_ticket(reader: &mut Reader<'_>) -> Result<Ticket, String> {
    let level = reader.u32()?;
    let level = Level::from_index(level as usize)
        .ok_or_else(|| format!("level {level} is out of range"))?;
    let sequence = reader.u32()?;
    Ok(Ticket::new(level, sequence))
}

fn read_queue_entry(reader: &mut Reader<'_>) -> Result<(Cpf, Ticket), String> {
    let id = Cpf::parse(&reader.string()?).map_err(|e| e.to_string())?;
    let ticket = read_ticket(reader)?;
    Ok((id, ticket))
}

impl LoadReport {
    fn corrupt(&mut self, path: &Path, record: usize, reason: impl Into<String>) {
        let err = TriageError::CorruptArtifact {
            path: path.to_path_buf(),
            record,
            reason: reason.into(),
        };
        tracing::warn!("{}; ignoring the rest of the file", err);
        self.problems.push(err);
    }

    fn skip(&mut self, path: &Path, record: usize, err: TriageError) {
        tracing::warn!("skipping record {} of {}: {}", record, path.display(), err);
        self.problems.push(err);
    }
}

struct Writer {
    buf: Vec<u8>,
    records: u32,
}

impl Writer {
    fn with_header(magic: [u8; 4]) -> TriageResult<Self> {
        let mut writer = Self {
            buf: Vec::new(),
            records: 0,
        };
        writer.put_bytes(&magic)?;
        writer.put_u32(FORMAT_VERSION)?;
        // record count, patched in finish()
        writer.put_u32(0)?;
        Ok(writer)
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> TriageResult<()> {
        self.buf.try_reserve(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn put_u32(&mut self, value: u32) -> TriageResult<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    fn put_str(&mut self, value: &str) -> TriageResult<()> {
        self.put_u32(value.len() as u32)?;
        self.put_bytes(value.as_bytes())
    }

    fn finish(mut self) -> (Vec<u8>, usize) {
        self.buf[8..HEADER_LEN].copy_from_slice(&self.records.to_le_bytes());
        (self.buf, self.records as usize)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let remaining = self.bytes.len() - self.pos;
        if len > remaining {
            return Err(format!(
                "needed {len} bytes at offset {}, only {remaining} left",
                self.pos
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, String> {
        let raw = self.take(4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(raw);
        Ok(u32::from_le_bytes(word))
    }

    fn string(&mut self) -> Result<String, String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| format!("invalid UTF-8: {e}"))
    }

    /// Checks magic and version, returns the record count.
    fn header(&mut self, magic: [u8; 4]) -> Result<u32, String> {
        let found = self.take(4)?;
        if found != magic {
            return Err(format!(
                "bad magic {:?}, expected {:?}",
                String::from_utf8_lossy(found),
                String::from_utf8_lossy(&magic)
            ));
        }
        let version = self.u32()?;
        if version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            ));
        }
        self.u32()
    }
}
