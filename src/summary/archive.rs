use std::collections::BTreeSet;
use std::io::{self, Cursor, Read, Seek, Write};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use zip::result::ZipResult;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Convert a chrono timestamp into a zip entry timestamp.
///
/// Zip timestamps cover 1980..=2107; anything outside falls back to the zip epoch.
pub fn zip_time<Tz: TimeZone>(time: &DateTime<Tz>) -> zip::DateTime {
    let year = u16::try_from(time.year()).unwrap_or(0);
    zip::DateTime::from_date_and_time(
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .unwrap_or_default()
}

/// Current local time as a zip timestamp.
pub fn zip_now() -> zip::DateTime {
    zip_time(&Local::now())
}

/// File modification time as a zip timestamp.
pub fn zip_system_time(time: SystemTime) -> zip::DateTime {
    zip_time(&DateTime::<Local>::from(time))
}

/// Best-effort zip writer for the summary bundle.
///
/// Failing to add one entry is logged and never stops later entries.
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: BTreeSet<String>,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            names: BTreeSet::new(),
        }
    }

    /// Names of the entries added so far, sorted.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Add an entry with the given contents.
    pub fn add_bytes(&mut self, name: &str, modified: zip::DateTime, data: &[u8]) {
        self.add_stream(name, modified, &mut Cursor::new(data));
    }

    /// Add an entry, copying its contents from `reader` without buffering it whole.
    pub fn add_stream<R: Read>(&mut self, name: &str, modified: zip::DateTime, reader: &mut R) {
        if self.names.contains(name) {
            tracing::warn!(entry = name, "Duplicate archive entry, skipping");
            return;
        }

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(modified);

        if let Err(err) = self.zip.start_file(name, options) {
            tracing::error!(entry = name, error = %err, "Cannot add archive entry");
            return;
        }
        self.names.insert(name.to_string());

        if let Err(err) = io::copy(reader, &mut self.zip) {
            tracing::error!(entry = name, error = %err, "Cannot write archive entry");
        }
    }

    /// Copy every file of an in-memory zip archive under `prefix/`,
    /// keeping each file's modification time.
    ///
    /// Returns the number of entries copied; fails only if `data` is not a zip archive.
    pub fn add_zip(&mut self, prefix: &str, data: &[u8]) -> ZipResult<usize> {
        let mut source = ZipArchive::new(Cursor::new(data))?;
        let mut copied = 0;

        for i in 0..source.len() {
            let mut file = match source.by_index(i) {
                Ok(file) => file,
                Err(err) => {
                    tracing::error!(index = i, error = %err, "Cannot open file in zip archive");
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }

            let name = join_entry_name(prefix, file.name());
            let modified = file.last_modified();
            self.add_stream(&name, modified, &mut file);
            copied += 1;
        }

        Ok(copied)
    }

    /// Write the central directory and return the underlying writer.
    pub fn finish(mut self) -> ZipResult<W> {
        self.zip.finish()
    }
}

fn join_entry_name(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
