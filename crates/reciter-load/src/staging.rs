//! Staging files: one CSV per table, digested while it is written

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use reciter_transform::RowSet;

/// A staging file on disk.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    /// BLAKE3 hex digest of the file content
    pub digest: String,
    pub rows: usize,
}

/// Writer adapter that hashes every byte passed through.
struct HashingWriter<W> {
    inner: W,
    hasher: blake3::Hasher,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Write `rows` as `<dir>/<table>.csv` (header first, RFC 4180 quoting).
///
/// The file is written to a temporary name and renamed into place, so a
/// crash never leaves a truncated staging file behind.
pub fn write(dir: &Path, rows: &RowSet) -> io::Result<StagedFile> {
    let path = dir.join(format!("{}.csv", rows.table()));
    let tmp = dir.join(format!("{}.csv.tmp", rows.table()));

    let file = File::create(&tmp)?;
    let hashing = HashingWriter {
        inner: BufWriter::new(file),
        hasher: blake3::Hasher::new(),
    };
    let mut writer = csv::Writer::from_writer(hashing);
    writer.write_record(rows.header())?;
    for row in rows.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    let mut hashing = writer.into_inner().map_err(|e| e.into_error())?;
    hashing.flush()?;
    let digest = hashing.hasher.finalize().to_hex().to_string();
    drop(hashing);

    fs::rename(&tmp, &path)?;
    Ok(StagedFile {
        path,
        digest,
        rows: rows.len(),
    })
}
