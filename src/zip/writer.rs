//! In-memory ZIP archive builder.
//!
//! Entries are written with the STORED method only, with zeroed timestamps,
//! so identical input always produces identical bytes.
//!
//! ## Building Strategy
//!
//! 1. Drop entries without a path or data
//! 2. Measure every entry (CRC, header lengths, offsets) and check that each
//!    value fits its ZIP32 field
//! 3. Allocate one buffer of the exact archive size
//! 4. Write all local headers with their data, then all central directory
//!    records, then the EOCD
//!
//! Nothing is written until step 2 has succeeded for every entry, so an
//! overflow never leaves a partial archive behind.

use log::{debug, trace, warn};
use std::io::{self, Write};

use crate::error::{Result, ZipError};

use super::crc::crc32;
use super::structures::*;

/// A named byte buffer to be archived.
///
/// Entries with an empty `path` or no `data` are skipped by [`build_zip`].
/// Paths are stored exactly as given; sanitizing them and avoiding duplicates
/// is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub data: Option<Vec<u8>>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: Some(data.into()),
        }
    }

    /// Whether the entry will be included in an archive.
    pub fn is_valid(&self) -> bool {
        !self.path.is_empty() && self.data.is_some()
    }

    fn parts(&self) -> Option<(&str, &[u8])> {
        match &self.data {
            Some(data) if !self.path.is_empty() => Some((self.path.as_str(), data.as_slice())),
            _ => None,
        }
    }
}

/// Convert a length or offset to a 4-byte header field.
///
/// `0xFFFFFFFF` is refused along with anything larger, since readers take it
/// as a pointer into a ZIP64 record.
pub(crate) fn field_u32(value: u64) -> Option<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&v| v != ZIP64_MARKER_U32)
}

/// Headers for one entry, measured and validated against ZIP32 limits.
///
/// Construction computes the CRC and checks every field width; writing
/// afterwards cannot overflow.
#[derive(Debug, Clone)]
pub struct EntryHeaders<'a> {
    file_name: &'a [u8],
    data: &'a [u8],
    crc32: u32,
    size: u32,
    offset: u32,
}

impl<'a> EntryHeaders<'a> {
    /// Prepare the headers for `data` stored under `path`, whose local
    /// header starts `offset` bytes into the archive.
    pub fn new(path: &'a str, data: &'a [u8], offset: u64) -> Result<Self> {
        let file_name = encode_path(path);
        if file_name.len() > u16::MAX as usize {
            return Err(ZipError::PathTooLong {
                path: path.to_string(),
                len: file_name.len(),
            });
        }

        let size = field_u32(data.len() as u64).ok_or_else(|| ZipError::EntryTooLarge {
            path: path.to_string(),
            size: data.len() as u64,
        })?;
        let offset = field_u32(offset).ok_or(ZipError::ArchiveTooLarge { offset })?;

        Ok(Self {
            file_name,
            data,
            crc32: crc32(data),
            size,
            offset,
        })
    }

    fn local_header(&self) -> LocalFileHeader<'a> {
        LocalFileHeader {
            crc32: self.crc32,
            size: self.size,
            file_name: self.file_name,
        }
    }

    fn central_header(&self) -> CentralDirectoryHeader<'a> {
        CentralDirectoryHeader {
            crc32: self.crc32,
            size: self.size,
            lfh_offset: self.offset,
            file_name: self.file_name,
        }
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Offset of the local header from the start of the archive.
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    /// Length of the local header plus the entry data.
    pub fn local_len(&self) -> usize {
        self.local_header().encoded_len() + self.data.len()
    }

    pub fn central_len(&self) -> usize {
        self.central_header().encoded_len()
    }

    /// Offset at which the next entry's local header starts.
    pub fn next_offset(&self) -> u64 {
        self.offset() + self.local_len() as u64
    }

    /// Write the local header followed by the raw data.
    pub fn write_local<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.local_header().write_to(out)?;
        out.write_all(self.data)
    }

    pub fn write_central<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.central_header().write_to(out)
    }

    /// Build the local segment and the central directory record as
    /// separate buffers.
    pub fn to_segments(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut local = Vec::with_capacity(self.local_len());
        self.write_local(&mut local)?;
        let mut central = Vec::with_capacity(self.central_len());
        self.write_central(&mut central)?;
        Ok((local, central))
    }
}

/// Collects entries in order and lays them out into a single archive.
#[derive(Debug, Default)]
pub struct ArchiveAssembler<'a> {
    entries: Vec<EntryHeaders<'a>>,
    /// Bytes taken by local headers and data so far.
    local_size: u64,
    central_size: u64,
}

impl<'a> ArchiveAssembler<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Append an entry after those already pushed.
    pub fn push(&mut self, path: &'a str, data: &'a [u8]) -> Result<()> {
        let count = self.entries.len() + 1;
        if count >= ZIP64_MARKER_U16 as usize {
            return Err(ZipError::TooManyEntries { count });
        }

        let headers = EntryHeaders::new(path, data, self.local_size)?;
        trace!(
            "entry {:?}: {} bytes at offset {}, crc {:08x}",
            path,
            data.len(),
            headers.offset(),
            headers.crc32()
        );

        self.local_size = headers.next_offset();
        self.central_size += headers.central_len() as u64;
        self.entries.push(headers);
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Total size of the finished archive in bytes.
    pub fn archive_size(&self) -> u64 {
        self.local_size + self.central_size + EndOfCentralDirectory::SIZE as u64
    }

    /// Write every record into one buffer and append the EOCD.
    pub fn finish(self) -> Result<Archive> {
        let cd_offset = field_u32(self.local_size).ok_or(ZipError::ArchiveTooLarge {
            offset: self.local_size,
        })?;
        let cd_size = field_u32(self.central_size).ok_or(ZipError::ArchiveTooLarge {
            offset: self.local_size + self.central_size,
        })?;
        let total = usize::try_from(self.archive_size()).map_err(|_| {
            ZipError::ArchiveTooLarge {
                offset: self.archive_size(),
            }
        })?;

        let mut bytes = Vec::with_capacity(total);
        for entry in &self.entries {
            entry.write_local(&mut bytes)?;
        }
        for entry in &self.entries {
            entry.write_central(&mut bytes)?;
        }
        // Bounded by the check in `push`.
        let count = self.entries.len() as u16;
        EndOfCentralDirectory::new(count, cd_size, cd_offset).write_to(&mut bytes)?;
        debug_assert_eq!(bytes.len(), total);

        debug!(
            "assembled archive: {} entries, {} bytes, central directory {} bytes at {}",
            count, total, cd_size, cd_offset
        );

        Ok(Archive {
            bytes,
            entry_count: self.entries.len(),
        })
    }
}

/// A finished ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    bytes: Vec<u8>,
    entry_count: usize,
}

impl Archive {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Size of the archive in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Number of entries written, after invalid ones were dropped.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Always `application/zip`.
    pub fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }
}

impl AsRef<[u8]> for Archive {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Archive> for Vec<u8> {
    fn from(archive: Archive) -> Self {
        archive.bytes
    }
}

/// Build a ZIP archive from `entries`, in order.
///
/// Invalid entries are skipped; an empty (or fully skipped) input gives an
/// archive holding just the 22-byte EOCD. Duplicate paths are written as
/// separate entries.
///
/// # Errors
///
/// Fails only when something does not fit a ZIP32 field; see [`ZipError`].
///
/// ```
/// use storezip::{FileEntry, build_zip};
///
/// let archive = build_zip(&[FileEntry::new("a.txt", "hello")]).unwrap();
/// assert_eq!(archive.entry_count(), 1);
/// assert_eq!(archive.media_type(), "application/zip");
/// ```
pub fn build_zip(entries: &[FileEntry]) -> Result<Archive> {
    let valid: Vec<(&str, &[u8])> = entries
        .iter()
        .filter_map(|entry| {
            let parts = entry.parts();
            if parts.is_none() {
                debug!("skipping entry {:?}: missing path or data", entry.path);
            }
            parts
        })
        .collect();

    if valid.len() < entries.len() {
        debug!("dropped {} invalid entries", entries.len() - valid.len());
    }

    assemble(&valid).inspect_err(|err| warn!("cannot build archive: {}", err))
}

fn assemble(entries: &[(&str, &[u8])]) -> Result<Archive> {
    let mut assembler = ArchiveAssembler::with_capacity(entries.len());
    for &(path, data) in entries {
        assembler.push(path, data)?;
    }
    assembler.finish()
}

/// Build an archive on the blocking thread pool.
///
/// Same result as [`build_zip`]; use it from async code so large inputs
/// do not stall the runtime.
pub async fn build_zip_async(entries: Vec<FileEntry>) -> Result<Archive> {
    tokio::task::spawn_blocking(move || build_zip(&entries)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_u32_limits() {
        assert_eq!(field_u32(0), Some(0));
        assert_eq!(field_u32(0xFFFF_FFFE), Some(0xFFFF_FFFE));
        assert_eq!(field_u32(0xFFFF_FFFF), None);
        assert_eq!(field_u32(1 << 32), None);
    }

    #[test]
    fn entry_headers_measure() {
        let headers = EntryHeaders::new("a.txt", b"hello", 100).unwrap();
        assert_eq!(headers.crc32(), 0x3610_A686);
        assert_eq!(headers.offset(), 100);
        assert_eq!(headers.local_len(), 30 + 5 + 5);
        assert_eq!(headers.central_len(), 46 + 5);
        assert_eq!(headers.next_offset(), 140);
    }

    #[test]
    fn entry_segments() {
        let headers = EntryHeaders::new("a.txt", b"hello", 7).unwrap();
        let (local, central) = headers.to_segments().unwrap();

        assert_eq!(local.len(), headers.local_len());
        assert_eq!(&local[0..4], LocalFileHeader::SIGNATURE);
        assert_eq!(&local[30..35], b"a.txt");
        assert_eq!(&local[35..], b"hello");

        assert_eq!(central.len(), headers.central_len());
        assert_eq!(&central[0..4], CentralDirectoryHeader::SIGNATURE);
        assert_eq!(&central[16..20], &local[14..18]);
        assert_eq!(&central[42..46], &[7, 0, 0, 0]);
    }

    #[test]
    fn filename_length_counts_bytes() {
        let headers = EntryHeaders::new("é", b"", 0).unwrap();
        let (local, _) = headers.to_segments().unwrap();
        assert_eq!(&local[26..28], &[2, 0]);
    }

    #[test]
    fn offset_overflow_is_rejected() {
        let err = EntryHeaders::new("late.txt", b"x", 0xFFFF_FFFF).unwrap_err();
        assert!(matches!(err, ZipError::ArchiveTooLarge { offset: 0xFFFF_FFFF }));
        assert!(err.is_overflow());
    }

    #[test]
    fn path_overflow_is_rejected() {
        let path = "p".repeat(u16::MAX as usize + 1);
        let err = EntryHeaders::new(&path, b"", 0).unwrap_err();
        assert!(matches!(err, ZipError::PathTooLong { len: 65536, .. }));

        let path = "p".repeat(u16::MAX as usize);
        assert!(EntryHeaders::new(&path, b"", 0).is_ok());
    }

    #[test]
    fn assembler_tracks_offsets() {
        let mut assembler = ArchiveAssembler::new();
        assembler.push("a", b"12").unwrap();
        assembler.push("bb", b"").unwrap();
        assert_eq!(assembler.entry_count(), 2);
        // (30 + 1 + 2) + (30 + 2) locals, (46 + 1) + (46 + 2) centrals, EOCD
        assert_eq!(assembler.archive_size(), 33 + 32 + 47 + 48 + 22);

        let archive = assembler.finish().unwrap();
        let bytes = archive.as_bytes();
        assert_eq!(bytes.len(), 182);
        // second local header right after the first segment
        assert_eq!(&bytes[33..37], LocalFileHeader::SIGNATURE);
        // central directory starts after both local segments
        assert_eq!(&bytes[65..69], CentralDirectoryHeader::SIGNATURE);
        assert_eq!(&bytes[65 + 42..65 + 46], &[0, 0, 0, 0]);
        assert_eq!(&bytes[112 + 42..112 + 46], &[33, 0, 0, 0]);

        let eocd = EndOfCentralDirectory::from_bytes(&bytes[160..]).unwrap();
        assert_eq!(eocd, EndOfCentralDirectory::new(2, 95, 65));
    }

    #[test]
    fn empty_input_gives_bare_eocd() {
        let archive = build_zip(&[]).unwrap();
        assert_eq!(archive.entry_count(), 0);
        assert_eq!(archive.size(), EndOfCentralDirectory::SIZE);

        let eocd = EndOfCentralDirectory::from_bytes(archive.as_bytes()).unwrap();
        assert_eq!(eocd, EndOfCentralDirectory::new(0, 0, 0));
    }

    #[test]
    fn invalid_entries_are_dropped() {
        let entries = vec![
            FileEntry::new("", "no path"),
            FileEntry {
                path: "no-data.txt".to_string(),
                data: None,
            },
            FileEntry::new("kept.txt", "ok"),
        ];
        assert!(!entries[0].is_valid());
        assert!(!entries[1].is_valid());
        assert!(entries[2].is_valid());

        let archive = build_zip(&entries).unwrap();
        assert_eq!(archive.entry_count(), 1);
        assert_eq!(archive.as_bytes(), build_zip(&entries[2..]).unwrap().as_bytes());
    }

    #[test]
    fn only_invalid_entries_gives_empty_archive() {
        let entries = vec![FileEntry::default(), FileEntry::new("", "x")];
        let archive = build_zip(&entries).unwrap();
        assert_eq!(archive, build_zip(&[]).unwrap());
    }

    #[test]
    fn entry_count_limit() {
        let entries: Vec<FileEntry> = (0..u16::MAX as usize)
            .map(|i| FileEntry::new(i.to_string(), Vec::<u8>::new()))
            .collect();
        let err = build_zip(&entries).unwrap_err();
        assert!(matches!(err, ZipError::TooManyEntries { count: 65535 }));

        let mut assembler = ArchiveAssembler::new();
        for entry in &entries[1..] {
            assembler.push(&entry.path, b"").unwrap();
        }
        let err = assembler.push("one-too-many", b"").unwrap_err();
        assert!(matches!(err, ZipError::TooManyEntries { count: 65535 }));

        let archive = build_zip(&entries[1..]).unwrap();
        assert_eq!(archive.entry_count(), 65534);
        let eocd_start = archive.size() - EndOfCentralDirectory::SIZE;
        let eocd = EndOfCentralDirectory::from_bytes(&archive.as_bytes()[eocd_start..]).unwrap();
        assert_eq!(eocd.total_entries, 65534);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn archive_conversions() {
        let archive = build_zip(&[FileEntry::new("a", "b")]).unwrap();
        let copy = archive.as_bytes().to_vec();
        assert_eq!(archive.as_ref(), copy.as_slice());
        assert_eq!(Vec::from(archive.clone()), copy);
        assert_eq!(archive.into_bytes(), copy);
    }

    #[tokio::test]
    async fn async_build_matches_sync() {
        let entries = vec![FileEntry::new("a.txt", "hello"), FileEntry::new("b/c", "")];
        let expected = build_zip(&entries).unwrap();
        let archive = build_zip_async(entries).await.unwrap();
        assert_eq!(archive, expected);
    }
}
