use log::{debug, warn};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::crc::Crc32;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Entry data is read and checksummed in pieces of this size.
const READ_CHUNK: usize = 64 * 1024;

/// Outcome of checking every entry in an archive.
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Number of entries checked.
    pub checked: usize,
    /// Entry names paired with the reason they failed.
    pub failures: Vec<(String, String)>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads and verifies stored entries from a ZIP archive.
pub struct ArchiveReader<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ArchiveReader<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Read an entry's data, checking it against the stored CRC-32.
    pub async fn read_entry(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.compression_method != CompressionMethod::Stored {
            bail!(
                "Unsupported compression method {} for {} (only STORED is supported)",
                entry.compression_method.as_u16(),
                entry.file_name
            );
        }
        if entry.compressed_size != entry.uncompressed_size {
            bail!(
                "Stored entry {} has mismatched sizes ({} vs {})",
                entry.file_name,
                entry.compressed_size,
                entry.uncompressed_size
            );
        }

        let data_offset = self.parser.get_data_offset(entry).await?;

        let mut buf = vec![0u8; entry.uncompressed_size as usize];
        let mut hasher = Crc32::new();
        let mut offset = data_offset;
        for chunk in buf.chunks_mut(READ_CHUNK) {
            self.parser.reader().read_exact_at(offset, chunk).await?;
            hasher.update(chunk);
            offset += chunk.len() as u64;
        }

        let actual = hasher.finalize();
        if actual != entry.crc32 {
            bail!(
                "CRC mismatch for {}: expected {:08x}, got {:08x}",
                entry.file_name,
                entry.crc32,
                actual
            );
        }

        Ok(buf)
    }

    /// Read every entry and collect the ones that fail.
    pub async fn verify(&self) -> Result<VerifyReport> {
        let entries = self.list_files().await?;
        let mut report = VerifyReport::default();

        for entry in &entries {
            report.checked += 1;
            match self.read_entry(entry).await {
                Ok(_) => debug!("{}: OK", entry.file_name),
                Err(e) => {
                    warn!("{}: {:#}", entry.file_name, e);
                    report.failures.push((entry.file_name.clone(), format!("{:#}", e)));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::{FileEntry, build_zip};

    fn reader_for(bytes: Vec<u8>) -> ArchiveReader<MemoryReader> {
        ArchiveReader::new(Arc::new(MemoryReader::new(bytes)))
    }

    #[tokio::test]
    async fn reads_back_entry_data() {
        let big: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let archive = build_zip(&[FileEntry::new("small", "abc"), FileEntry::new("big", big.clone())])
            .unwrap();
        let reader = reader_for(archive.into_bytes());

        let entries = reader.list_files().await.unwrap();
        assert_eq!(reader.read_entry(&entries[0]).await.unwrap(), b"abc");
        assert_eq!(reader.read_entry(&entries[1]).await.unwrap(), big);

        let report = reader.verify().await.unwrap();
        assert_eq!(report.checked, 2);
        assert!(report.is_ok());
    }

    #[tokio::test]
    async fn detects_corrupted_data() {
        let mut bytes = build_zip(&[FileEntry::new("a.txt", "hello"), FileEntry::new("b.txt", "world")])
            .unwrap()
            .into_bytes();
        // Flip a byte in the first entry's data ("hello" starts at 30 + 5).
        bytes[35] ^= 0x20;

        let reader = reader_for(bytes);
        let entries = reader.list_files().await.unwrap();
        let err = reader.read_entry(&entries[0]).await.unwrap_err();
        assert!(err.to_string().contains("CRC mismatch"));

        let report = reader.verify().await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "a.txt");
    }

    #[tokio::test]
    async fn rejects_compressed_entries() {
        let mut bytes = build_zip(&[FileEntry::new("a", "b")]).unwrap().into_bytes();
        // Method field of the central directory record (entry segment is 32 bytes).
        bytes[32 + 10] = 8;

        let reader = reader_for(bytes);
        let entries = reader.list_files().await.unwrap();
        assert_eq!(entries[0].compression_method, CompressionMethod::Deflate);
        assert!(reader.read_entry(&entries[0]).await.is_err());
    }
}
