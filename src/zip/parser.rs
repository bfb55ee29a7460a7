//! Low-level ZIP archive parser.
//!
//! This module reads ZIP32 structures back from any source that implements
//! the [`ReadAt`] trait. It is used to list and verify archives, including
//! the ones produced by [`build_zip`](super::build_zip).
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data
//!
//! Archives that need ZIP64 records are reported as unsupported.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Typically used through [`ArchiveReader`](super::ArchiveReader)
/// rather than directly.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the archive. Archives with a
    /// trailing comment are found by searching backwards for the signature.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            bail!("Not a valid ZIP file: only {} bytes", self.size);
        }

        // Common case: no comment, EOCD is the last 22 bytes.
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment must run exactly to the end of the archive.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// List all files in the ZIP archive, in central directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        if eocd.is_zip64() {
            bail!("ZIP64 archives are not supported");
        }
        if eocd.disk_number != 0 || eocd.disk_with_cd != 0 {
            bail!("Multi-disk archives are not supported");
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            bail!(
                "Central Directory ({} bytes at {}) overlaps the End of Central Directory",
                cd_size,
                cd_offset
            );
        }

        // Read the entire Central Directory in one request
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let total_entries = eocd.total_entries as usize;
        let mut entries = Vec::with_capacity(total_entries);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..total_entries {
            entries.push(Self::parse_cdfh(&mut cursor)?);
        }

        if cursor.position() != cd_size {
            bail!(
                "Central Directory size mismatch: parsed {} of {} bytes",
                cursor.position(),
                cd_size
            );
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CentralDirectoryHeader::SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()?;

        if compressed_size == ZIP64_MARKER_U32
            || uncompressed_size == ZIP64_MARKER_U32
            || lfh_offset == ZIP64_MARKER_U32
        {
            bail!("ZIP64 entries are not supported");
        }

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

        // Directory entries end with '/'
        let is_directory = file_name.ends_with('/');

        // Skip the extra field and the file comment
        let mut skip = vec![0u8; extra_field_length as usize + file_comment_length as usize];
        cursor.read_exact(&mut skip)?;

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            crc32,
            lfh_offset: lfh_offset as u64,
            last_mod_time,
            last_mod_date,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header's name and extra field may differ in length
    /// from the Central Directory copy, so the header is read to find
    /// where the data begins.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LocalFileHeader::SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;

        if &lfh_buf[0..4] != LocalFileHeader::SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.file_name);
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        let data_offset =
            entry.lfh_offset + LocalFileHeader::SIZE as u64 + file_name_length + extra_field_length;

        if data_offset + entry.compressed_size > self.size {
            bail!("Data for {} runs past the end of the archive", entry.file_name);
        }

        Ok(data_offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::{FileEntry, build_zip};

    fn parser_for(bytes: Vec<u8>) -> ZipParser<MemoryReader> {
        ZipParser::new(Arc::new(MemoryReader::new(bytes)))
    }

    #[tokio::test]
    async fn lists_built_entries_in_order() {
        let archive = build_zip(&[
            FileEntry::new("one.txt", "1"),
            FileEntry::new("dir/", ""),
            FileEntry::new("two.bin", vec![0u8, 1, 2]),
        ])
        .unwrap();
        let parser = parser_for(archive.into_bytes());

        let entries = parser.list_files().await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["one.txt", "dir/", "two.bin"]);
        assert!(entries[1].is_directory);
        assert_eq!(entries[2].uncompressed_size, 3);
        assert_eq!(entries[2].compression_method, CompressionMethod::Stored);
        assert_eq!(entries[0].lfh_offset, 0);
        assert_eq!(entries[1].lfh_offset, 30 + 7 + 1);
    }

    #[tokio::test]
    async fn data_offset_skips_header_and_name() {
        let archive = build_zip(&[FileEntry::new("a.txt", "hello")]).unwrap();
        let parser = parser_for(archive.into_bytes());

        let entries = parser.list_files().await.unwrap();
        assert_eq!(parser.get_data_offset(&entries[0]).await.unwrap(), 35);
    }

    #[tokio::test]
    async fn finds_eocd_before_a_comment() {
        let mut bytes = build_zip(&[FileEntry::new("a", "b")]).unwrap().into_bytes();
        let eocd_offset = (bytes.len() - EndOfCentralDirectory::SIZE) as u64;
        let comment = b"archive comment";
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(comment);

        let parser = parser_for(bytes);
        let (eocd, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(offset, eocd_offset);
        assert_eq!(eocd.comment_len as usize, comment.len());
        assert_eq!(parser.list_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_zip_data() {
        assert!(parser_for(b"short".to_vec()).find_eocd().await.is_err());
        assert!(parser_for(vec![0u8; 100]).find_eocd().await.is_err());
    }

    #[tokio::test]
    async fn rejects_zip64_marker() {
        let mut bytes = build_zip(&[]).unwrap().into_bytes();
        bytes[8..10].copy_from_slice(&[0xFF, 0xFF]);
        let err = parser_for(bytes).list_files().await.unwrap_err();
        assert!(err.to_string().contains("ZIP64"));
    }

    #[tokio::test]
    async fn rejects_truncated_central_directory() {
        let mut bytes = build_zip(&[FileEntry::new("a", "b")]).unwrap().into_bytes();
        let len = bytes.len();
        // Claim one more byte of central directory than exists.
        let cd_size = u32::from_le_bytes(bytes[len - 10..len - 6].try_into().unwrap());
        bytes[len - 10..len - 6].copy_from_slice(&(cd_size + 1).to_le_bytes());
        assert!(parser_for(bytes).list_files().await.is_err());
    }
}
