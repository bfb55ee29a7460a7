use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};

use anyhow::{Result, bail};

/// "Version needed to extract" for stored entries (PKZIP 2.0).
pub const VERSION_NEEDED: u16 = 20;

/// "Version made by" written to central directory records.
pub const VERSION_MADE_BY: u16 = 20;

/// 2-byte field value that tells readers to consult the ZIP64 record.
pub const ZIP64_MARKER_U16: u16 = 0xFFFF;

/// 4-byte field value that tells readers to consult the ZIP64 record.
pub const ZIP64_MARKER_U32: u32 = 0xFFFF_FFFF;

/// Media type of a produced archive.
pub const MEDIA_TYPE: &str = "application/zip";

/// Encode an entry path for a header filename field.
///
/// This is a plain UTF-8 transcode: separators, `..` segments and
/// leading slashes are passed through untouched.
pub fn encode_path(path: &str) -> &[u8] {
    path.as_bytes()
}

/// Filename length field for `file_name`.
///
/// Checked before any byte of a header is written, so an oversized name
/// leaves the output untouched.
fn file_name_len(file_name: &[u8]) -> io::Result<u16> {
    u16::try_from(file_name.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "file name is {} bytes, which exceeds the ZIP32 filename limit",
                file_name.len()
            ),
        )
    })
}

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local File Header (LFH) - 30 bytes plus the file name.
///
/// The entry data follows the header directly. Time, date, flags and the
/// extra field are always zero.
#[derive(Debug, Clone, Copy)]
pub struct LocalFileHeader<'a> {
    pub crc32: u32,
    pub size: u32,
    /// Encoded name, at most `u16::MAX` bytes.
    pub file_name: &'a [u8],
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    /// Encoded length of the header including the file name.
    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let name_len = file_name_len(self.file_name)?;

        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(0)?; // flags
        out.write_u16::<LittleEndian>(CompressionMethod::Stored.as_u16())?;
        out.write_u16::<LittleEndian>(0)?; // mod time
        out.write_u16::<LittleEndian>(0)?; // mod date
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.size)?; // compressed
        out.write_u32::<LittleEndian>(self.size)?; // uncompressed
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_all(self.file_name)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus the file name.
#[derive(Debug, Clone, Copy)]
pub struct CentralDirectoryHeader<'a> {
    pub crc32: u32,
    pub size: u32,
    pub lfh_offset: u32,
    /// Encoded name, at most `u16::MAX` bytes.
    pub file_name: &'a [u8],
}

impl CentralDirectoryHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: usize = 46;

    /// Encoded length of the record including the file name.
    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let name_len = file_name_len(self.file_name)?;

        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(0)?; // flags
        out.write_u16::<LittleEndian>(CompressionMethod::Stored.as_u16())?;
        out.write_u16::<LittleEndian>(0)?; // mod time
        out.write_u16::<LittleEndian>(0)?; // mod date
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.size)?; // compressed
        out.write_u32::<LittleEndian>(self.size)?; // uncompressed
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(0)?; // external attributes
        out.write_u32::<LittleEndian>(self.lfh_offset)?;
        out.write_all(self.file_name)
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk EOCD without a comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_MARKER_U16
            || self.total_entries == ZIP64_MARKER_U16
            || self.cd_size == ZIP64_MARKER_U32
            || self.cd_offset == ZIP64_MARKER_U32
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}
