use super::ReadAt;
use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::zip::Archive;

/// Random access over an owned byte buffer.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Archive> for MemoryReader {
    fn from(archive: Archive) -> Self {
        Self::new(archive.into_bytes())
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let size = self.size();
        if offset > size {
            bail!("Read offset {} is past the end of the data ({} bytes)", offset, size);
        }

        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_are_clamped_to_the_buffer() {
        let reader = MemoryReader::new(b"abcdef".to_vec());
        assert_eq!(reader.size(), 6);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(1, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"bcde");

        assert_eq!(reader.read_at(4, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");

        assert_eq!(reader.read_at(6, &mut buf).await.unwrap(), 0);
        assert!(reader.read_at(7, &mut buf).await.is_err());
    }
}
