use std::io::{Read, Write};

pub const MAGIC: &[u8; 6] = b"SATCHL";
pub const VERSION: u16 = 1;
/// magic + version + manifest_len + data_len
pub const HEADER_LEN: u64 = 6 + 2 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub version: u16,
    /// Byte length of the manifest (CBOR)
    pub manifest_len: u64,
    /// Byte length of the data section that follows the manifest
    pub data_len: u64,
}

impl Superblock {
    pub fn data_off(&self) -> u64 {
        HEADER_LEN + self.manifest_len
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.manifest_len.to_le_bytes())?;
        w.write_all(&self.data_len.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        let mut magic = [0u8; 6];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad superblock magic",
            ));
        }
        let mut v = [0u8; 2];
        r.read_exact(&mut v)?;
        let version = u16::from_le_bytes(v);
        let mut buf8 = [0u8; 8];
        r.read_exact(&mut buf8)?;
        let manifest_len = u64::from_le_bytes(buf8);
        r.read_exact(&mut buf8)?;
        let data_len = u64::from_le_bytes(buf8);
        Ok(Self {
            version,
            manifest_len,
            data_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_len_matches_written_bytes() {
        let sb = Superblock {
            version: VERSION,
            manifest_len: 17,
            data_len: 4096,
        };
        let mut buf = Vec::new();
        sb.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, HEADER_LEN);
        assert_eq!(Superblock::read_from(&buf[..]).unwrap(), sb);
        assert_eq!(sb.data_off(), HEADER_LEN + 17);
    }

    #[test]
    fn rejects_foreign_magic() {
        let err = Superblock::read_from(&b"PK\x03\x04garbage-garbage-garbage"[..]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
