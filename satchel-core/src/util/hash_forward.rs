use std::io::{Result, Write};

/// Write adapter that feeds everything it forwards into a BLAKE3 hasher.
pub struct HashingForward<W: Write> {
    inner: W,
    hasher: blake3::Hasher,
    pub counted: u64,
}

impl<W: Write> HashingForward<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            counted: 0,
        }
    }

    /// Returns the inner writer together with the digest of everything written.
    pub fn finish(self) -> (W, [u8; 32]) {
        (self.inner, *self.hasher.finalize().as_bytes())
    }
}

impl<W: Write> Write for HashingForward<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_covers_forwarded_bytes() {
        let mut w = HashingForward::new(Vec::new());
        w.write_all(b"hello ").unwrap();
        w.write_all(b"world").unwrap();
        assert_eq!(w.counted, 11);
        let (inner, digest) = w.finish();
        assert_eq!(inner, b"hello world");
        assert_eq!(&digest, blake3::hash(b"hello world").as_bytes());
    }
}
