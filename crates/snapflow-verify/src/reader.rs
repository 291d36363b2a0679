use std::io::{self, Read};

use crate::error::{Result, VerifyError};
use crate::hasher::Hasher;

/// Reader that hashes every byte it hands out.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    bytes:  u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            bytes: 0,
        }
    }

    /// Bytes hashed so far.
    pub fn bytes_read(&self) -> u64 { self.bytes }
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    /// Compare the digest of everything read so far against `expected`.
    pub fn finish(self, expected: &[u8]) -> Result<()> {
        let actual = self.hasher.finalize();
        if actual == expected {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                expected: expected.to_vec(),
                actual,
            })
        }
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sha256Hasher;
    use std::io::Cursor;

    #[test]
    fn matching_digest_passes() {
        let data = b"snapshot bytes";
        let expected = Sha256Hasher::digest(data);

        let mut reader = VerifiedReader::new(Cursor::new(data), Sha256Hasher::new());
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();

        assert_eq!(reader.bytes_read(), data.len() as u64);
        reader.finish(&expected).unwrap();
    }

    #[test]
    fn mismatching_digest_reports_both_sides() {
        let mut reader = VerifiedReader::new(Cursor::new(b"abc"), Sha256Hasher::new());
        io::copy(&mut reader, &mut io::sink()).unwrap();

        match reader.finish(&[0u8; 32]) {
            Err(VerifyError::Mismatch { expected, actual }) => {
                assert_eq!(expected, vec![0u8; 32]);
                assert_eq!(actual, Sha256Hasher::digest(b"abc"));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
