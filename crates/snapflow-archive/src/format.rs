use std::fmt;
use std::io::{self, BufReader, Read};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Compression codec wrapped around a tar stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TarCompress {
    #[cfg_attr(feature = "serde", serde(alias = "tar"))]
    None,
    #[cfg_attr(feature = "serde", serde(alias = "gz"))]
    Gzip,
    Xz,
    #[default]
    Zstd,
}

impl TarCompress {
    /// Create a decoder for this compression codec.
    pub fn decoder<R: Read>(self, reader: R) -> Result<Decoder<R>> {
        match self {
            Self::None => Ok(Decoder::Passthrough(reader)),
            Self::Gzip => Ok(Decoder::Gzip(Box::new(flate2::read::GzDecoder::new(reader)))),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Decoder::Xz(Box::new(xz2::read::XzDecoder::new(reader)))),
            #[cfg(not(feature = "xz"))]
            Self::Xz => Err(Error::UnsupportedCompression("xz".to_string())),
            Self::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(reader).map_err(Error::Corrupted)?;
                Ok(Decoder::Zstd(Box::new(decoder)))
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for TarCompress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TarCompress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zstd" | "zst" => Ok(Self::Zstd),
            "gzip" | "gz" => Ok(Self::Gzip),
            "xz" => Ok(Self::Xz),
            "none" | "tar" => Ok(Self::None),
            other => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }
}

/// Decoder wrapper for tar decompression.
pub enum Decoder<R: Read> {
    Passthrough(R),
    Gzip(Box<flate2::read::GzDecoder<R>>),
    #[cfg(feature = "xz")]
    Xz(Box<xz2::read::XzDecoder<R>>),
    Zstd(Box<zstd::stream::read::Decoder<'static, BufReader<R>>>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
            #[cfg(feature = "xz")]
            Self::Xz(d) => d.read(buf),
            Self::Zstd(d) => d.read(buf),
        }
    }
}

impl<R: Read> fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Passthrough(_) => "Passthrough",
            Self::Gzip(_) => "Gzip",
            #[cfg(feature = "xz")]
            Self::Xz(_) => "Xz",
            Self::Zstd(_) => "Zstd",
        };
        f.debug_tuple("Decoder").field(&name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parses_codec_names() {
        assert_eq!("zstd".parse::<TarCompress>().unwrap(), TarCompress::Zstd);
        assert_eq!("GZ".parse::<TarCompress>().unwrap(), TarCompress::Gzip);
        assert_eq!("tar".parse::<TarCompress>().unwrap(), TarCompress::None);
        assert_eq!(" xz ".parse::<TarCompress>().unwrap(), TarCompress::Xz);
        assert!(matches!(
            "lz4".parse::<TarCompress>(),
            Err(Error::UnsupportedCompression(name)) if name == "lz4"
        ));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for codec in [TarCompress::None, TarCompress::Gzip, TarCompress::Xz, TarCompress::Zstd] {
            assert_eq!(codec.to_string().parse::<TarCompress>().unwrap(), codec);
        }
    }

    #[test]
    fn default_is_zstd() {
        assert_eq!(TarCompress::default(), TarCompress::Zstd);
    }

    #[test]
    fn zstd_decoder_inflates() {
        let compressed = zstd::encode_all(&b"hello window"[..], 3).unwrap();
        let mut out = String::new();
        TarCompress::Zstd
            .decoder(Cursor::new(compressed))
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello window");
    }

    #[test]
    fn gzip_decoder_inflates() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(b"hello gzip").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = String::new();
        TarCompress::Gzip
            .decoder(Cursor::new(compressed))
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello gzip");
    }

    #[test]
    #[cfg(not(feature = "xz"))]
    fn xz_needs_its_feature() {
        assert!(matches!(
            TarCompress::Xz.decoder(Cursor::new(Vec::new())),
            Err(Error::UnsupportedCompression(_))
        ));
    }
}
