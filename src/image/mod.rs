//! The E8 loadable image format: a length-prefixed list of section
//! headers followed by the concatenated section payloads. Zeros sections
//! carry no payload, only an address range.

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinWrite, BinRead)]
#[brw(repr(u8))]
pub enum SectionKind {
    Code = 1,
    Data = 2,
    Zeros = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinWrite, BinRead)]
#[brw(little)]
pub struct SectionHeader {
    pub kind: SectionKind,
    pub addr: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub header: SectionHeader,
    pub bytes: Vec<u8>,
}

impl Section {
    pub fn code(addr: u32, bytes: Vec<u8>) -> Self {
        Section {
            header: SectionHeader {
                kind: SectionKind::Code,
                addr,
                size: bytes.len() as u32,
            },
            bytes,
        }
    }

    pub fn data(addr: u32, bytes: Vec<u8>) -> Self {
        Section {
            header: SectionHeader {
                kind: SectionKind::Data,
                addr,
                size: bytes.len() as u32,
            },
            bytes,
        }
    }

    pub fn zeros(addr: u32, size: u32) -> Self {
        Section {
            header: SectionHeader {
                kind: SectionKind::Zeros,
                addr,
                size,
            },
            bytes: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("serialization error: {0}")]
    Serialization(#[from] binrw::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Writes an image: section count, headers, then the payload blob.
pub fn write<W: Write>(
    out: &mut W,
    sections: &[Section],
) -> Result<(), ImageError> {
    let mut buf = Cursor::new(Vec::new());
    buf.write_le(&(sections.len() as u32))?;
    for sec in sections {
        debug_assert!(
            sec.header.kind == SectionKind::Zeros
                || sec.header.size as usize == sec.bytes.len(),
            "section size disagrees with payload"
        );
        buf.write_le(&sec.header)?;
    }
    for sec in sections {
        if sec.header.kind != SectionKind::Zeros {
            buf.write_all(&sec.bytes)?;
        }
    }
    out.write_all(buf.get_ref())?;
    Ok(())
}

/// Loader-side parse of an image produced by [`write`].
pub fn read(bytes: &[u8]) -> Result<Vec<Section>, ImageError> {
    let mut cur = Cursor::new(bytes);
    let count: u32 = cur.read_le()?;

    let mut headers = Vec::new();
    for _ in 0..count {
        headers.push(cur.read_le::<SectionHeader>()?);
    }

    let mut sections = Vec::with_capacity(headers.len());
    for header in headers {
        let bytes = if header.kind == SectionKind::Zeros {
            Vec::new()
        } else {
            let mut payload = vec![0u8; header.size as usize];
            cur.read_exact(&mut payload)?;
            payload
        };
        sections.push(Section { header, bytes });
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_round_trips() {
        let sections = vec![
            Section::code(0x8000, vec![0, 0, 0, 0x38, 1, 2, 3, 4]),
            Section::data(0x8008, vec![0xaa, 0xbb]),
            Section::zeros(0x800c, 16),
        ];

        let mut image = Vec::new();
        write(&mut image, &sections).unwrap();
        assert_eq!(read(&image).unwrap(), sections);
    }

    #[test]
    fn zeros_sections_carry_no_payload() {
        let sections = vec![Section::zeros(0x9000, 64)];
        let mut image = Vec::new();
        write(&mut image, &sections).unwrap();

        // count + one header, nothing else
        assert_eq!(image.len(), 4 + 9);
        let back = read(&image).unwrap();
        assert_eq!(back[0].header.size, 64);
        assert!(back[0].bytes.is_empty());
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let sections = vec![Section::data(0x8000, vec![1, 2, 3, 4])];
        let mut image = Vec::new();
        write(&mut image, &sections).unwrap();
        image.truncate(image.len() - 2);
        assert!(read(&image).is_err());
    }
}
