//! Binary read helpers shared by the container parsers.

use std::io::{self, Read, Seek, SeekFrom};

pub(crate) fn read_u8<R: Read>(src: &mut R) -> io::Result<u8> {
    let mut b = [0u8; 1];
    src.read_exact(&mut b)?;
    Ok(b[0])
}

pub(crate) fn read_4cc<R: Read>(src: &mut R) -> io::Result<[u8; 4]> {
    let mut b = [0u8; 4];
    src.read_exact(&mut b)?;
    Ok(b)
}

/// As [`read_4cc`], but reports end-of-file as `None` so chunk-scanning
/// loops can finish cleanly.
pub(crate) fn read_4cc_opt<R: Read>(src: &mut R) -> io::Result<Option<[u8; 4]>> {
    match read_4cc(src) {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

macro_rules! int_readers {
    ($($name:ident, $opt:ident: $ty:ty, $from:ident;)*) => {
        $(
            pub(crate) fn $name<R: Read>(src: &mut R) -> io::Result<$ty> {
                let mut b = [0u8; core::mem::size_of::<$ty>()];
                src.read_exact(&mut b)?;
                Ok(<$ty>::$from(b))
            }

            #[allow(dead_code)]
            pub(crate) fn $opt<R: Read>(src: &mut R) -> io::Result<Option<$ty>> {
                match $name(src) {
                    Ok(v) => Ok(Some(v)),
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
                    Err(e) => Err(e),
                }
            }
        )*
    };
}

int_readers! {
    read_u16_le, read_u16_le_opt: u16, from_le_bytes;
    read_u32_le, read_u32_le_opt: u32, from_le_bytes;
    read_u64_le, read_u64_le_opt: u64, from_le_bytes;
    read_u16_be, read_u16_be_opt: u16, from_be_bytes;
    read_u32_be, read_u32_be_opt: u32, from_be_bytes;
    read_u64_be, read_u64_be_opt: u64, from_be_bytes;
}

/// Skips `n` bytes forward.
pub(crate) fn skip<R: Seek>(src: &mut R, n: u64) -> io::Result<()> {
    let n = i64::try_from(n)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "absurd chunk size"))?;
    src.seek(SeekFrom::Current(n)).map(drop)
}
