//! Holds the record serialisation trait and primitive encoding helpers for the explorer store.
//!
//! Records are stored unversioned: the persisted layout is rebuilt from the upstream
//! services rather than migrated.

use core2::io::{self, Read, Write};

/// Byte encoding of a stored record.
///
/// Integers are little-endian unless a helper says otherwise; variable length fields are
/// prefixed with a [`CompactSize`] length.
pub trait DbSerde: Sized {
    /// Encodes the record.
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()>;

    /// Decodes a record written by [`DbSerde::encode`].
    fn decode<R: Read>(r: &mut R) -> io::Result<Self>;

    /// Serialize into a `Vec<u8>`.
    #[inline]
    fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Reconstruct from a `&[u8]`, rejecting trailing bytes.
    #[inline]
    fn from_bytes(data: &[u8]) -> io::Result<Self> {
        let mut cursor = core2::io::Cursor::new(data);
        let value = Self::decode(&mut cursor)?;
        if cursor.position() as usize != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "trailing bytes after record",
            ));
        }
        Ok(value)
    }
}

/* ──────────────────────────── CompactSize helpers ────────────────────────────── */
/// A bitcoin-style CompactSize, a form of variable-length integer.
pub struct CompactSize;

/// The largest collection length accepted when decoding.
pub const MAX_COMPACT_SIZE: u32 = 0x0200_0000;

impl CompactSize {
    /// Reads an integer encoded in compact form, without an upper bound.
    ///
    /// Used for counters, which may legitimately exceed [`MAX_COMPACT_SIZE`].
    pub fn read_u64<R: Read>(mut reader: R) -> io::Result<u64> {
        let mut flag_bytes = [0; 1];
        reader.read_exact(&mut flag_bytes)?;
        let flag = flag_bytes[0];

        if flag < 253 {
            Ok(flag as u64)
        } else if flag == 253 {
            let mut bytes = [0; 2];
            reader.read_exact(&mut bytes)?;
            match u16::from_le_bytes(bytes) {
                n if n < 253 => Err(non_canonical()),
                n => Ok(n as u64),
            }
        } else if flag == 254 {
            let mut bytes = [0; 4];
            reader.read_exact(&mut bytes)?;
            match u32::from_le_bytes(bytes) {
                n if n < 0x10000 => Err(non_canonical()),
                n => Ok(n as u64),
            }
        } else {
            let mut bytes = [0; 8];
            reader.read_exact(&mut bytes)?;
            match u64::from_le_bytes(bytes) {
                n if n < 0x100000000 => Err(non_canonical()),
                n => Ok(n),
            }
        }
    }

    /// Reads a collection length encoded in compact form.
    pub fn read<R: Read>(reader: R) -> io::Result<usize> {
        match Self::read_u64(reader)? {
            s if s > <u64>::from(MAX_COMPACT_SIZE) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "CompactSize too large",
            )),
            s => Ok(s as usize),
        }
    }

    /// Writes the provided value in compact form.
    pub fn write<W: Write>(mut writer: W, value: u64) -> io::Result<()> {
        match value {
            s if s < 253 => writer.write_all(&[s as u8]),
            s if s <= 0xFFFF => {
                writer.write_all(&[253])?;
                writer.write_all(&(s as u16).to_le_bytes())
            }
            s if s <= 0xFFFFFFFF => {
                writer.write_all(&[254])?;
                writer.write_all(&(s as u32).to_le_bytes())
            }
            s => {
                writer.write_all(&[255])?;
                writer.write_all(&s.to_le_bytes())
            }
        }
    }

    /// Encodes `value` into a fresh buffer.
    pub fn to_bytes(value: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9);
        // Writing into a Vec cannot fail.
        let _ = Self::write(&mut buf, value);
        buf
    }
}

fn non_canonical() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "non-canonical CompactSize")
}

/* ───────────────────────────── integer helpers ───────────────────────────── */

/// Reads a u32 in LE format.
#[inline]
pub fn read_u32_le<R: Read>(mut r: R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Writes a u32 in LE format.
#[inline]
pub fn write_u32_le<W: Write>(mut w: W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Reads a u64 in LE format.
#[inline]
pub fn read_u64_le<R: Read>(mut r: R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Writes a u64 in LE format.
#[inline]
pub fn write_u64_le<W: Write>(mut w: W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Reads a u64 in BE format.
#[inline]
pub fn read_u64_be<R: Read>(mut r: R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Reads an i64 in LE format.
#[inline]
pub fn read_i64_le<R: Read>(mut r: R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Writes an i64 in LE format.
#[inline]
pub fn write_i64_le<W: Write>(mut w: W, v: i64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Encodes a sequence number as a fixed 8-byte big-endian value, so that LMDB key order
/// matches numeric order.
#[inline]
pub fn encode_seq(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

/// Decodes a value written by [`encode_seq`].
#[inline]
pub fn decode_seq(bytes: &[u8]) -> io::Result<u64> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("sequence value must be 8 bytes, got {}", bytes.len()),
        )
    })?;
    Ok(u64::from_be_bytes(array))
}

/* ──────────────────────────── byte / string helpers ──────────────────────────── */

/// Writes a byte string preceded by its length (compactsize).
pub fn write_bytes<W: Write>(mut w: W, bytes: &[u8]) -> io::Result<()> {
    CompactSize::write(&mut w, bytes.len() as u64)?;
    w.write_all(bytes)
}

/// Reads a byte string preceded by its length (compactsize).
pub fn read_bytes<R: Read>(mut r: R) -> io::Result<Vec<u8>> {
    let len = CompactSize::read(&mut r)?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes a UTF-8 string preceded by its length (compactsize).
pub fn write_string<W: Write>(w: W, s: &str) -> io::Result<()> {
    write_bytes(w, s.as_bytes())
}

/// Reads a UTF-8 string preceded by its length (compactsize).
pub fn read_string<R: Read>(r: R) -> io::Result<String> {
    String::from_utf8(read_bytes(r)?)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/* ──────────────────────────── Vec<T> helpers ────────────────────────────── */
/// Writes a vec of structs, preceded by number of items (compactsize).
pub fn write_vec<W, T, F>(mut w: W, vec: &[T], mut f: F) -> io::Result<()>
where
    W: Write,
    F: FnMut(&mut W, &T) -> io::Result<()>,
{
    CompactSize::write(&mut w, vec.len() as u64)?;
    for item in vec {
        f(&mut w, item)?
    }
    Ok(())
}

/// Reads a vec of structs, preceded by number of items (compactsize).
pub fn read_vec<R, T, F>(mut r: R, mut f: F) -> io::Result<Vec<T>>
where
    R: Read,
    F: FnMut(&mut R) -> io::Result<T>,
{
    let len = CompactSize::read(&mut r)?;
    let mut v = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        v.push(f(&mut r)?);
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_boundaries() {
        for (value, len) in [
            (0u64, 1usize),
            (252, 1),
            (253, 3),
            (0xFFFF, 3),
            (0x10000, 5),
            (0xFFFF_FFFF, 5),
            (0x1_0000_0000, 9),
        ] {
            let bytes = CompactSize::to_bytes(value);
            assert_eq!(bytes.len(), len, "encoded length of {value}");
            assert_eq!(CompactSize::read_u64(&bytes[..]).unwrap(), value);
        }
    }

    #[test]
    fn compact_size_rejects_non_canonical() {
        assert!(CompactSize::read_u64(&[253u8, 1, 0][..]).is_err());
    }

    #[test]
    fn collection_lengths_are_capped() {
        let bytes = CompactSize::to_bytes(u64::from(MAX_COMPACT_SIZE) + 1);
        assert!(CompactSize::read(&bytes[..]).is_err());
        assert!(CompactSize::read_u64(&bytes[..]).is_ok());
    }

    #[test]
    fn seq_keys_sort_numerically() {
        assert!(encode_seq(255) < encode_seq(256));
        assert_eq!(decode_seq(&encode_seq(90210)).unwrap(), 90210);
        assert!(decode_seq(&[1, 2, 3]).is_err());
    }
}
