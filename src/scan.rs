use std::io::{self, Read};

use crate::error::{Error, Result};

/// Pull one byte from `reader`, or `None` once the stream is exhausted.
///
/// Interrupted reads are retried. Any other failure is fatal.
pub fn scan_byte<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::Read(e)),
        }
    }
}

/// Pull one byte from `reader`. End of stream reads as `0`.
pub fn next_byte<R: Read + ?Sized>(reader: &mut R) -> Result<u8> {
    Ok(scan_byte(reader)?.unwrap_or(0))
}
