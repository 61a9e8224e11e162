use std::io::{self, Read, Write};

/// Maximum payload bytes per object block.
pub const MAX_PAYLOAD: usize = 0xFF;

/// Checksum seed. Not algebraically neutral; kept for binary compatibility
/// with existing object files.
pub const CHECKSUM_SEED: u8 = 0xFF;

/// One self-describing run of bytes: start address, payload, trailing
/// XOR checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub start: u16,
    pub data: Vec<u8>,
}

impl Block {
    pub fn checksum(&self) -> u8 {
        self.data.iter().fold(CHECKSUM_SEED, |chk, b| chk ^ b)
    }

    /// Raw binary form: start (big-endian), length, payload, checksum.
    pub fn write_bin<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.start.to_be_bytes())?;
        w.write_all(&[self.data.len() as u8])?;
        w.write_all(&self.data)?;
        w.write_all(&[self.checksum()])?;
        Ok(())
    }

    /// Read one block in binary form. Returns `None` on a clean end of
    /// stream. The checksum byte is consumed but not verified; only the
    /// structure is load-bearing.
    pub fn read_bin<R: Read>(r: &mut R) -> io::Result<Option<Block>> {
        let mut header = [0u8; 3];
        match r.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let start = u16::from_be_bytes([header[0], header[1]]);
        let len = header[2] as usize;
        let mut data = vec![0u8; len];
        r.read_exact(&mut data)?;
        let mut chk = [0u8; 1];
        r.read_exact(&mut chk)?;
        Ok(Some(Block { start, data }))
    }

    /// Companion text form: the same fields as upper-hex byte pairs, line
    /// broken every 16 values for readability.
    pub fn write_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{:02X} {:02X} ", self.start >> 8, self.start & 0xFF)?;
        write!(w, "{:02X} ", self.data.len())?;
        for (i, b) in self.data.iter().enumerate() {
            write!(w, "{:02X} ", b)?;
            if (i + 4) % 16 == 0 {
                writeln!(w)?;
            }
        }
        write!(w, "{:02X}", self.checksum())?;
        Ok(())
    }

    /// Read one block in text form: whitespace-separated hex byte pairs in
    /// the same order as the binary form. Returns `None` on a clean end of
    /// input; as with [`Block::read_bin`], the checksum is consumed but not
    /// verified.
    pub fn read_text<R: Read>(r: &mut R) -> io::Result<Option<Block>> {
        let hi = match next_pair(r)? {
            Some(b) => b,
            None => return Ok(None),
        };
        let lo = expect_pair(r)?;
        let len = expect_pair(r)? as usize;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(expect_pair(r)?);
        }
        expect_pair(r)?;
        Ok(Some(Block {
            start: u16::from_be_bytes([hi, lo]),
            data,
        }))
    }
}

/// Next whitespace-delimited hex pair, or `None` at end of input. Byte-wise
/// reads keep the stream positioned for the following pair.
fn next_pair<R: Read>(r: &mut R) -> io::Result<Option<u8>> {
    let mut token = String::new();
    let mut buf = [0u8; 1];
    loop {
        if r.read(&mut buf)? == 0 {
            break;
        }
        if buf[0].is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            break;
        }
        token.push(buf[0] as char);
    }
    if token.is_empty() {
        return Ok(None);
    }
    u8::from_str_radix(&token, 16)
        .map(Some)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("bad hex pair `{token}`")))
}

fn expect_pair<R: Read>(r: &mut R) -> io::Result<u8> {
    next_pair(r)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated text block"))
}

/// Split a contiguous byte run into blocks of at most [`MAX_PAYLOAD`] bytes,
/// each independently checksummed, start addresses continuing contiguously.
pub fn split(start: u16, bytes: &[u8]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut addr = start;
    for chunk in bytes.chunks(MAX_PAYLOAD) {
        blocks.push(Block {
            start: addr,
            data: chunk.to_vec(),
        });
        addr = addr.wrapping_add(chunk.len() as u16);
    }
    blocks
}
