//! Loads an LC-3 image file: a big-endian `origin` word followed by a
//! big-endian sequence of words to place starting at that address.

use crate::bits::swap16;
use crate::state::memory::{KeySource, Memory};
use byteorder::{NativeEndian, ReadBytesExt};
use std::io::{self, BufReader};
use std::fs::File;

/// Reads `path` and writes its contents into `memory` starting at the image's
/// embedded origin. Loading stops once the address space is exhausted; any
/// remaining bytes in the file are ignored, matching the original format's
/// "never longer than `0x10000 - origin` words" contract.
///
/// Words are stored big-endian on disk regardless of host byte order, so
/// each one is read in native order and then byte-swapped.
pub fn load_image<K: KeySource>(path: &str, memory: &mut Memory<K>) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let origin = swap16(reader.read_u16::<NativeEndian>()?);
    let mut address = origin;

    loop {
        let word = match reader.read_u16::<NativeEndian>() {
            Ok(word) => swap16(word),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };

        memory.write(address, word);

        if address == u16::MAX {
            // Filled through the top of the address space; anything left in
            // the file is excess and is ignored.
            break;
        }
        address += 1;
    }

    Ok(())
}
