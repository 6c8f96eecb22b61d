//! Load/save entry points shared by every top-level format.
//!
//! Implementors decode from and encode to any seekable stream; paths and
//! in-memory buffers come for free.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use crate::archive::{Afs2Archive, ArchiveError};
use crate::table::{Table, TableError};

pub trait Container: Sized {
    type Error: From<io::Error>;

    /// Decode starting at the source's current position.
    fn read_from<R: Read + Seek>(source: &mut R) -> Result<Self, Self::Error>;

    /// Encode at the destination's current position.
    fn write_to<W: Read + Write + Seek>(&mut self, destination: &mut W) -> Result<(), Self::Error>;

    fn load_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error> {
        let mut file = BufReader::new(File::open(path)?);
        Self::read_from(&mut file)
    }

    fn load_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::read_from(&mut Cursor::new(bytes))
    }

    /// Create or truncate `path`.  The file is opened read-write because
    /// masking rereads what was written.
    fn save_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Self::Error> {
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;
        self.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>, Self::Error> {
        let mut out = Cursor::new(Vec::new());
        self.write_to(&mut out)?;
        Ok(out.into_inner())
    }
}

impl Container for Table {
    type Error = TableError;

    fn read_from<R: Read + Seek>(source: &mut R) -> Result<Self, TableError> {
        Table::read(source)
    }

    fn write_to<W: Read + Write + Seek>(&mut self, destination: &mut W) -> Result<(), TableError> {
        self.write(destination)
    }
}

impl Container for Afs2Archive {
    type Error = ArchiveError;

    fn read_from<R: Read + Seek>(source: &mut R) -> Result<Self, ArchiveError> {
        Afs2Archive::read_from(source)
    }

    fn write_to<W: Read + Write + Seek>(&mut self, destination: &mut W) -> Result<(), ArchiveError> {
        self.write(destination)
    }
}
