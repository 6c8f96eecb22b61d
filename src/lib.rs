pub mod io_stream;
pub mod text;
pub mod progress;
pub mod pool;
pub mod table;
pub mod archive;
pub mod extract;
pub mod container;

pub use io_stream::SubStream;
pub use text::TextEncoding;
pub use pool::{DataPool, StringPool};
pub use table::{Field, FieldType, MaskKey, Row, Table, TableError, TableReader, TableWriter, Value, WriterSettings};
pub use archive::{Afs2Archive, ArchiveData, ArchiveError, Entry};
pub use extract::{ExtractOptions, ExtractReport, Extractor};
pub use container::Container;
