pub mod header;
pub mod index;
pub mod io_stream;
pub mod validator;
pub mod files;
pub mod sweep;

pub use header::{Header, HEADER_SIZE};
pub use index::{DirectoryFlags, ExtendedInfo, IndexEntry};
pub use io_stream::{FormatError, PackageReader};
pub use validator::{validate, validate_stream, ErrorKind, ValidationError};
