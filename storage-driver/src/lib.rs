//! Interface between image storage backends and the code that reads them.

mod chunk;
mod driver;
mod error;

pub use chunk::ChunkStream;
pub use chunk::SizeChecked;
pub use driver::Driver;
pub use driver::DEFAULT_CHUNK_SIZE;
pub use error::SizeMismatch;
pub use error::StorageError;
pub use error::StorageErrorBuilder;
pub use error::StorageErrorKind;
