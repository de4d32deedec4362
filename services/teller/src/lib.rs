//! # Teller
//!
//! A thin HTTP service which streams disk images. An image id is resolved
//! against a registry, which describes the image as an ordered list of files.
//! Each file names a location whose URI scheme selects a storage backend, and
//! the files are streamed back to back as the response body.
//!
//! ## Routes
//!
//! - `GET /images/{id}?registry={name}` streams the image
//! - `GET /images`, `POST /images`, `PUT /images/{id}` and
//!   `DELETE /images/{id}` answer `501 Not Implemented`
//!
//! ## Example
//!
//! ```no_run
//! use storage::{BackendResolver, MemoryStorage};
//! use teller::{ImageDescriptor, FileDescriptor, Registries, StaticRegistry, TellerBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = MemoryStorage::new().with_object("images", "kernel", "ABCD");
//! let image = ImageDescriptor::new(
//!     "1",
//!     vec![FileDescriptor::new("memory://images/kernel".parse()?, 4)],
//! );
//!
//! let teller = TellerBuilder::new()
//!     .backends(BackendResolver::new().with(storage))
//!     .registries(Registries::new().with("parallax", StaticRegistry::new().with_image(image)))
//!     .build();
//!
//! // Use the image service with axum or any tower-compatible server
//! # Ok(())
//! # }
//! ```

mod api;
mod assembler;
mod config;
mod descriptor;
mod error;
mod image;
mod parallax;
mod registry;

pub use api::{DEFAULT_CONTENT_TYPE, TellerBuilder, TellerState};
pub use assembler::ImageAssembler;
pub use config::{ConfigError, RegistryConfig, RetryConfig, TellerConfig};
pub use descriptor::{FileDescriptor, ImageDescriptor};
pub use error::{TellerError, TellerResult};
pub use parallax::ParallaxRegistry;
pub use registry::{DEFAULT_REGISTRY, ImageRegistry, Registries, StaticRegistry};
