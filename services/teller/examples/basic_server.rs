//! Basic image server example
//!
//! Run with: cargo run -p teller --example basic_server

use storage::{BackendResolver, MemoryStorage};
use teller::{FileDescriptor, ImageDescriptor, Registries, StaticRegistry, TellerBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Create an in-memory storage backend holding two image files
    let storage = MemoryStorage::new()
        .with_object("images", "kernel", "ABCD")
        .with_object("images", "ramdisk", "EF");

    // Describe one image made of both files
    let image = ImageDescriptor::new(
        "1",
        vec![
            FileDescriptor::new("memory://images/kernel".parse()?, 4),
            FileDescriptor::new("memory://images/ramdisk".parse()?, 2),
        ],
    );

    // Build the image service
    let app = TellerBuilder::new()
        .backends(BackendResolver::new().with(storage))
        .registries(Registries::new().with("parallax", StaticRegistry::new().with_image(image)))
        .build();

    // Bind to address
    let addr = "127.0.0.1:9292";
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Teller listening on http://{}", addr);
    tracing::info!("Try: curl http://{}/images/1", addr);

    // Serve the image service
    axum::serve(listener, app).await?;

    Ok(())
}
