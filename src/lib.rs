/// fadepix: anonymous, ephemeral image hosting
///
/// An upload yields an opaque URL that serves the image for sixty
/// seconds; after that, access is denied unconditionally. The library
/// is organized as a deny-by-default access-control core (token
/// generator, blob store, metadata index, upload coordinator, access
/// arbiter) with a thin HTTP adapter on top.

pub mod access;
pub mod api;
pub mod blob_store;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod metadata;
pub mod server;
pub mod token;
pub mod upload;
