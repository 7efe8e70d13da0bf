//! Dependency-resolution container for the mediahub backend.
//!
//! Repositories, services, media-server clients and sync jobs are registered at
//! bootstrap as ready instances or as constructors, then resolved lazily by type.
//! The container caches what it builds, detects circular construction chains,
//! isolates panicking constructors and bounds how long a caller waits.

pub mod config;
pub mod container;
pub mod errors;

pub use config::{ConfigError, ConfigSource, ContainerConfig, CycleDetection};
pub use container::{
    ChainId, Constructor, Container, ContainerBuilder, ContainerSnapshot, Instance, TypeKey,
};
pub use errors::{BoxError, ContainerError, ResolutionTrace};

