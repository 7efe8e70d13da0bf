#[allow(clippy::module_inception)]
pub mod container;
pub mod builder;
pub mod diagnostics;
pub mod in_flight;
pub mod key;
pub mod registry;
pub mod typed;


pub use container::Container;
pub use builder::ContainerBuilder;
pub use diagnostics::ContainerSnapshot;
pub use in_flight::{ChainId, InFlightTracker};
pub use key::TypeKey;
pub use registry::{ComponentStore, Constructor, ConstructorStore, Instance, Registry};
pub use typed::downcast;
