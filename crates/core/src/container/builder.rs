use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::container::container::Container;
use crate::errors::{BoxError, ContainerError};

type Registration = Box<dyn FnOnce(&Container) -> Result<(), ContainerError> + Send>;

/// Builder for a container with fluent bootstrap API
///
/// Registrations are recorded and applied in order when [`ContainerBuilder::build`]
/// runs, after the configuration has been validated.
pub struct ContainerBuilder {
    config: ContainerConfig,
    registrations: Vec<Registration>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            registrations: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a ready instance
    pub fn instance<T>(mut self, value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.registrations
            .push(Box::new(move |container: &Container| container.register_instance(value)));
        self
    }

    /// Register a lazily invoked constructor
    pub fn constructor<T, F>(mut self, constructor: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.registrations
            .push(Box::new(move |container: &Container| container.register_constructor(constructor)));
        self
    }

    /// Register a constructor memoized to run successfully at most once
    pub fn singleton<T, F>(mut self, constructor: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.registrations.push(Box::new(move |container: &Container| {
            container.register_singleton_constructor(constructor)
        }));
        self
    }

    /// Number of registrations recorded so far
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Validate the configuration and apply every registration
    pub fn build(self) -> Result<Container, ContainerError> {
        let container = Container::with_config(self.config)?;
        let count = self.registrations.len();

        for registration in self.registrations {
            registration(&container)?;
        }

        tracing::info!("Container built with {} registrations", count);
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("config", &self.config)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CycleDetection;
    use std::time::Duration;

    trait WatchHistory: Send + Sync {
        fn entries(&self) -> usize;
    }

    struct InMemoryWatchHistory(usize);

    impl WatchHistory for InMemoryWatchHistory {
        fn entries(&self) -> usize {
            self.0
        }
    }

    struct Recommender {
        history: Arc<dyn WatchHistory>,
    }

    #[test]
    fn test_builder_registers_in_order() {
        let builder = ContainerBuilder::new()
            .with_config(
                ContainerConfig::new()
                    .with_resolve_timeout(Duration::from_millis(500))
                    .with_cycle_detection(CycleDetection::Global),
            )
            .instance::<dyn WatchHistory>(Arc::new(InMemoryWatchHistory(12)))
            .constructor(|c: &Container| -> Result<Arc<Recommender>, BoxError> {
                Ok(Arc::new(Recommender {
                    history: c.resolve_typed::<dyn WatchHistory>()?,
                }))
            });
        assert_eq!(builder.registration_count(), 2);

        let container = builder.build().unwrap();
        assert_eq!(container.config().resolve_timeout, Duration::from_millis(500));
        assert_eq!(container.config().cycle_detection, CycleDetection::Global);

        let recommender = container.resolve_typed::<Recommender>().unwrap();
        assert_eq!(recommender.history.entries(), 12);
    }

    #[test]
    fn test_builder_singleton() {
        let container = ContainerBuilder::new()
            .singleton(|_: &Container| -> Result<Arc<u16>, BoxError> { Ok(Arc::new(8096)) })
            .build()
            .unwrap();

        assert_eq!(*container.resolve_typed::<u16>().unwrap(), 8096);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = ContainerBuilder::new()
            .with_config(ContainerConfig::new().with_resolve_timeout(Duration::ZERO))
            .build();

        assert!(matches!(result, Err(ContainerError::Configuration(_))));
    }
}
