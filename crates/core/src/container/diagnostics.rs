use serde::Serialize;

use crate::config::CycleDetection;
use crate::container::container::Container;
use crate::errors::ContainerError;

/// Point-in-time view of a container, for dumping when a resolution times out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSnapshot {
    /// Keys with a registered constructor
    pub constructors: Vec<String>,
    /// Keys with a registered or published instance
    pub instances: Vec<String>,
    /// Keys whose constructor is running
    pub in_flight: Vec<String>,
    pub resolve_timeout_ms: u64,
    pub cycle_detection: CycleDetection,
}

impl ContainerSnapshot {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Container {
    /// Capture registered, published and in-flight keys
    pub fn snapshot(&self) -> Result<ContainerSnapshot, ContainerError> {
        let registry = self.read_registry()?;
        let names = |keys: Vec<crate::container::key::TypeKey>| {
            keys.iter().map(|key| key.type_name().to_string()).collect::<Vec<_>>()
        };

        Ok(ContainerSnapshot {
            constructors: names(registry.constructors.keys()),
            instances: names(registry.components.keys()),
            in_flight: names(registry.in_flight.keys()),
            resolve_timeout_ms: self.config().resolve_timeout.as_millis() as u64,
            cycle_detection: self.config().cycle_detection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BoxError;
    use std::sync::Arc;

    struct TranscodeQueue;

    #[test]
    fn test_snapshot_lists_keys() {
        let container = Container::new();
        container.register_instance(Arc::new(1u8)).unwrap();
        container
            .register_constructor(|_: &Container| -> Result<Arc<TranscodeQueue>, BoxError> {
                Ok(Arc::new(TranscodeQueue))
            })
            .unwrap();

        let snapshot = container.snapshot().unwrap();
        assert_eq!(snapshot.instances, vec!["u8".to_string()]);
        assert_eq!(snapshot.constructors.len(), 1);
        assert!(snapshot.constructors[0].ends_with("TranscodeQueue"));
        assert!(snapshot.in_flight.is_empty());
        assert_eq!(snapshot.resolve_timeout_ms, 5000);

        container.resolve_typed::<TranscodeQueue>().unwrap();
        assert_eq!(container.snapshot().unwrap().instances.len(), 2);
    }

    #[test]
    fn test_snapshot_json() {
        let container = Container::new();
        let json = container.snapshot().unwrap().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["cycle_detection"], "call_chain");
        assert_eq!(value["resolve_timeout_ms"], 5000);
        assert!(value["instances"].as_array().unwrap().is_empty());
    }
}
