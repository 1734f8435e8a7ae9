//! Module container
//!
//! The shared dependency container populated during boot. Every configured
//! module ends up with a defined entry: either a live service or an explicit
//! `Absent` placeholder, so consumers resolving a registration name never hit
//! a missing-key error for a module the platform knows about. Resolution
//! returns an `Option`, forcing callers to handle the absent case.

use std::collections::HashMap;
use std::sync::Arc;

use crate::datastore::Datastore;
use crate::module::traits::ModuleService;

/// A container entry.
#[derive(Clone)]
pub enum Registration {
    /// Live service instance
    Service(Arc<dyn ModuleService>),
    /// Defined-but-empty placeholder: the module is disabled or failed to
    /// load and the boot policy allowed continuing
    Absent,
}

impl Registration {
    pub fn is_absent(&self) -> bool {
        matches!(self, Registration::Absent)
    }
}

/// Shared dependency container.
///
/// Built single-threaded during the boot sequence, read-only afterwards.
/// Owns the shared datastore that modules with `resources = "shared"` borrow.
pub struct ModuleContainer {
    registrations: HashMap<String, Registration>,
    shared_datastore: Arc<dyn Datastore>,
}

impl ModuleContainer {
    pub fn new(shared_datastore: Arc<dyn Datastore>) -> Self {
        Self {
            registrations: HashMap::new(),
            shared_datastore,
        }
    }

    /// The container-owned shared datastore.
    pub fn shared_datastore(&self) -> &Arc<dyn Datastore> {
        &self.shared_datastore
    }

    /// Register a live service under a registration name.
    pub fn register_service(
        &mut self,
        registration_name: impl Into<String>,
        service: Arc<dyn ModuleService>,
    ) {
        self.registrations
            .insert(registration_name.into(), Registration::Service(service));
    }

    /// Register a placeholder for a module that is disabled or failed.
    pub fn register_absent(&mut self, registration_name: impl Into<String>) {
        self.registrations
            .insert(registration_name.into(), Registration::Absent);
    }

    /// Resolve a live service. `None` means the name is unknown *or* the
    /// module is registered absent; use [`lookup`](Self::lookup) to
    /// distinguish.
    pub fn resolve(&self, registration_name: &str) -> Option<Arc<dyn ModuleService>> {
        match self.registrations.get(registration_name) {
            Some(Registration::Service(service)) => Some(Arc::clone(service)),
            _ => None,
        }
    }

    /// Look up the raw registration entry.
    pub fn lookup(&self, registration_name: &str) -> Option<&Registration> {
        self.registrations.get(registration_name)
    }

    /// Resolve a service by its joiner `service_name` rather than its
    /// registration name. Link modules register under their service name, so
    /// this covers both real and link services.
    pub fn resolve_service_name(&self, service_name: &str) -> Option<Arc<dyn ModuleService>> {
        if let Some(service) = self.resolve(service_name) {
            return Some(service);
        }
        self.registrations.values().find_map(|r| match r {
            Registration::Service(service) if service.service_name() == service_name => {
                Some(Arc::clone(service))
            }
            _ => None,
        })
    }

    /// Registration names present in the container, sorted.
    pub fn registration_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registrations.keys().cloned().collect();
        names.sort();
        names
    }

    /// Live services currently registered.
    pub fn services(&self) -> Vec<Arc<dyn ModuleService>> {
        self.registrations
            .values()
            .filter_map(|r| match r {
                Registration::Service(service) => Some(Arc::clone(service)),
                Registration::Absent => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryStore;
    use crate::link::config::{EntityShape, JoinerAlias, ModuleJoinerConfig};
    use crate::module::traits::{FetchRequest, FetchResult, ModuleError};
    use async_trait::async_trait;

    struct StubService {
        name: String,
    }

    #[async_trait]
    impl ModuleService for StubService {
        fn service_name(&self) -> &str {
            &self.name
        }

        fn joiner_config(&self) -> ModuleJoinerConfig {
            ModuleJoinerConfig {
                service_name: self.name.clone(),
                is_link: false,
                primary_keys: vec!["id".to_string()],
                alias: vec![JoinerAlias::new(self.name.clone())],
                entities: vec![EntityShape::new(self.name.clone(), &["id"])],
                relationships: vec![],
                extends: vec![],
            }
        }

        async fn fetch(&self, _request: FetchRequest) -> Result<FetchResult, ModuleError> {
            Ok(FetchResult {
                rows: vec![],
                count: 0,
            })
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn container() -> ModuleContainer {
        ModuleContainer::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn resolve_returns_none_for_absent_placeholder() {
        let mut container = container();
        container.register_absent("auth_module");

        assert!(container.resolve("auth_module").is_none());
        assert!(container.lookup("auth_module").unwrap().is_absent());
    }

    #[test]
    fn resolve_returns_none_for_unknown_name() {
        let container = container();
        assert!(container.resolve("never_registered").is_none());
        assert!(container.lookup("never_registered").is_none());
    }

    #[test]
    fn registered_service_resolves_by_registration_and_service_name() {
        let mut container = container();
        container.register_service(
            "product_module",
            Arc::new(StubService {
                name: "product".to_string(),
            }),
        );

        assert!(container.resolve("product_module").is_some());
        assert!(container.resolve_service_name("product").is_some());
        assert!(container.resolve_service_name("inventory").is_none());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut container = container();
        container.register_absent("product_module");
        container.register_service(
            "product_module",
            Arc::new(StubService {
                name: "product".to_string(),
            }),
        );

        assert!(container.resolve("product_module").is_some());
        assert_eq!(container.services().len(), 1);
    }
}
