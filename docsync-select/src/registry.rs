//! Selector registry: entity type → [`EntitySelector`].

use crate::error::{SelectError, SelectResult};
use crate::selector::EntitySelector;
use docsync_types::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// What `register` does when the entity type already has a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`SelectError::Duplicate`].
    Reject,
    /// Log a warning and replace the existing selector.
    WarnAndOverwrite,
}

impl Default for DuplicatePolicy {
    /// `Reject` in debug builds, `WarnAndOverwrite` in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DuplicatePolicy::Reject
        } else {
            DuplicatePolicy::WarnAndOverwrite
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl RegistryConfig {
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Maps entity types to their selectors.
///
/// Instances are independent; [`SelectorRegistry::global`] is the shared
/// process-wide default.
#[derive(Debug, Default)]
pub struct SelectorRegistry {
    config: RegistryConfig,
    selectors: RwLock<HashMap<EntityType, Arc<EntitySelector>>>,
}

static GLOBAL: OnceLock<SelectorRegistry> = OnceLock::new();

impl SelectorRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            selectors: RwLock::default(),
        }
    }

    /// The process-wide registry, created with the default configuration on
    /// first use.
    pub fn global() -> &'static SelectorRegistry {
        GLOBAL.get_or_init(SelectorRegistry::default)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EntityType, Arc<EntitySelector>>> {
        self.selectors.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EntityType, Arc<EntitySelector>>> {
        self.selectors.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a selector under its schema's entity type.
    pub fn register(&self, selector: EntitySelector) -> SelectResult<Arc<EntitySelector>> {
        let entity_type = selector.entity_type().clone();
        if !entity_type.is_valid() {
            return Err(SelectError::InvalidEntityType(entity_type.to_string()));
        }

        let selector = Arc::new(selector);
        let mut selectors = self.write();
        if selectors.contains_key(&entity_type) {
            match self.config.duplicate_policy {
                DuplicatePolicy::Reject => return Err(SelectError::Duplicate(entity_type)),
                DuplicatePolicy::WarnAndOverwrite => {
                    warn!("Overwriting selector for entity type {}", entity_type);
                }
            }
        }
        selectors.insert(entity_type.clone(), Arc::clone(&selector));
        debug!("Registered selector for {}", entity_type);
        Ok(selector)
    }

    pub fn get(&self, entity_type: &EntityType) -> Option<Arc<EntitySelector>> {
        self.read().get(entity_type).cloned()
    }

    /// The registered selector, or a permissive one registered on the spot.
    pub fn get_or_default(&self, entity_type: &EntityType) -> Arc<EntitySelector> {
        if let Some(selector) = self.get(entity_type) {
            return selector;
        }
        let mut selectors = self.write();
        Arc::clone(selectors.entry(entity_type.clone()).or_insert_with(|| {
            debug!("Created permissive selector for {}", entity_type);
            Arc::new(EntitySelector::permissive(entity_type.clone()))
        }))
    }

    pub fn unregister(&self, entity_type: &EntityType) -> Option<Arc<EntitySelector>> {
        self.write().remove(entity_type)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Registered entity types, sorted.
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
