use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::domain::menu::{CanonicalMenuExport, TenantId};
use crate::menu::index::{MenuIndex, MenuIndexError};

/// Current menu index per tenant.
///
/// A publish builds a complete new [`MenuIndex`] outside the lock and then swaps the
/// `Arc`. Readers holding the previous `Arc` keep a consistent snapshot until they drop it.
#[derive(Default)]
pub struct MenuRegistry {
    indexes: RwLock<HashMap<TenantId, Arc<MenuIndex>>>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, export: CanonicalMenuExport) -> Result<Arc<MenuIndex>, MenuIndexError> {
        let tenant_id = export.tenant_id.clone();
        let offered = export.version;
        if let Some(current) = self.current(&tenant_id) {
            if current.version() >= offered {
                return Err(MenuIndexError::StaleVersion {
                    tenant: tenant_id.0,
                    current: current.version(),
                    offered,
                });
            }
        }

        let index = Arc::new(MenuIndex::build(export)?);

        let mut indexes = match self.indexes.write() {
            Ok(indexes) => indexes,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Re-check under the write lock; a concurrent publish may have won the race.
        if let Some(current) = indexes.get(&tenant_id) {
            if current.version() >= offered {
                return Err(MenuIndexError::StaleVersion {
                    tenant: tenant_id.0,
                    current: current.version(),
                    offered,
                });
            }
        }
        indexes.insert(tenant_id.clone(), Arc::clone(&index));
        drop(indexes);

        info!(
            event_name = "menu.index.published",
            tenant_id = %tenant_id.0,
            version = offered,
            items = index.items().count(),
            synonyms = index.synonyms().len(),
            "menu index rebuilt and swapped in"
        );
        Ok(index)
    }

    pub fn current(&self, tenant_id: &TenantId) -> Option<Arc<MenuIndex>> {
        let indexes = match self.indexes.read() {
            Ok(indexes) => indexes,
            Err(poisoned) => poisoned.into_inner(),
        };
        indexes.get(tenant_id).cloned()
    }
}
