// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Provider factory used by the host binary: providers come from the wrapped
// factory, session flags live in `session.json` next to the config.

use std::sync::Arc;

use visit_sdk_bridge::EventSink;
use visit_sdk_bridge::storage::FileSessionStorage;
use visit_sdk_bridge::traits::{HealthConnectProvider, ProviderFactory, SessionStorage, UiSurface};

pub struct HostFactory {
    providers: Box<dyn ProviderFactory>,
    storage: Arc<FileSessionStorage>,
}

impl HostFactory {
    pub fn new(providers: Box<dyn ProviderFactory>, storage: FileSessionStorage) -> Self {
        Self {
            providers,
            storage: Arc::new(storage),
        }
    }
}

impl ProviderFactory for HostFactory {
    fn create_provider(
        &self,
        surface: &Arc<dyn UiSurface>,
        events: EventSink,
    ) -> Arc<dyn HealthConnectProvider> {
        self.providers.create_provider(surface, events)
    }

    fn create_session_storage(&self, _surface: &Arc<dyn UiSurface>) -> Arc<dyn SessionStorage> {
        self.storage.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visit_sdk_bridge::simulated::SimulatedPlatform;
    use visit_sdk_core::types::ConnectionState;

    #[test]
    fn storage_comes_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let platform = SimulatedPlatform::new(ConnectionState::Installed);
        let factory = HostFactory::new(platform.factory(), FileSessionStorage::open(dir.path()));

        let storage = factory.create_session_storage(&platform.surface_handle());
        storage.set_previously_revoked(true).unwrap();
        assert!(dir.path().join(FileSessionStorage::FILE_NAME).exists());
        assert!(FileSessionStorage::open(dir.path()).previously_revoked());
    }
}
