use futures::{
    future::{
        BoxFuture,
        Shared,
    },
    FutureExt as _,
};
use meet_faces_config::{
    Settings,
    SettingsStore,
};
use parking_lot::Mutex;
use std::sync::Arc;

type SettingsLoad = Shared<BoxFuture<'static, Settings>>;

/// Settings loaded on first use and kept until [`MemoizedSettings::reload`].
///
/// Concurrent callers share a single pending load. A failed load is logged and
/// answered with the defaults.
pub struct MemoizedSettings {
    store: Arc<dyn SettingsStore>,
    current: Mutex<Option<SettingsLoad>>,
}

impl MemoizedSettings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    fn load(&self) -> SettingsLoad {
        let store = self.store.clone();
        async move {
            match store.load().await {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Failed to load settings, using defaults: {err:?}");
                    Settings::default()
                }
            }
        }
        .boxed()
        .shared()
    }

    pub async fn get(&self) -> Settings {
        let load = self.current.lock().get_or_insert_with(|| self.load()).clone();
        load.await
    }

    /// Replaces the cached settings with a fresh load.
    pub async fn reload(&self) -> Settings {
        let load = self.load();
        *self.current.lock() = Some(load.clone());
        load.await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use meet_faces_config::SettingsKey;
    use pretty_assertions::assert_eq;
    use std::{
        sync::atomic::{
            AtomicUsize,
            Ordering,
        },
        time::Duration,
    };

    /// In-memory store that counts loads; each load takes 10ms.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) settings: parking_lot::Mutex<Settings>,
        pub(crate) loads: AtomicUsize,
        pub(crate) fail: std::sync::atomic::AtomicBool,
    }

    impl MemoryStore {
        pub(crate) fn with(settings: Settings) -> Self {
            Self {
                settings: parking_lot::Mutex::new(settings),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn load(&self) -> eyre::Result<Settings> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail.load(Ordering::SeqCst) {
                eyre::bail!("storage unavailable");
            }
            Ok(*self.settings.lock())
        }

        async fn save(&self, settings: &Settings) -> eyre::Result<()> {
            *self.settings.lock() = *settings;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loads_lazily_once_for_concurrent_callers() {
        let store = Arc::new(MemoryStore::default());
        let settings = MemoizedSettings::new(store.clone());
        assert_eq!(store.loads.load(Ordering::SeqCst), 0);

        let (a, b, c) = tokio::join!(settings.get(), settings.get(), settings.get());
        assert_eq!([a, b, c], [Settings::default(); 3]);
        assert_eq!(settings.get().await, Settings::default());
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_replaces_cached_value() {
        let store = Arc::new(MemoryStore::default());
        let settings = MemoizedSettings::new(store.clone());
        assert!(settings.get().await.is_enabled);

        store.set(SettingsKey::IsEnabled, false).await.unwrap();
        assert!(settings.get().await.is_enabled, "cached until reloaded");

        assert!(!settings.reload().await.is_enabled);
        assert!(!settings.get().await.is_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_falls_back_to_defaults() {
        let store = Arc::new(MemoryStore::with(Settings::default().with(SettingsKey::IncludeYou, true)));
        store.fail.store(true, Ordering::SeqCst);
        let settings = MemoizedSettings::new(store.clone());

        assert_eq!(settings.get().await, Settings::default());

        store.fail.store(false, Ordering::SeqCst);
        assert!(settings.reload().await.include_you);
    }
}
