//! Cached test discovery with single-writer reload.
//!
//! Discovery is callable concurrently; a second caller during an in-flight
//! scan waits on the write lock and then sees the scanned result. Reload
//! takes the same write lock, so it is serialized against discovery.

use std::sync::Arc;

use tokio::sync::RwLock;

use preflight_core::{DiscoverySnapshot, ProjectError, TestDescriptor, TestProject};

/// Cached view of the project's discovered tests.
pub struct Discovery {
    project: Arc<dyn TestProject>,
    cache: RwLock<Option<DiscoverySnapshot>>,
}

impl Discovery {
    pub fn new(project: Arc<dyn TestProject>) -> Self {
        Discovery {
            project,
            cache: RwLock::new(None),
        }
    }

    /// Current discovery snapshot, scanning the project if the cache is cold.
    pub async fn snapshot(&self) -> DiscoverySnapshot {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return snapshot.clone();
        }

        let mut guard = self.cache.write().await;
        // A concurrent caller may have filled the cache while we waited.
        if let Some(snapshot) = guard.as_ref() {
            return snapshot.clone();
        }
        let snapshot = self.project.tests();
        if let Some(error) = &snapshot.error {
            tracing::warn!(%error, "test discovery reported a load failure");
        }
        *guard = Some(snapshot.clone());
        snapshot
    }

    /// Looks up one descriptor in the current snapshot.
    pub async fn find(&self, qualified_name: &str) -> Option<TestDescriptor> {
        self.snapshot()
            .await
            .tests
            .into_iter()
            .find(|t| t.qualified_name == qualified_name)
    }

    /// Drops cached test code via the plugin and rescans.
    ///
    /// Holds the cache write lock for the duration, serializing reload
    /// against concurrent discovery.
    pub async fn reload(&self) -> Result<(), ProjectError> {
        let mut guard = self.cache.write().await;
        self.project.reload()?;
        *guard = Some(self.project.tests());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use preflight_core::{CaseRecorder, CaseSpec, LoadedTests, StaticProject, TestRegistration};

    use super::*;

    fn counting_project(counter: Arc<AtomicUsize>) -> Arc<StaticProject> {
        Arc::new(StaticProject::new(Arc::new(move || {
            let generation = counter.fetch_add(1, Ordering::SeqCst);
            LoadedTests::ok(vec![TestRegistration::new(
                "mod_a",
                format!("test_gen_{}", generation),
                None,
                Arc::new(|recorder: &mut CaseRecorder| {
                    recorder.case(CaseSpec::new("ping", vec![]));
                    Ok(())
                }),
            )])
        })))
    }

    #[tokio::test]
    async fn snapshot_is_cached_between_calls() {
        let counter = Arc::new(AtomicUsize::new(0));
        let discovery = Discovery::new(counting_project(Arc::clone(&counter)));

        let first = discovery.snapshot().await;
        let second = discovery.snapshot().await;
        assert_eq!(first, second);
        // StaticProject::new runs the loader once; the cache prevents more.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reload_refreshes_the_snapshot() {
        let counter = Arc::new(AtomicUsize::new(0));
        let discovery = Discovery::new(counting_project(Arc::clone(&counter)));

        assert_eq!(discovery.snapshot().await.tests[0].name, "test_gen_0");
        discovery.reload().await.unwrap();
        assert_eq!(discovery.snapshot().await.tests[0].name, "test_gen_1");
    }

    #[tokio::test]
    async fn find_resolves_qualified_names() {
        let counter = Arc::new(AtomicUsize::new(0));
        let discovery = Discovery::new(counting_project(counter));

        assert!(discovery.find("mod_a::test_gen_0").await.is_some());
        assert!(discovery.find("mod_a::test_missing").await.is_none());
    }
}
