//! The project plugin seam: where user test code lives.
//!
//! The orchestrator never assumes in-process code mutation. It sees user
//! tests through [`TestProject`]: a listing of descriptors, a reload hook
//! that invalidates whatever the plugin cached, and an entry point that runs
//! one test body against a [`CaseRecorder`].
//!
//! [`StaticProject`] is the bundled implementation: it holds a loader
//! closure and re-runs it on `reload()`, so embedders with a dynamic source
//! of tests (generated code, out-of-process helpers) get real reload
//! semantics without dynamic linking.

use std::sync::{Arc, RwLock};

use crate::case::CaseRecorder;
use crate::descriptor::TestDescriptor;

/// A consistent view of the discovered test set.
///
/// `error` carries the load failure text when parts of the project could not
/// be loaded; `tests` still lists everything that did load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySnapshot {
    pub tests: Vec<TestDescriptor>,
    pub error: Option<String>,
}

/// Errors raised by a project plugin.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project load failed: {0}")]
    LoadFailed(String),

    #[error("test not found: {0}")]
    TestNotFound(String),

    #[error("test raised: {0}")]
    TestFailed(String),
}

/// A test body: emits its case through the recorder, or fails.
pub type TestBody = Arc<dyn Fn(&mut CaseRecorder) -> Result<(), String> + Send + Sync>;

/// One registered test: identity plus the body to run.
#[derive(Clone)]
pub struct TestRegistration {
    pub module: String,
    pub name: String,
    pub docstring: Option<String>,
    pub body: TestBody,
}

impl TestRegistration {
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        docstring: Option<String>,
        body: TestBody,
    ) -> Self {
        TestRegistration {
            module: module.into(),
            name: name.into(),
            docstring,
            body,
        }
    }

    pub fn descriptor(&self) -> TestDescriptor {
        TestDescriptor::new(self.module.clone(), self.name.clone(), self.docstring.clone())
    }
}

impl std::fmt::Debug for TestRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRegistration")
            .field("module", &self.module)
            .field("name", &self.name)
            .finish()
    }
}

/// Result of one loader run: the registrations that loaded, plus the error
/// text for anything that did not.
#[derive(Debug, Clone, Default)]
pub struct LoadedTests {
    pub registrations: Vec<TestRegistration>,
    pub error: Option<String>,
}

impl LoadedTests {
    pub fn ok(registrations: Vec<TestRegistration>) -> Self {
        LoadedTests {
            registrations,
            error: None,
        }
    }
}

/// Loader closure invoked at construction and on every reload.
pub type ProjectLoader = Arc<dyn Fn() -> LoadedTests + Send + Sync>;

/// The boundary behind which user test code lives.
pub trait TestProject: Send + Sync {
    /// Current discovered test set, sorted by `(module, name)`.
    fn tests(&self) -> DiscoverySnapshot;

    /// Drops cached test code so the next discovery observes fresh source.
    fn reload(&self) -> Result<(), ProjectError>;

    /// Runs one test body, capturing its cases in `recorder`.
    fn run_test(&self, qualified_name: &str, recorder: &mut CaseRecorder)
        -> Result<(), ProjectError>;
}

/// In-process [`TestProject`] backed by a loader closure.
pub struct StaticProject {
    loader: ProjectLoader,
    state: RwLock<LoadedTests>,
}

impl StaticProject {
    /// Builds the project and runs the loader once.
    pub fn new(loader: ProjectLoader) -> Self {
        let state = loader();
        StaticProject {
            loader,
            state: RwLock::new(state),
        }
    }

    /// A project with no tests; useful for a standalone server binary.
    pub fn empty() -> Self {
        StaticProject::new(Arc::new(|| LoadedTests::default()))
    }

    /// Convenience constructor from a fixed registration list.
    pub fn from_registrations(registrations: Vec<TestRegistration>) -> Self {
        StaticProject::new(Arc::new(move || LoadedTests::ok(registrations.clone())))
    }
}

impl TestProject for StaticProject {
    fn tests(&self) -> DiscoverySnapshot {
        let state = self.state.read().expect("project state lock poisoned");
        let mut tests: Vec<TestDescriptor> =
            state.registrations.iter().map(|r| r.descriptor()).collect();
        tests.sort_by(|a, b| (&a.module, &a.name).cmp(&(&b.module, &b.name)));
        // Duplicate qualified names would break job bookkeeping; first wins.
        tests.dedup_by(|a, b| a.qualified_name == b.qualified_name);
        DiscoverySnapshot {
            tests,
            error: state.error.clone(),
        }
    }

    fn reload(&self) -> Result<(), ProjectError> {
        let fresh = (self.loader)();
        let mut state = self.state.write().expect("project state lock poisoned");
        *state = fresh;
        Ok(())
    }

    fn run_test(
        &self,
        qualified_name: &str,
        recorder: &mut CaseRecorder,
    ) -> Result<(), ProjectError> {
        let body = {
            let state = self.state.read().expect("project state lock poisoned");
            state
                .registrations
                .iter()
                .find(|r| r.descriptor().qualified_name == qualified_name)
                .map(|r| Arc::clone(&r.body))
        };
        let body = body.ok_or_else(|| ProjectError::TestNotFound(qualified_name.to_string()))?;
        body(recorder).map_err(ProjectError::TestFailed)
    }
}
