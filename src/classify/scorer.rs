//! Learned-scorer boundary and its lazily loaded handle.
//!
//! A [`Scorer`] turns a preprocessed [`ModelInput`] into one score per
//! [`Severity`](super::Severity) class. Scorers are created by a
//! [`ScorerLoader`] from an artifact on disk. The [`ScorerHandle`] owns that
//! load: it runs at most once, and a failed or disabled load settles the
//! handle permanently to "absent" so later calls go straight to the
//! heuristic.
//!
//! State transitions:
//!
//! ```text
//! Uninitialized --load ok--> Loaded
//!       \
//!        --low memory / missing artifact / load error--> PermanentlyFailed
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::linear::LinearScorerLoader;
use crate::config::ScreenConfig;

/// Single-channel model input with samples normalized to [0, 1], row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

/// Errors from loading or running a scorer.
///
/// None of these reach classifier callers; each one routes to the
/// heuristic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScorerError {
    /// Low-memory mode keeps the scorer unloaded.
    #[error("Scorer disabled by low-memory mode")]
    Disabled,

    /// The model artifact does not exist.
    #[error("Model artifact not found: {0}")]
    ArtifactMissing(PathBuf),

    /// The artifact exists but could not be turned into a scorer.
    #[error("Failed to load model: {0}")]
    Load(String),

    /// The scorer failed on an input.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The scorer returned the wrong number of class scores.
    #[error("Scorer returned {actual} scores, expected {expected}")]
    OutputShape {
        /// Number of severity classes.
        expected: usize,
        /// Number of scores returned.
        actual: usize,
    },

    /// The scorer returned NaN or infinite scores.
    #[error("Scorer returned non-finite scores")]
    NonFinite,

    /// The loader or scorer panicked.
    #[error("Scorer panicked: {0}")]
    Panicked(String),
}

/// Run scorer or loader code, turning a panic into [`ScorerError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, ScorerError>) -> Result<T, ScorerError> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(ScorerError::Panicked(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A loaded model that scores preprocessed images.
pub trait Scorer: Send + Sync {
    /// One score per severity class, in class order.
    fn score(&self, input: &ModelInput) -> Result<Vec<f32>, ScorerError>;
}

/// Builds a [`Scorer`] from an artifact path.
pub trait ScorerLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Scorer>, ScorerError>;
}

enum HandleState {
    Uninitialized,
    Loaded(Arc<dyn Scorer>),
    PermanentlyFailed,
}

/// Observable state of a [`ScorerHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerStatus {
    Uninitialized,
    Loaded,
    PermanentlyFailed,
}

impl fmt::Display for ScorerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::PermanentlyFailed => "permanently failed",
        })
    }
}

static GLOBAL_HANDLE: OnceLock<Arc<ScorerHandle>> = OnceLock::new();

/// Lazily loaded, shareable scorer.
pub struct ScorerHandle {
    model_path: PathBuf,
    low_memory: bool,
    loader: Box<dyn ScorerLoader>,
    state: Mutex<HandleState>,
    load_attempts: AtomicUsize,
}

impl fmt::Debug for ScorerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScorerHandle")
            .field("model_path", &self.model_path)
            .field("low_memory", &self.low_memory)
            .field("status", &self.status())
            .field("load_count", &self.load_count())
            .finish_non_exhaustive()
    }
}

impl ScorerHandle {
    /// Handle that loads `model_path` with `loader` on first use.
    #[must_use]
    pub fn new(model_path: impl Into<PathBuf>, loader: Box<dyn ScorerLoader>) -> Self {
        Self {
            model_path: model_path.into(),
            low_memory: false,
            loader,
            state: Mutex::new(HandleState::Uninitialized),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Handle for the configured artifact, read with [`LinearScorerLoader`].
    #[must_use]
    pub fn from_config(config: &ScreenConfig) -> Self {
        Self::new(config.model_path.clone(), Box::new(LinearScorerLoader))
            .with_low_memory(config.low_memory)
    }

    /// In low-memory mode the handle never loads and stays absent.
    #[must_use]
    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.low_memory = low_memory;
        self
    }

    /// Process-wide handle, configured from the environment on first call.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_HANDLE.get_or_init(|| {
            let config = ScreenConfig::from_env();
            debug!(model_path = %config.model_path.display(), low_memory = config.low_memory, "creating global scorer handle");
            Arc::new(Self::from_config(&config))
        }))
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// The scorer, loading it on first call.
    ///
    /// Concurrent first callers block on the same load; only one of them
    /// invokes the loader. Returns `None` once the handle has failed.
    pub fn get_or_load(&self) -> Option<Arc<dyn Scorer>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            HandleState::Loaded(scorer) => return Some(Arc::clone(scorer)),
            HandleState::PermanentlyFailed => return None,
            HandleState::Uninitialized => {}
        }

        match self.load() {
            Ok(scorer) => {
                *state = HandleState::Loaded(Arc::clone(&scorer));
                Some(scorer)
            }
            Err(ScorerError::Disabled) => {
                info!("low-memory mode: scorer disabled, using heuristic classification");
                *state = HandleState::PermanentlyFailed;
                None
            }
            Err(err) => {
                warn!(error = %err, "scorer unavailable, using heuristic classification");
                *state = HandleState::PermanentlyFailed;
                None
            }
        }
    }

    fn load(&self) -> Result<Arc<dyn Scorer>, ScorerError> {
        if self.low_memory {
            return Err(ScorerError::Disabled);
        }
        if !self.model_path.is_file() {
            return Err(ScorerError::ArtifactMissing(self.model_path.clone()));
        }

        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        let scorer = guarded(|| self.loader.load(&self.model_path))?;
        info!(
            path = %self.model_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scorer loaded"
        );
        Ok(scorer)
    }

    /// Number of times the loader has been invoked.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn status(&self) -> ScorerStatus {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            HandleState::Uninitialized => ScorerStatus::Uninitialized,
            HandleState::Loaded(_) => ScorerStatus::Loaded,
            HandleState::PermanentlyFailed => ScorerStatus::PermanentlyFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    struct ConstantScorer(Vec<f32>);

    impl Scorer for ConstantScorer {
        fn score(&self, _input: &ModelInput) -> Result<Vec<f32>, ScorerError> {
            Ok(self.0.clone())
        }
    }

    /// Loader that sleeps, then succeeds or fails.
    struct SlowLoader {
        delay: Duration,
        fail: bool,
    }

    impl ScorerLoader for SlowLoader {
        fn load(&self, _path: &Path) -> Result<Arc<dyn Scorer>, ScorerError> {
            thread::sleep(self.delay);
            if self.fail {
                Err(ScorerError::Load("corrupt artifact".to_string()))
            } else {
                Ok(Arc::new(ConstantScorer(vec![0.1, 0.2, 0.3, 0.4])))
            }
        }
    }

    fn artifact() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    fn handle(path: &Path, fail: bool) -> ScorerHandle {
        ScorerHandle::new(
            path,
            Box::new(SlowLoader {
                delay: Duration::from_millis(50),
                fail,
            }),
        )
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let file = artifact();
        let handle = Arc::new(handle(file.path(), false));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || handle.get_or_load().is_some())
            })
            .collect();
        for t in threads {
            assert!(t.join().unwrap());
        }

        assert_eq!(handle.load_count(), 1);
        assert_eq!(handle.status(), ScorerStatus::Loaded);
    }

    #[test]
    fn test_failure_is_cached() {
        let file = artifact();
        let handle = handle(file.path(), true);
        assert!(handle.get_or_load().is_none());
        assert!(handle.get_or_load().is_none());
        assert_eq!(handle.load_count(), 1);
        assert_eq!(handle.status(), ScorerStatus::PermanentlyFailed);
    }

    #[test]
    fn test_missing_artifact_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(&dir.path().join("missing.json"), false);
        assert!(handle.get_or_load().is_none());
        assert_eq!(handle.load_count(), 0);
        assert_eq!(handle.status(), ScorerStatus::PermanentlyFailed);
    }

    #[test]
    fn test_low_memory_never_loads() {
        let file = artifact();
        let handle = handle(file.path(), false).with_low_memory(true);
        assert_eq!(handle.status(), ScorerStatus::Uninitialized);
        assert!(handle.get_or_load().is_none());
        assert_eq!(handle.load_count(), 0);
    }

    struct PanickingLoader;

    impl ScorerLoader for PanickingLoader {
        fn load(&self, _path: &Path) -> Result<Arc<dyn Scorer>, ScorerError> {
            panic!("loader blew up");
        }
    }

    #[test]
    fn test_panicking_loader_settles_failed() {
        let file = artifact();
        let handle = ScorerHandle::new(file.path(), Box::new(PanickingLoader));
        assert!(handle.get_or_load().is_none());
        assert!(handle.get_or_load().is_none());
        assert_eq!(handle.load_count(), 1);
        assert_eq!(handle.status(), ScorerStatus::PermanentlyFailed);
    }

    #[test]
    fn test_guarded_reports_panic_message() {
        let err = guarded::<()>(|| panic!("boom {}", 7)).unwrap_err();
        assert!(matches!(&err, ScorerError::Panicked(msg) if msg == "boom 7"));
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_loaded_scorer_is_shared() {
        let file = artifact();
        let handle = handle(file.path(), false);
        let a = handle.get_or_load().unwrap();
        let b = handle.get_or_load().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
