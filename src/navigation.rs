use std::sync::{Arc, Mutex};

/// Navigator
///
/// The navigation collaborator the guard hands redirect requests to. Redirects
/// are fire-and-forget; implementations must not fail.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

impl<N: Navigator + ?Sized> Navigator for &N {
    fn redirect(&self, path: &str) {
        (**self).redirect(path)
    }
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn redirect(&self, path: &str) {
        (**self).redirect(path)
    }
}

/// RecordingNavigator
///
/// Keeps every redirect it receives, in order. Used wherever a real navigation
/// target does not exist (tests, server-side dry runs).
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.redirects().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        if let Ok(mut paths) = self.redirects.lock() {
            paths.push(path.to_string());
        }
    }
}
