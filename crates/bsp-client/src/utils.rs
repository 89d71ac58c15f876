//! Uri/path conversions and small concurrency helpers.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bsp_types::Uri;
use url::Url;

pub fn file_uri(path: impl AsRef<Path>) -> Uri {
    match Url::from_file_path(path.as_ref()) {
        Ok(url) => Uri(url.to_string()),
        // Not an absolute path; keep the textual form so the value still round-trips.
        Err(()) => Uri(format!("file://{}", path.as_ref().display())),
    }
}

pub fn uri_to_file_path(uri: &Uri) -> Option<PathBuf> {
    let url = Url::parse(uri.as_str()).ok()?;
    url.to_file_path().ok()
}

/// Whether `descendant` lies under `ancestor`, compared component-wise rather than textually,
/// so that `/a/bc` is not considered a descendant of `/a/b`.
pub fn is_descendant_path(descendant: &Path, ancestor: &Path) -> bool {
    descendant.starts_with(ancestor)
}

/// A slot whose value can be taken exactly once, from any thread.
///
/// Used to resolve the race between a cancellation handler and the normal completion path of a
/// request: both sides attempt to take the request id, and only the winner acts on it.
#[derive(Debug)]
pub struct TakeOnce<T> {
    slot: Mutex<Option<T>>,
}

impl<T> TakeOnce<T> {
    pub fn new(value: T) -> Self {
        TakeOnce {
            slot: Mutex::new(Some(value)),
        }
    }

    pub fn empty() -> Self {
        TakeOnce {
            slot: Mutex::new(None),
        }
    }

    /// Store a value. Returns the value back if the slot is already occupied.
    pub fn fill(&self, value: T) -> Result<(), T> {
        let mut slot = self.slot.lock().unwrap();
        match *slot {
            Some(_) => Err(value),
            None => {
                *slot = Some(value);
                Ok(())
            }
        }
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().unwrap().take()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn file_uri_round_trip() {
        let uri = file_uri("/tmp/project/a.swift");
        assert_eq!(uri.as_str(), "file:///tmp/project/a.swift");
        assert_eq!(
            uri_to_file_path(&uri),
            Some(PathBuf::from("/tmp/project/a.swift"))
        );
    }

    #[test]
    fn descendant_is_component_wise() {
        assert!(is_descendant_path(
            Path::new("/a/b/c.swift"),
            Path::new("/a/b")
        ));
        assert!(!is_descendant_path(Path::new("/a/bc"), Path::new("/a/b")));
    }

    #[test]
    fn take_once_single_winner() {
        let slot = Arc::new(TakeOnce::new(42));
        let taken = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let taken = Arc::clone(&taken);
                std::thread::spawn(move || {
                    if slot.take().is_some() {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(taken.load(Ordering::SeqCst), 1);
    }
}
