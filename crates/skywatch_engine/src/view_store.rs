use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use skywatch_core::{reveal_tab, AnchorSurface, History, Location, ViewState};
use skywatch_logging::{sky_debug, sky_warn};
use tokio::sync::watch;

/// Shared, observable address bar of the console.
///
/// Cloning yields another handle onto the same state. Writes are
/// read-modify-write under one lock, so two panels writing disjoint keys
/// never erase each other's values.
#[derive(Clone)]
pub struct ViewStateStore {
    inner: Arc<Inner>,
}

struct Inner {
    history: Mutex<History>,
    current: watch::Sender<Location>,
}

impl std::fmt::Debug for ViewStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStateStore")
            .field("location", &self.location().relative_href())
            .finish()
    }
}

impl ViewStateStore {
    pub fn new(initial: Location) -> Self {
        let (current, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(Inner {
                history: Mutex::new(History::new(initial)),
                current,
            }),
        }
    }

    /// Starts from `href`; a malformed address falls back to the default location.
    pub fn from_href(href: &str) -> Self {
        match Location::parse(href) {
            Ok(location) => Self::new(location),
            Err(err) => {
                sky_warn!("ignoring malformed address {:?}: {}", href, err);
                Self::new(Location::default())
            }
        }
    }

    pub fn read(&self, key: &str) -> Option<String> {
        self.inner.current.borrow().state().read(key).map(str::to_string)
    }

    pub fn tab(&self) -> String {
        self.inner.current.borrow().state().tab().to_string()
    }

    pub fn snapshot(&self) -> ViewState {
        self.inner.current.borrow().state().clone()
    }

    pub fn location(&self) -> Location {
        self.inner.current.borrow().clone()
    }

    /// Full address of the current view, shareable as-is.
    pub fn permalink(&self) -> String {
        self.inner.current.borrow().href()
    }

    /// Applies `updates` on top of the current state and pushes one history entry.
    ///
    /// `None` or an empty value removes a key; keys not named are kept.
    /// Returns false when the result equals the current location.
    pub fn write_many<I, K, V>(&self, updates: I) -> bool
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut history = self.lock();
        let current = history.current();
        let mut state = current.state().clone();
        state.apply(updates);
        let next = current.with_state(state);
        if !history.push(next.clone()) {
            return false;
        }
        sky_debug!("view state now {}", next.relative_href());
        self.inner.current.send_replace(next);
        true
    }

    pub fn back(&self) -> bool {
        let mut history = self.lock();
        match history.back() {
            Some(location) => {
                self.inner.current.send_replace(location.clone());
                true
            }
            None => false,
        }
    }

    pub fn forward(&self) -> bool {
        let mut history = self.lock();
        match history.forward() {
            Some(location) => {
                self.inner.current.send_replace(location.clone());
                true
            }
            None => false,
        }
    }

    pub fn history_len(&self) -> usize {
        self.lock().len()
    }

    /// Notified after every write, back and forward.
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.inner.current.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.inner.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reveals `tab`, retrying once after `delay` if its anchor was not rendered yet.
pub async fn reveal_tab_with_retry<S>(surface: &mut S, tab: &str, delay: Duration) -> Option<String>
where
    S: AnchorSurface + Send + ?Sized,
{
    if let Some(id) = reveal_tab(surface, tab) {
        return Some(id);
    }
    tokio::time::sleep(delay).await;
    let revealed = reveal_tab(surface, tab);
    if revealed.is_none() {
        sky_debug!("no anchor for tab {:?}", tab);
    }
    revealed
}
