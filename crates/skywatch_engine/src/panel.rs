use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skywatch_core::{scoped_updates, LatestOnly, PanelError, RequestError, ViewState};
use skywatch_logging::{sky_debug, sky_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::view_store::ViewStateStore;

/// A view that owns a few view-state keys and loads data for their values.
#[async_trait::async_trait]
pub trait Panel: Send + Sync + 'static {
    type Selection: Clone + PartialEq + Debug + Send + Sync + 'static;
    type Data: Clone + Debug + Send + Sync + 'static;

    /// Tab written alongside every selection change.
    fn tab(&self) -> &'static str;

    fn owned_keys(&self) -> &'static [&'static str];

    /// Initial selection from the view state; malformed values read as absent.
    fn read_selection(&self, state: &ViewState) -> Self::Selection;

    fn write_selection(&self, selection: &Self::Selection) -> Vec<(String, Option<String>)>;

    async fn load(&self, selection: &Self::Selection) -> Result<Self::Data, RequestError>;
}

/// What a panel currently displays.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView<S, D> {
    pub selection: Option<S>,
    pub data: Option<D>,
    pub error: Option<RequestError>,
    pub loading: bool,
}

impl<S, D> Default for PanelView<S, D> {
    fn default() -> Self {
        Self {
            selection: None,
            data: None,
            error: None,
            loading: false,
        }
    }
}

/// Binds a [`Panel`] to the shared view state.
///
/// Only the most recently issued fetch may update the view; a slower,
/// older response is discarded when it resolves.
pub struct PanelSync<P: Panel> {
    panel: Arc<P>,
    store: ViewStateStore,
    gate: Arc<Mutex<LatestOnly<P::Selection>>>,
    view: Arc<watch::Sender<PanelView<P::Selection, P::Data>>>,
}

impl<P: Panel> Clone for PanelSync<P> {
    fn clone(&self) -> Self {
        Self {
            panel: Arc::clone(&self.panel),
            store: self.store.clone(),
            gate: Arc::clone(&self.gate),
            view: Arc::clone(&self.view),
        }
    }
}

impl<P: Panel> PanelSync<P> {
    pub fn new(panel: P, store: ViewStateStore) -> Self {
        let (view, _) = watch::channel(PanelView::default());
        Self {
            panel: Arc::new(panel),
            store,
            gate: Arc::new(Mutex::new(LatestOnly::default())),
            view: Arc::new(view),
        }
    }

    /// Reads the selection from the current view state and loads it.
    pub async fn mount(&self) -> P::Selection {
        let selection = self.panel.read_selection(&self.store.snapshot());
        sky_debug!("{} panel mounted with {:?}", self.panel.tab(), selection);
        self.fetch(selection.clone()).await;
        selection
    }

    /// Writes the panel's keys plus its tab, then loads the new selection.
    pub async fn select(&self, selection: P::Selection) -> Result<bool, PanelError> {
        let updates = scoped_updates(
            self.panel.tab(),
            self.panel.owned_keys(),
            self.panel.write_selection(&selection),
        )?;
        self.store.write_many(updates);
        Ok(self.fetch(selection).await)
    }

    /// Reloads when the view state now names a different selection.
    pub async fn sync_from_store(&self) -> bool {
        let selection = self.panel.read_selection(&self.store.snapshot());
        if self.lock_gate().selection() == Some(&selection) {
            return false;
        }
        self.fetch(selection).await
    }

    /// Follows external view-state changes (back, forward, other writers) until the store is gone.
    pub fn follow(&self) -> JoinHandle<()> {
        let sync = self.clone();
        let mut changes = self.store.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                sync.sync_from_store().await;
            }
        })
    }

    /// Loads `selection`; returns false when a newer fetch superseded this one.
    pub async fn fetch(&self, selection: P::Selection) -> bool {
        let ticket = {
            let mut gate = self.lock_gate();
            let ticket = gate.issue(selection.clone());
            self.view.send_modify(|view| {
                view.selection = Some(selection.clone());
                view.loading = true;
            });
            ticket
        };

        let result = self.panel.load(&selection).await;

        let gate = self.lock_gate();
        if !gate.is_current(ticket) {
            sky_debug!(
                "{} panel discarded stale result for {:?}",
                self.panel.tab(),
                selection
            );
            return false;
        }
        self.view.send_modify(|view| {
            view.loading = false;
            match result {
                Ok(data) => {
                    view.data = Some(data);
                    view.error = None;
                }
                Err(err) => {
                    sky_warn!("{} panel failed to load {:?}: {}", self.panel.tab(), selection, err);
                    view.error = Some(err);
                }
            }
        });
        drop(gate);
        true
    }

    pub fn view(&self) -> PanelView<P::Selection, P::Data> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelView<P::Selection, P::Data>> {
        self.view.subscribe()
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    fn lock_gate(&self) -> MutexGuard<'_, LatestOnly<P::Selection>> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
