use crate::view_state::TAB_KEY;

/// Proof that a fetch was issued; compared against the gate when it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// Accepts only the result of the most recently issued fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestOnly<S> {
    generation: u64,
    selection: Option<S>,
}

impl<S> Default for LatestOnly<S> {
    fn default() -> Self {
        Self {
            generation: 0,
            selection: None,
        }
    }
}

impl<S> LatestOnly<S> {
    pub fn issue(&mut self, selection: S) -> FetchTicket {
        self.generation += 1;
        self.selection = Some(selection);
        FetchTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn selection(&self) -> Option<&S> {
        self.selection.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("panel `{panel}` does not own view-state key `{key}`")]
    UnownedKey { panel: String, key: String },
}

/// Checks that a panel writes only its own keys and stamps its tab onto the write.
pub fn scoped_updates(
    tab: &str,
    owned: &[&str],
    updates: Vec<(String, Option<String>)>,
) -> Result<Vec<(String, Option<String>)>, PanelError> {
    if let Some((key, _)) = updates
        .iter()
        .find(|(key, _)| !owned.contains(&key.as_str()))
    {
        return Err(PanelError::UnownedKey {
            panel: tab.to_string(),
            key: key.clone(),
        });
    }
    let mut scoped = updates;
    scoped.retain(|(key, _)| key != TAB_KEY);
    scoped.push((TAB_KEY.to_string(), Some(tab.to_string())));
    Ok(scoped)
}

#[cfg(test)]
mod tests {
    use super::{scoped_updates, LatestOnly, PanelError};

    #[test]
    fn only_latest_ticket_is_current() {
        let mut gate = LatestOnly::default();
        let first = gate.issue("run-1");
        let second = gate.issue("run-2");
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
        assert_eq!(gate.selection(), Some(&"run-2"));
    }

    #[test]
    fn rejects_foreign_keys_and_adds_tab() {
        let ok = scoped_updates(
            "reliability",
            &["run", "model"],
            vec![("run".into(), Some("RUN-1".into()))],
        )
        .unwrap();
        assert_eq!(
            ok,
            vec![
                ("run".to_string(), Some("RUN-1".to_string())),
                ("tab".to_string(), Some("reliability".to_string())),
            ]
        );

        let err = scoped_updates("reliability", &["run"], vec![("star".into(), None)]).unwrap_err();
        assert_eq!(
            err,
            PanelError::UnownedKey {
                panel: "reliability".into(),
                key: "star".into()
            }
        );
    }
}
