#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Whatever lays panels out and can bring one into view.
pub trait AnchorSurface {
    fn has_anchor(&self, id: &str) -> bool;
    fn scroll_into_view(&mut self, id: &str, behavior: ScrollBehavior);
}

/// Normalizes a tab name into the anchor id its panel is rendered under.
///
/// `"Run Compare"` becomes `"run-compare"`; `"phase_fold"` becomes `"phase-fold"`.
pub fn anchor_id(tab: &str) -> String {
    let mut id = String::with_capacity(tab.len());
    for ch in tab.trim().chars() {
        let mapped = match ch {
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            c if c.is_whitespace() || c == '_' || c == '/' || c == '-' => Some('-'),
            _ => None,
        };
        match mapped {
            Some('-') if id.is_empty() || id.ends_with('-') => {}
            Some(c) => id.push(c),
            None => {}
        }
    }
    while id.ends_with('-') {
        id.pop();
    }
    id
}

/// Smooth-scrolls to the tab's anchor when it exists.
///
/// Returns the anchor id scrolled to, or `None` when nothing matched.
pub fn reveal_tab<S: AnchorSurface + ?Sized>(surface: &mut S, tab: &str) -> Option<String> {
    reveal_tab_with(surface, tab, ScrollBehavior::Smooth)
}

/// [`reveal_tab`] with an explicit scroll behavior, e.g. `Instant` when re-focusing after a redraw.
pub fn reveal_tab_with<S: AnchorSurface + ?Sized>(
    surface: &mut S,
    tab: &str,
    behavior: ScrollBehavior,
) -> Option<String> {
    let id = anchor_id(tab);
    if id.is_empty() || !surface.has_anchor(&id) {
        return None;
    }
    surface.scroll_into_view(&id, behavior);
    Some(id)
}
