//! Viewport trigger: "load more" when the last rendered item becomes visible.

use log::debug;

/// Everything that decides which element is "last" and whether it should be
/// observed at all. Any change re-subscribes the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Id of the last rendered item; `None` when nothing is rendered.
    pub last_id: Option<String>,
    /// Next page offset. Changes on every merge, so a page that only repeats
    /// known ids still re-arms the latch.
    pub offset: usize,
    pub columns: u16,
    pub folder_id: Option<String>,
    pub has_more: bool,
}

/// Edge-triggered observer of the list boundary.
///
/// Fires once per intersection: a sustained visible boundary does not fire
/// again until it leaves view or the subscription changes. The sequencer's
/// busy gate still decides whether a fire actually issues a request.
#[derive(Debug, Default)]
pub struct ViewportTrigger {
    subscribed: Option<Boundary>,
    fired: bool,
}

impl ViewportTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `boundary`. Returns `true` when this replaced a different
    /// subscription (the latch is cleared so a visible boundary fires again).
    pub fn observe(&mut self, boundary: Boundary) -> bool {
        if self.subscribed.as_ref() == Some(&boundary) {
            return false;
        }
        debug!(
            "trigger: subscribe last={:?} offset={} columns={} folder={:?} has_more={}",
            boundary.last_id,
            boundary.offset,
            boundary.columns,
            boundary.folder_id,
            boundary.has_more
        );
        self.subscribed = Some(boundary);
        self.fired = false;
        true
    }

    /// Drop the subscription entirely.
    pub fn disconnect(&mut self) {
        self.subscribed = None;
        self.fired = false;
    }

    /// Whether a fire-capable subscription exists.
    pub fn is_observing(&self) -> bool {
        self.subscribed
            .as_ref()
            .is_some_and(|b| b.has_more && b.last_id.is_some())
    }

    /// Report whether the boundary item is currently visible. Returns `true`
    /// when a "load more" signal should be emitted.
    pub fn report(&mut self, last_visible: bool) -> bool {
        if !self.is_observing() {
            return false;
        }
        if !last_visible {
            self.fired = false;
            return false;
        }
        if self.fired {
            return false;
        }
        self.fired = true;
        debug!("trigger: boundary visible, load more");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary(last: Option<&str>, has_more: bool) -> Boundary {
        Boundary {
            last_id: last.map(str::to_string),
            offset: 20,
            columns: 4,
            folder_id: None,
            has_more,
        }
    }

    #[test]
    fn fires_once_per_intersection() {
        let mut t = ViewportTrigger::new();
        t.observe(boundary(Some("a"), true));
        assert!(t.report(true));
        assert!(!t.report(true));
        assert!(!t.report(true));
    }

    #[test]
    fn refires_after_leaving_view() {
        let mut t = ViewportTrigger::new();
        t.observe(boundary(Some("a"), true));
        assert!(t.report(true));
        assert!(!t.report(false));
        assert!(t.report(true));
    }

    #[test]
    fn new_boundary_resubscribes() {
        let mut t = ViewportTrigger::new();
        assert!(t.observe(boundary(Some("a"), true)));
        assert!(t.report(true));
        assert!(!t.observe(boundary(Some("a"), true)));
        assert!(!t.report(true));
        assert!(t.observe(boundary(Some("b"), true)));
        assert!(t.report(true));
    }

    #[test]
    fn offset_change_resubscribes_with_same_last_item() {
        let mut t = ViewportTrigger::new();
        t.observe(boundary(Some("a"), true));
        assert!(t.report(true));

        // a page of duplicates advances the offset but not the last id
        let mut b = boundary(Some("a"), true);
        b.offset = 40;
        assert!(t.observe(b));
        assert!(t.report(true));
    }

    #[test]
    fn column_or_folder_change_resubscribes() {
        let mut t = ViewportTrigger::new();
        t.observe(boundary(Some("a"), true));
        assert!(t.report(true));

        let mut b = boundary(Some("a"), true);
        b.columns = 5;
        assert!(t.observe(b.clone()));
        assert!(t.report(true));

        b.folder_id = Some("F1".into());
        assert!(t.observe(b));
        assert!(t.report(true));
    }

    #[test]
    fn silent_when_exhausted() {
        let mut t = ViewportTrigger::new();
        t.observe(boundary(Some("a"), false));
        assert!(!t.is_observing());
        assert!(!t.report(true));
    }

    #[test]
    fn silent_when_empty() {
        let mut t = ViewportTrigger::new();
        t.observe(boundary(None, true));
        assert!(!t.report(true));
    }

    #[test]
    fn silent_without_subscription() {
        let mut t = ViewportTrigger::new();
        assert!(!t.report(true));
        t.observe(boundary(Some("a"), true));
        t.disconnect();
        assert!(!t.report(true));
    }
}
