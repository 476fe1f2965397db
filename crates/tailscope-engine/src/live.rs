//! Live/pause gate with a one-shot scroll reset

/// Whether the panel follows new events
///
/// Switching to live arms a scroll reset that fires once, the next time
/// events land. Afterwards the user may scroll freely until live is
/// toggled again.
#[derive(Debug, Clone)]
pub struct LiveController {
    live: bool,
    scroll_reset_armed: bool,
    unseen_while_paused: usize,
}

impl LiveController {
    pub fn new(live: bool) -> Self {
        Self {
            live,
            scroll_reset_armed: false,
            unseen_while_paused: 0,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Returns true if the state changed
    pub fn set_live(&mut self, live: bool) -> bool {
        if self.live == live {
            return false;
        }
        self.live = live;
        if live {
            self.scroll_reset_armed = true;
            self.unseen_while_paused = 0;
        } else {
            self.scroll_reset_armed = false;
        }
        true
    }

    pub fn toggle(&mut self) -> bool {
        self.set_live(!self.live);
        self.live
    }

    /// Consume the pending scroll reset, if any
    pub fn take_scroll_reset(&mut self) -> bool {
        std::mem::take(&mut self.scroll_reset_armed)
    }

    pub fn scroll_reset_armed(&self) -> bool {
        self.scroll_reset_armed
    }

    /// Record events that landed in the buffer
    pub fn note_landed(&mut self, count: usize) {
        if !self.live {
            self.unseen_while_paused = self.unseen_while_paused.saturating_add(count);
        }
    }

    /// Events that landed while paused (via manual refresh)
    pub fn unseen(&self) -> usize {
        self.unseen_while_paused
    }
}

impl Default for LiveController {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_arms_one_shot_reset() {
        let mut live = LiveController::new(false);
        assert!(!live.take_scroll_reset());

        assert!(live.set_live(true));
        assert!(live.scroll_reset_armed());
        assert!(live.take_scroll_reset());
        assert!(!live.take_scroll_reset());
    }

    #[test]
    fn test_setting_same_state_is_noop() {
        let mut live = LiveController::new(true);
        assert!(!live.set_live(true));
        assert!(!live.scroll_reset_armed());
    }

    #[test]
    fn test_pause_disarms_pending_reset() {
        let mut live = LiveController::new(false);
        live.set_live(true);
        live.set_live(false);
        assert!(!live.take_scroll_reset());
    }

    #[test]
    fn test_unseen_counts_only_while_paused() {
        let mut live = LiveController::new(true);
        live.note_landed(3);
        assert_eq!(live.unseen(), 0);

        assert!(!live.toggle());
        live.note_landed(2);
        live.note_landed(4);
        assert_eq!(live.unseen(), 6);

        assert!(live.toggle());
        assert_eq!(live.unseen(), 0);
    }
}
