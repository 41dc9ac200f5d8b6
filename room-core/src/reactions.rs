use std::time::{Duration, Instant};

/// How long a reaction stays on screen.
pub const DISPLAY_DURATION: Duration = Duration::from_secs(4);

/// One fire-and-forget emoji annotation, placed horizontally as a
/// percentage of the viewport width.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub emoji: String,
    pub placement: f32,
    posted_at: Instant,
}

/// The set of currently visible reactions. Entries expire after
/// [`DISPLAY_DURATION`]; nothing is ever persisted. The clock is passed in
/// by the caller so expiry is deterministic under test.
#[derive(Debug, Default)]
pub struct ReactionBoard {
    entries: Vec<Reaction>,
}

impl ReactionBoard {
    pub fn push(&mut self, emoji: impl Into<String>, placement: f32, now: Instant) {
        self.entries.push(Reaction {
            emoji: emoji.into(),
            placement,
            posted_at: now,
        });
    }

    /// Drop expired entries and return what is still visible.
    pub fn active(&mut self, now: Instant) -> &[Reaction] {
        self.entries
            .retain(|r| now.duration_since(r.posted_at) < DISPLAY_DURATION);
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_expires_within_five_seconds() {
        let t0 = Instant::now();
        let mut board = ReactionBoard::default();
        board.push("❤️", 50.0, t0);

        assert_eq!(board.active(t0 + Duration::from_secs(1)).len(), 1);
        assert!(board.active(t0 + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_concurrent_reactions_expire_independently() {
        let t0 = Instant::now();
        let mut board = ReactionBoard::default();
        for i in 0..10 {
            board.push("🎉", i as f32 * 10.0, t0 + Duration::from_millis(500 * i));
        }

        // At t0+4.2s the first entry is gone, later ones remain.
        let visible = board.active(t0 + Duration::from_millis(4200));
        assert_eq!(visible.len(), 9);

        // Well past the last insert plus the display window: all gone.
        assert!(board.active(t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn test_expiry_does_not_depend_on_polling() {
        let t0 = Instant::now();
        let mut board = ReactionBoard::default();
        board.push("🔥", 12.0, t0);
        // No intermediate active() calls; a single late poll still prunes.
        assert!(board.active(t0 + Duration::from_secs(10)).is_empty());
    }
}
