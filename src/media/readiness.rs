/// Signals that count towards readiness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessSignal {
    Playing,
    TimeUpdate,
}

/// Tracks whether a real frame is available to composite.
///
/// Ready means both a `playing` and a `timeupdate` signal have been observed since the last
/// reset, in any order. Once ready, further signals never clear it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    playing: bool,
    time_updated: bool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a signal. Returns `true` on the observation that made the stream ready.
    pub fn observe(&mut self, signal: ReadinessSignal) -> bool {
        let was_ready = self.is_ready();
        match signal {
            ReadinessSignal::Playing => self.playing = true,
            ReadinessSignal::TimeUpdate => self.time_updated = true,
        }
        !was_ready && self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.playing && self.time_updated
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ReadinessSignal::{Playing, TimeUpdate};

    fn orderings(len: usize) -> Vec<Vec<ReadinessSignal>> {
        let mut out = Vec::new();
        for bits in 0..(1u32 << len) {
            out.push(
                (0..len)
                    .map(|i| if bits & (1 << i) != 0 { Playing } else { TimeUpdate })
                    .collect(),
            );
        }
        out
    }

    #[test]
    fn ready_iff_both_signals_seen_and_never_reverts() {
        for seq in orderings(6) {
            let mut r = Readiness::new();
            let mut seen_playing = false;
            let mut seen_update = false;
            let mut was_ready = false;
            let mut transitions = 0;
            for s in seq {
                match s {
                    Playing => seen_playing = true,
                    TimeUpdate => seen_update = true,
                }
                if r.observe(s) {
                    transitions += 1;
                }
                assert_eq!(r.is_ready(), seen_playing && seen_update);
                assert!(!was_ready || r.is_ready(), "readiness reverted");
                was_ready = r.is_ready();
            }
            assert!(transitions <= 1);
            assert_eq!(transitions == 1, r.is_ready());
        }
    }

    #[test]
    fn reset_clears_both_halves() {
        let mut r = Readiness::new();
        r.observe(Playing);
        r.observe(TimeUpdate);
        assert!(r.is_ready());
        r.reset();
        assert!(!r.is_ready());
        assert!(!r.observe(TimeUpdate));
        assert!(r.observe(Playing));
    }
}
