use std::io::Write;

use tracing::debug;

/// A cue prepared ahead of time so playback has no latency at zero.
pub type PreparedCue = Box<dyn FnOnce() + Send>;

/// Source of completion cues.
///
/// The concrete sound is opaque to the rest of the system; all it needs is
/// "prepare now, play later, at most once".
pub trait CueSource: Send {
    fn prepare(&self) -> PreparedCue;
}

/// Rings the terminal bell.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl CueSource for TerminalBell {
    fn prepare(&self) -> PreparedCue {
        Box::new(|| {
            let mut out = std::io::stdout();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        })
    }
}

/// Holds at most one prepared cue and fires it at most once.
#[derive(Default)]
pub struct ArmedCue {
    prepared: Option<PreparedCue>,
}

impl ArmedCue {
    /// Prepare a cue from `source`. No-op when one is already armed.
    pub fn arm(&mut self, source: &dyn CueSource) {
        if self.prepared.is_none() {
            self.prepared = Some(source.prepare());
        }
    }

    pub fn disarm(&mut self) {
        self.prepared = None;
    }

    /// Play the armed cue. No-op when already fired or disarmed.
    pub fn fire(&mut self) {
        match self.prepared.take() {
            Some(play) => play(),
            None => debug!("completion cue already fired or disarmed"),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.prepared.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        prepared: Arc<AtomicUsize>,
        played: Arc<AtomicUsize>,
    }

    impl CueSource for CountingSource {
        fn prepare(&self) -> PreparedCue {
            self.prepared.fetch_add(1, Ordering::SeqCst);
            let played = self.played.clone();
            Box::new(move || {
                played.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    fn counting_source() -> (CountingSource, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let prepared = Arc::new(AtomicUsize::new(0));
        let played = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            prepared: prepared.clone(),
            played: played.clone(),
        };
        (source, prepared, played)
    }

    #[test]
    fn fires_exactly_once() {
        let (source, _, played) = counting_source();
        let mut cue = ArmedCue::default();
        cue.arm(&source);

        cue.fire();
        cue.fire();
        assert_eq!(played.load(Ordering::SeqCst), 1);
        assert!(!cue.is_armed());
    }

    #[test]
    fn firing_after_disarm_is_a_no_op() {
        let (source, _, played) = counting_source();
        let mut cue = ArmedCue::default();
        cue.arm(&source);
        cue.disarm();

        cue.fire();
        assert_eq!(played.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arming_twice_prepares_once() {
        let (source, prepared, _) = counting_source();
        let mut cue = ArmedCue::default();
        cue.arm(&source);
        cue.arm(&source);
        assert_eq!(prepared.load(Ordering::SeqCst), 1);
    }
}
