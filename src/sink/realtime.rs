use std::thread::sleep;
use std::time::{Duration, Instant};

pub struct Realtime<S> {
    inner: S,
    frame_duration: Duration,
    runout: Option<Instant>,
}

impl<S> Realtime<S> {
    pub fn new(inner: S, frame_duration: Duration) -> Self {
        Self {
            inner,
            frame_duration,
            runout: None,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> super::Sink for Realtime<S>
where
    S: super::Sink,
{
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        let duration = self.frame_duration;
        let now = Instant::now();

        // wait until the previous packet is about to run out
        if let Some(ref end) = self.runout {
            if *end > now + duration {
                sleep(*end - now - duration);
            }
        }

        self.inner.send(packet)?;
        let end = self.runout.get_or_insert(now);
        // a stalled transport should not earn a burst afterwards
        if *end < now {
            *end = now;
        }
        *end += duration;
        Ok(())
    }
}
