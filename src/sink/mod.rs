mod realtime;
mod stream;

pub use realtime::Realtime;
pub use stream::Stream;

use std::time::Duration;

/// `send` may block; that is how a slow transport pushes back on the
/// encoder and, through the stream buffer, on the decoder.
pub trait Sink {
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()>;

    fn realtime(self, frame_duration: Duration) -> Realtime<Self>
    where
        Self: Sized,
    {
        Realtime::new(self, frame_duration)
    }
}

impl Sink for Box<dyn Sink + Send> {
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        (**self).send(packet)
    }
}

impl<S> Sink for &mut S
where
    S: Sink + ?Sized,
{
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        (**self).send(packet)
    }
}

impl Sink for std::sync::mpsc::SyncSender<Vec<u8>> {
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        std::sync::mpsc::SyncSender::send(self, packet.to_vec())
            .map_err(|_| anyhow::anyhow!("packet receiver hung up"))
    }
}

impl Sink for std::sync::mpsc::Sender<Vec<u8>> {
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        std::sync::mpsc::Sender::send(self, packet.to_vec())
            .map_err(|_| anyhow::anyhow!("packet receiver hung up"))
    }
}

/// Blocks the encoder thread, so it must not run on an async runtime worker.
impl Sink for tokio::sync::mpsc::Sender<Vec<u8>> {
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        self.blocking_send(packet.to_vec())
            .map_err(|_| anyhow::anyhow!("packet receiver hung up"))
    }
}
