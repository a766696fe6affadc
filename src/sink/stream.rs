pub struct Stream<F> {
    inner: F,
    length_prefixed: bool,
}

impl<F> Stream<F>
where
    F: std::io::Write,
{
    pub fn new(inner: F) -> Self {
        Stream {
            inner,
            length_prefixed: false,
        }
    }

    pub fn length_prefixed(inner: F) -> Self {
        Stream {
            inner,
            length_prefixed: true,
        }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F> super::Sink for Stream<F>
where
    F: std::io::Write,
{
    fn send(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        if self.length_prefixed {
            let len = u32::try_from(packet.len())
                .map_err(|_| anyhow::anyhow!("packet too large to frame"))?;
            self.inner.write_all(&len.to_le_bytes())?;
        }
        self.inner.write_all(packet)?;
        self.inner.flush()?;
        Ok(())
    }
}
