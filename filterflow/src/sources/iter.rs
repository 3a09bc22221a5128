use super::Source;
use crate::core::Unit;
use crate::errors::FilterResult;
use crate::pipeline::ShutdownToken;

/// A source over any iterator of units.
#[derive(Debug)]
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Unit> + Send,
{
    /// Wraps an iterator.
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self { iter: iter.into_iter() }
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator<Item = Unit> + Send,
{
    fn pull(&mut self, shutdown: &ShutdownToken) -> FilterResult<Option<Unit>> {
        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        Ok(self.iter.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Packet;

    #[test]
    fn test_iter_source_yields_then_ends() {
        let mut source =
            IterSource::new(vec![Unit::from(Packet::new("a")), Unit::from(Packet::new("b"))]);
        let token = ShutdownToken::new();

        assert!(source.pull(&token).unwrap().is_some());
        assert!(source.pull(&token).unwrap().is_some());
        assert!(source.pull(&token).unwrap().is_none());
    }

    #[test]
    fn test_iter_source_stops_on_shutdown() {
        let mut source = IterSource::new(vec![Unit::from(Packet::new("a"))]);
        let token = ShutdownToken::new();
        token.shut_down("stop");

        assert!(source.pull(&token).unwrap().is_none());
    }
}
