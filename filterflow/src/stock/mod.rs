//! Stock filters.
//!
//! Leaf implementations of [`Filter`](crate::filter::Filter) covering routing,
//! buffering, attribute work, control messages and text. Every stock filter
//! except [`CallbackOnAttribute`] is available through
//! [`FilterRegistry::with_stock_filters`].

mod attributes;
mod buffering;
mod counting;
mod messaging;
mod routing;
mod sink;
mod slope;
mod text;
mod watch;

pub use attributes::{Calculate, Operator, TagPacket};
pub use buffering::{Batch, Join, Peek};
pub use counting::{CollectData, CountLoops, SeqPacket};
pub use messaging::{Reset, SendMessage};
pub use routing::{BranchClone, BranchIf, BranchRef, Comparison, Merge, PassThrough, Waste};
pub use sink::{Sink, SinkHandle};
pub use slope::CalcSlope;
pub use text::{HashSha256, SplitLines, SplitWords};
pub use watch::{CallbackOnAttribute, WatchCallback};

use crate::filter::{Filter, FilterRegistry};
use crate::tank::{TankFeed, TankQueue};

fn factory<F: Filter + 'static>(make: fn() -> F) -> impl Fn() -> Box<dyn Filter> + Send + Sync {
    move || Box::new(make())
}

/// Registers every stock filter under its type tag.
pub fn register_all(registry: &mut FilterRegistry) {
    registry.register("pass_through", factory(PassThrough::new));
    registry.register("waste", factory(Waste::new));
    registry.register("merge", factory(Merge::new));
    registry.register("sink", factory(Sink::new));
    registry.register("branch_clone", factory(BranchClone::new));
    registry.register("branch_ref", factory(BranchRef::new));
    registry.register("branch_if", factory(BranchIf::new));
    registry.register("seq_packet", factory(SeqPacket::new));
    registry.register("count_loops", factory(CountLoops::new));
    registry.register("batch", factory(Batch::new));
    registry.register("join", factory(Join::new));
    registry.register("peek", factory(Peek::new));
    registry.register("collect_data", factory(CollectData::new));
    registry.register("tag_packet", factory(TagPacket::new));
    registry.register("calculate", factory(Calculate::new));
    registry.register("reset", factory(Reset::new));
    registry.register("send_message", factory(SendMessage::new));
    registry.register("split_lines", factory(SplitLines::new));
    registry.register("split_words", factory(SplitWords::new));
    registry.register("hash_sha256", factory(HashSha256::new));
    registry.register("calc_slope", factory(CalcSlope::new));
    registry.register("tank_queue", factory(TankQueue::new));
    registry.register("tank_branch", factory(TankQueue::windowed));
    registry.register("tank_feed", factory(TankFeed::new));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_tags_match_filters() {
        let registry = FilterRegistry::with_stock_filters();
        for tag in registry.type_tags() {
            let filter = registry.create(tag).unwrap();
            assert_eq!(filter.type_tag(), tag);
        }
        assert_eq!(registry.type_tags().len(), 24);
    }
}
