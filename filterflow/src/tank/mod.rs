//! Tanks: priority-ordered reentrant buffering.
//!
//! A [`TankQueue`] holds up to `tank_size` packets ordered by an integer
//! priority attribute and forwards the lowest-priority packet on main whenever
//! it overflows. A [`TankFeed`] placed downstream pushes packets straight back
//! into the tank's buffer, so a cycle through a tank is drained iteratively
//! by the tank's own loop instead of recursing through the router.

mod buffer;
mod feed;
mod queue;

pub use buffer::{SlotPriority, TankBuffer, TankEntry, TankHandle};
pub use feed::TankFeed;
pub use queue::TankQueue;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MessageBottle, Packet, Payload};
    use crate::errors::{FilterError, FilterResult, RoutingError};
    use crate::filter::{Filter, FilterContext};
    use crate::pipeline::{Pipeline, PipelineBuilder};
    use crate::stock::{PassThrough, Sink, SinkHandle};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn seq(n: i64) -> Packet {
        Packet::new(format!("p{n}")).with_attr("seq_num", n)
    }

    fn held(tank: &TankHandle) -> Vec<i64> {
        tank.sorted_packets()
            .iter()
            .map(|p| p.get_i64("seq_num").unwrap())
            .collect()
    }

    fn tank_into_sink(tank: TankQueue, params: Value) -> (Pipeline, TankHandle, SinkHandle) {
        let handle = tank.tank().unwrap();
        let sink = Sink::new();
        let out = sink.handle();
        let pipeline = PipelineBuilder::new("tank")
            .filter("tank", tank, params)
            .unwrap()
            .filter("out", sink, json!({"max_results": 0}))
            .unwrap()
            .main("tank", "out")
            .unwrap()
            .build()
            .unwrap();
        (pipeline, handle, out)
    }

    #[test]
    fn test_overflow_forwards_lowest_priority() {
        let (mut pipeline, tank, out) = tank_into_sink(TankQueue::new(), json!({"tank_size": 3}));

        for n in 1..=3 {
            pipeline.send(seq(n)).unwrap();
        }
        assert!(out.is_empty());

        pipeline.send(seq(4)).unwrap();
        assert_eq!(out.texts(), vec!["p1"]);
        pipeline.send(seq(5)).unwrap();
        assert_eq!(out.texts(), vec!["p1", "p2"]);
        assert_eq!(held(&tank), vec![3, 4, 5]);
    }

    #[test]
    fn test_equal_priorities_leave_in_arrival_order() {
        let (mut pipeline, _tank, out) = tank_into_sink(TankQueue::new(), json!({"tank_size": 1}));
        pipeline.send(Packet::new("a").with_attr("seq_num", 7)).unwrap();
        pipeline.send(Packet::new("b").with_attr("seq_num", 7)).unwrap();
        pipeline.send(Packet::new("c").with_attr("seq_num", 7)).unwrap();
        assert_eq!(out.texts(), vec!["a", "b"]);
    }

    #[test]
    fn test_flush_drains_in_order() {
        let (mut pipeline, tank, out) = tank_into_sink(TankQueue::new(), json!({"tank_size": 10}));
        for n in [5, 3, 9, 1] {
            pipeline.send(seq(n)).unwrap();
        }
        pipeline.shut_down().unwrap();
        assert_eq!(out.texts(), vec!["p1", "p3", "p5", "p9"]);
        assert!(tank.sorted_packets().is_empty());
    }

    #[test]
    fn test_missing_priority_fails() {
        let (mut pipeline, _tank, _out) = tank_into_sink(TankQueue::new(), json!({"tank_size": 2}));
        let err = pipeline.send(Packet::new("no seq")).unwrap_err();
        assert!(matches!(err, FilterError::Attribute(_)));
    }

    #[test]
    fn test_resize_by_reset_bottle() {
        let (mut pipeline, tank, out) = tank_into_sink(TankQueue::new(), json!({"tank_size": 3}));
        for n in 1..=3 {
            pipeline.send(seq(n)).unwrap();
        }

        pipeline.send(MessageBottle::reset("tank", "tank_size", 1)).unwrap();
        assert_eq!(out.texts(), vec!["p1", "p2"]);
        assert_eq!(held(&tank), vec![3]);

        pipeline.send(MessageBottle::reset("tank", "tank_size", 3)).unwrap();
        assert_eq!(tank.len(), 3);
        pipeline.send(seq(4)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(held(&tank), vec![3, 4]);
    }

    #[test]
    fn test_bad_reset_keeps_previous_size() {
        let (mut pipeline, tank, out) = tank_into_sink(TankQueue::new(), json!({"tank_size": 3}));

        let err = pipeline.send(MessageBottle::reset("tank", "tank_size", "big")).unwrap_err();
        assert!(matches!(err, FilterError::Configuration(_)));
        let err = pipeline
            .send(MessageBottle::reset("tank", "priority_field_name", ""))
            .unwrap_err();
        assert!(matches!(err, FilterError::Configuration(_)));

        for n in 1..=3 {
            pipeline.send(seq(n)).unwrap();
        }
        assert!(out.is_empty());
        pipeline.send(seq(4)).unwrap();
        assert_eq!(out.texts(), vec!["p1"]);
        assert_eq!(held(&tank), vec![2, 3, 4]);
    }

    #[test]
    fn test_windowed_snapshots() {
        let tank = TankQueue::windowed();
        let buffer = tank.tank().unwrap();
        let windows = Sink::new();
        let main = Sink::new();
        let (hw, hm) = (windows.handle(), main.handle());
        let mut pipeline = PipelineBuilder::new("window")
            .filter("tank", tank, json!({"tank_size": 2}))
            .unwrap()
            .filter("windows", windows, json!({"max_results": 0}))
            .unwrap()
            .filter("main", main, Value::Null)
            .unwrap()
            .branch("tank", "windows")
            .unwrap()
            .main("tank", "main")
            .unwrap()
            .build()
            .unwrap();

        for n in 1..=3 {
            pipeline.send(seq(n)).unwrap();
        }
        let sizes = |h: &SinkHandle| -> Vec<usize> {
            h.packets().iter().map(Packet::payload_len).collect()
        };
        assert_eq!(sizes(&hw), vec![1, 2, 2]);
        assert_eq!(hm.texts(), vec!["p1"]);

        pipeline.shut_down().unwrap();
        assert_eq!(sizes(&hw), vec![1, 2, 2, 1, 0]);
        assert_eq!(hm.texts(), vec!["p1", "p2", "p3"]);
        assert!(buffer.is_empty());

        let last_window = hw.packets()[3].payload();
        assert!(matches!(
            last_window,
            Payload::Packets(ref ps) if ps[0].text().as_deref() == Some("p3")
        ));
    }

    #[test]
    fn test_feed_must_point_at_tank() {
        let err = PipelineBuilder::new("feed")
            .filter("feed", TankFeed::new(), Value::Null)
            .unwrap()
            .filter("plain", PassThrough::new(), Value::Null)
            .unwrap()
            .main("feed", "plain")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FilterError::Routing(RoutingError::Topology { .. })));

        let err = PipelineBuilder::new("feed")
            .filter("feed", TankFeed::new(), Value::Null)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FilterError::Routing(RoutingError::Topology { .. })));
    }

    /// One factorial step per visit: multiplies `acc` by `n` and feeds the
    /// packet back with `n - 1` until `n` reaches 1.
    #[derive(Debug)]
    struct FactorialStep;

    impl Filter for FactorialStep {
        fn type_tag(&self) -> &str {
            "factorial_step"
        }

        fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
            let n = packet.get_i64("n")?;
            let acc = packet.get_i64("acc").unwrap_or(1);
            if n <= 1 {
                return ctx.send_main(packet);
            }
            packet.set("acc", acc * n);
            packet.set("n", n - 1);
            ctx.send_branch(packet)
        }
    }

    #[test]
    fn test_factorial_through_feedback_loop() {
        let sink = Sink::new();
        let out = sink.handle();
        let mut pipeline = PipelineBuilder::new("factorial")
            .filter("tank", TankQueue::new(), Value::Null)
            .unwrap()
            .filter("step", FactorialStep, Value::Null)
            .unwrap()
            .filter("feed", TankFeed::new(), Value::Null)
            .unwrap()
            .filter("out", sink, Value::Null)
            .unwrap()
            .main("tank", "step")
            .unwrap()
            .branch("step", "feed")
            .unwrap()
            .main("feed", "tank")
            .unwrap()
            .main("step", "out")
            .unwrap()
            .build()
            .unwrap();

        for (i, n) in [5, 3, 1].into_iter().enumerate() {
            pipeline.send(Packet::new("").with_attr("seq_num", i).with_attr("n", n)).unwrap();
        }

        let results: Vec<i64> = out
            .packets()
            .iter()
            .map(|p| p.get_i64("acc").unwrap_or(1))
            .collect();
        assert_eq!(results, vec![120, 6, 1]);
    }
}
