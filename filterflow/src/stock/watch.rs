//! Attribute watcher that reports through a callback.

use crate::core::{MessageBottle, Packet};
use crate::errors::{ConfigurationError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Receives `found:<attr>`, `not_found:<attr>` and
/// `inconsistency_value_exceeded:<attr>` events with the current environ.
pub type WatchCallback = Box<dyn FnMut(&str, &Map<String, Value>) + Send>;

#[derive(Debug, Default)]
struct WatchConfig {
    watch_attr: String,
    count_to_confirm: usize,
    num_watch_pkts: Option<usize>,
    allowed_inconsistencies: usize,
    watch_for_change: bool,
    include_in_environ: Vec<String>,
    close_when_found: bool,
}

/// Watches `watch_attr` on packets and on bottles addressed to it.
///
/// A value is confirmed once it has been seen `count_to_confirm` times. If
/// more than `allowed_inconsistencies` distinct values turn up, the counts
/// restart from the latest value. With `num_watch_pkts` only that many units
/// are inspected. With `watch_for_change` every new value is reported.
///
/// Added by instance, since it needs a callback.
pub struct CallbackOnAttribute {
    callback: WatchCallback,
    config: WatchConfig,
    counts: BTreeMap<String, usize>,
    environ: Map<String, Value>,
    previous: Option<Value>,
    seen: usize,
    found: bool,
    reported_close: bool,
}

impl fmt::Debug for CallbackOnAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackOnAttribute")
            .field("config", &self.config)
            .field("counts", &self.counts)
            .field("found", &self.found)
            .finish_non_exhaustive()
    }
}

impl CallbackOnAttribute {
    /// Creates the watcher.
    pub fn new(callback: impl FnMut(&str, &Map<String, Value>) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            config: WatchConfig::default(),
            counts: BTreeMap::new(),
            environ: Map::new(),
            previous: None,
            seen: 0,
            found: false,
            reported_close: false,
        }
    }

    fn fire(&mut self, event: &str) {
        let event = format!("{event}:{}", self.config.watch_attr);
        debug!(event = %event, "Watch callback");
        (self.callback)(&event, &self.environ);
    }

    fn confirm(&mut self, ctx: &FilterContext<'_>) {
        self.found = true;
        self.fire("found");
        if self.config.close_when_found {
            info!(
                filter = %ctx.name(),
                attr = %self.config.watch_attr,
                "Watched value found, shutting down"
            );
            ctx.request_shutdown("watched attribute found");
        }
    }

    /// Reads `num_watch_pkts`: null watches every unit, otherwise at least one.
    fn watch_window(params: &Params, name: &str) -> Result<Option<usize>, ConfigurationError> {
        if params.non_null("num_watch_pkts").is_none() {
            return Ok(None);
        }
        match params.usize("num_watch_pkts")? {
            0 => Err(ConfigurationError::bad_value(
                name,
                "num_watch_pkts",
                "must be at least 1, or null to watch every unit",
            )),
            n => Ok(Some(n)),
        }
    }

    /// Shared counting path for packets and bottles.
    fn observe(&mut self, lookup: &dyn Fn(&str) -> Option<Value>, ctx: &FilterContext<'_>) {
        if self.found && !self.config.watch_for_change {
            return;
        }
        if let Some(limit) = self.config.num_watch_pkts {
            self.seen += 1;
            if self.seen > limit {
                return;
            }
        }

        if let Some(value) = lookup(&self.config.watch_attr) {
            for name in &self.config.include_in_environ {
                if let Some(v) = lookup(name) {
                    self.environ.insert(name.clone(), v);
                }
            }
            self.environ.insert(self.config.watch_attr.clone(), value.clone());

            let key = value.to_string();
            *self.counts.entry(key.clone()).or_insert(0) += 1;

            if self.config.watch_for_change {
                if self.previous.as_ref() != Some(&value) {
                    self.previous = Some(value);
                    self.confirm(ctx);
                }
                return;
            }

            if self.counts.len() - 1 > self.config.allowed_inconsistencies {
                self.fire("inconsistency_value_exceeded");
                self.counts = BTreeMap::from([(key.clone(), 1)]);
            }
            if self.counts.get(&key).copied().unwrap_or(0) >= self.config.count_to_confirm {
                self.confirm(ctx);
            }
        }

        if self.config.num_watch_pkts == Some(self.seen) && !self.found {
            self.fire("not_found");
        }
    }
}

impl Filter for CallbackOnAttribute {
    fn type_tag(&self) -> &str {
        "callback_on_attribute"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("watch_attr")
            .optional("count_to_confirm", 1)
            .optional("num_watch_pkts", Value::Null)
            .optional("allowed_inconsistencies", 0)
            .optional("watch_for_change", false)
            .optional("include_in_environ", Value::Array(Vec::new()))
            .optional("close_when_found", false)
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        setup.params().str("watch_attr")?;
        Self::watch_window(setup.params(), setup.name())?;
        Ok(())
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        let params = setup.params();
        self.config = WatchConfig {
            watch_attr: params.str("watch_attr")?.to_string(),
            count_to_confirm: params.usize("count_to_confirm")?.max(1),
            num_watch_pkts: Self::watch_window(params, setup.name())?,
            allowed_inconsistencies: params.usize("allowed_inconsistencies")?,
            watch_for_change: params.bool("watch_for_change")?,
            include_in_environ: params.str_list("include_in_environ")?,
            close_when_found: params.bool("close_when_found")?,
        };
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.counts.clear();
        self.environ.clear();
        self.previous = None;
        self.seen = 0;
        self.found = false;
        self.reported_close = false;
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.observe(&|name| packet.get_opt(name), ctx);
        ctx.send_main(packet)
    }

    fn open_message_bottle(
        &mut self,
        bottle: &MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        self.observe(&|name| bottle.get(name).cloned(), ctx);
        Ok(())
    }

    fn close_filter(&mut self) -> FilterResult<()> {
        if !self.reported_close && !self.found && self.config.num_watch_pkts.is_none() {
            self.fire("not_found");
        }
        self.reported_close = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, PipelineBuilder};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    type Events = Arc<Mutex<Vec<(String, Map<String, Value>)>>>;

    fn watcher(params: Value) -> (Pipeline, Events) {
        let events: Events = Arc::default();
        let sink = events.clone();
        let filter = CallbackOnAttribute::new(move |event, environ| {
            sink.lock().push((event.to_string(), environ.clone()));
        });
        let pipeline = PipelineBuilder::new("watch")
            .filter("watch", filter, params)
            .unwrap()
            .build()
            .unwrap();
        (pipeline, events)
    }

    fn names(events: &Events) -> Vec<String> {
        events.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    #[test]
    fn test_found_after_confirmations() {
        let (mut pipeline, events) = watcher(json!({
            "watch_attr": "label",
            "count_to_confirm": 2,
            "allowed_inconsistencies": 1,
            "include_in_environ": ["frame"],
        }));

        pipeline.send(Packet::new("").with_attr("label", "cat").with_attr("frame", 1)).unwrap();
        pipeline.send(Packet::new("").with_attr("label", "dog").with_attr("frame", 2)).unwrap();
        assert!(names(&events).is_empty());

        pipeline.send(Packet::new("").with_attr("label", "dog").with_attr("frame", 3)).unwrap();
        assert_eq!(names(&events), vec!["found:label"]);
        assert_eq!(events.lock()[0].1.get("frame"), Some(&json!(3)));

        pipeline.shut_down().unwrap();
        assert_eq!(names(&events).len(), 1);
    }

    #[test]
    fn test_inconsistency_resets_counts() {
        let (mut pipeline, events) = watcher(json!({"watch_attr": "v", "count_to_confirm": 2}));
        pipeline.send(Packet::new("").with_attr("v", 1)).unwrap();
        pipeline.send(Packet::new("").with_attr("v", 2)).unwrap();
        assert_eq!(names(&events), vec!["inconsistency_value_exceeded:v"]);

        pipeline.send(Packet::new("").with_attr("v", 2)).unwrap();
        assert_eq!(names(&events).last().unwrap(), "found:v");
    }

    #[test]
    fn test_empty_watch_window_rejected() {
        let filter = CallbackOnAttribute::new(|_, _| {});
        let err = PipelineBuilder::new("watch")
            .filter("watch", filter, json!({"watch_attr": "v", "num_watch_pkts": 0}))
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            crate::errors::FilterError::Configuration(e) => {
                assert_eq!(e.code(), Some("CONFIG-BAD_VALUE"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_found_within_window() {
        let (mut pipeline, events) = watcher(json!({"watch_attr": "v", "num_watch_pkts": 2}));
        pipeline.send(Packet::new("")).unwrap();
        pipeline.send(Packet::new("")).unwrap();
        pipeline.send(Packet::new("").with_attr("v", 1)).unwrap();
        assert_eq!(names(&events), vec!["not_found:v"]);
    }

    #[test]
    fn test_not_found_on_close() {
        let (mut pipeline, events) = watcher(json!({"watch_attr": "v"}));
        pipeline.send(Packet::new("")).unwrap();
        pipeline.shut_down().unwrap();
        pipeline.shut_down().unwrap();
        assert_eq!(names(&events), vec!["not_found:v"]);
    }

    #[test]
    fn test_watch_for_change() {
        let (mut pipeline, events) =
            watcher(json!({"watch_attr": "mode", "watch_for_change": true}));
        for mode in ["a", "a", "b", "a"] {
            pipeline.send(Packet::new("").with_attr("mode", mode)).unwrap();
        }
        assert_eq!(names(&events).len(), 3);
    }

    #[test]
    fn test_bottles_share_counting_path() {
        let (mut pipeline, events) = watcher(json!({"watch_attr": "v", "count_to_confirm": 2}));
        pipeline.send(MessageBottle::to_filter("watch", "observe").with_value("v", 5)).unwrap();
        pipeline.send(Packet::new("").with_attr("v", 5)).unwrap();
        assert_eq!(names(&events), vec!["found:v"]);
    }

    #[test]
    fn test_close_when_found_requests_shutdown() {
        let (mut pipeline, _events) = watcher(json!({"watch_attr": "v", "close_when_found": true}));
        let token = pipeline.shutdown_token();
        pipeline.send(Packet::new("").with_attr("v", true)).unwrap();
        assert!(token.is_shutting_down());
        assert_eq!(token.reason().as_deref(), Some("watched attribute found"));
    }
}
