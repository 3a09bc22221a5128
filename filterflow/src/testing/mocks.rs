//! Mock filters for testing.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::{MessageBottle, Packet};
use crate::errors::{FilterError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};

#[derive(Debug, Default)]
struct LogInner {
    events: Vec<String>,
    packets: Vec<Packet>,
}

/// A shared, append-only log of what test filters saw.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<LogInner>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&self, event: impl Into<String>) {
        self.inner.lock().events.push(event.into());
    }

    /// Returns the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.inner.lock().events.clone()
    }

    /// Returns the packet handles recorded so far.
    #[must_use]
    pub fn packets(&self) -> Vec<Packet> {
        self.inner.lock().packets.clone()
    }

    /// Clears the log.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.events.clear();
        inner.packets.clear();
    }

    fn record(&self, event: String, packet: Packet) {
        let mut inner = self.inner.lock();
        inner.events.push(event);
        inner.packets.push(packet);
    }
}

fn label(packet: &Packet) -> String {
    packet
        .text()
        .unwrap_or_else(|| packet.with_payload(|p| p.kind_name().to_string()))
}

/// Records `name:text` for every packet and `name:<message>` for every bottle,
/// then forwards on main.
#[derive(Debug)]
pub struct RecordingFilter {
    log: EventLog,
}

impl RecordingFilter {
    /// Creates a recorder writing to `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Filter for RecordingFilter {
    fn type_tag(&self) -> &str {
        "recording"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.log.record(format!("{}:{}", ctx.name(), label(&packet)), packet.clone());
        ctx.send_main(packet)
    }

    fn handle_control(
        &mut self,
        bottle: MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        self.log.push(format!("{}:<{}>", ctx.name(), bottle.message));
        if ctx.is_addressee(&bottle) {
            self.open_message_bottle(&bottle, ctx)?;
            if bottle.single_use {
                return Ok(());
            }
        }
        ctx.send_main(bottle)
    }
}

/// Records `flush:name` and `close:name`, and forwards packets on main.
#[derive(Debug)]
pub struct LifecycleProbe {
    log: EventLog,
    name: String,
}

impl LifecycleProbe {
    /// Creates a probe writing to `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            name: String::from("unnamed"),
        }
    }
}

impl Filter for LifecycleProbe {
    fn type_tag(&self) -> &str {
        "lifecycle_probe"
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.name = setup.name().to_string();
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        ctx.send_main(packet)
    }

    fn flush_buffer(&mut self, _ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.log.push(format!("flush:{}", self.name));
        Ok(())
    }

    fn close_filter(&mut self) -> FilterResult<()> {
        self.log.push(format!("close:{}", self.name));
        Ok(())
    }
}

/// Fails packets with a data error.
///
/// With a trigger text only packets carrying exactly that text fail; the rest
/// are forwarded on main.
#[derive(Debug, Default)]
pub struct FailingFilter {
    trigger: Option<String>,
    failures: usize,
}

impl FailingFilter {
    /// Creates a filter that fails every packet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter that fails only packets whose text is `text`.
    #[must_use]
    pub fn on_text(text: impl Into<String>) -> Self {
        Self {
            trigger: Some(text.into()),
            failures: 0,
        }
    }
}

impl Filter for FailingFilter {
    fn type_tag(&self) -> &str {
        "failing"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let fails = match &self.trigger {
            Some(trigger) => packet.text().as_deref() == Some(trigger.as_str()),
            None => true,
        };
        if fails {
            self.failures += 1;
            return Err(FilterError::data(format!(
                "'{}' rejected packet #{}",
                ctx.name(),
                self.failures
            )));
        }
        ctx.send_main(packet)
    }
}
