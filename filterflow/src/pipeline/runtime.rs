//! A built pipeline and its lifecycle.

use super::graph::{Graph, NodeId};
use super::{FailurePolicy, FailureRecord, RunSummary, ShutdownToken};
use crate::core::{FilterState, Unit};
use crate::errors::{ConfigurationError, ContractErrorInfo, FilterError, FilterResult};
use crate::observability::SpanTimer;
use crate::sources::Source;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// A validated, initialized filter graph.
///
/// Units are pushed into the entry filter with [`Pipeline::send`] or pulled
/// from a [`Source`] by [`Pipeline::run`]. [`Pipeline::shut_down`] flushes
/// every filter in graph order, then closes every filter in graph order.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    run_id: Uuid,
    graph: Graph,
    entry: NodeId,
    order: Vec<NodeId>,
    policy: FailurePolicy,
    failures: Vec<FailureRecord>,
    closed: bool,
}

impl Pipeline {
    pub(crate) fn new(
        name: String,
        graph: Graph,
        entry: NodeId,
        order: Vec<NodeId>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            name,
            run_id: Uuid::new_v4(),
            graph,
            entry,
            order,
            policy,
            failures: Vec::new(),
            closed: false,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the id generated for this pipeline instance.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns a handle to the shared shutdown flag.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.graph.shutdown().clone()
    }

    /// Returns the filter names in graph order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&str> {
        self.order.iter().map(|id| self.graph.node_name(*id)).collect()
    }

    /// Returns a filter's lifecycle state.
    #[must_use]
    pub fn filter_state(&self, name: &str) -> Option<FilterState> {
        self.graph.find(name).map(|id| self.graph.state(id))
    }

    /// Returns every failure recorded so far.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Returns true once the pipeline has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends one unit into the entry filter.
    ///
    /// The call returns once the unit and everything derived from it have
    /// been processed. A per-unit failure is recorded; under
    /// [`FailurePolicy::LogAndContinue`] it is logged and swallowed unless
    /// it is fatal.
    pub fn send(&mut self, unit: impl Into<Unit>) -> FilterResult<()> {
        let entry = self.entry;
        self.send_at(entry, unit.into())
    }

    /// Sends one unit into a named filter instead of the entry filter.
    pub fn send_to(&mut self, name: &str, unit: impl Into<Unit>) -> FilterResult<()> {
        let node = self.node(name)?;
        self.send_at(node, unit.into())
    }

    fn node(&self, name: &str) -> Result<NodeId, ConfigurationError> {
        self.graph.find(name).ok_or_else(|| {
            ConfigurationError::new(format!("Pipeline '{}' has no filter '{name}'", self.name))
                .with_error_info(ContractErrorInfo::new(
                    "CONFIG-UNKNOWN_FILTER",
                    format!("'{name}' not found"),
                ))
        })
    }

    fn send_at(&mut self, node: NodeId, unit: Unit) -> FilterResult<()> {
        if self.closed {
            return Err(FilterError::PipelineClosed(self.name.clone()));
        }
        let result = self.graph.deliver(node, unit);
        let failed_at = self.graph.take_failed_at();
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failures.push(FailureRecord::new(failed_at.clone(), &e));
                if self.policy == FailurePolicy::LogAndContinue && !e.is_fatal() {
                    warn!(
                        pipeline = %self.name,
                        filter = failed_at.as_deref().unwrap_or("?"),
                        kind = %e.kind(),
                        error = %e,
                        "Unit failed, continuing"
                    );
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Pulls units from a source until it is exhausted or shutdown is
    /// requested, then shuts the pipeline down.
    ///
    /// On an error the pipeline is aborted: filters are closed without flush.
    pub fn run<S>(&mut self, source: &mut S) -> FilterResult<RunSummary>
    where
        S: Source + ?Sized,
    {
        let span = info_span!("pipeline_run", pipeline = %self.name, run_id = %self.run_id);
        let _guard = span.enter();
        let timer = SpanTimer::start("pipeline_run");
        info!("Pipeline run started");

        let token = self.shutdown_token();
        let first_failure = self.failures.len();
        let mut units_in = 0;

        while !token.is_shutting_down() {
            let unit = match source.pull(&token) {
                Ok(Some(unit)) => unit,
                Ok(None) => break,
                Err(e) => return Err(self.fail_run(source, e)),
            };
            units_in += 1;
            if let Err(e) = self.send(unit) {
                return Err(self.fail_run(source, e));
            }
        }

        source.close_source()?;
        self.shut_down()?;
        info!(units_in, duration_ms = timer.finish(), "Pipeline run finished");
        Ok(RunSummary {
            units_in,
            failures: self.failures[first_failure..].to_vec(),
        })
    }

    fn fail_run<S>(&mut self, source: &mut S, error: FilterError) -> FilterError
    where
        S: Source + ?Sized,
    {
        warn!(error = %error, "Pipeline run failed, aborting");
        if let Err(e) = source.close_source() {
            warn!(error = %e, "Source close failed");
        }
        if let Err(e) = self.abort(&error.to_string()) {
            warn!(error = %e, "Close failed during abort");
        }
        error
    }

    /// Flushes every filter in graph order, then closes every filter in graph
    /// order.
    ///
    /// Every flush and every close is attempted even after a failure; the
    /// first error is returned. Idempotent.
    pub fn shut_down(&mut self) -> FilterResult<()> {
        if self.closed {
            return Ok(());
        }
        self.graph.shutdown().shut_down("pipeline shut down");
        debug!(pipeline = %self.name, "Flushing filters");

        let mut first_error = None;
        for id in self.order.clone() {
            if let Err(e) = self.graph.flush(id) {
                let failed_at = self.graph.take_failed_at();
                warn!(
                    pipeline = %self.name,
                    filter = failed_at.as_deref().unwrap_or("?"),
                    error = %e,
                    "Flush failed"
                );
                self.failures.push(FailureRecord::new(failed_at, &e));
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.close_all() {
            first_error.get_or_insert(e);
        }
        info!(pipeline = %self.name, "Pipeline shut down");
        first_error.map_or(Ok(()), Err)
    }

    /// Stops the pipeline without flushing: tank drains stop and every filter
    /// is closed. Idempotent.
    pub fn abort(&mut self, reason: &str) -> FilterResult<()> {
        if self.closed {
            return Ok(());
        }
        self.graph.shutdown().abort(reason);
        info!(pipeline = %self.name, reason, "Pipeline aborted");
        self.close_all()
    }

    fn close_all(&mut self) -> FilterResult<()> {
        self.closed = true;
        let mut first_error = None;
        for id in self.order.clone() {
            if let Err(e) = self.graph.close(id) {
                warn!(
                    pipeline = %self.name,
                    filter = %self.graph.node_name(id),
                    error = %e,
                    "Close failed"
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-runs a filter's `zero_inputs`, resetting its internal state.
    pub fn zero_inputs(&mut self, name: &str) -> FilterResult<()> {
        let node = self.node(name)?;
        self.graph.zero_inputs(node)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.closed {
            debug!(pipeline = %self.name, "Pipeline dropped while open, closing filters");
            if let Err(e) = self.close_all() {
                warn!(pipeline = %self.name, error = %e, "Close failed on drop");
            }
        }
    }
}
