//! Report pipeline
//!
//! One invocation of [`ReportPipeline::report`] is one cycle. For every
//! monitored connection it:
//!
//! 1. sweeps the directory caches
//! 2. gates the connection (evict / availability only / full report)
//! 3. resolves directory metadata (non-container mode)
//! 4. matches selectors, converts and de-duplicates the matches
//! 5. appends builtin memory and GC metrics and plugin inbuilt records
//! 6. tags everything with `dir=<name>`
//!
//! Failures never cross connection boundaries; the worst case is an empty or
//! partial report for one connection.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::connection::{Connection, EvictReason, Gate, LivenessClassifier};
use crate::directory::{DirKey, DirectoryCaches, DirectoryResolver};
use crate::hook::{ConnectionLifecycle, ContainerCheck, PluginHook};
use crate::metrics::PipelineMetrics;
use crate::plugin::{ContainerIdCheck, LoggingLifecycle};
use crate::report::{
    BuiltinExtractor, CounterType, GcExtractor, MetricMatcher, ReportContext, ReportDeduplicator,
    ReportRecord, ReportSet,
};
use crate::selector::MetricSelector;
use crate::snapshot::ManagementObjectSnapshot;
use crate::transformer::{ExpressionEvaluator, ValueTransformer};

/// Suffix of the per-connection availability metric
pub const AVAILABILITY_METRIC: &str = "availability";

/// Everything the pipeline needs about one connection in one cycle
#[derive(Debug, Clone)]
pub struct MonitoredConnection {
    pub connection: Connection,
    pub snapshots: Vec<ManagementObjectSnapshot>,
    pub selectors: Vec<MetricSelector>,
    /// Report timestamp, Unix seconds
    pub timestamp: i64,
}

/// Static pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Endpoint identity stamped on every record
    pub endpoint: String,
    pub container_runtime: bool,
}

/// Orchestrates one report cycle
pub struct ReportPipeline {
    settings: PipelineSettings,
    hook: Arc<dyn PluginHook>,
    resolver: DirectoryResolver,
    lifecycle: Arc<dyn ConnectionLifecycle>,
    containers: Arc<dyn ContainerCheck>,
    dedup: ReportDeduplicator,
    metrics: Arc<PipelineMetrics>,
}

impl ReportPipeline {
    /// Create a pipeline with logging-only lifecycle, a permissive container
    /// check and the arithmetic expression evaluator
    pub fn new(
        settings: PipelineSettings,
        hook: Arc<dyn PluginHook>,
        caches: Arc<DirectoryCaches>,
    ) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        Self {
            settings,
            resolver: DirectoryResolver::new(caches, hook.clone()),
            hook,
            lifecycle: Arc::new(LoggingLifecycle),
            containers: Arc::new(ContainerIdCheck::default()),
            dedup: ReportDeduplicator::default().with_metrics(metrics.clone()),
            metrics,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn ConnectionLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_container_check(mut self, containers: Arc<dyn ContainerCheck>) -> Self {
        self.containers = containers;
        self
    }

    /// Use another value expression evaluator
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.dedup = ReportDeduplicator::new(ValueTransformer::new(evaluator))
            .with_metrics(self.metrics.clone());
        self
    }

    /// Share a metrics registry with the caller
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.dedup = self.dedup.with_metrics(metrics.clone());
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn caches(&self) -> &DirectoryCaches {
        self.resolver.caches()
    }

    /// Run one cycle over `connections`
    pub fn report(&self, connections: &[MonitoredConnection]) -> ReportSet {
        let started = Instant::now();
        let expired = self.resolver.caches().evict_expired();
        if expired > 0 {
            debug!(expired, "Swept directory caches");
        }

        let mut result = ReportSet::new();
        for monitored in connections {
            result.extend(self.report_connection(monitored));
        }

        self.metrics
            .directory_cache_entries
            .set(self.resolver.caches().len() as f64);
        self.metrics.record_cycle(started.elapsed(), result.len());
        info!(
            connections = connections.len(),
            records = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report cycle complete"
        );
        result
    }

    /// Records for one connection
    pub fn report_connection(&self, monitored: &MonitoredConnection) -> ReportSet {
        let connection = &monitored.connection;
        let container_runtime = self.settings.container_runtime;

        let install_dir = match connection.server_name.as_deref() {
            Some(server) if !container_runtime && connection.pid != 0 => {
                Some(self.resolver.resolve_dir_path(connection.pid, server))
            }
            _ => None,
        };

        let classifier = LivenessClassifier::new(container_runtime, &*self.containers);
        let liveness = match classifier.classify(connection, install_dir.as_deref()) {
            Gate::Evict(reason) => {
                self.evict(connection, &reason);
                return ReportSet::new();
            }
            Gate::Report(liveness) => liveness,
        };

        let ctx = self.context(monitored);
        let mut out = ReportSet::new();
        out.insert(availability_record(&ctx, connection));

        if !connection.is_reportable() {
            debug!(
                connection = %connection.name,
                "Connection lacks handle, cache key or qualified name; availability only"
            );
            return out;
        }

        let dir_name = match connection.server_name.as_deref() {
            Some(server) if !container_runtime => {
                self.resolver.resolve_dir_name(connection.pid, server)
            }
            _ => String::new(),
        };

        if !liveness.continues_reporting() {
            debug!(
                connection = %connection.name,
                liveness = ?liveness,
                "Connection unavailable; availability only"
            );
            return out;
        }

        let outcome = MetricMatcher::match_all(&monitored.selectors, &monitored.snapshots);
        outcome.log_diagnostics(&connection.name);
        out.extend(self.dedup.convert(&outcome.pairs, &ctx));

        out.extend(BuiltinExtractor::extract_with_metrics(
            &ctx,
            &monitored.snapshots,
            &self.metrics,
        ));
        out.extend(GcExtractor::extract(&ctx, &monitored.snapshots));
        out.extend(self.hook.inbuilt_reports(monitored, &ctx));

        if !dir_name.is_empty() {
            out.append_tag_to_all(&format!("dir={}", dir_name));
        }
        out
    }

    fn context(&self, monitored: &MonitoredConnection) -> ReportContext {
        ReportContext {
            endpoint: self.settings.endpoint.clone(),
            step: self.hook.step(),
            timestamp: monitored.timestamp,
            metric_prefix: self.hook.metric_prefix().to_string(),
            identity_tags: self.hook.identity_tags(&monitored.connection.name),
            connection: monitored.connection.name.clone(),
        }
    }

    fn evict(&self, connection: &Connection, reason: &EvictReason) {
        warn!(
            connection = %connection.name,
            pid = connection.pid,
            reason = %reason,
            "Evicting connection"
        );
        self.lifecycle.remove_connection(connection);
        if let Some(server) = connection.server_name.as_deref() {
            let removed = self
                .resolver
                .caches()
                .evict_key(&DirKey::new(server, connection.pid));
            debug!(connection = %connection.name, removed, "Evicted directory cache entries");
        }
        self.metrics.connections_evicted_total.inc();
    }
}

/// `<prefix>.availability` = 1 / 0, with `reason=<reason>` when known
fn availability_record(ctx: &ReportContext, connection: &Connection) -> ReportRecord {
    let value = if connection.valid { "1" } else { "0" };
    let mut record = ctx.record(AVAILABILITY_METRIC, value, CounterType::Gauge, "");
    if let Some(reason) = connection.reason() {
        record.append_tags(&format!("reason={}", reason));
    }
    record
}
