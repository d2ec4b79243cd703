//! Type Definition Preamble
//!
//! The Pushgateway stores a handful of its own metrics next to the pushed
//! ones. With every pushed metric reduced to `untyped`, those self-metrics
//! would still collide with same-named pushed series. The Pushgateway
//! accepts `# TYPE` lines that name no sample, so every push is prefixed
//! with a fixed block declaring the self-metric types up front.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Prometheus metric types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Summary,
    Histogram,
    Untyped,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Summary => "summary",
            MetricType::Histogram => "histogram",
            MetricType::Untyped => "untyped",
        }
    }
}

/// One `# TYPE <name> <type>` line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
}

impl TypeDefinition {
    pub fn new(name: &str, metric_type: MetricType) -> Self {
        Self {
            name: name.to_string(),
            metric_type,
        }
    }

    /// Check the name against `[a-zA-Z_:][a-zA-Z0-9_:]*`
    pub fn has_valid_name(&self) -> bool {
        let mut bytes = self.name.bytes();
        match bytes.next() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b':' => {}
            _ => return false,
        }
        bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b':')
    }
}

/// Self-metrics of a stock Pushgateway: Go runtime, process collector and
/// the gateway's own counters.
const PUSHGATEWAY_SELF_METRICS: &[(&str, MetricType)] = &[
    ("go_gc_duration_seconds", MetricType::Summary),
    ("go_goroutines", MetricType::Gauge),
    ("go_info", MetricType::Gauge),
    ("go_memstats_alloc_bytes", MetricType::Gauge),
    ("go_memstats_alloc_bytes_total", MetricType::Counter),
    ("go_memstats_buck_hash_sys_bytes", MetricType::Gauge),
    ("go_memstats_frees_total", MetricType::Counter),
    ("go_memstats_gc_cpu_fraction", MetricType::Gauge),
    ("go_memstats_gc_sys_bytes", MetricType::Gauge),
    ("go_memstats_heap_alloc_bytes", MetricType::Gauge),
    ("go_memstats_heap_idle_bytes", MetricType::Gauge),
    ("go_memstats_heap_inuse_bytes", MetricType::Gauge),
    ("go_memstats_heap_objects", MetricType::Gauge),
    ("go_memstats_heap_released_bytes", MetricType::Gauge),
    ("go_memstats_heap_sys_bytes", MetricType::Gauge),
    ("go_memstats_last_gc_time_seconds", MetricType::Gauge),
    ("go_memstats_lookups_total", MetricType::Counter),
    ("go_memstats_mallocs_total", MetricType::Counter),
    ("go_memstats_mcache_inuse_bytes", MetricType::Gauge),
    ("go_memstats_mcache_sys_bytes", MetricType::Gauge),
    ("go_memstats_mspan_inuse_bytes", MetricType::Gauge),
    ("go_memstats_mspan_sys_bytes", MetricType::Gauge),
    ("go_memstats_next_gc_bytes", MetricType::Gauge),
    ("go_memstats_other_sys_bytes", MetricType::Gauge),
    ("go_memstats_stack_inuse_bytes", MetricType::Gauge),
    ("go_memstats_stack_sys_bytes", MetricType::Gauge),
    ("go_memstats_sys_bytes", MetricType::Gauge),
    ("go_threads", MetricType::Gauge),
    ("process_cpu_seconds_total", MetricType::Counter),
    ("process_max_fds", MetricType::Gauge),
    ("process_open_fds", MetricType::Gauge),
    ("process_resident_memory_bytes", MetricType::Gauge),
    ("process_start_time_seconds", MetricType::Gauge),
    ("process_virtual_memory_bytes", MetricType::Gauge),
    ("process_virtual_memory_max_bytes", MetricType::Gauge),
    ("pushgateway_build_info", MetricType::Gauge),
    ("pushgateway_http_requests_total", MetricType::Counter),
];

/// Default catalog: the Pushgateway self-metrics
pub fn pushgateway_self_metrics() -> Vec<TypeDefinition> {
    PUSHGATEWAY_SELF_METRICS
        .iter()
        .map(|&(name, metric_type)| TypeDefinition::new(name, metric_type))
        .collect()
}

/// Immutable preamble bytes, shared by every stream built from one config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preamble {
    bytes: Arc<[u8]>,
}

impl Preamble {
    /// Render one newline-terminated `# TYPE` line per definition
    pub fn from_definitions(definitions: &[TypeDefinition]) -> Self {
        let mut text = String::new();
        for def in definitions {
            text.push_str("# TYPE ");
            text.push_str(&def.name);
            text.push(' ');
            text.push_str(def.metric_type.as_str());
            text.push('\n');
        }
        Self {
            bytes: Arc::from(text.into_bytes()),
        }
    }

    /// Use `bytes` verbatim
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for Preamble {
    fn default() -> Self {
        Self::from_definitions(&pushgateway_self_metrics())
    }
}
