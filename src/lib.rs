//! Pushgateway Type Guard Wasm Filter for Envoy Proxy
//!
//! This filter sits in front of a shared Prometheus Pushgateway and
//! rewrites every push body as it streams through:
//! - `# TYPE` lines from pushers are neutralized, so pushes from different
//!   producers can never declare conflicting types
//! - the gateway's own self-metric types are declared once at the top of
//!   every push, so pushed series never redefine them
//!
//! The body is never buffered in full; each chunk is rewritten and
//! forwarded as it arrives.
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod config;
pub mod ingest;
pub mod streaming;
pub mod telemetry;

use log::{debug, info, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType};
use std::cell::RefCell;

use crate::config::FilterConfig;
use crate::ingest::PushRewriter;
use crate::streaming::Preamble;

// Thread-local storage for filter configuration
thread_local! {
    static CONFIG: RefCell<SharedConfig> = RefCell::new(SharedConfig::new(FilterConfig::default()));
}

/// Configuration plus the preamble rendered from it, shared by every
/// HTTP context on this worker.
#[derive(Clone, Debug)]
struct SharedConfig {
    config: FilterConfig,
    preamble: Preamble,
}

impl SharedConfig {
    fn new(config: FilterConfig) -> Self {
        let preamble = config.preamble();
        Self { config, preamble }
    }
}

/// Root context for filter lifecycle management
struct TypeGuardRootContext {
    shared: SharedConfig,
}

impl TypeGuardRootContext {
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    fn new() -> Self {
        Self {
            shared: SharedConfig::new(FilterConfig::default()),
        }
    }
}

impl Context for TypeGuardRootContext {}

impl RootContext for TypeGuardRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        if let Some(config_bytes) = self.get_plugin_configuration() {
            match FilterConfig::from_bytes(&config_bytes) {
                Ok(config) => {
                    self.shared = SharedConfig::new(config);
                }
                Err(e) => {
                    // Keep serving with the previous configuration, the
                    // defaults on first load
                    warn!("Rejected plugin configuration: {}", e);
                    telemetry::audit_config_rejected(&e.to_string()).emit();
                }
            }
        }

        CONFIG.with(|c| {
            *c.borrow_mut() = self.shared.clone();
        });

        info!(
            "Type guard initialized: {} predeclared types ({} bytes), push prefix {}",
            self.shared.config.type_definitions.len(),
            self.shared.preamble.len(),
            self.shared.config.push_path_prefix
        );

        true
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        Some(Box::new(TypeGuardHttpContext::new(context_id)))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// HTTP context for per-request processing
struct TypeGuardHttpContext {
    context_id: u32,
    /// Configuration snapshot for this request
    shared: SharedConfig,
    /// Present only for push requests
    rewriter: Option<PushRewriter>,
    path: String,
    failed: bool,
}

impl TypeGuardHttpContext {
    fn new(context_id: u32) -> Self {
        let shared = CONFIG.with(|c| c.borrow().clone());

        Self {
            context_id,
            shared,
            rewriter: None,
            path: String::new(),
            failed: false,
        }
    }

    /// Refuse the push rather than forward unfiltered type lines
    fn send_error_response(&mut self, reason: &str) {
        if self.failed {
            return;
        }
        self.failed = true;

        let error_body = serde_json::json!({
            "error": "Push body rewrite failed",
            "reason": reason,
            "status": 500
        });
        let body_bytes = error_body.to_string();

        warn!(
            "[context_id={}] Push rewrite failed: {}",
            self.context_id, reason
        );

        self.send_http_response(
            500,
            vec![("content-type", "application/json")],
            Some(body_bytes.as_bytes()),
        );
    }
}

impl Context for TypeGuardHttpContext {}

impl HttpContext for TypeGuardHttpContext {
    fn on_http_request_headers(&mut self, _num_headers: usize, end_of_stream: bool) -> Action {
        let method = self.get_http_request_header(":method").unwrap_or_default();
        self.path = self.get_http_request_header(":path").unwrap_or_default();
        let content_type = self.get_http_request_header("content-type");

        if !self
            .shared
            .config
            .is_push(&method, &self.path, content_type.as_deref())
        {
            let reason = format!(
                "{} {} ({}) is not a text format push",
                method,
                self.path,
                content_type.as_deref().unwrap_or("no content-type")
            );
            debug!("[context_id={}] {}", self.context_id, reason);
            if self.shared.config.log_rewrites {
                telemetry::audit_skipped(&reason)
                    .with_request_id(self.context_id)
                    .emit();
            }
            return Action::Continue;
        }

        if end_of_stream {
            debug!("[context_id={}] Push without body", self.context_id);
            return Action::Continue;
        }

        // The preamble changes the body length
        self.set_http_request_header("content-length", None);
        self.rewriter = Some(PushRewriter::new(self.shared.preamble.clone()));

        Action::Continue
    }

    fn on_http_request_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        if self.failed {
            return Action::Pause;
        }
        if self.rewriter.is_none() {
            return Action::Continue;
        }

        debug!(
            "[context_id={}] Received body chunk: {} bytes, end_of_stream: {}",
            self.context_id, body_size, end_of_stream
        );

        let chunk = self.get_http_request_body(0, body_size).unwrap_or_default();
        let result = match self.rewriter.as_mut() {
            Some(rewriter) => rewriter.on_body_chunk(&chunk, end_of_stream),
            None => return Action::Continue,
        };
        match result {
            Ok(rewritten) => {
                self.set_http_request_body(0, body_size, &rewritten);
                Action::Continue
            }
            Err(e) => {
                self.send_error_response(&e.to_string());
                Action::Pause
            }
        }
    }

    fn on_log(&mut self) {
        let Some(rewriter) = self.rewriter.as_ref() else {
            return;
        };
        if !self.shared.config.log_rewrites {
            return;
        }
        if !rewriter.is_complete() {
            debug!(
                "[context_id={}] Push ended before end of stream",
                self.context_id
            );
        }
        telemetry::audit_rewritten(rewriter.stats())
            .with_request_id(self.context_id)
            .with_path(&self.path)
            .emit();
    }
}

// Register the filter with proxy-wasm runtime
#[cfg(target_arch = "wasm32")]
proxy_wasm::main! {{
    proxy_wasm::set_log_level(proxy_wasm::types::LogLevel::Info);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(TypeGuardRootContext::new())
    });
}}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_config_renders_preamble() {
        let shared = SharedConfig::new(FilterConfig::default());
        assert_eq!(shared.preamble, Preamble::default());
    }

    #[test]
    fn test_push_end_to_end() {
        let shared = SharedConfig::new(FilterConfig::default());
        assert!(shared.config.is_push("POST", "/metrics/job/nightly", Some("text/plain; version=0.0.4")));

        let mut rewriter = PushRewriter::new(shared.preamble.clone());
        let mut forwarded = rewriter.on_body_chunk(b"# HELP jobs Jobs run.\n# TYPE jo", false).unwrap();
        forwarded.extend(rewriter.on_body_chunk(b"bs counter\njobs 12\n", true).unwrap());

        let body = &forwarded[shared.preamble.len()..];
        assert_eq!(&forwarded[..shared.preamble.len()], shared.preamble.as_bytes());
        assert_eq!(body, b"# HELP jobs Jobs run.\n# TYPEXjobs counter\njobs 12\n");
    }
}
