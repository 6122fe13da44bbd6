//! Backend Endpoint Resolution
//!
//! Pure, deterministic mapping from the hosting context to the backend
//! endpoint the presentation layer should use. No network I/O; callable
//! before any other component starts.
//!
//! Resolution rules:
//! - embedded desktop host: fixed local address regardless of any
//!   configured URL,
//! - explicit absolute URL: used as-is,
//! - empty configured URL: same origin, rewritten through the reverse
//!   proxy under the `/api` path prefix,
//! - nothing configured: default local address.

/// Hosting context the endpoint was resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginContext {
    /// Embedded desktop host owning the backend process.
    EmbeddedHost,
    /// Browser talking to an absolute backend URL.
    Browser,
    /// Browser behind a reverse proxy, same-origin path-prefixed.
    ProxiedPath,
}

/// Resolved backend endpoint; immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    stream_url: String,
    origin: OriginContext,
}

impl Endpoint {
    /// Base HTTP address (empty for same-origin proxied deployments).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket stream address.
    #[must_use]
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// The hosting context this endpoint was resolved for.
    #[must_use]
    pub const fn origin(&self) -> OriginContext {
        self.origin
    }

    /// Snapshot URL for one symbol's market data.
    #[must_use]
    pub fn market_snapshot_url(&self, symbol: &str) -> String {
        format!("{}/api/market/{symbol}", self.base_url)
    }
}

/// Resolves the session endpoint from the hosting context.
#[derive(Debug, Clone)]
pub struct BackendLocator {
    embedded: bool,
    backend_url: Option<String>,
    local_port: u16,
}

impl BackendLocator {
    /// Default port of the locally-hosted backend.
    pub const DEFAULT_LOCAL_PORT: u16 = 8001;

    /// Create a locator.
    ///
    /// `backend_url` distinguishes unset (`None`, default local address)
    /// from set-but-empty (`Some("")`, same-origin proxied path).
    #[must_use]
    pub const fn new(embedded: bool, backend_url: Option<String>) -> Self {
        Self {
            embedded,
            backend_url,
            local_port: Self::DEFAULT_LOCAL_PORT,
        }
    }

    /// Override the local backend port.
    #[must_use]
    pub const fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    /// Resolve the endpoint for this session.
    #[must_use]
    pub fn resolve(&self) -> Endpoint {
        if self.embedded {
            let base = format!("http://127.0.0.1:{}", self.local_port);
            return Endpoint {
                stream_url: stream_url_for(&base),
                base_url: base,
                origin: OriginContext::EmbeddedHost,
            };
        }

        match self.backend_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                let base = url.trim_end_matches('/').to_string();
                Endpoint {
                    stream_url: stream_url_for(&base),
                    base_url: base,
                    origin: OriginContext::Browser,
                }
            }
            Some(_) => Endpoint {
                // Same origin; the reverse proxy rewrites /api to the backend.
                base_url: String::new(),
                stream_url: "/api/ws".to_string(),
                origin: OriginContext::ProxiedPath,
            },
            None => {
                let base = format!("http://127.0.0.1:{}", self.local_port);
                Endpoint {
                    stream_url: stream_url_for(&base),
                    base_url: base,
                    origin: OriginContext::Browser,
                }
            }
        }
    }
}

/// Derive the WebSocket address from an HTTP base address.
fn stream_url_for(base: &str) -> String {
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/api/ws")
}
