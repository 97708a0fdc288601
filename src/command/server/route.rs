use hyper::Method;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Healthz,
    Metrics,
    Whoami,
    Unknown,
}

impl Route {
    pub fn parse(method: &Method, path: &str) -> Self {
        match (method, path) {
            (&Method::GET, "/healthz") => Route::Healthz,
            (&Method::GET, "/metrics") => Route::Metrics,
            (&Method::GET, "/whoami") => Route::Whoami,
            _ => Route::Unknown,
        }
    }

    pub fn action_name(self) -> &'static str {
        match self {
            Route::Healthz => "healthz",
            Route::Metrics => "metrics",
            Route::Whoami => "whoami",
            Route::Unknown => "unknown",
        }
    }

    /// Probes stay reachable without a client certificate.
    pub fn requires_authentication(self) -> bool {
        !matches!(self, Route::Healthz | Route::Metrics)
    }
}
