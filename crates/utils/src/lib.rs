pub mod jwt;
pub mod response;
pub mod sentry;
pub mod text;

/// Package version reported by the health endpoint.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
