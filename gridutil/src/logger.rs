/// Intercept messages using the `log` crate and print them to STDOUT. The filter defaults to
/// `info` and can be overridden with the usual RUST_LOG environment variable.
pub fn setup() {
    use env_logger::{Builder, Env};
    // The importer binary and tests may both wind up here; only the first call counts.
    let _ = Builder::from_env(Env::default().default_filter_or("info")).try_init();
}
