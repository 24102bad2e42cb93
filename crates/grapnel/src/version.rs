/// The version of the running binary, as baked in by cargo.
pub(crate) fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
