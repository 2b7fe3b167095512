//! Opt-in `tracing_subscriber` installation (SPEC_FULL.md §6.6).
//!
//! Library code only ever emits through `tracing`; it never installs a
//! global subscriber on its own. A host binary that wants the default
//! `RUST_LOG`-driven text output can call this once at startup (teacher
//! convention: `tracing-subscriber` is a dev/example dependency of
//! `dashflow`, never pulled in unconditionally by the library).

#[cfg(feature = "tracing-init")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
