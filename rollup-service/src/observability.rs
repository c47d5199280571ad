use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber; `RUST_LOG` directives extend the default
/// `rollup_service=info`.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "rollup_service=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
