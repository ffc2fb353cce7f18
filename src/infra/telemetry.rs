use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default `info` filter.
///
/// Calling it twice is harmless; the second call only logs that a subscriber already exists.
pub fn init_tracing(service_name: &str) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .try_init();

    match result {
        Ok(()) => tracing::info!("logging initialized (service={})", service_name),
        Err(_) => tracing::debug!("tracing subscriber already installed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing("test");
        init_tracing("test");
    }
}
