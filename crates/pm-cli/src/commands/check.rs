//! Configuration check.

use crate::PmConfig;
use crate::output::{info, success};

/// Prints the configured backends in priority order.
///
/// The configuration was validated when it was loaded; no directory is
/// contacted.
pub fn run_check(config: &PmConfig) {
    for line in backend_lines(config) {
        info(&line);
    }
    success(&format!(
        "Configuration valid: {} backend(s), lockout after {} failure(s)",
        config.backends.len(),
        config.lockout.threshold
    ));
}

fn backend_lines(config: &PmConfig) -> Vec<String> {
    config
        .backends
        .iter()
        .enumerate()
        .map(|(i, b)| {
            format!(
                "{}. {} ({:?}) {} users={} questions={}",
                i + 1,
                b.description,
                b.vendor,
                b.connection_url,
                b.users_dn,
                b.default_questions.len() + b.custom_questions.len()
            )
        })
        .collect()
}
