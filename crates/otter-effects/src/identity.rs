//! Host identity detection.

use otter_core::{OtterError, Result};

const HOSTNAME_SOURCES: &[&str] = &["/proc/sys/kernel/hostname", "/etc/hostname"];

/// Resolve the name this host registers under.
///
/// An explicit override wins; otherwise the kernel hostname is read, then
/// `/etc/hostname`, then the `HOSTNAME` environment variable.
pub fn resolve_hostname(override_name: Option<&str>) -> Result<String> {
    if let Some(name) = override_name.map(str::trim).filter(|n| !n.is_empty()) {
        return validate(name);
    }
    for source in HOSTNAME_SOURCES {
        if let Ok(contents) = std::fs::read_to_string(source) {
            let name = contents.trim();
            if !name.is_empty() {
                return validate(name);
            }
        }
    }
    match std::env::var("HOSTNAME") {
        Ok(name) if !name.trim().is_empty() => validate(name.trim()),
        _ => Err(OtterError::not_found("hostname for this machine")),
    }
}

/// Host names become key path segments, so `/` is not allowed.
fn validate(name: &str) -> Result<String> {
    if name.contains('/') {
        return Err(OtterError::invalid(format!(
            "Hostname may not contain '/': {name}"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        assert_eq!(resolve_hostname(Some(" web-1 ")).unwrap(), "web-1");
    }

    #[test]
    fn slashes_are_rejected() {
        assert!(resolve_hostname(Some("a/b")).is_err());
    }
}
