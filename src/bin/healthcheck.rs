//! healthcheck - container health probe
//!
//! Exits 0 when the API's /health endpoint answers healthy, 1 otherwise.
//! Wired into the container runtime's HEALTHCHECK.

use std::process::ExitCode;
use std::time::Duration;

use borlacam::monitor::Monitor;

fn main() -> ExitCode {
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let url = format!("http://localhost:{port}");

    match Monitor::probe_once(&url, Duration::from_secs(5)) {
        Ok(body) => {
            if body.get("status").and_then(|s| s.as_str()) == Some("healthy") {
                println!("Health check passed");
                ExitCode::SUCCESS
            } else {
                println!("Health check failed: api reports {}", body);
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            println!("Health check failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
