//! Production monitoring.
//!
//! Polls the inference API's `/health` and `/api/status` endpoints, keeps a
//! bounded history of the results, derives alert conditions, and writes a
//! metrics snapshot to disk. Runs as its own binary against a deployed
//! server; nothing here touches the detection pipeline directly.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// History entries kept per series.
const HISTORY_LIMIT: usize = 100;
/// Window for the rolling summary.
const SUMMARY_WINDOW_SECS: u64 = 3600;
/// Responses slower than this raise a warning alert.
const SLOW_RESPONSE_MS: f64 = 5000.0;

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub api_url: String,
    pub metrics_path: PathBuf,
    pub request_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            metrics_path: PathBuf::from("metrics.json"),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthSample {
    pub timestamp: u64,
    pub status: HealthStatus,
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PerfSample {
    pub timestamp: u64,
    pub status_ok: bool,
    pub response_time_ms: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Clone, Debug, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MonitorSummary {
    pub uptime_percent_1h: f64,
    pub avg_response_time_ms_1h: f64,
    pub total_health_checks: usize,
    pub total_performance_checks: usize,
}

/// One monitoring cycle's results.
#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub health: HealthSample,
    pub performance: PerfSample,
    pub alerts: Vec<Alert>,
    pub summary: MonitorSummary,
}

pub struct Monitor {
    cfg: MonitorConfig,
    agent: ureq::Agent,
    health_history: Vec<HealthSample>,
    performance_history: Vec<PerfSample>,
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(cfg.request_timeout)
            .build();
        Self {
            cfg,
            agent,
            health_history: Vec::new(),
            performance_history: Vec::new(),
        }
    }

    /// Probe `/health` and record the outcome.
    pub fn check_health(&mut self) -> HealthSample {
        let url = format!("{}/health", self.cfg.api_url);
        let started = Instant::now();
        let sample = match self.agent.get(&url).call() {
            Ok(response) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                let status = if response.status() == 200 {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                };
                HealthSample {
                    timestamp: epoch_seconds(),
                    status,
                    response_time_ms: Some(elapsed_ms),
                    error: None,
                }
            }
            // A served error status still tells us the process is up but
            // unhealthy; transport errors mean it is unreachable.
            Err(ureq::Error::Status(_, _)) => HealthSample {
                timestamp: epoch_seconds(),
                status: HealthStatus::Unhealthy,
                response_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                error: None,
            },
            Err(err) => {
                log::error!("health check failed: {}", err);
                HealthSample {
                    timestamp: epoch_seconds(),
                    status: HealthStatus::Error,
                    response_time_ms: None,
                    error: Some(err.to_string()),
                }
            }
        };

        push_bounded(&mut self.health_history, sample.clone());
        sample
    }

    /// Probe `/api/status` and record the latency.
    pub fn check_performance(&mut self) -> PerfSample {
        let url = format!("{}/api/status", self.cfg.api_url);
        let started = Instant::now();
        let sample = match self.agent.get(&url).call() {
            Ok(response) => PerfSample {
                timestamp: epoch_seconds(),
                status_ok: response.status() == 200,
                response_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            },
            Err(ureq::Error::Status(_, _)) => PerfSample {
                timestamp: epoch_seconds(),
                status_ok: false,
                response_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            },
            Err(_) => PerfSample {
                timestamp: epoch_seconds(),
                status_ok: false,
                response_time_ms: None,
            },
        };

        push_bounded(&mut self.performance_history, sample.clone());
        sample
    }

    /// Derive alert conditions from the latest samples.
    pub fn check_alerts(&self, health: &HealthSample, perf: &PerfSample) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let now = epoch_seconds();

        if health.status != HealthStatus::Healthy {
            alerts.push(Alert {
                level: AlertLevel::Critical,
                message: format!("api is {:?}", health.status).to_lowercase(),
                timestamp: now,
            });
        }

        if let Some(ms) = perf.response_time_ms {
            if ms > SLOW_RESPONSE_MS {
                alerts.push(Alert {
                    level: AlertLevel::Warning,
                    message: format!("slow api response: {ms:.0}ms"),
                    timestamp: now,
                });
            }
        }

        for alert in &alerts {
            match alert.level {
                AlertLevel::Critical => log::error!("CRITICAL ALERT: {}", alert.message),
                AlertLevel::Warning => log::warn!("WARNING ALERT: {}", alert.message),
            }
        }

        alerts
    }

    /// Rolling one-hour summary.
    pub fn summary(&self) -> MonitorSummary {
        let cutoff = epoch_seconds().saturating_sub(SUMMARY_WINDOW_SECS);

        let recent_health: Vec<&HealthSample> = self
            .health_history
            .iter()
            .filter(|h| h.timestamp >= cutoff)
            .collect();
        let healthy = recent_health
            .iter()
            .filter(|h| h.status == HealthStatus::Healthy)
            .count();
        let uptime = if recent_health.is_empty() {
            0.0
        } else {
            healthy as f64 / recent_health.len() as f64 * 100.0
        };

        let recent_times: Vec<f64> = self
            .performance_history
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .filter_map(|p| p.response_time_ms)
            .collect();
        let avg_response = if recent_times.is_empty() {
            0.0
        } else {
            recent_times.iter().sum::<f64>() / recent_times.len() as f64
        };

        MonitorSummary {
            uptime_percent_1h: round2(uptime),
            avg_response_time_ms_1h: round2(avg_response),
            total_health_checks: self.health_history.len(),
            total_performance_checks: self.performance_history.len(),
        }
    }

    /// Write the metrics snapshot (recent history + summary) to disk.
    pub fn save_metrics(&self) -> Result<()> {
        let tail = |len: usize| len.saturating_sub(10);
        let metrics = serde_json::json!({
            "last_updated": epoch_seconds(),
            "health_history": &self.health_history[tail(self.health_history.len())..],
            "performance_history":
                &self.performance_history[tail(self.performance_history.len())..],
            "summary": self.summary(),
        });

        if let Some(parent) = self.cfg.metrics_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(
            &self.cfg.metrics_path,
            serde_json::to_vec_pretty(&metrics)?,
        )
        .with_context(|| {
            format!(
                "failed to write metrics to {}",
                self.cfg.metrics_path.display()
            )
        })?;
        Ok(())
    }

    /// Run one complete monitoring cycle.
    pub fn run_cycle(&mut self) -> CycleReport {
        log::info!("running monitoring cycle");

        let health = self.check_health();
        let performance = self.check_performance();
        let alerts = self.check_alerts(&health, &performance);

        if let Err(err) = self.save_metrics() {
            log::error!("failed to save metrics: {}", err);
        }

        let summary = self.summary();
        log::info!(
            "monitoring cycle complete. uptime: {:.1}%, avg response: {:.0}ms",
            summary.uptime_percent_1h,
            summary.avg_response_time_ms_1h
        );

        CycleReport {
            health,
            performance,
            alerts,
            summary,
        }
    }

    /// Parse the health payload for a one-shot check; used by the
    /// healthcheck binary via the library.
    pub fn probe_once(api_url: &str, timeout: Duration) -> Result<Value> {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let response = agent
            .get(&format!("{api_url}/health"))
            .call()
            .context("health endpoint unreachable")?;
        let body: Value = response.into_json().context("health payload not JSON")?;
        Ok(body)
    }
}

fn push_bounded<T>(history: &mut Vec<T>, sample: T) {
    history.push(sample);
    if history.len() > HISTORY_LIMIT {
        history.remove(0);
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
