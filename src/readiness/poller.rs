//! The readiness stage.

use super::address::AddressPolicy;
use super::sockets::find_service_port;
use crate::http::HttpProbe;
use crate::runner::{ProcessRunner, StructuredCommand};
use crate::{
    retry_until, DeployError, DeployProgress, InstallationContext, ProductProfile, RetryBudget,
    ServiceEndpoint, Stage,
};
use std::fmt;
use tracing::{debug, info};

/// Lists listening TCP sockets with their owning processes, one per line.
fn socket_table() -> StructuredCommand {
    StructuredCommand::new("ss").arg("-ltnpH").env("LC_ALL", "C")
}

/// Why a single readiness probe did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReady {
    /// The socket table could not be read.
    SocketScan(String),
    /// No listening socket belongs to a service process.
    NoListener,
    /// The host has no advertisable address.
    NoAddress,
    /// The console could not be reached.
    Unreachable(String),
    /// The console answered with something other than 200.
    Status(u16),
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketScan(message) => write!(f, "could not list listening sockets: {message}"),
            Self::NoListener => f.write_str("no service process is listening"),
            Self::NoAddress => f.write_str("no eligible host address found"),
            Self::Unreachable(message) => write!(f, "console unreachable: {message}"),
            Self::Status(status) => write!(f, "console answered HTTP {status}"),
        }
    }
}

/// Everything the readiness stage talks to.
pub struct ReadinessPoller<'a> {
    /// Runs `ss` and `hostname`.
    pub runner: &'a dyn ProcessRunner,
    /// Console client.
    pub http: &'a dyn HttpProbe,
    /// Process patterns and console path.
    pub profile: &'a ProductProfile,
    /// How the advertised address is chosen.
    pub policy: &'a AddressPolicy,
    /// Poll budget.
    pub budget: RetryBudget,
}

impl ReadinessPoller<'_> {
    /// Poll until the console answers 200 or the budget runs out.
    ///
    /// Records the discovered port and host in `ctx` the first time each is
    /// seen, and the successful status code once the loop ends.
    pub async fn wait<F>(
        &self,
        ctx: &mut InstallationContext,
        on_progress: F,
    ) -> Result<ServiceEndpoint, DeployError>
    where
        F: Fn(DeployProgress) + Send + Sync,
    {
        let shared: &InstallationContext = ctx;
        let polled = retry_until(self.budget, |attempt| {
            on_progress(DeployProgress::Attempt {
                stage: Stage::Readiness,
                attempt,
                max_attempts: self.budget.max_attempts,
            });
            async move {
                let result = self.probe(shared).await;
                match &result {
                    Ok((endpoint, _)) => info!(attempt, %endpoint, "service console is up"),
                    Err(reason) => info!(attempt, %reason, "service not ready yet"),
                }
                result
            }
        })
        .await;

        match polled {
            Ok(settled) => {
                let (endpoint, status) = settled.value;
                ctx.http_status = Some(status);
                Ok(endpoint)
            }
            Err(exhausted) => Err(DeployError::ReadinessTimeout {
                attempts: exhausted.attempts,
                elapsed: exhausted.elapsed,
                fix: format!(
                    "Last check: {}. Inspect `systemctl status {}` and the vendor server logs",
                    exhausted.last, self.profile.service_unit
                ),
            }),
        }
    }

    async fn probe(&self, ctx: &InstallationContext) -> Result<(ServiceEndpoint, u16), NotReady> {
        let table = self
            .capture(socket_table())
            .await
            .map_err(NotReady::SocketScan)?;
        let port = find_service_port(&table, &self.profile.process_patterns).ok_or(NotReady::NoListener)?;
        let port = ctx.record_port(port);

        let host = match ctx.host() {
            Some(host) => host,
            None => {
                let candidates = match self.policy.explicit_host {
                    Some(_) => String::new(),
                    None => self
                        .capture(StructuredCommand::new("hostname").arg("-I"))
                        .await
                        .map_err(|e| {
                            debug!(error = %e, "hostname -I failed");
                            NotReady::NoAddress
                        })?,
                };
                let host = self.policy.select(&candidates).ok_or(NotReady::NoAddress)?;
                ctx.record_host(host)
            }
        };

        let endpoint = ServiceEndpoint { host, port };
        let url = endpoint.url(&self.profile.console_path);
        let response = self
            .http
            .get(&url)
            .await
            .map_err(|e| NotReady::Unreachable(e.to_string()))?;
        if response.status == 200 {
            Ok((endpoint, response.status))
        } else {
            Err(NotReady::Status(response.status))
        }
    }

    async fn capture(&self, command: StructuredCommand) -> Result<String, String> {
        let output = self.runner.run(&command).await.map_err(|e| e.to_string())?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(format!("`{command}` exited with {:?}", output.exit_code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::runner::CommandOutput;
    use crate::testing::{ScriptedHttp, ScriptedRunner};
    use std::sync::Mutex;
    use std::time::Duration;

    const LISTENING: &str =
        "LISTEN 0 100 [::]:8443 [::]:* users:((\"vendor-server\",pid=4121,fd=9))\n";

    fn poller<'a>(
        runner: &'a ScriptedRunner,
        http: &'a ScriptedHttp,
        profile: &'a ProductProfile,
        policy: &'a AddressPolicy,
    ) -> ReadinessPoller<'a> {
        ReadinessPoller {
            runner,
            http,
            profile,
            policy,
            budget: RetryBudget::readiness(),
        }
    }

    #[test]
    fn test_socket_table_runs_in_c_locale() {
        let cmd = socket_table();
        assert_eq!(cmd.to_string(), "ss -ltnpH");
        assert!(cmd.env_vars.contains(&("LC_ALL".to_string(), "C".to_string())));
    }

    #[tokio::test]
    async fn test_ready_on_first_poll() {
        let runner = ScriptedRunner::new()
            .respond("ss -ltnpH", CommandOutput::ok(LISTENING))
            .respond("hostname -I", CommandOutput::ok("127.0.0.1 10.0.0.5\n"));
        let http = ScriptedHttp::new().respond("http://10.0.0.5:8443/console/", 200, "<html>");
        let profile = ProductProfile::default();
        let policy = AddressPolicy::default();
        let mut ctx = InstallationContext::new("/tmp", "/tmp/run.log");

        let endpoint = poller(&runner, &http, &profile, &policy)
            .wait(&mut ctx, |_| {})
            .await
            .unwrap();

        assert_eq!(endpoint.to_string(), "10.0.0.5:8443");
        assert_eq!(ctx.endpoint(), Some(endpoint));
        assert_eq!(ctx.http_status, Some(200));
        assert_eq!(runner.count("ss -ltnpH"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_listener() {
        let runner = ScriptedRunner::new().respond("ss -ltnpH", CommandOutput::ok(""));
        let http = ScriptedHttp::new();
        let profile = ProductProfile::default();
        let policy = AddressPolicy::default();
        let mut ctx = InstallationContext::new("/tmp", "/tmp/run.log");
        let attempts = Mutex::new(0u32);

        let err = poller(&runner, &http, &profile, &policy)
            .wait(&mut ctx, |progress| {
                if let DeployProgress::Attempt { attempt, .. } = progress {
                    *attempts.lock().unwrap() = attempt;
                }
            })
            .await
            .unwrap_err();

        match err {
            DeployError::ReadinessTimeout { attempts, elapsed, fix } => {
                assert_eq!(attempts, 30);
                assert_eq!(elapsed, Duration::from_secs(290));
                assert!(fix.contains("no service process is listening"));
            }
            other => panic!("expected ReadinessTimeout, got {other:?}"),
        }
        assert_eq!(*attempts.lock().unwrap(), 30);
        assert_eq!(runner.count("ss -ltnpH"), 30);
        assert!(http.calls().is_empty());
        assert!(ctx.endpoint().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_console_to_answer_200() {
        let runner = ScriptedRunner::new().respond("ss -ltnpH", CommandOutput::ok(LISTENING));
        let http = ScriptedHttp::new().respond_with("/console/", |earlier| {
            Ok(HttpResponse {
                status: if earlier < 2 { 503 } else { 200 },
                body: String::new(),
            })
        });
        let profile = ProductProfile::default();
        let policy = AddressPolicy {
            explicit_host: Some("192.0.2.10".parse().unwrap()),
            ..AddressPolicy::default()
        };
        let mut ctx = InstallationContext::new("/tmp", "/tmp/run.log");

        let endpoint = poller(&runner, &http, &profile, &policy)
            .wait(&mut ctx, |_| {})
            .await
            .unwrap();

        assert_eq!(endpoint.url("/console/"), "http://192.0.2.10:8443/console/");
        assert_eq!(http.count("/console/"), 3);
        assert_eq!(runner.count("hostname"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_address_is_resolved_once() {
        let runner = ScriptedRunner::new()
            .respond("ss -ltnpH", CommandOutput::ok(LISTENING))
            .respond("hostname -I", CommandOutput::ok("10.0.0.5"));
        let http = ScriptedHttp::new().respond_with("/console/", |earlier| {
            Ok(HttpResponse {
                status: if earlier == 0 { 502 } else { 200 },
                body: String::new(),
            })
        });
        let profile = ProductProfile::default();
        let policy = AddressPolicy::default();
        let mut ctx = InstallationContext::new("/tmp", "/tmp/run.log");

        poller(&runner, &http, &profile, &policy)
            .wait(&mut ctx, |_| {})
            .await
            .unwrap();

        assert_eq!(runner.count("hostname -I"), 1);
        assert_eq!(runner.count("ss -ltnpH"), 2);
    }

    #[test]
    fn test_not_ready_messages() {
        assert_eq!(NotReady::Status(503).to_string(), "console answered HTTP 503");
        assert!(NotReady::NoAddress.to_string().contains("address"));
    }
}
