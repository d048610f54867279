// Run orchestration: start readers, report periodically, stop on deadline or signal.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::future::join_all;
use hlsprobe_engine::{ProbeConfig, Reader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use url::Url;

use crate::cli::Args;
use crate::error::{AppError, Result};
use crate::messages::{Messages, render};
use crate::output::{OutputManager, ReportKind};

/// Timing of one probe run
#[derive(Debug, Clone, Copy)]
pub struct RunPlan {
    pub run_time: Duration,
    pub report_period: Duration,
    /// How long to wait for in-flight downloads after the loops stop
    pub drain_timeout: Option<Duration>,
}

/// Builds the readers from the flags and runs them until the deadline or Ctrl-C.
pub async fn run(args: Args) -> Result<()> {
    let config = Arc::new(args.probe_config()?);
    let messages = match &args.messages {
        Some(path) => Messages::load(path)?,
        None => Messages::default(),
    };
    let output = OutputManager::new(args.format, messages, !args.hide_segments);
    let readers = build_readers(args.workers, &args.url, &config)?;

    let plan = RunPlan {
        run_time: args.run_time(),
        report_period: args.report_period(),
        drain_timeout: args.drain_timeout(),
    };

    if let Some(line) = output.format_started(args.workers, &args.url) {
        println!("{line}");
    }
    let mut stdout = std::io::stdout();
    drive(&readers, &output, plan, shutdown_signal(), &mut stdout).await?;
    if let Some(line) = output.format_done() {
        println!("{line}");
    }
    Ok(())
}

/// One reader per worker; each gets its own HTTP client and connection pool.
pub fn build_readers(workers: u32, url: &Url, config: &Arc<ProbeConfig>) -> Result<Vec<Reader>> {
    (0..workers as usize)
        .map(|id| Reader::new(id, url.as_str(), Arc::clone(config)).map_err(AppError::from))
        .collect()
}

/// Starts every reader, writes a report each period, then stops and writes the final report.
///
/// Returns after `plan.run_time` or as soon as `shutdown` completes. Fetch errors
/// never end the run early.
pub async fn drive<W, F>(
    readers: &[Reader],
    output: &OutputManager,
    plan: RunPlan,
    shutdown: F,
    out: &mut W,
) -> Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    for reader in readers {
        reader.start();
    }
    info!(readers = readers.len(), run_time = ?plan.run_time, "Probe started");

    // Readers stop even when writing a report fails.
    let reporting = report_until_stop(readers, output, plan, shutdown, out).await;

    for reader in readers {
        reader.stop();
    }
    join_all(readers.iter().map(Reader::wait)).await;
    reporting?;

    if let Some(timeout) = plan.drain_timeout {
        let drained = join_all(readers.iter().map(|r| r.wait_for_downloads(timeout))).await;
        for (reader, drained) in readers.iter().zip(drained) {
            if drained {
                continue;
            }
            warn!(
                reader = reader.id(),
                in_flight = reader.in_flight(),
                "Downloads still in flight after drain timeout"
            );
            let text = render(
                &output.messages().downloads_pending,
                &[("id", &reader.id()), ("count", &reader.in_flight())],
            );
            if let Some(line) = output.format_notice(text) {
                writeln!(out, "{line}")?;
            }
        }
    }

    for reader in readers {
        reader.log_summary();
    }
    write_report(readers, output, ReportKind::Final, out)
}

/// Writes periodic reports until the deadline passes or `shutdown` completes.
async fn report_until_stop<W, F>(
    readers: &[Reader],
    output: &OutputManager,
    plan: RunPlan,
    shutdown: F,
    out: &mut W,
) -> Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let deadline = tokio::time::sleep(plan.run_time);
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    let mut reports =
        tokio::time::interval_at(Instant::now() + plan.report_period, plan.report_period);
    reports.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Interrupted, stopping readers");
                if let Some(line) = output.format_notice(output.messages().interrupted.clone()) {
                    writeln!(out, "{line}")?;
                }
                return Ok(());
            }
            _ = &mut deadline => {
                info!("Run time elapsed, stopping readers");
                return Ok(());
            }
            _ = reports.tick() => {
                write_report(readers, output, ReportKind::Periodic, out)?;
            }
        }
    }
}

fn write_report<W: Write>(
    readers: &[Reader],
    output: &OutputManager,
    kind: ReportKind,
    out: &mut W,
) -> Result<()> {
    let reports = readers.iter().map(Reader::report).collect();
    let text = output.format_reports(kind, Local::now(), reports)?;
    writeln!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C; running until the deadline");
        std::future::pending::<()>().await;
    }
}
