use chrono::{DateTime, Local};
use hlsprobe_engine::{ReaderReport, SegmentStatus};
use serde::Serialize;
use url::Url;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::messages::{Messages, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Periodic,
    Final,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    kind: ReportKind,
    timestamp: String,
    readers: &'a [ReaderReport],
}

/// Renders reader reports for stdout.
pub struct OutputManager {
    format: OutputFormat,
    messages: Messages,
    show_segments: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, messages: Messages, show_segments: bool) -> Self {
        Self {
            format,
            messages,
            show_segments,
        }
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Free-form notice; JSON output carries reports only.
    pub fn format_notice(&self, text: String) -> Option<String> {
        match self.format {
            OutputFormat::Pretty => Some(text),
            OutputFormat::Json => None,
        }
    }

    pub fn format_started(&self, workers: u32, url: &Url) -> Option<String> {
        self.format_notice(render(
            &self.messages.started,
            &[("workers", &workers), ("url", url)],
        ))
    }

    pub fn format_done(&self) -> Option<String> {
        self.format_notice(self.messages.done.clone())
    }

    pub fn format_reports(
        &self,
        kind: ReportKind,
        at: DateTime<Local>,
        mut reports: Vec<ReaderReport>,
    ) -> Result<String> {
        if !self.show_segments {
            for report in &mut reports {
                report.segments.clear();
            }
        }

        match self.format {
            OutputFormat::Pretty => Ok(self.format_pretty(kind, at, &reports)),
            OutputFormat::Json => {
                let document = ReportDocument {
                    kind,
                    timestamp: at.to_rfc3339(),
                    readers: &reports,
                };
                Ok(serde_json::to_string(&document)?)
            }
        }
    }

    fn format_pretty(&self, kind: ReportKind, at: DateTime<Local>, reports: &[ReaderReport]) -> String {
        let m = &self.messages;
        let time = at.format("%Y-%m-%d %H:%M:%S").to_string();
        let header = match kind {
            ReportKind::Periodic => &m.report_header,
            ReportKind::Final => &m.final_header,
        };

        let mut lines = vec![render(header, &[("time", &time)])];
        for report in reports {
            lines.push(render(
                &m.reader_header,
                &[("id", &report.id), ("state", &report.state)],
            ));
            lines.push(render(&m.requests, &[("count", &report.stats.connections)]));
            lines.push(render(&m.errors, &[("count", &report.stats.errors)]));
            lines.push(render(&m.bytes, &[("count", &report.stats.bytes_received)]));
            lines.push(match report.bitrate_mbps {
                Some(mbps) => render(&m.speed, &[("mbps", &format!("{mbps:.2}"))]),
                None => m.speed_unknown.clone(),
            });
            let secs = format!("{:.2}", report.poll_interval.as_secs_f64());
            lines.push(render(&m.poll_interval, &[("secs", &secs)]));
            lines.push(render(&m.in_flight, &[("count", &report.in_flight)]));

            if self.show_segments {
                lines.push(render(
                    &m.playlist_header,
                    &[("count", &report.segments.len())],
                ));
                for segment in &report.segments {
                    let status = match segment.status {
                        SegmentStatus::Loaded => &m.loaded,
                        SegmentStatus::PendingLocked => &m.pending_locked,
                        SegmentStatus::PendingUnlocked => &m.pending_unlocked,
                    };
                    lines.push(render(
                        &m.segment,
                        &[("name", &segment.name), ("status", status)],
                    ));
                }
            }
        }
        lines.join("\n")
    }
}
