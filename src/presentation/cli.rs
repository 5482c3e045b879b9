// Command line interface
use crate::domain::telemetry::TimeRange;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render Grafana dashboard panels to SVG files")]
pub struct Cli {
    /// Configuration file, with or without its extension
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Start of the time range as a unix timestamp (default: end minus the configured time slice)
    #[arg(short, long)]
    pub from: Option<i64>,

    /// End of the time range as a unix timestamp (default: now)
    #[arg(short, long)]
    pub to: Option<i64>,

    /// Process dashboards one after another instead of concurrently
    #[arg(short, long)]
    pub sequentially: bool,

    /// Write plots here instead of the configured output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

impl Cli {
    pub fn time_range(&self, default_slice_secs: u64, now: DateTime<Utc>) -> anyhow::Result<TimeRange> {
        let to = match self.to {
            Some(ts) => timestamp(ts)?,
            None => now,
        };
        match self.from {
            Some(ts) => TimeRange::new(timestamp(ts)?, to),
            None => {
                let slice = i64::try_from(default_slice_secs).context("time slice is too large")?;
                TimeRange::ending_at(to, chrono::Duration::seconds(slice))
            }
        }
    }
}

fn timestamp(secs: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("invalid unix timestamp {}", secs))
}
