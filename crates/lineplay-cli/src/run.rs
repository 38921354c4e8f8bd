//! The playback run: wire the line model to a sink, replay the feed and
//! report what was published.

use std::sync::Arc;

use anyhow::{Context, Result};
use lineplay_core::replay::{ReplaySummary, TimelineReplayer};
use lineplay_core::time::{SimTime, sim_to_f64};
use lineplay_data::feed::FeedReader;
use lineplay_model::{Clock, MemorySink, Topology, Value, line};
use serde::Serialize;
use tracing::info;

use crate::{OutputFormat, RunSettings};

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub preset: String,
    pub topology: &'static str,
    pub groups_dispatched: u64,
    pub records_dispatched: u64,
    pub records_skipped: u64,
    pub records_untimed: u64,
    pub records_ignored: u64,
    pub entities_registered: u64,
    pub last_group_time: Option<f64>,
    pub sink_writes: u64,
    /// Final value of every written node, in declaration order.
    pub values: Vec<NodeValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeValue {
    pub path: String,
    pub value: Value,
}

/// Run a playback with `settings`, taking lot dates from `clock`.
pub async fn execute(settings: &RunSettings, clock: Arc<dyn Clock>) -> Result<RunReport> {
    let mut registry = line::build_registry().context("building line registry")?;
    let mut sink = MemorySink::new();
    settings.topology.declare(&mut sink);
    let sink = Arc::new(sink);
    settings
        .topology
        .install(&mut registry, sink.clone(), clock)
        .await
        .context("installing observers")?;

    let replay = &settings.replay;
    let mut feed = FeedReader::open(&settings.feed_file)
        .with_context(|| format!("opening feed {}", settings.feed_file.display()))?;
    let pre_skipped = if replay.skip_to > SimTime::ZERO {
        feed.skip_to(replay.skip_to)
            .with_context(|| format!("skipping feed to t={}", replay.skip_to))?
    } else {
        0
    };

    info!("{}", banner(settings));
    tokio::time::sleep(settings.lead_in).await;

    let replayer = TimelineReplayer::new(replay.clone())?;
    let mut summary = replayer
        .run(feed, &mut registry)
        .await
        .context("replay aborted")?;
    summary.records_skipped += pre_skipped;
    info!("End of data feed");

    Ok(RunReport::new(settings, &summary, sink.as_ref()).await)
}

/// Playback banner, e.g. `Beginning TMC playback with events from t=0 ->
/// t=365 at 1 seconds per timestamp unit...`.
pub fn banner(settings: &RunSettings) -> String {
    let replay = &settings.replay;
    let mut message = format!(
        "Beginning {}playback with events from t={} -> t={}",
        if settings.topology == Topology::Tmc { "TMC " } else { "" },
        replay.skip_to,
        replay.fast_forward_to,
    );
    if replay.pace != 60.0 {
        message.push_str(&format!(" at {} seconds per timestamp unit", replay.pace));
    }
    message.push_str("...");
    message
}

impl RunReport {
    async fn new(settings: &RunSettings, summary: &ReplaySummary, sink: &MemorySink) -> Self {
        let values = sink
            .snapshot()
            .await
            .into_iter()
            .map(|(path, value)| NodeValue { path, value })
            .collect();
        Self {
            preset: settings.preset.clone(),
            topology: settings.topology.name(),
            groups_dispatched: summary.groups_dispatched,
            records_dispatched: summary.records_dispatched,
            records_skipped: summary.records_skipped,
            records_untimed: summary.records_untimed,
            records_ignored: summary.records_ignored,
            entities_registered: summary.entities_registered,
            last_group_time: summary.last_group_time.map(sim_to_f64),
            sink_writes: sink.write_count().await,
            values,
        }
    }

    /// Render for stdout in `format`.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).context("serializing report")
            }
            OutputFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = format!(
            "preset {} ({} model)\n\
             groups dispatched:   {}\n\
             records dispatched:  {}\n\
             records skipped:     {}\n\
             records untimed:     {}\n\
             records ignored:     {}\n\
             entities registered: {}\n\
             sink writes:         {}\n",
            self.preset,
            self.topology,
            self.groups_dispatched,
            self.records_dispatched,
            self.records_skipped,
            self.records_untimed,
            self.records_ignored,
            self.entities_registered,
            self.sink_writes,
        );
        if let Some(t) = self.last_group_time {
            out.push_str(&format!("last event time:     {t}\n"));
        }
        out.push('\n');
        for node in &self.values {
            out.push_str(&format!("{} = {}\n", node.path, node.value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineplay_core::replay::ReplayConfig;
    use std::path::PathBuf;
    use std::time::Duration;

    fn settings(topology: Topology, pace: f64) -> RunSettings {
        RunSettings {
            preset: "default".to_string(),
            topology,
            feed_file: PathBuf::from("data/schedule1.csv"),
            replay: ReplayConfig {
                pace,
                skip_to: SimTime::from_num(10),
                fast_forward_to: SimTime::from_num(365),
                auto_register: false,
            },
            lead_in: Duration::ZERO,
        }
    }

    #[test]
    fn banner_default_pace() {
        assert_eq!(
            banner(&settings(Topology::Basic, 60.0)),
            "Beginning playback with events from t=10 -> t=365..."
        );
    }

    #[test]
    fn banner_tmc_with_pace() {
        assert_eq!(
            banner(&settings(Topology::Tmc, 0.5)),
            "Beginning TMC playback with events from t=10 -> t=365 \
             at 0.5 seconds per timestamp unit..."
        );
    }
}
