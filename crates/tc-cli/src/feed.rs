//! JSON-lines step-event feed.
//!
//! One record per line, `primary` plus a flattened [`StepEvent`]:
//!
//! ```text
//! {"primary":0,"type":"deposit","position":[0,0,0.12],"edep":0.0031}
//! {"primary":0,"type":"track","particle":"neutron","kinetic_energy":2.1e-9,"post_volume":null}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tc_score::StepEvent;

#[derive(Debug, Deserialize)]
struct FeedRecord {
    primary: u64,
    #[serde(flatten)]
    event: StepEvent,
}

/// Step events grouped by primary particle, in increasing primary id.
#[derive(Debug, Default)]
pub struct EventFeed {
    pub primaries: Vec<(u64, Vec<StepEvent>)>,
}

impl EventFeed {
    pub fn n_events(&self) -> usize {
        self.primaries.iter().map(|(_, evs)| evs.len()).sum()
    }
}

pub fn parse_event_feed(reader: impl BufRead, origin: &str) -> Result<EventFeed> {
    let mut grouped: BTreeMap<u64, Vec<StepEvent>> = BTreeMap::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("{origin}:{}: read failed", n + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let rec: FeedRecord = serde_json::from_str(line)
            .with_context(|| format!("{origin}:{}: invalid step event", n + 1))?;
        grouped.entry(rec.primary).or_default().push(rec.event);
    }
    Ok(EventFeed { primaries: grouped.into_iter().collect() })
}

pub fn read_event_feed(path: &Path) -> Result<EventFeed> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open event feed {}", path.display()))?;
    let feed = parse_event_feed(std::io::BufReader::new(file), &path.display().to_string())?;
    tracing::info!(
        path = %path.display(),
        primaries = feed.primaries.len(),
        events = feed.n_events(),
        "event feed loaded"
    );
    Ok(feed)
}
