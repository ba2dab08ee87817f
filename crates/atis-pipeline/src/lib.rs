//! Run orchestration: configuration, concurrent dispatch over all portals,
//! consolidation, and snapshot emission.

pub mod consolidate;
pub mod dispatch;
pub mod emit;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use atis_adapters::{PortalId, ScrapeContext};
use atis_core::states::{State, StateResolver};
use atis_net::session::{HttpSessionProvider, SessionProvider, WaitPolicy};
use atis_net::{HttpClientConfig, HttpFetcher};

use crate::consolidate::{consolidate, StateDefaults};
use crate::dispatch::Dispatcher;

/// One row of the portal table: which adapter, where it starts, and the
/// fallback state the consolidator applies when a record's own location
/// resolves to nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalEntry {
    pub portal: PortalId,
    pub search_url: String,
    pub source_url: String,
    #[serde(default)]
    pub default_state: Option<State>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSettings {
    #[serde(default = "default_element_timeout_secs")]
    pub element_timeout_secs: u64,
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    #[serde(default = "default_scroll_settle_secs")]
    pub scroll_settle_secs: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            element_timeout_secs: default_element_timeout_secs(),
            settle_secs: default_settle_secs(),
            scroll_settle_secs: default_scroll_settle_secs(),
        }
    }
}

impl WaitSettings {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy {
            element_timeout: Duration::from_secs(self.element_timeout_secs),
            settle: Duration::from_secs(self.settle_secs),
            scroll_settle: Duration::from_secs(self.scroll_settle_secs),
        }
    }
}

/// Full run configuration. YAML-loadable; the built-in default carries the
/// complete portal table and keyword list so a bare `scrape` works out of
/// the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_portals")]
    pub portals: Vec<PortalEntry>,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub waits: WaitSettings,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_concurrent_portals")]
    pub max_concurrent_portals: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            portals: default_portals(),
            keywords: default_keywords(),
            waits: WaitSettings::default(),
            output_dir: default_output_dir(),
            max_concurrent_portals: default_max_concurrent_portals(),
            user_agent: default_user_agent(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

fn default_true() -> bool {
    true
}

fn default_element_timeout_secs() -> u64 {
    20
}

fn default_settle_secs() -> u64 {
    5
}

fn default_scroll_settle_secs() -> u64 {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./snapshots")
}

fn default_max_concurrent_portals() -> usize {
    10
}

fn default_user_agent() -> String {
    "atis-bot/0.1".to_string()
}

fn default_http_timeout_secs() -> u64 {
    20
}

const NETSERVER_SEARCH_PATH: &str = "/NetServer/PublicationSearchControllerServlet?function=SearchPublications&Gesetzesgrundlage=All&Category=InvitationToTender&thContext=publications";

fn entry(
    portal: PortalId,
    search_url: String,
    source_url: &str,
    default_state: Option<State>,
) -> PortalEntry {
    PortalEntry {
        portal,
        search_url,
        source_url: source_url.to_string(),
        default_state,
        enabled: true,
    }
}

fn default_portals() -> Vec<PortalEntry> {
    vec![
        entry(
            PortalId::Muenchen,
            format!("https://vergabe.muenchen.de{NETSERVER_SEARCH_PATH}"),
            "https://vergabe.muenchen.de",
            Some(State::Bavaria),
        ),
        entry(
            PortalId::Vmstart,
            format!("https://vergabe.vmstart.de{NETSERVER_SEARCH_PATH}"),
            "https://vergabe.vmstart.de",
            Some(State::RhinelandPalatinate),
        ),
        entry(
            PortalId::RibBayern,
            "https://www.myorder.rib.de/public/publications".to_string(),
            "https://www.myorder.rib.de",
            Some(State::Bavaria),
        ),
        entry(
            PortalId::Rlp,
            "https://vergabe.rlp.de/VMPCenter/company/announcements/categoryOverview.do?method=show"
                .to_string(),
            "https://vergabe.rlp.de",
            Some(State::RhinelandPalatinate),
        ),
        entry(
            PortalId::Nrw,
            "https://www.evergabe.nrw.de/VMPCenter/company/announcements/categoryOverview.do?method=show"
                .to_string(),
            "https://www.evergabe.nrw.de",
            Some(State::NorthRhineWestphalia),
        ),
        entry(
            PortalId::MetropoleRuhr,
            "https://www.vergabe.metropoleruhr.de/VMPSatellite/company/announcements/categoryOverview.do?method=show"
                .to_string(),
            "https://www.vergabe.metropoleruhr.de",
            None,
        ),
        entry(
            PortalId::Niedersachsen,
            "https://vergabe.niedersachsen.de/Satellite/company/announcements/categoryOverview.do?method=show"
                .to_string(),
            "https://vergabe.niedersachsen.de",
            None,
        ),
        entry(
            PortalId::Brandenburg,
            "https://vergabemarktplatz.brandenburg.de/VMPCenter/company/announcements/categoryOverview.do?method=show"
                .to_string(),
            "https://vergabemarktplatz.brandenburg.de",
            Some(State::Brandenburg),
        ),
        entry(
            PortalId::Saarland,
            format!("https://saarvpsl.vmstart.de{NETSERVER_SEARCH_PATH}"),
            "https://saarvpsl.vmstart.de",
            Some(State::Saarland),
        ),
        entry(
            PortalId::SchleswigHolstein,
            "https://www.e-vergabe-sh.de/vergabeplattform/vergabeinformationen".to_string(),
            "https://www.e-vergabe-sh.de",
            None,
        ),
    ]
}

fn default_keywords() -> Vec<String> {
    [
        "Erlebnis",
        "Freizeit",
        "Destination",
        "Tourismus",
        "Tourismusförderung",
        "Tourismuskonzept",
        "Tourismuskonzeption",
        "Tourismusservice",
        "Besucher",
        "Museum",
        "Markenwelt",
        "Ausstellung",
        "Ideenskizze",
        "Konzept",
        "Nutzungsidee",
        "Masterplan",
        "Machbarkeit",
        "Beratung",
        "Studie",
        "Analyse",
        "Machbarkeitsanalyse",
        "Marktforschung",
        "Plausibilisierung",
        "Investitionskostenschätzung",
        "Machbarkeitsstudie",
        "Besucherzentrum",
        "Informationszentrum",
        "Gartenschau",
        "Grünanlage",
        "Besucherinformationszentrum",
        "Gutachten",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// What one full run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub portals_attempted: usize,
    pub raw_records: usize,
    pub unique_records: usize,
    pub snapshot_path: PathBuf,
}

/// Default provider: plain HTTP sessions over a shared retrying fetcher.
/// Scripted-browser providers come from the embedding application.
pub fn http_session_provider(config: &RunConfig) -> Result<Arc<dyn SessionProvider>> {
    let fetcher = HttpFetcher::new(HttpClientConfig {
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: Some(config.user_agent.clone()),
        ..Default::default()
    })?;
    Ok(Arc::new(HttpSessionProvider::new(Arc::new(fetcher))))
}

/// Runs the whole pipeline once: dispatch every enabled portal, consolidate,
/// emit a timestamped snapshot. An empty dataset is a valid outcome, not an
/// error.
pub async fn run_pipeline(
    config: &RunConfig,
    provider: Arc<dyn SessionProvider>,
) -> Result<RunSummary> {
    let resolver = Arc::new(StateResolver::new());
    let ctx = Arc::new(ScrapeContext::new(resolver, config.waits.policy()));
    let portals_attempted = config.portals.iter().filter(|p| p.enabled).count();

    info!(run_id = %ctx.run_id, portals = portals_attempted, "starting scrape run");

    let dispatcher = Dispatcher::new(provider, config.max_concurrent_portals);
    let raw = dispatcher.run(&config.portals, &config.keywords, &ctx).await;
    let raw_records = raw.len();

    let defaults = StateDefaults::from_entries(&config.portals);
    let consolidated = consolidate(raw, &defaults);
    if consolidated.is_empty() {
        info!(run_id = %ctx.run_id, "no records from any portal; emitting empty snapshot");
    }

    let snapshot = emit::write_snapshot(&config.output_dir, ctx.started_at, &consolidated)?;
    let finished_at = Utc::now();

    info!(
        run_id = %ctx.run_id,
        raw = raw_records,
        unique = consolidated.len(),
        snapshot = %snapshot.path.display(),
        "scrape run finished"
    );

    Ok(RunSummary {
        run_id: ctx.run_id,
        started_at: ctx.started_at,
        finished_at,
        portals_attempted,
        raw_records,
        unique_records: consolidated.len(),
        snapshot_path: snapshot.path,
    })
}
