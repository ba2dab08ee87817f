//! Concurrent portal dispatch: one task per portal, bounded pool, failures
//! isolated so a broken portal contributes an empty result set.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use atis_adapters::{adapter_for, PortalId, PortalTarget, ScrapeContext};
use atis_core::TenderRecord;
use atis_net::session::SessionProvider;

use crate::PortalEntry;

pub struct Dispatcher {
    provider: Arc<dyn SessionProvider>,
    max_concurrent: usize,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn SessionProvider>, max_concurrent: usize) -> Self {
        Self {
            provider,
            max_concurrent,
        }
    }

    /// Scrapes every enabled portal and returns the combined raw records.
    /// Waits for all tasks; there is no early exit on failure.
    pub async fn run(
        &self,
        portals: &[PortalEntry],
        keywords: &[String],
        ctx: &Arc<ScrapeContext>,
    ) -> Vec<TenderRecord> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for entry in portals.iter().filter(|entry| entry.enabled).cloned() {
            let provider = Arc::clone(&self.provider);
            let ctx = Arc::clone(ctx);
            let keywords = keywords.to_vec();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore not closed");
                scrape_portal(provider, ctx, entry, keywords).await
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((portal, records)) => {
                    info!(%portal, count = records.len(), "portal finished");
                    all.extend(records);
                }
                Err(err) => {
                    warn!(error = %err, "portal task panicked; contributing no records");
                }
            }
        }
        all
    }
}

async fn scrape_portal(
    provider: Arc<dyn SessionProvider>,
    ctx: Arc<ScrapeContext>,
    entry: PortalEntry,
    keywords: Vec<String>,
) -> (PortalId, Vec<TenderRecord>) {
    let adapter = adapter_for(entry.portal);
    let target = PortalTarget {
        search_url: entry.search_url.clone(),
        source_url: entry.source_url.clone(),
    };

    // Each task owns one session; sessions are never shared across portals.
    let result = async {
        let mut session = provider.open(ctx.run_id, entry.portal.as_str()).await?;
        adapter
            .scrape(session.as_mut(), &ctx, &target, &keywords)
            .await
            .map_err(anyhow::Error::from)
    }
    .await;

    match result {
        Ok(records) => (entry.portal, records),
        Err(err) => {
            warn!(
                portal = %entry.portal,
                error = %err,
                "portal failed; contributing no records"
            );
            (entry.portal, Vec::new())
        }
    }
}
