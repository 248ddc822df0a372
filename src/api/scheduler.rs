//! Bounded-concurrency request scheduling and pagination
//!
//! One gate caps how many page requests are in flight across all entities;
//! within one entity, pages are fetched strictly in increasing offset order.
//! Slots are released unconditionally, on success and on error, so the cap
//! can never leak.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::constants::{DEFAULT_MAX_CONCURRENT, DEFAULT_PAGE_SIZE};
use super::metadata::Catalog;
use super::query::EntityQuery;

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on concurrently in-flight page requests across all entities
    pub max_concurrent: usize,
    /// Rows requested per page
    pub page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Instance-scoped concurrency gate over page requests
#[derive(Debug, Clone)]
pub struct RequestGate {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// Permit for one in-flight page request. Dropping it releases the slot,
/// which makes release unconditional on every exit path.
#[derive(Debug)]
pub struct RequestSlot {
    _permit: OwnedSemaphorePermit,
}

impl RequestGate {
    pub fn new(max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Suspend until a slot is free, then claim it
    pub async fn acquire(&self) -> RequestSlot {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("request gate is never closed");
        RequestSlot { _permit: permit }
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// One page of rows plus the server-reported total, present on the first page
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An entity query compiled down to its wire parameters, ready to page over
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub entity: String,
    pub params: Vec<(String, String)>,
}

impl CompiledQuery {
    pub fn compile(query: &EntityQuery, catalog: &Catalog) -> Result<Self> {
        Ok(Self {
            entity: query.entity.clone(),
            params: query.to_query_params(catalog)?,
        })
    }
}

/// Seam between the scheduler and the transport: fetches one page of one
/// compiled query at the given offset.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, query: &CompiledQuery, skip: u32, top: u32) -> Result<Page>;
}

/// Paginate one compiled query to completion. The slot is held for exactly
/// one page request at a time and released before any error propagates; an
/// error aborts this entity's remaining pages.
pub async fn fetch_all_pages<F: PageFetcher + ?Sized>(
    fetcher: &F,
    gate: &RequestGate,
    query: &CompiledQuery,
    page_size: u32,
) -> Result<Vec<Value>> {
    let mut rows: Vec<Value> = Vec::new();
    let mut skip: u32 = 0;
    let mut total: Option<u64> = None;

    loop {
        let slot = gate.acquire().await;
        let outcome = fetcher.fetch_page(query, skip, page_size).await;
        drop(slot);

        let page = outcome?;
        if total.is_none() {
            total = page.total;
        }
        let fetched = page.len();
        rows.extend(page.rows);
        skip += page_size;

        debug!(
            "{}: fetched {} rows at offset {} (total {:?})",
            query.entity,
            fetched,
            skip - page_size,
            total
        );

        let total = total.unwrap_or(rows.len() as u64);
        if u64::from(skip) >= total || fetched == 0 {
            break;
        }
    }

    Ok(rows)
}

/// Executes entity queries against a page fetcher with a shared gate
pub struct QueryEngine<F: PageFetcher> {
    fetcher: F,
    gate: RequestGate,
    page_size: u32,
}

impl<F: PageFetcher> QueryEngine<F> {
    pub fn new(fetcher: F, config: EngineConfig) -> Self {
        Self {
            fetcher,
            gate: RequestGate::new(config.max_concurrent),
            page_size: config.page_size,
        }
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch every page of one entity query
    pub async fn fetch_all_pages(&self, catalog: &Catalog, query: &EntityQuery) -> Result<Vec<Value>> {
        let compiled = CompiledQuery::compile(query, catalog)?;
        fetch_all_pages(&self.fetcher, &self.gate, &compiled, self.page_size).await
    }

    /// Launch every query's pagination loop together, throttled only by the
    /// gate. The output preserves the input order; one entity's failure does
    /// not cancel its siblings; every loop runs to completion before the
    /// first error is surfaced.
    pub async fn fetch_many(&self, catalog: &Catalog, queries: &[EntityQuery]) -> Result<Vec<Vec<Value>>> {
        let compiled: Vec<CompiledQuery> = queries
            .iter()
            .map(|q| CompiledQuery::compile(q, catalog))
            .collect::<Result<_>>()?;

        let fetches = compiled
            .iter()
            .map(|query| fetch_all_pages(&self.fetcher, &self.gate, query, self.page_size));

        join_all(fetches).await.into_iter().collect()
    }
}
