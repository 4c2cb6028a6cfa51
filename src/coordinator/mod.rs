//! Page-side conversion coordinator
//!
//! For each image element the coordinator first asks the [`Prober`] for a
//! pre-built WebP twin on the asset host and swaps it in when it loads.
//! Otherwise the element's decoded pixels go through the
//! [`CanvasReencoder`] and the element is pointed at the resulting blob.
//! Any failure leaves the original source in place. An element that is
//! still loading is handed to its own waiter thread, so it never holds up the
//! rest of a scan.
//!
//! Entry points mirror the page lifecycle: [`ConversionCoordinator::init`]
//! on document ready, [`ConversionCoordinator::on_intersections`] for
//! deferred images and [`ConversionCoordinator::on_nodes_inserted`] for
//! live DOM insertions.

pub mod lazy;
pub mod record;

pub use lazy::LazyObserver;
pub use record::{ConversionRecord, RecordEntry};

use crate::{
    canvas::{self, BlobStore, CanvasReencoder, CANVAS_QUALITY},
    encoder::EncoderStats,
    error::LoadError,
    page::{ImageElement, IntersectionEntry, LoadStatus, Node, Page, PreloadHint},
    probe::{HostAllowList, Prober, ResourceLoader, DEFAULT_ASSET_HOST, DEFAULT_PROBE_TIMEOUT},
    types::{RawImage, ResourceId},
};

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::{
    collections::HashSet,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// State of one element's conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Not a conversion candidate
    Untouched,
    /// Host not allow-listed; the source already is its own candidate
    Passthrough,
    /// Pre-built WebP twin swapped in
    SwappedToPrefetched,
    /// Re-encoded blob swapped in
    SwappedToReencoded,
    /// Re-encode failed; original source kept
    LeftOriginal,
    /// No twin; re-encode runs once the element finishes loading
    AwaitingLoad,
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Hosts whose assets have WebP twins
    pub allow_list: HostAllowList,
    /// Bound on each candidate or lazy-source load
    pub probe_timeout: Option<Duration>,
    /// Bound on waiting for an element to finish decoding
    pub decode_timeout: Option<Duration>,
    /// Re-encode quality on the `0.0..=1.0` scale
    pub quality: f32,
    /// Class removed from deferred images once their source is assigned
    pub lazy_class: String,
    /// Images announced as preload hints on init
    pub critical_images: Vec<ResourceId>,
    /// Elements converted side by side during a scan
    pub workers: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            allow_list: HostAllowList::default(),
            probe_timeout: Some(DEFAULT_PROBE_TIMEOUT),
            decode_timeout: Some(Duration::from_secs(10)),
            quality: CANVAS_QUALITY,
            lazy_class: "lazy".to_string(),
            critical_images: vec![ResourceId::new(format!(
                "https://{}/canada_emeralds/raw-emerald-crystals.jpg",
                DEFAULT_ASSET_HOST
            ))],
            workers: 4,
        }
    }
}

/// Counters for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub started: u64,
    pub skipped: u64,
    pub passthrough: u64,
    pub prefetched: u64,
    pub reencoded: u64,
    pub failed: u64,
    /// Conversions handed to a waiter because the element was still loading
    pub deferred: u64,
    /// Waits that hit the decode timeout; the claim was released
    pub timed_out: u64,
    /// Elements pointed at a target recorded for the same source
    pub reused: u64,
}

/// Result of a bulk scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub converted: Vec<(ResourceId, ElementState)>,
    pub reused: usize,
    pub skipped: usize,
}

/// Result of [`ConversionCoordinator::init`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    pub enabled: bool,
    pub preloads: usize,
    pub scan: ScanReport,
    pub lazy_observed: usize,
}

enum Outcome {
    Finished(ElementState, Option<ResourceId>),
    Pending,
}

/// Shared between the coordinator and its load waiters
struct Pipeline {
    config: CoordinatorConfig,
    prober: Prober,
    reencoder: CanvasReencoder,
    record: ConversionRecord,
    stats: Mutex<CoordinatorStats>,
}

impl Pipeline {
    fn run(&self, element: &ImageElement, source: &ResourceId) -> Outcome {
        let candidate = self.prober.candidate(source);
        if &candidate == source {
            return Outcome::Finished(ElementState::Passthrough, None);
        }

        if let Some(image) = self.prober.fetch(&candidate) {
            log::debug!("Using pre-built {}", candidate);
            element.set_src(candidate.clone());
            element.finish_loading(image);
            return Outcome::Finished(ElementState::SwappedToPrefetched, Some(candidate));
        }

        match element.status() {
            LoadStatus::Loaded(image) => {
                let (state, target) = self.reencode(element, source, image);
                Outcome::Finished(state, target)
            }
            LoadStatus::Failed(reason) => {
                log::warn!("WebP conversion failed for {}: {}", source, reason);
                Outcome::Finished(ElementState::LeftOriginal, None)
            }
            LoadStatus::Pending => Outcome::Pending,
        }
    }

    fn reencode(
        &self,
        element: &ImageElement,
        source: &ResourceId,
        image: RawImage,
    ) -> (ElementState, Option<ResourceId>) {
        match self.reencoder.reencode(&image) {
            Ok(url) => {
                log::debug!("Re-encoded {} -> {}", source, url);
                element.set_src(url.clone());
                element.finish_loading(image);
                (ElementState::SwappedToReencoded, Some(url))
            }
            Err(e) => {
                log::warn!("WebP conversion failed for {}: {}", source, e);
                (ElementState::LeftOriginal, None)
            }
        }
    }

    /// Block until `element` settles, then re-encode it
    fn finish_after_load(&self, element: &ImageElement, source: &ResourceId) {
        match element.decode(self.config.decode_timeout) {
            Ok(_) if element.src().as_ref() != Some(source) => {
                log::debug!("{} was replaced while loading", source);
                self.record.release(source);
            }
            Ok(image) => {
                let (state, target) = self.reencode(element, source, image);
                self.finish(source, state, target);
            }
            Err(LoadError::Timeout { timeout_ms, .. }) => {
                log::warn!(
                    "{} did not load within {}ms; retrying on the next pass",
                    source,
                    timeout_ms
                );
                self.record.release(source);
                self.stats.lock().timed_out += 1;
            }
            Err(e) => {
                log::warn!("WebP conversion failed for {}: {}", source, e);
                self.finish(source, ElementState::LeftOriginal, None);
            }
        }
    }

    fn finish(&self, source: &ResourceId, state: ElementState, target: Option<ResourceId>) {
        match target {
            Some(target) => self.record.mark_swapped(source, state, target),
            None => self.record.mark_processed(source, state),
        }

        let mut stats = self.stats.lock();
        match state {
            ElementState::Passthrough => stats.passthrough += 1,
            ElementState::SwappedToPrefetched => stats.prefetched += 1,
            ElementState::SwappedToReencoded => stats.reencoded += 1,
            ElementState::LeftOriginal => stats.failed += 1,
            ElementState::Untouched | ElementState::AwaitingLoad => {}
        }
    }
}

/// Drives the probe-then-re-encode pipeline for one page session
pub struct ConversionCoordinator {
    pipeline: Arc<Pipeline>,
    webp_supported: bool,
    lazy: LazyObserver,
    waiting: Mutex<Vec<JoinHandle<()>>>,
}

impl ConversionCoordinator {
    pub fn new(config: CoordinatorConfig, loader: Arc<dyn ResourceLoader>) -> Self {
        let prober =
            Prober::new(config.allow_list.clone(), loader).with_timeout(config.probe_timeout);
        let reencoder = CanvasReencoder::with_quality(Arc::new(BlobStore::new()), config.quality);
        Self {
            pipeline: Arc::new(Pipeline {
                config,
                prober,
                reencoder,
                record: ConversionRecord::new(),
                stats: Mutex::new(CoordinatorStats::default()),
            }),
            webp_supported: canvas::webp_supported(),
            lazy: LazyObserver::new(),
            waiting: Mutex::new(Vec::new()),
        }
    }

    /// Override the detected capability
    pub fn with_webp_support(mut self, supported: bool) -> Self {
        self.webp_supported = supported;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.webp_supported
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.pipeline.config
    }

    pub fn record(&self) -> &ConversionRecord {
        &self.pipeline.record
    }

    pub fn prober(&self) -> &Prober {
        &self.pipeline.prober
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        self.pipeline.reencoder.blobs()
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.pipeline.stats.lock().clone()
    }

    pub fn encoder_stats(&self) -> EncoderStats {
        self.pipeline.reencoder.stats()
    }

    /// Document-ready entry point: preload hints, bulk scan, lazy registration
    pub fn init(&self, page: &mut Page) -> InitReport {
        if !self.webp_supported {
            log::info!("WebP not supported in this runtime; leaving images untouched");
            return InitReport::default();
        }

        let hints = self.preload_hints();
        let preloads = hints.len();
        page.head.extend(hints);

        let scan = self.bulk_scan(&page.images());
        let lazy_observed = self.observe_lazy(&page.lazy_images());

        InitReport {
            enabled: true,
            preloads,
            scan,
            lazy_observed,
        }
    }

    /// Preload hints for the configured critical images, pointing at their WebP twins
    pub fn preload_hints(&self) -> Vec<PreloadHint> {
        self.pipeline
            .config
            .critical_images
            .iter()
            .map(|src| PreloadHint::image(self.pipeline.prober.candidate(src)))
            .collect()
    }

    /// Convert every element whose source ends in a supported suffix
    pub fn bulk_scan(&self, images: &[ImageElement]) -> ScanReport {
        if !self.webp_supported {
            return ScanReport::default();
        }
        self.schedule(images)
    }

    /// Register deferred elements; returns how many are now observed
    pub fn observe_lazy(&self, images: &[ImageElement]) -> usize {
        if !self.webp_supported {
            return 0;
        }
        for element in images.iter().filter(|e| e.data_src().is_some()) {
            self.lazy.observe(element);
        }
        self.lazy.len()
    }

    /// Visibility callback: assign real sources once, then convert
    pub fn on_intersections(
        &self,
        entries: &[IntersectionEntry],
    ) -> Vec<(ResourceId, ElementState)> {
        let lazy_class = &self.pipeline.config.lazy_class;
        let revealed: Vec<(ResourceId, ImageElement)> = self
            .lazy
            .take_intersecting(entries)
            .into_iter()
            .filter_map(|element| {
                let real = element.data_src()?;
                element.set_src(real.clone());
                element.remove_class(lazy_class);
                Some((real, element))
            })
            .collect();

        self.fan_out(revealed, |(real, element)| {
            match self.pipeline.prober.load(&real) {
                Ok(image) => element.finish_loading(image),
                Err(e) => element.fail_loading(e.to_string()),
            }
            self.convert(&element)
                .or_else(|| self.reuse(&element, &real))
                .map(|state| (real, state))
        })
        .into_iter()
        .flatten()
        .collect()
    }

    /// Mutation callback: inserted images, and images inside inserted elements
    pub fn on_nodes_inserted(&self, nodes: &[Node]) -> ScanReport {
        if !self.webp_supported {
            return ScanReport::default();
        }
        let images: Vec<ImageElement> = nodes.iter().flat_map(Node::images).collect();
        self.schedule(&images)
    }

    /// Run the per-element state machine.
    ///
    /// Returns `None` when the element has no source yet or its source is
    /// already claimed in the record. An element that has not finished
    /// loading comes back as [`ElementState::AwaitingLoad`] and is converted
    /// by a waiter thread once it settles.
    pub fn convert(&self, element: &ImageElement) -> Option<ElementState> {
        let source = element.src()?;
        if !source.has_input_suffix() {
            return Some(ElementState::Untouched);
        }
        let pipeline = &self.pipeline;
        if !pipeline.record.try_begin(&source) {
            log::debug!("Skipping {}: already processed", source);
            pipeline.stats.lock().skipped += 1;
            return None;
        }
        pipeline.stats.lock().started += 1;

        let state = match pipeline.run(element, &source) {
            Outcome::Finished(state, target) => {
                pipeline.finish(&source, state, target);
                state
            }
            Outcome::Pending => self.await_load(element, source),
        };
        Some(state)
    }

    /// Join every waiter started so far; returns how many were joined
    pub fn wait_for_loads(&self) -> usize {
        let handles: Vec<JoinHandle<()>> = self.waiting.lock().drain(..).collect();
        let count = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                log::error!("Load waiter panicked");
            }
        }
        count
    }

    fn await_load(&self, element: &ImageElement, source: ResourceId) -> ElementState {
        let pipeline = Arc::clone(&self.pipeline);
        let waiter_element = element.clone();
        let waiter_source = source.clone();
        let spawned = thread::Builder::new()
            .name("webp-await-load".to_string())
            .spawn(move || pipeline.finish_after_load(&waiter_element, &waiter_source));

        match spawned {
            Ok(handle) => {
                let mut waiting = self.waiting.lock();
                waiting.retain(|h| !h.is_finished());
                waiting.push(handle);
                self.pipeline.stats.lock().deferred += 1;
                log::debug!("{} still loading; conversion deferred", source);
                ElementState::AwaitingLoad
            }
            Err(e) => {
                log::warn!("Could not wait for {}: {}", source, e);
                self.pipeline.finish(&source, ElementState::LeftOriginal, None);
                ElementState::LeftOriginal
            }
        }
    }

    /// Point `element` at the target already recorded for `source`
    fn reuse(&self, element: &ImageElement, source: &ResourceId) -> Option<ElementState> {
        let record = &self.pipeline.record;
        let (Some(RecordEntry::Done(state)), Some(target)) =
            (record.entry(source), record.target(source))
        else {
            self.pipeline.stats.lock().skipped += 1;
            return None;
        };

        let pixels = match element.status() {
            LoadStatus::Loaded(image) => Some(image),
            _ => None,
        };
        element.set_src(target.clone());
        if let Some(image) = pixels {
            element.finish_loading(image);
        }
        self.pipeline.stats.lock().reused += 1;
        log::debug!("Reusing {} for {}", target, source);
        Some(state)
    }

    /// Convert fresh sources concurrently, then reuse or skip the rest
    fn schedule(&self, images: &[ImageElement]) -> ScanReport {
        let mut fresh = Vec::new();
        let mut repeats = Vec::new();
        let mut seen = HashSet::new();
        for element in images {
            let Some(src) = element.src().filter(ResourceId::has_input_suffix) else {
                continue;
            };
            if !self.pipeline.record.has_processed(&src) && seen.insert(src.clone()) {
                fresh.push((src, element.clone()));
            } else {
                repeats.push((src, element.clone()));
            }
        }

        let mut report = ScanReport::default();
        let results = self.fan_out(fresh, |(src, element)| (src, self.convert(&element)));
        for (src, state) in results {
            match state {
                Some(state) => report.converted.push((src, state)),
                None => report.skipped += 1,
            }
        }
        for (src, element) in repeats {
            match self.reuse(&element, &src) {
                Some(_) => report.reused += 1,
                None => report.skipped += 1,
            }
        }
        report
    }

    /// Run `job` over `items` on up to `workers` threads, keeping input order
    fn fan_out<T, R, F>(&self, items: Vec<T>, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let total = items.len();
        let workers = self.pipeline.config.workers.min(total);
        if workers <= 1 {
            return items.into_iter().map(job).collect();
        }

        let (job_tx, job_rx) = bounded::<(usize, T)>(total);
        for item in items.into_iter().enumerate() {
            // Capacity covers every item
            let _ = job_tx.send(item);
        }
        drop(job_tx);

        let (done_tx, done_rx) = bounded::<(usize, R)>(total);
        let job = &job;
        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let spawned = thread::Builder::new()
                    .name("webp-convert".to_string())
                    .spawn_scoped(scope, move || {
                        for (index, item) in job_rx.iter() {
                            let _ = done_tx.send((index, job(item)));
                        }
                    });
                if let Err(e) = spawned {
                    log::warn!("Could not start conversion worker: {}", e);
                }
            }
        });

        // Anything left means no worker could be started
        for (index, item) in job_rx.try_iter() {
            let _ = done_tx.send((index, job(item)));
        }
        drop(done_tx);

        let mut results: Vec<(usize, R)> = done_rx.try_iter().collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
