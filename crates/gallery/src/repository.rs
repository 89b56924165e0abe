//! # Gallery Repository
//!
//! Entry point for the presentation layer. Owns the current
//! [`GallerySnapshot`] and serves image bytes through
//! memory, then disk, then network.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::cache::manifest::ManifestStore;
use crate::cache::providers::{DiskTier, MemoryTier};
use crate::cache::store::DiskStore;
use crate::cache::tiered::TieredCache;
use crate::cache::types::{CacheKey, CacheVariant, VariantClass};
use crate::classifier::LinkClassifier;
use crate::config::GalleryConfig;
use crate::error::{GalleryError, Result};
use crate::models::{GallerySnapshot, ImageMetadata};
use crate::net::gateway::{GatewaySettings, NetworkGateway};
use crate::net::reachability::{
    AlwaysOnline, ConnectivityGate, ReachabilityMonitor, TcpProbeMonitor,
};
use crate::net::retry::Retrier;
use crate::net::transport::{HttpTransport, ReqwestTransport};
use crate::render::{ImageRenderer, ThumbnailRenderer};

pub struct GalleryRepository {
    gateway: NetworkGateway,
    manifest_store: ManifestStore,
    cache: TieredCache,
    renderer: Arc<dyn ThumbnailRenderer>,
    current: RwLock<Option<Arc<GallerySnapshot>>>,
    /// Serialises load and refresh so snapshot replacement never interleaves
    refresh_lock: Mutex<()>,
}

impl GalleryRepository {
    pub fn new(
        gateway: NetworkGateway,
        manifest_store: ManifestStore,
        cache: TieredCache,
        renderer: Arc<dyn ThumbnailRenderer>,
    ) -> Self {
        Self {
            gateway,
            manifest_store,
            cache,
            renderer,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Build a repository with the reqwest transport, a TCP reachability
    /// probe against the manifest host and the `image` renderer.
    pub async fn from_config(config: &GalleryConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::from_config(&config.http)?);
        let monitor: Arc<dyn ReachabilityMonitor> = match TcpProbeMonitor::for_url(
            &config.manifest_url,
            config.reachability_interval,
            config.http.connect_timeout,
        ) {
            Some(monitor) => Arc::new(monitor),
            None => Arc::new(AlwaysOnline),
        };
        let renderer = Arc::new(ImageRenderer::new(config.thumbnail_quality));

        Self::with_collaborators(config, transport, monitor, renderer).await
    }

    /// Build a repository around caller-supplied collaborators
    pub async fn with_collaborators(
        config: &GalleryConfig,
        transport: Arc<dyn HttpTransport>,
        monitor: Arc<dyn ReachabilityMonitor>,
        renderer: Arc<dyn ThumbnailRenderer>,
    ) -> Result<Self> {
        let store = DiskStore::open(&config.cache_dir).await?;
        let memory = Arc::new(MemoryTier::new(&config.memory_cache));
        let disk = Arc::new(DiskTier::new(store.clone(), config.disk_cache));

        let gate = Arc::new(ConnectivityGate::new(monitor));
        let gateway = NetworkGateway::new(
            transport,
            Retrier::new(config.retry, gate),
            LinkClassifier::new(config.classifier.clone()),
            GatewaySettings::from(config),
        );

        Ok(Self::new(
            gateway,
            ManifestStore::new(&store),
            TieredCache::new(memory, disk),
            renderer,
        ))
    }

    /// The in-memory snapshot, without any I/O
    pub fn current_snapshot(&self) -> Option<Arc<GallerySnapshot>> {
        self.current.read().clone()
    }

    /// Return the current snapshot, else the persisted manifest, else
    /// whatever a fresh network fetch yields.
    pub async fn load_initial_snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<GallerySnapshot>> {
        if let Some(snapshot) = self.current_snapshot() {
            return Ok(snapshot);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have finished loading while we waited
        if let Some(snapshot) = self.current_snapshot() {
            return Ok(snapshot);
        }

        if let Some(manifest) = self.manifest_store.load().await? {
            let snapshot = Arc::new(GallerySnapshot::from(&manifest));
            info!(
                source = %snapshot.source_url,
                fetched_at = %snapshot.fetched_at,
                items = snapshot.items.len(),
                "Loaded gallery from persisted manifest"
            );
            *self.current.write() = Some(Arc::clone(&snapshot));
            return Ok(snapshot);
        }

        self.refresh_locked(cancel).await
    }

    /// Fetch the manifest from the network, persist it and replace the
    /// current snapshot. On failure the previous snapshot stays in place.
    pub async fn refresh_snapshot(&self, cancel: &CancellationToken) -> Result<Arc<GallerySnapshot>> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked(cancel).await
    }

    async fn refresh_locked(&self, cancel: &CancellationToken) -> Result<Arc<GallerySnapshot>> {
        let manifest = self.gateway.fetch_manifest(cancel).await?;
        self.manifest_store.save(&manifest).await?;

        let snapshot = Arc::new(GallerySnapshot::from(&manifest));
        *self.current.write() = Some(Arc::clone(&snapshot));

        info!(
            source = %snapshot.source_url,
            items = snapshot.items.len(),
            images = snapshot.image_urls().count(),
            "Refreshed gallery"
        );
        Ok(snapshot)
    }

    /// Bytes of `variant` for `url`, from the first tier that has them.
    ///
    /// Thumbnails are always rendered from the original, which is itself
    /// fetched cache-first.
    pub async fn image_data(
        &self,
        url: &Url,
        variant: CacheVariant,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        match variant {
            CacheVariant::Original => self.original_data(url, cancel).await,
            CacheVariant::Thumbnail { max_pixel_size } => {
                self.thumbnail_data(url, max_pixel_size, cancel).await
            }
        }
    }

    async fn original_data(&self, url: &Url, cancel: &CancellationToken) -> Result<Bytes> {
        let key = CacheKey::original(url.clone());
        if let Some(data) = self.cache.lookup(&key).await? {
            return Ok(data);
        }

        debug!(url = %url, "Original not cached, downloading");
        let data = self
            .gateway
            .download(url, cancel)
            .await
            .map_err(|e| GalleryError::image_unavailable(url, e))?;

        if data.is_empty() {
            return Err(GalleryError::ImageDataUnavailable {
                url: url.clone(),
                source: None,
            });
        }

        self.cache.store(&key, data.clone()).await?;
        Ok(data)
    }

    async fn thumbnail_data(
        &self,
        url: &Url,
        max_pixel_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let key = CacheKey::thumbnail(url.clone(), max_pixel_size);
        if let Some(data) = self.cache.lookup(&key).await? {
            return Ok(data);
        }

        let original = self.original_data(url, cancel).await?;

        let rendered = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GalleryError::Cancelled),
            rendered = self.renderer.render_thumbnail(original, max_pixel_size) => rendered,
        };
        let data = rendered.map_err(|e| GalleryError::image_unavailable(url, e.into()))?;

        self.cache.store(&key, data.clone()).await?;
        debug!(url = %url, max_pixel_size, bytes = data.len(), "Cached rendered thumbnail");
        Ok(data)
    }

    /// Probe the format of `url`. Never cached.
    pub async fn metadata(&self, url: &Url, cancel: &CancellationToken) -> Result<ImageMetadata> {
        self.gateway.probe_metadata(url, cancel).await
    }

    /// Drop every cached entry of `class` from both tiers
    pub async fn clear_cache(&self, class: VariantClass) -> Result<()> {
        self.cache.clear(class).await?;
        info!(class = ?class, "Cleared image cache");
        Ok(())
    }

    /// Drop the persisted manifest. The in-memory snapshot is kept.
    pub async fn clear_manifest(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.manifest_store.clear().await?;
        info!("Cleared persisted manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use reqwest::StatusCode;
    use tempfile::TempDir;

    use super::*;
    use crate::cache::providers::CacheTier;
    use crate::cache::types::{DiskCacheConfig, MemoryCacheConfig, Namespace};
    use crate::models::{ContentKind, GalleryItem, PlaceholderReason};
    use crate::net::reachability::ReachabilityStatus;
    use crate::net::retry::RetryPolicy;
    use crate::net::transport::HttpResponse;
    use crate::render::tests::png_fixture;
    use crate::testing::{
        CountingRenderer, ScriptedReachability, ScriptedTransport, SpyTier, init_tracing,
    };

    const MANIFEST: &str = "https://x/a.jpg\nhttps://x/a.jpg\nnot a url\nhttps://x/b.gif";

    fn manifest_url() -> Url {
        Url::parse("https://x/links.txt").unwrap()
    }

    struct Harness {
        repository: GalleryRepository,
        transport: Arc<ScriptedTransport>,
        renderer: Arc<CountingRenderer<ImageRenderer>>,
        memory: Arc<SpyTier<MemoryTier>>,
        disk: Arc<SpyTier<DiskTier>>,
        store: DiskStore,
        _temp: Option<TempDir>,
    }

    impl Harness {
        fn manifest_requests(&self) -> usize {
            self.transport
                .requests()
                .iter()
                .filter(|r| r.url == manifest_url())
                .count()
        }

        fn image_requests(&self) -> usize {
            self.transport.call_count() - self.manifest_requests()
        }
    }

    /// Serves the manifest from `manifest_url()` and a 400x200 PNG from every other URL
    fn serving(manifest: &'static str) -> ScriptedTransport {
        let image = png_fixture(400, 200, false);
        ScriptedTransport::new(move |request, _| {
            if request.url == manifest_url() {
                Ok(HttpResponse::new(StatusCode::OK, manifest).with_content_type("text/plain"))
            } else {
                Ok(HttpResponse::new(StatusCode::OK, image.clone()).with_content_type("image/png"))
            }
        })
    }

    async fn harness_in(root: &Path, transport: ScriptedTransport) -> Harness {
        init_tracing();
        let store = DiskStore::open(root).await.unwrap();
        let transport = Arc::new(transport);
        let renderer = Arc::new(CountingRenderer::new(ImageRenderer::default()));
        let memory = Arc::new(SpyTier::new(MemoryTier::new(&MemoryCacheConfig::default())));
        let disk = Arc::new(SpyTier::new(DiskTier::new(
            store.clone(),
            DiskCacheConfig::default(),
        )));

        let gate = Arc::new(ConnectivityGate::new(Arc::new(ScriptedReachability::new(
            ReachabilityStatus::Satisfied,
        ))));
        let gateway = NetworkGateway::new(
            transport.clone(),
            Retrier::new(RetryPolicy::new(2, Duration::from_millis(10)), gate),
            LinkClassifier::default(),
            GatewaySettings::new(manifest_url()),
        );
        let repository = GalleryRepository::new(
            gateway,
            ManifestStore::new(&store),
            TieredCache::new(memory.clone(), disk.clone()),
            renderer.clone(),
        );

        Harness {
            repository,
            transport,
            renderer,
            memory,
            disk,
            store,
            _temp: None,
        }
    }

    async fn harness(transport: ScriptedTransport) -> Harness {
        let temp = tempfile::tempdir().unwrap();
        let mut harness = harness_in(temp.path(), transport).await;
        harness._temp = Some(temp);
        harness
    }

    fn image_url() -> Url {
        Url::parse("https://x/a.jpg").unwrap()
    }

    #[tokio::test]
    async fn initial_load_fetches_classifies_and_persists() {
        let h = harness(serving(MANIFEST)).await;
        let snapshot = h
            .repository
            .load_initial_snapshot(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.items.len(), 3);
        let lines: Vec<_> = snapshot.items.iter().map(GalleryItem::line_number).collect();
        assert_eq!(lines, vec![1, 3, 4]);
        assert!(matches!(&snapshot.items[0], GalleryItem::Image(image) if image.url == image_url()));
        assert!(matches!(
            &snapshot.items[1],
            GalleryItem::Placeholder(p) if p.reason == PlaceholderReason::InvalidContent && p.original_line == "not a url"
        ));
        assert!(matches!(&snapshot.items[2], GalleryItem::Image(_)));

        let persisted = ManifestStore::new(&h.store).load().await.unwrap().unwrap();
        assert_eq!(persisted.records.len(), snapshot.items.len());
        assert_eq!(persisted.records[1].content_kind, ContentKind::NotUrl);
    }

    #[tokio::test]
    async fn current_snapshot_short_circuits_io() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();
        assert!(h.repository.current_snapshot().is_none());

        let first = h.repository.load_initial_snapshot(&cancel).await.unwrap();
        let second = h.repository.load_initial_snapshot(&cancel).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.manifest_requests(), 1);
        assert!(h.repository.current_snapshot().is_some());
    }

    #[tokio::test]
    async fn persisted_manifest_avoids_the_network() {
        let temp = tempfile::tempdir().unwrap();
        {
            let h = harness_in(temp.path(), serving(MANIFEST)).await;
            h.repository
                .refresh_snapshot(&CancellationToken::new())
                .await
                .unwrap();
        }

        let offline = ScriptedTransport::new(|_, _| Err(GalleryError::Network("offline".into())));
        let h = harness_in(temp.path(), offline).await;
        let snapshot = h
            .repository
            .load_initial_snapshot(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.items.len(), 3);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_snapshot() {
        let h = harness(ScriptedTransport::new(|_, call| {
            if call == 0 {
                Ok(HttpResponse::new(StatusCode::OK, MANIFEST).with_content_type("text/plain"))
            } else {
                Err(GalleryError::Network("unreachable".into()))
            }
        }))
        .await;
        let cancel = CancellationToken::new();

        let first = h.repository.refresh_snapshot(&cancel).await.unwrap();
        let err = h.repository.refresh_snapshot(&cancel).await.unwrap_err();

        assert!(matches!(err, GalleryError::Network(_)));
        let current = h.repository.current_snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[tokio::test]
    async fn invalid_content_type_surfaces_on_initial_load() {
        let h = harness(ScriptedTransport::new(|_, _| {
            Ok(HttpResponse::new(StatusCode::OK, "<html/>").with_content_type("application/json"))
        }))
        .await;

        let err = h
            .repository
            .load_initial_snapshot(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::InvalidContentType { .. }));
        assert!(h.repository.current_snapshot().is_none());
    }

    #[tokio::test]
    async fn cold_thumbnail_request_downloads_once_and_renders_once() {
        let h = harness(serving(MANIFEST)).await;

        let thumbnail = h
            .repository
            .image_data(&image_url(), CacheVariant::thumbnail(128), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.image_requests(), 1);
        assert_eq!(h.disk.puts_for(VariantClass::Original), 1);
        assert_eq!(h.renderer.bounds(), vec![128]);
        assert_eq!(h.disk.puts_for(VariantClass::Thumbnail), 1);
        assert_eq!(h.memory.puts_for(VariantClass::Thumbnail), 1);

        let decoded = image::load_from_memory(&thumbnail).unwrap();
        assert!(decoded.width().max(decoded.height()) <= 128);
    }

    #[tokio::test]
    async fn warm_thumbnail_request_touches_nothing_but_memory() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();
        let variant = CacheVariant::thumbnail(128);

        let first = h.repository.image_data(&image_url(), variant, &cancel).await.unwrap();
        let disk_reads = h.disk.get_count();
        let second = h.repository.image_data(&image_url(), variant, &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.image_requests(), 1);
        assert_eq!(h.renderer.call_count(), 1);
        assert_eq!(h.disk.get_count(), disk_reads);
    }

    #[tokio::test]
    async fn stored_original_is_served_without_network() {
        let h = harness(serving(MANIFEST)).await;
        let key = CacheKey::original(image_url());
        h.disk
            .inner()
            .put(&key, Bytes::from_static(b"cached original"))
            .await
            .unwrap();

        let data = h
            .repository
            .image_data(&image_url(), CacheVariant::Original, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data, Bytes::from_static(b"cached original"));
        assert_eq!(h.transport.call_count(), 0);
        // Promoted on the way out
        assert!(h.memory.inner().contains(&key));
    }

    #[tokio::test]
    async fn thumbnail_sizes_are_cached_separately() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();

        h.repository
            .image_data(&image_url(), CacheVariant::thumbnail(64), &cancel)
            .await
            .unwrap();
        h.repository
            .image_data(&image_url(), CacheVariant::thumbnail(128), &cancel)
            .await
            .unwrap();

        assert_eq!(h.image_requests(), 1);
        assert_eq!(h.renderer.bounds(), vec![64, 128]);
    }

    #[tokio::test]
    async fn empty_download_is_unavailable() {
        let h = harness(ScriptedTransport::new(|_, _| {
            Ok(HttpResponse::new(StatusCode::OK, Bytes::new()))
        }))
        .await;

        let err = h
            .repository
            .image_data(&image_url(), CacheVariant::Original, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GalleryError::ImageDataUnavailable { ref url, source: None } if *url == image_url()
        ));
        assert_eq!(h.disk.put_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_download_is_unavailable_with_source() {
        let h = harness(ScriptedTransport::new(|_, _| {
            Ok(HttpResponse::new(StatusCode::NOT_FOUND, Bytes::new()))
        }))
        .await;

        let err = h
            .repository
            .image_data(&image_url(), CacheVariant::thumbnail(64), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            GalleryError::ImageDataUnavailable { source: Some(source), .. } => {
                assert!(matches!(*source, GalleryError::StatusCode { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.image_requests(), 3);
        assert_eq!(h.renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn undecodable_original_fails_the_thumbnail_only() {
        let h = harness(ScriptedTransport::new(|_, _| {
            Ok(HttpResponse::new(StatusCode::OK, "not an image"))
        }))
        .await;

        let err = h
            .repository
            .image_data(&image_url(), CacheVariant::thumbnail(64), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::ImageDataUnavailable { source: Some(_), .. }));
        // The original itself was fine and stays cached
        assert_eq!(h.disk.puts_for(VariantClass::Original), 1);
        assert_eq!(h.disk.puts_for(VariantClass::Thumbnail), 0);
    }

    #[tokio::test]
    async fn cancellation_is_never_rewrapped() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h
            .repository
            .image_data(&image_url(), CacheVariant::Original, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(h.disk.put_count(), 0);
    }

    #[tokio::test]
    async fn metadata_is_a_pass_through() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();

        h.repository.metadata(&image_url(), &cancel).await.unwrap();
        let metadata = h.repository.metadata(&image_url(), &cancel).await.unwrap();

        assert_eq!(metadata.mime_type.as_deref(), Some("image/png"));
        assert_eq!(h.image_requests(), 2);
        assert_eq!(h.disk.put_count(), 0);
        assert_eq!(h.memory.put_count(), 0);
    }

    #[tokio::test]
    async fn clear_cache_forces_a_new_download() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();

        h.repository
            .image_data(&image_url(), CacheVariant::Original, &cancel)
            .await
            .unwrap();
        h.repository.clear_cache(VariantClass::Original).await.unwrap();
        h.repository
            .image_data(&image_url(), CacheVariant::Original, &cancel)
            .await
            .unwrap();

        assert_eq!(h.image_requests(), 2);
    }

    #[tokio::test]
    async fn clear_manifest_keeps_current_snapshot() {
        let h = harness(serving(MANIFEST)).await;
        let cancel = CancellationToken::new();
        h.repository.refresh_snapshot(&cancel).await.unwrap();

        h.repository.clear_manifest().await.unwrap();

        assert!(ManifestStore::new(&h.store).load().await.unwrap().is_none());
        assert!(h.repository.current_snapshot().is_some());
    }

    #[tokio::test]
    async fn from_config_creates_cache_layout() {
        let temp = tempfile::tempdir().unwrap();
        let config = GalleryConfig::new(manifest_url(), temp.path().join("cache"));

        let repository = GalleryRepository::with_collaborators(
            &config,
            Arc::new(serving(MANIFEST)),
            Arc::new(AlwaysOnline),
            Arc::new(ImageRenderer::default()),
        )
        .await
        .unwrap();

        assert!(temp.path().join("cache/thumbnails").is_dir());
        assert!(temp.path().join("cache/originals").is_dir());
        let snapshot = repository
            .load_initial_snapshot(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.image_urls().count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_for_one_key_agree_and_keep_one_file() {
        let h = Arc::new(harness(serving(MANIFEST)).await);
        let variant = CacheVariant::thumbnail(64);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let h = Arc::clone(&h);
                tokio::spawn(async move {
                    h.repository
                        .image_data(&image_url(), variant, &CancellationToken::new())
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }
        assert!(!results[0].is_empty());
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));

        for namespace in [Namespace::Thumbnails, Namespace::Originals] {
            let files: Vec<_> = std::fs::read_dir(h.store.namespace_dir(namespace))
                .unwrap()
                .map(|entry| entry.unwrap().file_name())
                .collect();
            assert_eq!(files.len(), 1, "{namespace}: {files:?}");
        }

        let stored = std::fs::read(h.store.entry_path(&CacheKey::thumbnail(image_url(), 64))).unwrap();
        assert_eq!(stored.as_slice(), results[0].as_ref());
    }
}
