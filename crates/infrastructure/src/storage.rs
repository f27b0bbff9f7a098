use crate::composite_filter::{CompositeFilter, ListSource, ServiceSource};
use crate::custom_filter::CustomFilterCache;
use crate::hash_prefix_filter::HashPrefixFilter;
use crate::hash_storage::HashStorage;
use crate::refreshable_source::RefreshableSource;
use crate::result_cache::ResultCache;
use crate::rule_list::RuleListEngine;
use crate::safe_search_filter::SafeSearchFilter;
use filterdns_application::ports::{ErrorCollectorPort, MetricsPort, RefreshOutcome, Resolver};
use filterdns_application::FilterContextInput;
use filterdns_domain::config::{FilteringConfig, HashListSource};
use filterdns_domain::{FilterError, FilterListId};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct FilterIndexDoc {
    filters: Vec<FilterIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct FilterIndexEntry {
    #[serde(rename = "filterId")]
    filter_id: Option<String>,
    #[serde(rename = "filterKey")]
    filter_key: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url: String,
}

/// One hash-prefix engine (safe-browsing, adult-blocking, or
/// newly-registered-domains): the source its text refreshes from, the
/// storage it resets, and the filter wrapping them (spec §4.5/§4.9/§5 "Hash
/// Storages have their own refresh workers with identical semantics").
struct HashComponent {
    source: RefreshableSource,
    storage: Arc<HashStorage>,
    filter: Arc<HashPrefixFilter>,
    result_cache: Arc<ResultCache>,
}

/// Top-level owner of every engine the filtering core runs (spec §4.10).
/// A request-scoped `CompositeFilter` only ever borrows `Arc`s out of here;
/// `Storage` is the sole place that mutates the installed set.
pub struct Storage {
    config: FilteringConfig,
    filter_index_source: RefreshableSource,
    service_index_source: RefreshableSource,
    rule_lists: RwLock<HashMap<FilterListId, Arc<RuleListEngine>>>,
    rule_list_cache: Option<Arc<ResultCache>>,
    service_blocker: Arc<crate::service_blocker::ServiceBlocker>,
    custom_filter_cache: Arc<CustomFilterCache>,
    safe_search_general: Arc<SafeSearchFilter>,
    safe_search_youtube: Arc<SafeSearchFilter>,
    safe_browsing: Option<HashComponent>,
    adult_blocking: Option<HashComponent>,
    newly_registered_domains: Option<HashComponent>,
    metrics: Arc<dyn MetricsPort>,
    errors: Arc<dyn ErrorCollectorPort>,
}

impl Storage {
    pub fn new(
        config: FilteringConfig,
        client: reqwest::Client,
        resolver: Arc<dyn Resolver>,
        metrics: Arc<dyn MetricsPort>,
        errors: Arc<dyn ErrorCollectorPort>,
    ) -> Self {
        let refresh = &config.refresh;
        let index_timeout = refresh.index_refresh_timeout;
        let list_timeout = refresh.rule_list_refresh_timeout;
        let staleness = refresh.refresh_interval;
        let max_size = refresh.max_rule_list_size;

        let filter_index_source = RefreshableSource::new(
            config.cache_dir.join("filters.json"),
            config.sources.filter_index_url.clone(),
            staleness,
            index_timeout,
            max_size,
            client.clone(),
        );
        let service_index_source = RefreshableSource::new(
            config.cache_dir.join("services.json"),
            config.sources.blocked_service_index_url.clone(),
            staleness,
            index_timeout,
            max_size,
            client.clone(),
        );

        let rule_list_cache = if config.cache.use_rule_list_cache {
            Some(Arc::new(ResultCache::new(config.cache.rule_list_cache_size)))
        } else {
            None
        };

        let safe_search_cache = Arc::new(ResultCache::new(config.cache.safe_search_cache_size));
        let general_engine = Arc::new(RuleListEngine::new(
            RefreshableSource::new(
                config.cache_dir.join("general_safe_search.txt"),
                config.sources.general_safe_search_rules_url.clone(),
                staleness,
                list_timeout,
                max_size,
                client.clone(),
            ),
            Some(safe_search_cache.clone()),
        ));
        let youtube_engine = Arc::new(RuleListEngine::new(
            RefreshableSource::new(
                config.cache_dir.join("youtube_safe_search.txt"),
                config.sources.youtube_safe_search_rules_url.clone(),
                staleness,
                list_timeout,
                max_size,
                client.clone(),
            ),
            Some(safe_search_cache.clone()),
        ));
        let safe_search_general = Arc::new(SafeSearchFilter::new(
            general_engine,
            FilterListId::general_safe_search(),
            resolver.clone(),
            safe_search_cache.clone(),
        ));
        let safe_search_youtube = Arc::new(SafeSearchFilter::new(
            youtube_engine,
            FilterListId::youtube_safe_search(),
            resolver.clone(),
            safe_search_cache,
        ));

        let safe_browsing = config.sources.safe_browsing.as_ref().map(|source| {
            build_hash_component(
                source,
                &config.cache_dir,
                "safe_browsing.txt",
                FilterListId::safe_browsing(),
                staleness,
                list_timeout,
                max_size,
                &client,
                resolver.clone(),
                config.cache.rule_list_cache_size,
            )
        });
        let adult_blocking = config.sources.adult_blocking.as_ref().map(|source| {
            build_hash_component(
                source,
                &config.cache_dir,
                "adult_blocking.txt",
                FilterListId::adult_blocking(),
                staleness,
                list_timeout,
                max_size,
                &client,
                resolver.clone(),
                config.cache.rule_list_cache_size,
            )
        });
        let newly_registered_domains = config.sources.newly_registered_domains.as_ref().map(|source| {
            build_hash_component(
                source,
                &config.cache_dir,
                "newly_registered_domains.txt",
                FilterListId::newly_registered_domains(),
                staleness,
                list_timeout,
                max_size,
                &client,
                resolver,
                config.cache.rule_list_cache_size,
            )
        });

        let custom_filter_cache = Arc::new(CustomFilterCache::new(config.cache.custom_filter_cache_size));

        Self {
            config,
            filter_index_source,
            service_index_source,
            rule_lists: RwLock::new(HashMap::new()),
            rule_list_cache,
            service_blocker: Arc::new(crate::service_blocker::ServiceBlocker::new()),
            custom_filter_cache,
            safe_search_general,
            safe_search_youtube,
            safe_browsing,
            adult_blocking,
            newly_registered_domains,
            metrics,
            errors,
        }
    }

    /// First-boot refresh: every source accepts stale cached content so
    /// startup never blocks on the network (spec §4.10 "RefreshInitial").
    pub async fn refresh_initial(&self) -> Result<(), FilterError> {
        self.refresh(true).await
    }

    /// Periodic refresh: strict freshness, duplicate IDs in the index are
    /// rejected, first occurrence wins (spec §4.10 "periodic Refresh").
    pub async fn refresh(&self, accept_stale: bool) -> Result<(), FilterError> {
        self.refresh_rule_lists(accept_stale).await?;
        self.refresh_safe_search(accept_stale).await;
        self.refresh_service_blocker(accept_stale).await;
        self.refresh_hash_component(self.safe_browsing.as_ref(), accept_stale)
            .await;
        self.refresh_hash_component(self.adult_blocking.as_ref(), accept_stale)
            .await;
        self.refresh_hash_component(self.newly_registered_domains.as_ref(), accept_stale)
            .await;
        Ok(())
    }

    async fn refresh_rule_lists(&self, accept_stale: bool) -> Result<(), FilterError> {
        let text = match self.filter_index_source.refresh(accept_stale).await {
            Ok(text) => text,
            Err(e) => {
                self.errors.report("filter_index", &e);
                return Err(e);
            }
        };
        let doc: FilterIndexDoc = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                let e = FilterError::from(e);
                self.errors.report("filter_index", &e);
                return Err(e);
            }
        };

        let mut seen: HashMap<String, ()> = HashMap::new();
        for entry in &doc.filters {
            let raw_id = entry
                .filter_key
                .clone()
                .or_else(|| entry.filter_id.clone())
                .unwrap_or_default();

            if seen.contains_key(&raw_id) {
                self.errors
                    .report(&raw_id, &FilterError::DuplicateListId(raw_id.clone()));
                continue;
            }
            seen.insert(raw_id.clone(), ());

            let id = match FilterListId::new(&raw_id) {
                Ok(id) if !id.is_none() => id,
                _ => {
                    self.errors
                        .report(&raw_id, &FilterError::MalformedIndex(format!("invalid filter id {raw_id:?}")));
                    continue;
                }
            };
            if !(entry.download_url.starts_with("http://") || entry.download_url.starts_with("https://")) {
                self.errors.report(
                    id.as_str(),
                    &FilterError::MalformedIndex(format!("invalid download url {:?}", entry.download_url)),
                );
                continue;
            }

            let engine = self.rule_list_engine_for(&id, &entry.download_url);
            match engine.refresh(accept_stale).await {
                Ok(()) => {
                    self.metrics.record_refresh(id.as_str(), RefreshOutcome::Updated);
                    self.metrics.record_compiled_size(id.as_str(), engine.rule_count());
                }
                Err(e) => {
                    self.errors.report(id.as_str(), &e);
                    self.metrics.record_refresh(id.as_str(), RefreshOutcome::Failed);
                }
            }
        }
        Ok(())
    }

    /// Returns the engine already installed for `id`, creating and
    /// installing one on first sight — engines persist across refreshes so
    /// a failed refresh simply leaves the previously compiled matcher live
    /// (spec §4.10 "the previous version of that list is retained").
    fn rule_list_engine_for(&self, id: &FilterListId, download_url: &str) -> Arc<RuleListEngine> {
        if let Some(engine) = self.rule_lists.read().unwrap().get(id) {
            return engine.clone();
        }
        let mut guard = self.rule_lists.write().unwrap();
        guard
            .entry(id.clone())
            .or_insert_with(|| {
                let source = RefreshableSource::new(
                    self.config.cache_dir.join(id.as_str()),
                    download_url.to_string(),
                    self.config.refresh.refresh_interval,
                    self.config.refresh.rule_list_refresh_timeout,
                    self.config.refresh.max_rule_list_size,
                    reqwest::Client::new(),
                );
                Arc::new(RuleListEngine::new(source, self.rule_list_cache.clone()))
            })
            .clone()
    }

    async fn refresh_safe_search(&self, accept_stale: bool) {
        if let Err(e) = self.safe_search_general.refresh(accept_stale).await {
            self.errors.report(FilterListId::general_safe_search().as_str(), &e);
        }
        if let Err(e) = self.safe_search_youtube.refresh(accept_stale).await {
            self.errors.report(FilterListId::youtube_safe_search().as_str(), &e);
        }
    }

    async fn refresh_service_blocker(&self, accept_stale: bool) {
        match self.service_index_source.refresh(accept_stale).await {
            Ok(text) => {
                if let Err(e) = self.service_blocker.compile(&text) {
                    self.errors.report("blocked_service", &e);
                }
            }
            Err(e) => self.errors.report("blocked_service", &e),
        }
    }

    async fn refresh_hash_component(&self, component: Option<&HashComponent>, accept_stale: bool) {
        let Some(component) = component else { return };
        match component.source.refresh(accept_stale).await {
            Ok(text) => {
                component.storage.reset(&text);
                component.result_cache.clear();
            }
            Err(e) => self.errors.report("hash_storage", &e),
        }
    }

    pub fn has_list_id(&self, id: &FilterListId) -> bool {
        self.rule_lists.read().unwrap().contains_key(id)
    }

    /// Builds the request-scoped `CompositeFilter` for `ctx` (spec §4.10
    /// "FilterFromContext"): profile settings win over the filtering
    /// group's when present, and the group/profile's parental-control
    /// schedule gates whether blocked-service lists are included.
    pub fn filter_from_context(&self, ctx: &FilterContextInput, now: chrono::DateTime<chrono::Utc>) -> CompositeFilter {
        let settings = ctx.effective_settings();

        let rule_lists_guard = self.rule_lists.read().unwrap();
        let rule_lists: Vec<ListSource> = settings
            .rule_list_ids
            .iter()
            .filter_map(|id| match rule_lists_guard.get(id) {
                Some(engine) => Some(ListSource {
                    list_id: id.clone(),
                    engine: engine.clone(),
                }),
                None => {
                    warn!(list_id = %id, "requested rule list not installed");
                    None
                }
            })
            .collect();
        drop(rule_lists_guard);

        let custom = if settings.custom_rules.is_empty() {
            None
        } else {
            let key = ctx.profile_id.clone().unwrap_or_else(|| "group".to_string());
            Some(self.custom_filter_cache.get_or_compile(
                key,
                settings.custom_rules_updated_at,
                &settings.custom_rules,
            ))
        };

        let blocked_services: Vec<ServiceSource> = if settings.blocked_service_ids.is_empty()
            || ctx.parental_control_paused(now)
        {
            Vec::new()
        } else {
            self.service_blocker
                .engines_for(&settings.blocked_service_ids)
                .into_iter()
                .map(|(service_id, engine)| ServiceSource { service_id, engine })
                .collect()
        };

        CompositeFilter {
            rule_lists,
            custom,
            blocked_services,
            safe_browsing: enabled_hash_filter(settings.safe_browsing_enabled, &self.safe_browsing),
            adult_blocking: enabled_hash_filter(
                settings.adult_blocking_enabled && !ctx.parental_control_paused(now),
                &self.adult_blocking,
            ),
            newly_registered_domains: enabled_hash_filter(
                settings.newly_registered_domains_enabled,
                &self.newly_registered_domains,
            ),
            safe_search_general: settings
                .safe_search_general_enabled
                .then(|| self.safe_search_general.clone()),
            safe_search_youtube: settings
                .safe_search_youtube_enabled
                .then(|| self.safe_search_youtube.clone()),
        }
    }
}

fn enabled_hash_filter(enabled: bool, component: &Option<HashComponent>) -> Option<Arc<HashPrefixFilter>> {
    if !enabled {
        return None;
    }
    component.as_ref().map(|c| c.filter.clone())
}

#[allow(clippy::too_many_arguments)]
fn build_hash_component(
    source: &HashListSource,
    cache_dir: &std::path::Path,
    file_name: &str,
    list_id: FilterListId,
    staleness: std::time::Duration,
    timeout: std::time::Duration,
    max_size: u64,
    client: &reqwest::Client,
    resolver: Arc<dyn Resolver>,
    cache_size: usize,
) -> HashComponent {
    let refreshable = RefreshableSource::new(
        cache_dir.join(file_name),
        source.hash_list_url.clone(),
        staleness,
        timeout,
        max_size,
        client.clone(),
    );
    let storage = Arc::new(HashStorage::new());
    let result_cache = Arc::new(ResultCache::new(cache_size));
    let filter = Arc::new(HashPrefixFilter::new(
        storage.clone(),
        source.replacement_host.clone(),
        list_id,
        resolver,
        result_cache.clone(),
    ));
    HashComponent {
        source: refreshable,
        storage,
        filter,
        result_cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use filterdns_application::ports::{AddressFamily, CollectingErrorCollector, ErrorCollectorPort, NoopMetrics};
    use filterdns_application::{FilterContextInput, FilterSettings};
    use filterdns_domain::config::{CacheConfig, RefreshConfig, SourceUrls};
    use filterdns_domain::BlockedServiceId;
    use std::net::IpAddr;

    struct NullResolver;

    #[async_trait]
    impl Resolver for NullResolver {
        async fn lookup_ip(&self, _family: AddressFamily, _host: &str) -> Result<Vec<IpAddr>, FilterError> {
            Ok(vec!["127.0.0.1".parse().unwrap()])
        }
    }

    /// Unreachable URLs paired with pre-seeded on-disk caches: `refresh(true)`
    /// (`acceptStale`) serves the seeded text without touching the network,
    /// the same pattern `refreshable_source`'s own tests use.
    fn config(cache_dir: &std::path::Path, unreachable: &str) -> FilteringConfig {
        FilteringConfig {
            refresh: RefreshConfig {
                refresh_interval: std::time::Duration::from_secs(3600),
                index_refresh_timeout: std::time::Duration::from_secs(5),
                rule_list_refresh_timeout: std::time::Duration::from_secs(5),
                max_rule_list_size: 1024 * 1024,
            },
            cache: CacheConfig::default(),
            sources: SourceUrls {
                filter_index_url: unreachable.to_string(),
                blocked_service_index_url: unreachable.to_string(),
                general_safe_search_rules_url: unreachable.to_string(),
                youtube_safe_search_rules_url: unreachable.to_string(),
                safe_browsing: None,
                adult_blocking: None,
                newly_registered_domains: None,
            },
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    fn storage_with_seeded_caches(dir: &std::path::Path, filters_json: &str, errors: Arc<dyn ErrorCollectorPort>) -> Storage {
        std::fs::write(dir.join("filters.json"), filters_json).unwrap();
        std::fs::write(dir.join("services.json"), r#"{"blocked_services":[]}"#).unwrap();
        std::fs::write(dir.join("general_safe_search.txt"), "# empty\n").unwrap();
        std::fs::write(dir.join("youtube_safe_search.txt"), "# empty\n").unwrap();
        std::fs::write(dir.join("fl1"), "||example.com^\n").unwrap();

        Storage::new(
            config(dir, "http://127.0.0.1:0/unreachable"),
            reqwest::Client::new(),
            Arc::new(NullResolver),
            Arc::new(NoopMetrics),
            errors,
        )
    }

    #[tokio::test]
    async fn refresh_initial_installs_rule_lists_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let filters_json = r#"{"filters":[{"filterId":"fl1","downloadUrl":"http://127.0.0.1:0/fl1"}]}"#;
        let storage = storage_with_seeded_caches(
            dir.path(),
            filters_json,
            Arc::new(CollectingErrorCollector::new()),
        );

        storage.refresh_initial().await.unwrap();

        let fl1 = FilterListId::new("fl1").unwrap();
        assert!(storage.has_list_id(&fl1));

        let ctx = FilterContextInput {
            profile_id: None,
            profile: None,
            group: FilterSettings {
                rule_list_ids: vec![fl1],
                ..Default::default()
            },
        };
        let composite = storage.filter_from_context(&ctx, chrono::Utc::now());
        assert_eq!(composite.rule_lists.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_filter_id_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let filters_json = r#"{"filters":[
            {"filterId":"fl1","downloadUrl":"http://127.0.0.1:0/a"},
            {"filterId":"fl1","downloadUrl":"http://127.0.0.1:0/b"}
        ]}"#;
        let errors = Arc::new(CollectingErrorCollector::new());
        let storage = storage_with_seeded_caches(dir.path(), filters_json, errors.clone());

        storage.refresh_initial().await.unwrap();
        let reported = errors.drain();
        assert!(reported.iter().any(|(id, msg)| id == "fl1" && msg.contains("duplicate")));
    }

    #[tokio::test]
    async fn missing_profile_falls_back_to_group_and_gates_blocked_services_on_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let filters_json = r#"{"filters":[]}"#;
        let storage = storage_with_seeded_caches(
            dir.path(),
            filters_json,
            Arc::new(CollectingErrorCollector::new()),
        );
        storage.refresh_initial().await.unwrap();

        let mut schedule = filterdns_domain::WeeklySchedule::default();
        let now = chrono::Utc::now();
        use chrono::Datelike;
        let weekday = now.weekday().num_days_from_sunday() as usize;
        schedule.days[weekday] = vec![filterdns_domain::DayInterval::new(0, 1440).unwrap()];

        let ctx = FilterContextInput {
            profile_id: None,
            profile: None,
            group: FilterSettings {
                blocked_service_ids: vec![BlockedServiceId::new("youtube").unwrap()],
                parental_control_schedule: Some(schedule),
                ..Default::default()
            },
        };
        let composite = storage.filter_from_context(&ctx, now);
        assert!(composite.blocked_services.is_empty());
    }

    #[tokio::test]
    async fn parental_control_pause_also_suppresses_adult_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let filters_json = r#"{"filters":[]}"#;
        std::fs::write(dir.path().join("filters.json"), filters_json).unwrap();
        std::fs::write(dir.path().join("services.json"), r#"{"blocked_services":[]}"#).unwrap();
        std::fs::write(dir.path().join("general_safe_search.txt"), "# empty\n").unwrap();
        std::fs::write(dir.path().join("youtube_safe_search.txt"), "# empty\n").unwrap();
        std::fs::write(dir.path().join("adult_blocking.txt"), "\n").unwrap();

        let mut cfg = config(dir.path(), "http://127.0.0.1:0/unreachable");
        cfg.sources.adult_blocking = Some(filterdns_domain::config::HashListSource {
            hash_list_url: "http://127.0.0.1:0/unreachable".to_string(),
            replacement_host: "replacement.example.net".to_string(),
        });
        let storage = Storage::new(
            cfg,
            reqwest::Client::new(),
            Arc::new(NullResolver),
            Arc::new(NoopMetrics),
            Arc::new(CollectingErrorCollector::new()),
        );
        storage.refresh_initial().await.unwrap();

        let mut schedule = filterdns_domain::WeeklySchedule::default();
        let now = chrono::Utc::now();
        use chrono::Datelike;
        let weekday = now.weekday().num_days_from_sunday() as usize;
        schedule.days[weekday] = vec![filterdns_domain::DayInterval::new(0, 1440).unwrap()];

        let ctx = FilterContextInput {
            profile_id: None,
            profile: None,
            group: FilterSettings {
                adult_blocking_enabled: true,
                parental_control_schedule: Some(schedule),
                ..Default::default()
            },
        };
        let composite = storage.filter_from_context(&ctx, now);
        assert!(composite.adult_blocking.is_none());
    }
}
