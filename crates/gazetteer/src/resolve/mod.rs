//! Bulk resolution of the codes referenced by a page of place rows.
//!
//! A result set references countries, feature codes, municipalities, administrative
//! areas and, for localisation, the places themselves. Each category is resolved with one
//! store request per chunk of at most [`EngineConfig::max_batch_size`] distinct keys, and
//! the answers are kept in [`ResolutionCaches`] for the rest of the call.
//!
//! Resolution never fails the whole call for a bad code: a category whose request fails is
//! logged and left empty, so the affected names come out blank. Only an unreachable or
//! cancelled store aborts.

use std::{fmt::Display, hash::Hash, time::Instant};

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use gazetteer_store::{CancelSignal, DataStore, StoreError, StoreRequest, columns};
use itertools::Itertools;
use polars::prelude::*;
use tracing::{debug, instrument, warn};

use crate::{
    EngineConfig, SearchOptions,
    assemble::PlaceRow,
    error::{GazetteerError, Result},
};

/// Per-call lookups from codes to display names.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCaches {
    /// Upper-case ISO-2 code to country name.
    pub countries: HashMap<String, String>,
    pub features: HashMap<String, String>,
    pub municipalities: HashMap<i64, String>,
    /// Lower-case `iso2.admin1` to administrative area name.
    pub admins: HashMap<String, String>,
    /// Place id to its name in the requested language.
    pub variants: HashMap<i64, String>,
    pub external_ids: HashMap<i64, String>,
}

/// A key column of a resolution response.
trait ResolutionKey: Clone + Eq + Hash + Display {
    fn read(column: &Column) -> PolarsResult<Vec<Option<Self>>>;
}

impl ResolutionKey for String {
    fn read(column: &Column) -> PolarsResult<Vec<Option<Self>>> {
        Ok(column
            .str()?
            .into_iter()
            .map(|v| v.map(ToString::to_string))
            .collect())
    }
}

impl ResolutionKey for i64 {
    fn read(column: &Column) -> PolarsResult<Vec<Option<Self>>> {
        Ok(column.i64()?.into_iter().collect())
    }
}

fn key_name_pairs<K: ResolutionKey>(df: &DataFrame) -> PolarsResult<Vec<(K, String)>> {
    let keys = K::read(df.column(columns::KEY)?)?;
    let names = df.column(columns::NAME)?.str()?;
    Ok(keys
        .into_iter()
        .zip(names)
        .filter_map(|(key, name)| Some((key?, name?.to_string())))
        .collect())
}

/// Distinct values in first-seen order.
fn distinct<K: Clone + Eq + Hash>(values: impl IntoIterator<Item = K>) -> Vec<K> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Resolves the codes of one call against a store.
pub struct BatchResolver<'a, S: DataStore + ?Sized> {
    store: &'a mut S,
    cancel: &'a CancelSignal,
    config: &'a EngineConfig,
    caches: ResolutionCaches,
}

impl<'a, S: DataStore + ?Sized> BatchResolver<'a, S> {
    pub fn new(store: &'a mut S, cancel: &'a CancelSignal, config: &'a EngineConfig) -> Self {
        Self {
            store,
            cancel,
            config,
            caches: ResolutionCaches::default(),
        }
    }

    pub fn caches(&self) -> &ResolutionCaches {
        &self.caches
    }

    pub fn into_caches(self) -> ResolutionCaches {
        self.caches
    }

    /// Resolve every category referenced by `rows`.
    ///
    /// `languages` is the equivalence class of the requested language; `search_word` is
    /// the pattern localized names must match in autocomplete mode.
    #[instrument(name = "Resolve place references", level = "debug", skip_all, fields(rows = rows.len()))]
    pub fn resolve_all(
        &mut self,
        rows: &[PlaceRow],
        options: &SearchOptions,
        languages: &[String],
        search_word: &str,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let t = Instant::now();
        let rows: Vec<&PlaceRow> = rows.iter().filter(|r| r.timezone.is_some()).collect();

        self.resolve_countries(distinct(rows.iter().filter_map(|r| r.iso2.clone())), languages)?;
        self.resolve_features(distinct(
            rows.iter().filter_map(|r| r.features_code.clone()),
        ))?;
        self.resolve_municipalities(
            distinct(rows.iter().filter_map(|r| r.municipalities_id)),
            options.language(),
            languages,
        )?;
        self.resolve_admins(distinct(
            rows.iter()
                .filter(|r| r.needs_admin_name())
                .filter_map(|r| r.admin_key()),
        ))?;
        if !languages.is_empty() {
            let pattern = options.autocomplete().then(|| search_word.to_string());
            self.resolve_variants(
                distinct(
                    rows.iter()
                        .filter(|r| r.override_name.is_none())
                        .map(|r| r.id),
                ),
                languages,
                pattern,
            )?;
        }
        let name_type = if options.name_type().is_empty() {
            self.config.default_external_id_type.clone()
        } else {
            options.name_type().to_string()
        };
        self.resolve_external_ids(distinct(rows.iter().map(|r| r.id)), &name_type)?;

        debug!(elapsed = ?t.elapsed(), "Place references resolved");
        Ok(())
    }

    /// Run one request per chunk and collect `(key, name)` pairs in response order.
    ///
    /// A failing chunk is skipped unless the store is gone.
    fn fetch<K: ResolutionKey>(
        &mut self,
        keys: &[K],
        make_request: impl Fn(Vec<K>) -> StoreRequest,
    ) -> Result<Vec<(K, String)>> {
        let mut pairs = Vec::new();
        for chunk in keys.chunks(self.config.max_batch_size) {
            let request = make_request(chunk.to_vec());
            let operation = request.operation();
            let response = self
                .store
                .execute_read(&request, self.cancel)
                .and_then(|df| key_name_pairs::<K>(&df).map_err(StoreError::from));
            match response {
                Ok(found) => pairs.extend(found),
                Err(e) if e.is_fatal() => {
                    return Err(GazetteerError::store(
                        operation,
                        chunk.iter().join(","),
                        e,
                    ));
                }
                Err(e) => {
                    warn!(
                        operation,
                        keys = chunk.len(),
                        error = %e,
                        "Resolution request failed, names left empty"
                    );
                }
            }
        }
        Ok(pairs)
    }

    /// Merge pairs into a cache, keeping the first name seen for a key.
    fn merge<K: Eq + Hash>(cache: &mut HashMap<K, String>, pairs: Vec<(K, String)>) {
        for (key, name) in pairs {
            cache.entry(key).or_insert(name);
        }
    }

    fn missing<K: Clone + Eq + Hash>(cache: &HashMap<K, String>, keys: Vec<K>) -> Vec<K> {
        keys.into_iter().filter(|k| !cache.contains_key(k)).collect()
    }

    /// Localized country names, falling back to the base country table per country.
    #[instrument(name = "Resolve countries", level = "debug", skip_all, fields(codes = codes.len()))]
    pub fn resolve_countries(&mut self, codes: Vec<String>, languages: &[String]) -> Result<()> {
        let codes = Self::missing(&self.caches.countries, codes);
        if codes.is_empty() {
            return Ok(());
        }
        if !languages.is_empty() {
            let pairs = self.fetch(&codes, |iso2| StoreRequest::CountryVariants {
                iso2,
                languages: languages.to_vec(),
            })?;
            Self::merge(&mut self.caches.countries, pairs);
        }
        let unresolved = Self::missing(&self.caches.countries, codes);
        if !unresolved.is_empty() {
            let pairs = self.fetch(&unresolved, |iso2| StoreRequest::CountryNames { iso2 })?;
            Self::merge(&mut self.caches.countries, pairs);
        }
        Ok(())
    }

    #[instrument(name = "Resolve features", level = "debug", skip_all, fields(codes = codes.len()))]
    pub fn resolve_features(&mut self, codes: Vec<String>) -> Result<()> {
        let codes = Self::missing(&self.caches.features, codes);
        if codes.is_empty() {
            return Ok(());
        }
        let pairs = self.fetch(&codes, |codes| StoreRequest::FeatureDescriptions { codes })?;
        Self::merge(&mut self.caches.features, pairs);
        Ok(())
    }

    /// Municipality names, replaced by the localized name for languages other than Finnish.
    #[instrument(name = "Resolve municipalities", level = "debug", skip_all, fields(ids = ids.len()))]
    pub fn resolve_municipalities(
        &mut self,
        ids: Vec<i64>,
        language: &str,
        languages: &[String],
    ) -> Result<()> {
        let ids = Self::missing(&self.caches.municipalities, ids);
        if ids.is_empty() {
            return Ok(());
        }
        let pairs = self.fetch(&ids, |ids| StoreRequest::MunicipalityNames { ids })?;
        Self::merge(&mut self.caches.municipalities, pairs);

        if language.is_empty() || language == "fi" || languages.is_empty() {
            return Ok(());
        }
        let pairs = self.fetch(&ids, |ids| StoreRequest::MunicipalityVariants {
            ids,
            languages: languages.to_vec(),
        })?;
        let mut localized = HashMap::new();
        Self::merge(&mut localized, pairs);
        self.caches.municipalities.extend(localized);
        Ok(())
    }

    #[instrument(name = "Resolve administrative areas", level = "debug", skip_all, fields(keys = keys.len()))]
    pub fn resolve_admins(&mut self, keys: Vec<String>) -> Result<()> {
        let keys = Self::missing(&self.caches.admins, keys);
        if keys.is_empty() {
            return Ok(());
        }
        let pairs = self.fetch(&keys, |keys| StoreRequest::AdminNames { keys })?;
        Self::merge(&mut self.caches.admins, pairs);
        Ok(())
    }

    /// Most preferred alternate name per place in the requested language.
    #[instrument(name = "Resolve name variants", level = "debug", skip_all, fields(ids = ids.len()))]
    pub fn resolve_variants(
        &mut self,
        ids: Vec<i64>,
        languages: &[String],
        pattern: Option<String>,
    ) -> Result<()> {
        let ids = Self::missing(&self.caches.variants, ids);
        if ids.is_empty() {
            return Ok(());
        }
        let pairs = self.fetch(&ids, |ids| StoreRequest::NameVariants {
            ids,
            languages: languages.to_vec(),
            pattern: pattern.clone(),
        })?;
        Self::merge(&mut self.caches.variants, pairs);
        Ok(())
    }

    #[instrument(name = "Resolve external ids", level = "debug", skip_all, fields(ids = ids.len()))]
    pub fn resolve_external_ids(&mut self, ids: Vec<i64>, name_type: &str) -> Result<()> {
        let ids = Self::missing(&self.caches.external_ids, ids);
        if ids.is_empty() {
            return Ok(());
        }
        let pairs = self.fetch(&ids, |ids| StoreRequest::ExternalIds {
            ids,
            name_type: name_type.to_string(),
        })?;
        Self::merge(&mut self.caches.external_ids, pairs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gazetteer_store::{FrameStore, test_data};

    use super::*;
    use crate::SearchOptionsBuilder;

    /// Counts requests per operation and fails the ones it is told to.
    struct CountingStore {
        inner: FrameStore,
        requests: Vec<&'static str>,
        failing: Option<StoreError>,
        fail_operation: &'static str,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: FrameStore::new(test_data::sample_tables().unwrap()),
                requests: Vec::new(),
                failing: None,
                fail_operation: "",
            }
        }

        fn count(&self, operation: &str) -> usize {
            self.requests.iter().filter(|o| **o == operation).count()
        }
    }

    impl DataStore for CountingStore {
        fn execute_read(
            &mut self,
            request: &StoreRequest,
            cancel: &CancelSignal,
        ) -> gazetteer_store::Result<DataFrame> {
            self.requests.push(request.operation());
            if request.operation() == self.fail_operation {
                return Err(match &self.failing {
                    Some(StoreError::Connection(m)) => StoreError::Connection(m.clone()),
                    _ => StoreError::Query {
                        operation: request.operation(),
                        message: "relation does not exist".into(),
                    },
                });
            }
            self.inner.execute_read(request, cancel)
        }
    }

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_chunks_never_exceed_batch_size() {
        let mut store = CountingStore::new();
        let cancel = CancelSignal::new();
        let config = EngineConfig {
            max_batch_size: 2,
            ..EngineConfig::default()
        };
        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver
            .resolve_features(codes(&["PPLC", "PPL", "PPLX", "AIRP", "ISL"]))
            .unwrap();
        assert_eq!(resolver.caches().features.len(), 5);
        assert_eq!(resolver.caches().features["AIRP"], "airport");
        assert_eq!(store.count("feature_descriptions"), 3);
    }

    #[test]
    fn test_cached_codes_are_not_requested_again() {
        let mut store = CountingStore::new();
        let cancel = CancelSignal::new();
        let config = EngineConfig::default();
        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver.resolve_features(codes(&["PPLC"])).unwrap();
        resolver.resolve_features(codes(&["PPLC"])).unwrap();
        resolver.resolve_features(codes(&["PPLC", "PPL"])).unwrap();
        drop(resolver);
        assert_eq!(store.count("feature_descriptions"), 2);
    }

    #[test]
    fn test_country_names_fall_back_to_base_table() {
        let mut store = CountingStore::new();
        let cancel = CancelSignal::new();
        let config = EngineConfig::default();
        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver
            .resolve_countries(codes(&["FI", "PL", "SE"]), &codes(&["fin", "fi"]))
            .unwrap();
        let countries = &resolver.caches().countries;
        // the preferred Finnish name wins over the longer official one
        assert_eq!(countries["FI"], "Suomi");
        assert_eq!(countries["SE"], "Ruotsi");
        assert_eq!(countries["PL"], "Poland");
        drop(resolver);
        assert_eq!(store.count("country_variants"), 1);
        assert_eq!(store.count("country_names"), 1);
    }

    #[test]
    fn test_municipalities_are_localized_outside_finnish() {
        let mut store = CountingStore::new();
        let cancel = CancelSignal::new();
        let config = EngineConfig::default();

        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver
            .resolve_municipalities(vec![91, 398], "sv", &codes(&["swe", "sv"]))
            .unwrap();
        assert_eq!(resolver.caches().municipalities[&91], "Helsingfors");
        assert_eq!(resolver.caches().municipalities[&398], "Lahti");

        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver
            .resolve_municipalities(vec![91], "fi", &codes(&["fin", "fi"]))
            .unwrap();
        assert_eq!(resolver.caches().municipalities[&91], "Helsinki");
        drop(resolver);
        assert_eq!(store.count("municipality_variants"), 1);
    }

    #[test]
    fn test_resolve_all_batches_by_category() {
        let mut store = CountingStore::new();
        let df = store
            .inner
            .execute_read(
                &StoreRequest::Places(gazetteer_store::PlaceQuery::new(
                    gazetteer_store::PlaceMode::Name {
                        pattern: "Kumpula".into(),
                        variants: None,
                    },
                )),
                &CancelSignal::new(),
            )
            .unwrap();
        let rows = PlaceRow::from_df(&df).unwrap();
        assert_eq!(rows.len(), 8);

        let options = SearchOptionsBuilder::new().language("sv").build();
        let cancel = CancelSignal::new();
        let config = EngineConfig::default();
        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver
            .resolve_all(&rows, &options, &codes(&["swe", "sv"]), "Kumpula")
            .unwrap();
        let caches = resolver.into_caches();

        assert_eq!(caches.countries["FI"], "Finland");
        assert_eq!(caches.variants[&test_data::KUMPULA_HELSINKI], "Gumtäkt");
        assert_eq!(caches.external_ids[&test_data::KUMPULA_HELSINKI], "101004");
        assert_eq!(caches.admins["fi.15"], "Pohjois-Savo");
        assert_eq!(caches.admins.len(), 1);
        for operation in [
            "country_variants",
            "feature_descriptions",
            "municipality_names",
            "municipality_variants",
            "admin_names",
            "name_variants",
            "external_ids",
        ] {
            assert_eq!(store.count(operation), 1, "{operation}");
        }
    }

    #[test]
    fn test_failed_category_degrades_to_empty_names() {
        let mut store = CountingStore::new();
        store.fail_operation = "feature_descriptions";
        let cancel = CancelSignal::new();
        let config = EngineConfig::default();
        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        resolver.resolve_features(codes(&["PPLC"])).unwrap();
        assert!(resolver.caches().features.is_empty());
        resolver.resolve_admins(codes(&["fi.01"])).unwrap();
        assert_eq!(resolver.caches().admins["fi.01"], "Uusimaa");
    }

    #[test]
    fn test_connection_failure_aborts() {
        let mut store = CountingStore::new();
        store.fail_operation = "admin_names";
        store.failing = Some(StoreError::Connection("server closed the connection".into()));
        let cancel = CancelSignal::new();
        let config = EngineConfig::default();
        let mut resolver = BatchResolver::new(&mut store, &cancel, &config);
        let err = resolver.resolve_admins(codes(&["fi.01", "fi.15"])).unwrap_err();
        assert!(err.is_connection_failure());
        let GazetteerError::Store {
            operation, input, ..
        } = err
        else {
            panic!("expected a store error");
        };
        assert_eq!(operation, "admin_names");
        assert_eq!(input, "fi.01,fi.15");
    }

    #[test]
    fn test_first_seen_name_wins_across_chunks() {
        let mut cache = HashMap::new();
        BatchResolver::<FrameStore>::merge(
            &mut cache,
            vec![
                (1_i64, "Prag".to_string()),
                (1, "Prague".to_string()),
                (2, "Tukholma".to_string()),
            ],
        );
        BatchResolver::<FrameStore>::merge(&mut cache, vec![(2, "Stockholm".to_string())]);
        assert_eq!(cache[&1], "Prag");
        assert_eq!(cache[&2], "Tukholma");
        assert_eq!(distinct([3, 1, 3, 2, 1]), [3, 1, 2]);
    }
}
