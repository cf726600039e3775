//! The [`GazetteerEngine`] facade.
//!
//! An engine owns one data store and runs every request on it synchronously. Operations
//! take `&mut self`, so one engine serves one caller at a time; run one engine per worker
//! to search in parallel. The language table is shared between engines through a
//! [`SharedLanguageTable`] and can be reloaded by any of them while others keep searching.
//!
//! ```rust
//! use gazetteer::{GazetteerEngine, SearchOptionsBuilder};
//! use gazetteer_store::{FrameStore, test_data};
//!
//! let store = FrameStore::new(test_data::sample_tables()?);
//! let mut engine = GazetteerEngine::initialize(store)?;
//!
//! let options = SearchOptionsBuilder::new().build();
//! let places = engine.fetch_by_name(&options, "Helsinki")?;
//! assert_eq!(places[0].country, "Suomi");
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::time::Instant;

use gazetteer_store::{CancelSignal, DataStore, PlaceQuery, StoreRequest, columns};
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument};

use crate::{
    EngineConfig, SearchOptions,
    assemble::{LocationAssembler, LocationRecord, PlaceRow},
    error::{GazetteerError, Result},
    language::{LanguageCodeTable, SharedLanguageTable},
    query::RankingQueryBuilder,
    resolve::BatchResolver,
};

/// Search entry point over one data store.
pub struct GazetteerEngine<S: DataStore> {
    store: S,
    languages: SharedLanguageTable,
    config: EngineConfig,
    cancel: CancelSignal,
}

impl<S: DataStore> std::fmt::Debug for GazetteerEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GazetteerEngine")
            .field("languages", &self.languages)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<S: DataStore> GazetteerEngine<S> {
    /// An engine reading the process-wide language table with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            languages: SharedLanguageTable::global(),
            config: EngineConfig::default(),
            cancel: CancelSignal::new(),
        }
    }

    /// Like [`Self::new`], then load the language table from the store.
    #[instrument(name = "Initialize GazetteerEngine", level = "info", skip_all)]
    pub fn initialize(store: S) -> Result<Self> {
        let mut engine = Self::new(store);
        let special_codes = engine.config.special_codes.clone();
        engine.reload_language_table(&special_codes)?;
        Ok(engine)
    }

    /// Use `languages` instead of the process-wide table.
    pub fn with_languages(mut self, languages: SharedLanguageTable) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Forward `cancel` to every store request.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn languages(&self) -> &SharedLanguageTable {
        &self.languages
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn read(&mut self, request: &StoreRequest, input: &str) -> Result<DataFrame> {
        self.store
            .execute_read(request, &self.cancel)
            .map_err(|e| GazetteerError::store(request.operation(), input, e))
    }

    /// Run a place query, resolve what it references and assemble the records.
    fn locations(
        &mut self,
        options: &SearchOptions,
        table: &LanguageCodeTable,
        query: PlaceQuery,
        input: &str,
        search_word: &str,
        area: Option<&str>,
    ) -> Result<(Vec<LocationRecord>, usize)> {
        let df = self.read(&StoreRequest::Places(query), input)?;
        let rows = PlaceRow::from_df(&df)?;
        if rows.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let languages = if options.language().is_empty() {
            Vec::new()
        } else {
            table.codes(options.language())
        };
        let mut resolver = BatchResolver::new(&mut self.store, &self.cancel, &self.config);
        resolver.resolve_all(&rows, options, &languages, search_word)?;
        let caches = resolver.into_caches();

        let records = LocationAssembler::new(options).assemble(&rows, &caches, search_word, area);
        Ok((records, rows.len()))
    }

    fn search_name(
        &mut self,
        options: &SearchOptions,
        search_word: &str,
        area: Option<&str>,
    ) -> Result<Vec<LocationRecord>> {
        let table = self.languages.snapshot();
        let query = RankingQueryBuilder::new(options, &self.config, &table)
            .by_name(search_word, area.is_some());
        let (records, _) = self.locations(options, &table, query, search_word, search_word, area)?;
        Ok(records)
    }

    /// Places by name, best match first.
    ///
    /// `text` may carry an area after a comma (`"Kumpula,Helsinki"`): only places whose
    /// country or administrative area has that name are kept. When nothing is found and
    /// [`SearchOptions::full_country_search`] is set, the search is retried once over
    /// every country.
    #[instrument(name = "Fetch by name", level = "info", skip(self, options))]
    pub fn fetch_by_name(
        &mut self,
        options: &SearchOptions,
        text: &str,
    ) -> Result<Vec<LocationRecord>> {
        let t = Instant::now();
        let (search_word, area) = match text.split_once(',') {
            Some((word, area)) => (word.trim(), Some(area.trim()).filter(|a| !a.is_empty())),
            None => (text.trim(), None),
        };
        if search_word.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = self.search_name(options, search_word, area)?;
        if records.is_empty() && options.full_country_search() && !options.all_countries() {
            info!(search_word, "No matches in requested countries, searching all countries");
            records = self.search_name(&options.with_all_countries(), search_word, area)?;
        }

        info!(results = records.len(), elapsed = ?t.elapsed(), "Name search complete");
        Ok(records)
    }

    /// Places nearest to a point, closest first.
    ///
    /// `radius_km` of `None` uses [`EngineConfig::default_radius_km`]; zero or less searches
    /// without a distance limit.
    #[instrument(name = "Fetch by coordinate", level = "info", skip(self, options, radius_km))]
    pub fn fetch_by_coordinate(
        &mut self,
        options: &SearchOptions,
        lon: f64,
        lat: f64,
        radius_km: impl Into<Option<f64>>,
    ) -> Result<Vec<LocationRecord>> {
        let t = Instant::now();
        let radius_km = radius_km.into().unwrap_or(self.config.default_radius_km);
        let table = self.languages.snapshot();
        let query = RankingQueryBuilder::new(options, &self.config, &table)
            .by_coordinate(lon, lat, radius_km);
        let input = format!("{lon},{lat}");
        let (records, _) = self.locations(options, &table, query, &input, "", None)?;

        info!(results = records.len(), radius_km, elapsed = ?t.elapsed(), "Coordinate search complete");
        Ok(records)
    }

    /// [`Self::fetch_by_coordinate`] with latitude first.
    pub fn fetch_by_lat_lon(
        &mut self,
        options: &SearchOptions,
        lat: f64,
        lon: f64,
        radius_km: impl Into<Option<f64>>,
    ) -> Result<Vec<LocationRecord>> {
        self.fetch_by_coordinate(options, lon, lat, radius_km)
    }

    /// The place with `id`, if any.
    ///
    /// Ids at or above [`EngineConfig::negative_id_threshold`] that are not found are
    /// retried once negated.
    #[instrument(name = "Fetch by id", level = "info", skip(self, options))]
    pub fn fetch_by_id(&mut self, options: &SearchOptions, id: i64) -> Result<Vec<LocationRecord>> {
        let table = self.languages.snapshot();
        let query = RankingQueryBuilder::new(options, &self.config, &table).by_id(id);
        let (records, found) = self.locations(options, &table, query, &id.to_string(), "", None)?;
        if found > 0 || id < self.config.negative_id_threshold {
            return Ok(records);
        }

        // the threshold is positive, so the negation cannot overflow
        let negated = -id;
        info!(id, negated, "Id not found, retrying negated");
        let retry = RankingQueryBuilder::new(options, &self.config, &table).by_id(negated);
        let (records, _) = self.locations(options, &table, retry, &negated.to_string(), "", None)?;
        Ok(records)
    }

    /// Every place tagged with `keyword`, sorted by name.
    ///
    /// The result limit of `options` is ignored.
    #[instrument(name = "Fetch by keyword", level = "info", skip(self, options))]
    pub fn fetch_by_keyword(
        &mut self,
        options: &SearchOptions,
        keyword: &str,
    ) -> Result<Vec<LocationRecord>> {
        let t = Instant::now();
        let exists = self.read(
            &StoreRequest::KeywordExists {
                keyword: keyword.to_string(),
            },
            keyword,
        )?;
        if exists.height() != 1 {
            debug!(keyword, "Unknown keyword");
            return Ok(Vec::new());
        }

        let options = options.unbounded();
        let table = self.languages.snapshot();
        let query = RankingQueryBuilder::new(&options, &self.config, &table).by_keyword(keyword);
        let (records, _) = self.locations(&options, &table, query, keyword, "", None)?;

        info!(results = records.len(), elapsed = ?t.elapsed(), "Keyword search complete");
        Ok(records)
    }

    /// Number of places tagged with `keyword`.
    #[instrument(name = "Count by keyword", level = "info", skip(self, _options))]
    pub fn count_by_keyword(&mut self, _options: &SearchOptions, keyword: &str) -> Result<u64> {
        let df = self.read(
            &StoreRequest::CountKeyword {
                keyword: keyword.to_string(),
            },
            keyword,
        )?;
        let count = df
            .column(columns::COUNT)?
            .cast(&polars::prelude::DataType::Int64)?
            .i64()?
            .get(0)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Rebuild the language table from the store and publish it to every engine sharing it.
    ///
    /// Readers holding the previous table keep using it until their call finishes.
    #[instrument(name = "Reload language table", level = "info", skip_all)]
    pub fn reload_language_table(&mut self, special_codes: &[String]) -> Result<usize> {
        let table = LanguageCodeTable::load(&mut self.store, &self.cancel, special_codes)
            .map_err(|e| GazetteerError::store(StoreRequest::Languages.operation(), "", e))?;
        let languages = table.len();
        self.languages.publish(table);
        info!(languages, "Language table published");
        Ok(languages)
    }
}
