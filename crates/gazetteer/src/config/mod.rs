use crate::{error::GazetteerError, options::SearchOptions};

/// Feature codes searched when the caller does not choose, most important first.
pub const DEFAULT_FEATURES: [&str; 17] = [
    "PPLC", "ADMD", "PPLA", "PPLA2", "PPLA3", "PPLG", "PPL", "ADM2", "ISL", "PPLX", "POST", "AIRP",
    "HBR", "SKI", "MT", "MTS", "PRK",
];

/// Values accepted where a list of codes is expected: a comma-separated string or a list.
pub trait IntoCodeList {
    fn into_code_list(self) -> Vec<String>;
}

impl IntoCodeList for &str {
    fn into_code_list(self) -> Vec<String> {
        self.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

impl IntoCodeList for String {
    fn into_code_list(self) -> Vec<String> {
        self.as_str().into_code_list()
    }
}

impl<S: AsRef<str>> IntoCodeList for &[S] {
    fn into_code_list(self) -> Vec<String> {
        self.iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl<S: AsRef<str>> IntoCodeList for Vec<S> {
    fn into_code_list(self) -> Vec<String> {
        self.as_slice().into_code_list()
    }
}

impl<S: AsRef<str>, const N: usize> IntoCodeList for [S; N] {
    fn into_code_list(self) -> Vec<String> {
        self.as_slice().into_code_list()
    }
}

/// Builder for [`SearchOptions`] with the gazetteer's customary defaults
#[derive(Debug, Clone)]
pub struct SearchOptionsBuilder {
    options: SearchOptions,
}

impl Default for SearchOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchOptionsBuilder {
    /// Finnish places in Finnish, up to 100 results
    pub fn new() -> Self {
        Self {
            options: SearchOptions {
                countries: vec!["fi".to_string()],
                excluded_countries: Vec::new(),
                features: DEFAULT_FEATURES.iter().map(ToString::to_string).collect(),
                keywords: Vec::new(),
                language: "fi".to_string(),
                charset: "utf8".to_string(),
                collation: gazetteer_store::Collation::GENERAL_NAME.to_string(),
                auto_collation: false,
                autocomplete: false,
                full_country_search: false,
                search_variants: true,
                result_limit: 100,
                population_min: 0,
                population_max: 0,
                name_type: String::new(),
            },
        }
    }

    /// Every country and every feature class
    pub fn global() -> Self {
        Self::new().countries("all").features("all")
    }

    /// Prefix search for type-ahead input
    pub fn for_autocomplete() -> Self {
        Self::new().autocomplete(true).limit(20)
    }

    /// Countries to search, highest priority first. `%` or `all` searches everywhere.
    pub fn countries(mut self, countries: impl IntoCodeList) -> Self {
        self.options.countries = countries.into_code_list();
        self
    }

    pub fn excluded_countries(mut self, countries: impl IntoCodeList) -> Self {
        self.options.excluded_countries = countries.into_code_list();
        self
    }

    /// Feature codes to search, highest priority first. `%` or `all` accepts any feature.
    pub fn features(mut self, features: impl IntoCodeList) -> Self {
        self.options.features = features.into_code_list();
        self
    }

    pub fn keywords(mut self, keywords: impl IntoCodeList) -> Self {
        self.options.keywords = keywords.into_code_list();
        self
    }

    /// Language of the returned names
    pub fn language(mut self, language: &str) -> Self {
        self.options.language = language.trim().to_lowercase();
        self
    }

    /// `utf8`, `latin1` or `ascii`
    pub fn charset(mut self, charset: &str) -> Self {
        self.options.charset = charset.trim().to_lowercase();
        self
    }

    pub fn collation(mut self, collation: &str) -> Self {
        self.options.collation = collation.to_string();
        self
    }

    /// Pick the collation from the language instead of the configured one
    pub fn auto_collation(mut self, enabled: bool) -> Self {
        self.options.auto_collation = enabled;
        self
    }

    pub fn autocomplete(mut self, enabled: bool) -> Self {
        self.options.autocomplete = enabled;
        self
    }

    /// Retry over all countries when the restricted name search finds nothing
    pub fn full_country_search(mut self, enabled: bool) -> Self {
        self.options.full_country_search = enabled;
        self
    }

    /// Match alternate names as well as stored names
    pub fn search_variants(mut self, enabled: bool) -> Self {
        self.options.search_variants = enabled;
        self
    }

    /// Set the maximum number of results to return, `0` for no limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.result_limit = limit;
        self
    }

    /// Smallest population accepted, `0` disables the bound
    pub fn population_min(mut self, population: u32) -> Self {
        self.options.population_min = population;
        self
    }

    /// Largest population accepted, `0` disables the bound
    pub fn population_max(mut self, population: u32) -> Self {
        self.options.population_max = population;
        self
    }

    /// Treat name searches as external identifier lookups (`fmisid`, `wmo`, `lpnn`)
    pub fn name_type(mut self, name_type: &str) -> Self {
        self.options.name_type = name_type.trim().to_lowercase();
        self
    }

    /// Build the final options
    pub fn build(self) -> SearchOptions {
        self.options
    }
}

/// Engine-wide tuning that does not change per call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EngineConfig {
    /// Most codes resolved by one store request
    pub max_batch_size: usize,
    /// Extra rows requested from the store's approximate nearest-neighbour ordering
    pub coordinate_safety_margin: usize,
    /// Populations above this rank by size, smaller ones share one bucket
    pub notable_population: u32,
    pub default_radius_km: f64,
    /// Ids at or above this are retried negated when not found
    pub negative_id_threshold: i64,
    /// Priority of countries and features not in the requested lists
    pub unlisted_priority: u32,
    /// External id type attached to records when the options name none
    pub default_external_id_type: String,
    /// Canonical-only language codes added on every language table load
    pub special_codes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            coordinate_safety_margin: 10,
            notable_population: 50_000,
            default_radius_km: 50.0,
            negative_id_threshold: 10_000_000,
            unlisted_priority: 1000,
            default_external_id_type: "fmisid".to_string(),
            special_codes: ["fmisid", "wmo", "lpnn"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), GazetteerError> {
        if self.max_batch_size == 0 {
            return Err(GazetteerError::ConfigError(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if !self.default_radius_km.is_finite() || self.default_radius_km < 0.0 {
            return Err(GazetteerError::ConfigError(format!(
                "default_radius_km must be a non-negative number, got {}",
                self.default_radius_km
            )));
        }
        if self.negative_id_threshold <= 0 {
            return Err(GazetteerError::ConfigError(format!(
                "negative_id_threshold must be positive, got {}",
                self.negative_id_threshold
            )));
        }
        if self.unlisted_priority == 0 {
            return Err(GazetteerError::ConfigError(
                "unlisted_priority must be above every listed position".to_string(),
            ));
        }
        if self.default_external_id_type.trim().is_empty() {
            return Err(GazetteerError::ConfigError(
                "default_external_id_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    pub fn coordinate_safety_margin(mut self, margin: usize) -> Self {
        self.config.coordinate_safety_margin = margin;
        self
    }

    pub fn notable_population(mut self, population: u32) -> Self {
        self.config.notable_population = population;
        self
    }

    pub fn default_radius_km(mut self, radius: f64) -> Self {
        self.config.default_radius_km = radius;
        self
    }

    pub fn negative_id_threshold(mut self, threshold: i64) -> Self {
        self.config.negative_id_threshold = threshold;
        self
    }

    pub fn unlisted_priority(mut self, priority: u32) -> Self {
        self.config.unlisted_priority = priority;
        self
    }

    pub fn default_external_id_type(mut self, name_type: &str) -> Self {
        self.config.default_external_id_type = name_type.to_lowercase();
        self
    }

    pub fn special_codes(mut self, codes: impl IntoCodeList) -> Self {
        self.config.special_codes = codes.into_code_list();
        self
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<EngineConfig, GazetteerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
