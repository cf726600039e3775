//! Translation of [`SearchOptions`] into store place queries.
//!
//! Every search mode shares one filter vocabulary and, except for proximity and keyword
//! searches, one priority ordering:
//!
//! 1. the store's own per-row priority,
//! 2. population for notable places (above [`EngineConfig::notable_population`]), zero
//!    for the rest,
//! 3. position of the row's country in the requested list, when several were requested,
//! 4. position of the row's feature code in the requested list, when several were requested,
//! 5. population, descending,
//! 6. name under the effective collation.
//!
//! A capital therefore always beats a village of the same name, and places too small to
//! be told apart by population fall back to the caller's country and feature preferences.

use gazetteer_store::{OrderKey, PlaceFilter, PlaceMode, PlaceQuery, VariantMatch};

use crate::{EngineConfig, SearchOptions, language::LanguageCodeTable};

/// Builds place queries for one call.
#[derive(Debug, Clone, Copy)]
pub struct RankingQueryBuilder<'a> {
    options: &'a SearchOptions,
    config: &'a EngineConfig,
    languages: &'a LanguageCodeTable,
}

impl<'a> RankingQueryBuilder<'a> {
    pub fn new(
        options: &'a SearchOptions,
        config: &'a EngineConfig,
        languages: &'a LanguageCodeTable,
    ) -> Self {
        Self {
            options,
            config,
            languages,
        }
    }

    /// Codes of the requested language, or none when no language is set.
    pub fn language_codes(&self) -> Vec<String> {
        if self.options.language().is_empty() {
            return Vec::new();
        }
        self.languages.codes(self.options.language())
    }

    /// Places whose name matches `search_word` (a `LIKE` pattern).
    ///
    /// With an external name type set the word is an identifier instead. When the caller
    /// will drop rows that fail an area qualifier, `qualified` keeps the store from
    /// truncating before that happens.
    pub fn by_name(&self, search_word: &str, qualified: bool) -> PlaceQuery {
        let mode = if self.options.name_type().is_empty() {
            PlaceMode::Name {
                pattern: search_word.to_string(),
                variants: self.variant_match(),
            }
        } else {
            PlaceMode::ExternalId {
                name_type: self.options.name_type().to_string(),
                value: search_word.to_string(),
            }
        };

        let mut query = self.base_query(mode);
        query.order = self.priority_order();
        if !qualified {
            query.limit = self.limit();
        }
        query
    }

    /// Nearest places first.
    ///
    /// A radius of zero or less does not limit the distance.
    pub fn by_coordinate(&self, lon: f64, lat: f64, radius_km: f64) -> PlaceQuery {
        let limit = self.limit();
        let mode = PlaceMode::Proximity {
            lon,
            lat,
            radius_km: (radius_km > 0.0).then_some(radius_km),
            candidate_limit: limit.map(|l| l + self.config.coordinate_safety_margin),
        };
        let mut query = self.base_query(mode);
        query.order = vec![OrderKey::Distance];
        query.limit = limit;
        query
    }

    /// One place by id, ignoring every filter.
    pub fn by_id(&self, id: i64) -> PlaceQuery {
        let mut query = PlaceQuery::new(PlaceMode::Id { id });
        query.collation = self.options.effective_collation().to_string();
        query
    }

    /// Every place tagged with the keyword, by name.
    pub fn by_keyword(&self, keyword: &str) -> PlaceQuery {
        let mut query = PlaceQuery::new(PlaceMode::Keyword {
            keyword: keyword.to_string(),
        });
        query.order = vec![OrderKey::Name];
        query.collation = self.options.effective_collation().to_string();
        query.limit = self.limit();
        query
    }

    fn base_query(&self, mode: PlaceMode) -> PlaceQuery {
        let mut query = PlaceQuery::new(mode);
        query.filters = self.filters();
        query.collation = self.options.effective_collation().to_string();
        query
    }

    fn limit(&self) -> Option<usize> {
        match self.options.result_limit() {
            0 => None,
            n => Some(n),
        }
    }

    fn variant_match(&self) -> Option<VariantMatch> {
        if !self.options.search_variants() {
            return None;
        }
        let languages = self.language_codes();
        if languages.is_empty() {
            return None;
        }
        Some(VariantMatch {
            languages,
            exact_language: self.options.autocomplete(),
        })
    }

    /// Filters shared by name, external id and proximity searches.
    pub fn filters(&self) -> Vec<PlaceFilter> {
        let options = self.options;
        let mut filters = vec![PlaceFilter::HasTimezone];

        if options.population_min() > 0 {
            filters.push(PlaceFilter::PopulationAtLeast(options.population_min()));
        }
        if options.population_max() > 0 {
            filters.push(PlaceFilter::PopulationAtMost(options.population_max()));
        }
        if !options.features().is_empty() && !options.all_features() {
            filters.push(PlaceFilter::FeatureIn(options.features().to_vec()));
        }
        if !options.all_countries() {
            if !options.countries().is_empty() {
                filters.push(PlaceFilter::CountryIn(upper(options.countries())));
            }
            if !options.excluded_countries().is_empty() {
                filters.push(PlaceFilter::CountryNotIn(upper(options.excluded_countries())));
            }
        }
        if !options.keywords().is_empty() && !options.all_keywords() {
            filters.push(PlaceFilter::KeywordIn(options.keywords().to_vec()));
        }
        filters
    }

    /// The six-level tie-break ordering used by name searches.
    pub fn priority_order(&self) -> Vec<OrderKey> {
        let options = self.options;
        let mut order = vec![
            OrderKey::StorePriority,
            OrderKey::PopulationBucket {
                threshold: self.config.notable_population,
            },
        ];
        if options.countries().len() > 1 {
            order.push(OrderKey::CountryPriority {
                countries: upper(options.countries()),
                unlisted: self.config.unlisted_priority,
            });
        }
        if options.features().len() > 1 {
            order.push(OrderKey::FeaturePriority {
                features: options.features().to_vec(),
                unlisted: self.config.unlisted_priority,
            });
        }
        order.push(OrderKey::PopulationDesc);
        order.push(OrderKey::Name);
        order
    }
}

fn upper(codes: &[String]) -> Vec<String> {
    codes.iter().map(|c| c.to_uppercase()).collect()
}
