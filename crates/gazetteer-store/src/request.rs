//! Structured read requests understood by every [`DataStore`](crate::DataStore).
//!
//! Each request kind is its own variant carrying typed parameters, so a store never has to
//! interpret a loose parameter map.

use std::cmp::Ordering;

use crate::collation::Collation;

/// A read request.
///
/// Place requests answer with the place columns listed in [`crate::columns`]. Resolution
/// requests answer with a `key` column (the code or id being resolved) and a `name` column,
/// in the store's preference order for that request.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    /// Places matching a search mode, filtered and ordered.
    Places(PlaceQuery),
    /// Single `keyword` column, one row when the keyword exists.
    KeywordExists { keyword: String },
    /// Single `count` column with the number of places tagged with the keyword.
    CountKeyword { keyword: String },
    /// Feature code to description.
    FeatureDescriptions { codes: Vec<String> },
    /// Upper-case ISO-2 code to the localized names of the country's `PCLI` place,
    /// preferred names first.
    CountryVariants {
        iso2: Vec<String>,
        languages: Vec<String>,
    },
    /// Upper-case ISO-2 code to base country name.
    CountryNames { iso2: Vec<String> },
    /// Municipality id to name.
    MunicipalityNames { ids: Vec<i64> },
    /// Municipality id to localized name.
    MunicipalityVariants { ids: Vec<i64>, languages: Vec<String> },
    /// Lower-case `iso2.admin1` key to administrative area name.
    AdminNames { keys: Vec<String> },
    /// Place id to its non-historic alternate names in the given languages, most preferred
    /// first. With a pattern, only names matching it (`LIKE`, case insensitive).
    NameVariants {
        ids: Vec<i64>,
        languages: Vec<String>,
        pattern: Option<String>,
    },
    /// Place id to its identifier in an external numbering scheme.
    ExternalIds { ids: Vec<i64>, name_type: String },
    /// The language code table: `iso_639_1`, `iso_639_2`, `iso_639_3`, `name`.
    Languages,
}

impl StoreRequest {
    /// Short operation name used in logs and error context.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Places(query) => match query.mode {
                PlaceMode::Name { .. } => "places_by_name",
                PlaceMode::ExternalId { .. } => "places_by_external_id",
                PlaceMode::Proximity { .. } => "places_by_coordinate",
                PlaceMode::Id { .. } => "places_by_id",
                PlaceMode::Keyword { .. } => "places_by_keyword",
            },
            Self::KeywordExists { .. } => "keyword_exists",
            Self::CountKeyword { .. } => "count_keyword",
            Self::FeatureDescriptions { .. } => "feature_descriptions",
            Self::CountryVariants { .. } => "country_variants",
            Self::CountryNames { .. } => "country_names",
            Self::MunicipalityNames { .. } => "municipality_names",
            Self::MunicipalityVariants { .. } => "municipality_variants",
            Self::AdminNames { .. } => "admin_names",
            Self::NameVariants { .. } => "name_variants",
            Self::ExternalIds { .. } => "external_ids",
            Self::Languages => "languages",
        }
    }
}

/// How places are matched before filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceMode {
    /// Stored name matches `pattern` (`LIKE`, case insensitive). With `variants`, places
    /// whose alternate names match in the given languages are included as well.
    Name {
        pattern: String,
        variants: Option<VariantMatch>,
    },
    /// Alternate name tagged `name_type` equals `value`.
    ExternalId { name_type: String, value: String },
    /// Nearest places first. The store returns at most `candidate_limit` rows by its own
    /// approximate ordering, then drops rows beyond `radius_km`.
    Proximity {
        lon: f64,
        lat: f64,
        radius_km: Option<f64>,
        candidate_limit: Option<usize>,
    },
    Id { id: i64 },
    /// Places tagged with the keyword, carrying the keyword's `override_name`.
    Keyword { keyword: String },
}

/// Language restriction on the alternate-name half of a name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantMatch {
    pub languages: Vec<String>,
    /// Compare language tags for equality rather than as `LIKE` patterns.
    pub exact_language: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceFilter {
    HasTimezone,
    PopulationAtLeast(u32),
    PopulationAtMost(u32),
    FeatureIn(Vec<String>),
    /// Upper-case ISO-2 codes.
    CountryIn(Vec<String>),
    CountryNotIn(Vec<String>),
    /// Place is tagged with any of the keywords.
    KeywordIn(Vec<String>),
}

/// One tie-break level of the place ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// The store's intrinsic per-row priority, ascending.
    StorePriority,
    /// Population for rows above `threshold`, zero otherwise, descending.
    PopulationBucket { threshold: u32 },
    /// 1-based position of the row's country in `countries`, `unlisted` when absent.
    CountryPriority {
        countries: Vec<String>,
        unlisted: u32,
    },
    /// 1-based position of the row's feature code in `features`, `unlisted` when absent.
    FeaturePriority {
        features: Vec<String>,
        unlisted: u32,
    },
    PopulationDesc,
    /// Stored name under the query's collation.
    Name,
    Distance,
}

fn position_priority(list: &[String], value: Option<&str>, unlisted: u32) -> u32 {
    value
        .and_then(|v| list.iter().position(|item| item.eq_ignore_ascii_case(v)))
        .map_or(unlisted, |i| i as u32 + 1)
}

impl OrderKey {
    pub fn compare(&self, collation: Collation, a: &RankRow<'_>, b: &RankRow<'_>) -> Ordering {
        match self {
            Self::StorePriority => a.priority.cmp(&b.priority),
            Self::PopulationBucket { threshold } => {
                let bucket = |p: i64| if p > i64::from(*threshold) { p } else { 0 };
                bucket(b.population).cmp(&bucket(a.population))
            }
            Self::CountryPriority {
                countries,
                unlisted,
            } => position_priority(countries, a.iso2, *unlisted).cmp(&position_priority(
                countries,
                b.iso2,
                *unlisted,
            )),
            Self::FeaturePriority { features, unlisted } => {
                position_priority(features, a.feature, *unlisted).cmp(&position_priority(
                    features, b.feature, *unlisted,
                ))
            }
            Self::PopulationDesc => b.population.cmp(&a.population),
            Self::Name => collation.compare(a.name, b.name),
            Self::Distance => a
                .distance
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.distance.unwrap_or(f64::INFINITY)),
        }
    }
}

/// The ranking-relevant fields of one place row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankRow<'a> {
    pub priority: i64,
    pub population: i64,
    pub iso2: Option<&'a str>,
    pub feature: Option<&'a str>,
    pub name: &'a str,
    pub distance: Option<f64>,
}

/// Filters, ordering and limit for a place search.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub mode: PlaceMode,
    pub filters: Vec<PlaceFilter>,
    pub order: Vec<OrderKey>,
    /// Collation name used for the `Name` order key.
    pub collation: String,
    /// `None` is unbounded.
    pub limit: Option<usize>,
}

impl PlaceQuery {
    pub fn new(mode: PlaceMode) -> Self {
        Self {
            mode,
            filters: Vec::new(),
            order: Vec::new(),
            collation: Collation::GENERAL_NAME.to_string(),
            limit: None,
        }
    }

    /// Compare two rows by the order keys, first difference wins.
    pub fn compare(&self, a: &RankRow<'_>, b: &RankRow<'_>) -> Ordering {
        let collation = Collation::from_name(&self.collation);
        self.order
            .iter()
            .map(|key| key.compare(collation, a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row<'a>(name: &'a str, population: i64, iso2: &'a str, feature: &'a str) -> RankRow<'a> {
        RankRow {
            name,
            population,
            iso2: Some(iso2),
            feature: Some(feature),
            ..RankRow::default()
        }
    }

    fn ranking_query(countries: &[&str], features: &[&str]) -> PlaceQuery {
        let mut query = PlaceQuery::new(PlaceMode::Id { id: 1 });
        query.order = vec![
            OrderKey::StorePriority,
            OrderKey::PopulationBucket { threshold: 50_000 },
            OrderKey::CountryPriority {
                countries: countries.iter().map(ToString::to_string).collect(),
                unlisted: 1000,
            },
            OrderKey::FeaturePriority {
                features: features.iter().map(ToString::to_string).collect(),
                unlisted: 1000,
            },
            OrderKey::PopulationDesc,
            OrderKey::Name,
        ];
        query
    }

    #[test]
    fn test_capital_beats_village() {
        let query = ranking_query(&["FI"], &["PPLC", "PPL"]);
        let capital = row("Helsinki", 558_457, "FI", "PPLC");
        let village = row("Helsinki", 120, "FI", "PPL");
        assert_eq!(query.compare(&capital, &village), Ordering::Less);
    }

    #[test]
    fn test_store_priority_wins_over_population() {
        let query = ranking_query(&[], &[]);
        let mut big = row("A", 1_000_000, "FI", "PPL");
        big.priority = 1;
        let small = row("B", 10, "FI", "PPL");
        assert_eq!(query.compare(&small, &big), Ordering::Less);
    }

    #[test]
    fn test_small_populations_share_bucket() {
        let query = PlaceQuery {
            order: vec![
                OrderKey::PopulationBucket { threshold: 50_000 },
                OrderKey::FeaturePriority {
                    features: vec!["PPLA".into(), "PPL".into()],
                    unlisted: 1000,
                },
            ],
            ..ranking_query(&[], &[])
        };
        // below the threshold population does not matter, feature decides
        let town = row("X", 40_000, "FI", "PPL");
        let seat = row("Y", 4_000, "FI", "PPLA");
        assert_eq!(query.compare(&seat, &town), Ordering::Less);
        // above the threshold the bigger place wins
        let city = row("Z", 60_000, "FI", "PPL");
        assert_eq!(query.compare(&city, &seat), Ordering::Less);
    }

    #[test]
    fn test_country_priority_follows_request_order() {
        let query = ranking_query(&["CZ", "SK"], &[]);
        let slovak = row("Praha", 100, "SK", "PPL");
        let czech = row("Praha", 100, "CZ", "PPL");
        let other = row("Praha", 100, "US", "PPL");
        assert_eq!(query.compare(&czech, &slovak), Ordering::Less);
        assert_eq!(query.compare(&slovak, &other), Ordering::Less);
    }

    #[test]
    fn test_equal_rank_orders_by_collated_name() {
        let mut query = ranking_query(&[], &[]);
        query.collation = Collation::SWEDISH_NAME.to_string();
        let a = row("Åland", 0, "FI", "PPL");
        let b = row("Oulu", 0, "FI", "PPL");
        assert_eq!(query.compare(&b, &a), Ordering::Less);

        query.collation = Collation::GENERAL_NAME.to_string();
        assert_eq!(query.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_distance_orders_missing_last() {
        let query = PlaceQuery {
            order: vec![OrderKey::Distance],
            ..PlaceQuery::new(PlaceMode::Id { id: 1 })
        };
        let near = RankRow {
            distance: Some(0.5),
            ..RankRow::default()
        };
        let unknown = RankRow::default();
        assert_eq!(query.compare(&near, &unknown), Ordering::Less);
    }

    #[test]
    fn test_operation_names() {
        let query = PlaceQuery::new(PlaceMode::Keyword {
            keyword: "finavia".into(),
        });
        assert_eq!(
            StoreRequest::Places(query).operation(),
            "places_by_keyword"
        );
        assert_eq!(StoreRequest::Languages.operation(), "languages");
    }
}
