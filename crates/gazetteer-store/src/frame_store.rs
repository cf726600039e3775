//! In-memory [`DataStore`] over the gazetteer tables held as polars frames.
//!
//! Matching and filtering run as polars lazy queries. Ranking needs collation-aware name
//! comparison, so rows are collected first and ordered by the query's order keys before
//! the limit is applied.

use std::{collections::HashSet, fs::File, path::Path, time::Instant};

use itertools::izip;
use polars::prelude::*;
use tracing::{debug, info, instrument};

use crate::{
    CancelSignal, DataStore,
    columns::{
        ADMIN1, ANSINAME, COUNT, DEM, DISTANCE, ELEVATION, FEATURES_CODE, GEONAMES_PRIORITY, ID,
        ISO2, KEY, KEYWORD, LAT, LON, MUNICIPALITIES_ID, NAME, OVERRIDE_NAME, POPULATION,
        TIMEZONE,
    },
    error::{Result, StoreError},
    like::{self, LikePattern},
    request::{PlaceFilter, PlaceMode, PlaceQuery, RankRow, StoreRequest, VariantMatch},
};

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Flat-earth distance, good enough to pick nearest-neighbour candidates.
fn approximate_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let mean_phi = ((lat1 + lat2) / 2.0).to_radians();
    let x = (lon2 - lon1).to_radians() * mean_phi.cos();
    let y = (lat2 - lat1).to_radians();
    EARTH_RADIUS_KM * x.hypot(y)
}

/// The fixed set of gazetteer tables.
///
/// | table | columns |
/// |---|---|
/// | `geonames` | `id`, `name`, `ansiname`, `lat`, `lon`, `countries_iso2`, `features_code`, `timezone`, `municipalities_id`, `admin1`, `population`, `elevation`, `dem`, `priority` |
/// | `alternate_geonames` | `geonames_id`, `name`, `language`, `priority`, `preferred`, `historic` |
/// | `countries` | `iso2`, `name` |
/// | `features` | `code`, `shortdesc` |
/// | `municipalities` | `id`, `name` |
/// | `alternate_municipalities` | `municipalities_id`, `name`, `language` |
/// | `admin1codes` | `code` (lower-case `iso2.admin1`), `name` |
/// | `keywords` | `keyword` |
/// | `keywords_has_geonames` | `keyword`, `geonames_id`, `name` |
/// | `languages` | `iso_639_1`, `iso_639_2`, `iso_639_3`, `name` |
#[derive(Debug, Clone)]
pub struct GazetteerTables {
    pub geonames: DataFrame,
    pub alternate_geonames: DataFrame,
    pub countries: DataFrame,
    pub features: DataFrame,
    pub municipalities: DataFrame,
    pub alternate_municipalities: DataFrame,
    pub admin1codes: DataFrame,
    pub keywords: DataFrame,
    pub keywords_has_geonames: DataFrame,
    pub languages: DataFrame,
}

impl GazetteerTables {
    pub const TABLE_NAMES: [&'static str; 10] = [
        "geonames",
        "alternate_geonames",
        "countries",
        "features",
        "municipalities",
        "alternate_municipalities",
        "admin1codes",
        "keywords",
        "keywords_has_geonames",
        "languages",
    ];

    fn tables(&self) -> [(&'static str, &DataFrame); 10] {
        [
            ("geonames", &self.geonames),
            ("alternate_geonames", &self.alternate_geonames),
            ("countries", &self.countries),
            ("features", &self.features),
            ("municipalities", &self.municipalities),
            ("alternate_municipalities", &self.alternate_municipalities),
            ("admin1codes", &self.admin1codes),
            ("keywords", &self.keywords),
            ("keywords_has_geonames", &self.keywords_has_geonames),
            ("languages", &self.languages),
        ]
    }

    /// Read every table from `<dir>/<table>.parquet`.
    #[instrument(name = "Read gazetteer tables", level = "info", skip_all)]
    pub fn read_parquet_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let t = Instant::now();
        let read = |name: &str| -> Result<DataFrame> {
            let path = dir.join(format!("{name}.parquet"));
            if !path.exists() {
                return Err(StoreError::MissingTable(name.to_string()));
            }
            let file = File::open(&path)?;
            Ok(ParquetReader::new(file).finish()?)
        };
        let tables = Self {
            geonames: read("geonames")?,
            alternate_geonames: read("alternate_geonames")?,
            countries: read("countries")?,
            features: read("features")?,
            municipalities: read("municipalities")?,
            alternate_municipalities: read("alternate_municipalities")?,
            admin1codes: read("admin1codes")?,
            keywords: read("keywords")?,
            keywords_has_geonames: read("keywords_has_geonames")?,
            languages: read("languages")?,
        };
        info!(
            dir = ?dir,
            places = tables.geonames.height(),
            elapsed_ms = ?t.elapsed(),
            "Loaded gazetteer tables"
        );
        Ok(tables)
    }

    /// Write every table to `<dir>/<table>.parquet`, creating `dir` if needed.
    #[instrument(name = "Write gazetteer tables", level = "info", skip_all)]
    pub fn write_parquet_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        for (name, df) in self.tables() {
            let mut file = File::create(dir.join(format!("{name}.parquet")))?;
            ParquetWriter::new(&mut file).finish(&mut df.clone())?;
            debug!(table = name, rows = df.height(), "Wrote table");
        }
        Ok(())
    }
}

fn str_list(values: &[String]) -> Expr {
    lit(Series::new("values".into(), values)).implode()
}

fn id_list(values: &[i64]) -> Expr {
    lit(Series::new("values".into(), values)).implode()
}

fn place_columns() -> Vec<Expr> {
    vec![
        col("id").cast(DataType::Int64).alias(ID),
        col("name").alias(NAME),
        col("ansiname").alias(ANSINAME),
        col("lat").cast(DataType::Float64).alias(LAT),
        col("lon").cast(DataType::Float64).alias(LON),
        col("countries_iso2").alias(ISO2),
        col("features_code").alias(FEATURES_CODE),
        col("timezone").alias(TIMEZONE),
        col("municipalities_id")
            .cast(DataType::Int64)
            .alias(MUNICIPALITIES_ID),
        col("admin1").alias(ADMIN1),
        col("population").cast(DataType::Int64).alias(POPULATION),
        col("elevation").cast(DataType::Int64).alias(ELEVATION),
        col("dem").cast(DataType::Int64).alias(DEM),
        col("priority").cast(DataType::Int64).alias(GEONAMES_PRIORITY),
    ]
}

fn reorder(df: &DataFrame, indices: Vec<IdxSize>) -> Result<DataFrame> {
    Ok(df.take(&IdxCa::from_vec("order".into(), indices))?)
}

/// A [`DataStore`] answering requests from in-memory [`GazetteerTables`].
#[derive(Debug, Clone)]
pub struct FrameStore {
    tables: GazetteerTables,
}

impl FrameStore {
    pub fn new(tables: GazetteerTables) -> Self {
        Self { tables }
    }

    pub fn from_parquet_dir(dir: impl AsRef<Path>) -> Result<Self> {
        GazetteerTables::read_parquet_dir(dir).map(Self::new)
    }

    pub fn tables(&self) -> &GazetteerTables {
        &self.tables
    }

    fn variant_language(variants: &VariantMatch) -> Expr {
        if variants.exact_language {
            col("language").is_in(str_list(&variants.languages), false)
        } else {
            col("language")
                .str()
                .contains(lit(like::any_to_regex(&variants.languages, true)), true)
        }
    }

    /// Geonames rows selected by the search mode, before filters.
    fn matched_places(&self, mode: &PlaceMode) -> Result<LazyFrame> {
        let geonames = self.tables.geonames.clone().lazy();
        let lf = match mode {
            PlaceMode::Name { pattern, variants } => {
                let name_re = LikePattern::new(pattern, true)?;
                let canonical = geonames.clone().filter(
                    col("name")
                        .str()
                        .contains(lit(name_re.regex_source().to_string()), true),
                );
                match variants {
                    None => canonical,
                    Some(variants) => {
                        let matching = self
                            .tables
                            .alternate_geonames
                            .clone()
                            .lazy()
                            .filter(
                                col("name")
                                    .str()
                                    .contains(lit(name_re.regex_source().to_string()), true)
                                    .and(Self::variant_language(variants)),
                            )
                            .select([col("geonames_id")]);
                        let variant_hits = geonames.join(
                            matching,
                            [col("id")],
                            [col("geonames_id")],
                            JoinArgs::new(JoinType::Semi),
                        );
                        concat([canonical, variant_hits], UnionArgs::default())?
                    }
                }
            }
            PlaceMode::ExternalId { name_type, value } => {
                let matching = self
                    .tables
                    .alternate_geonames
                    .clone()
                    .lazy()
                    .filter(
                        col("language")
                            .eq(lit(name_type.as_str()))
                            .and(col("name").eq(lit(value.as_str()))),
                    )
                    .select([col("geonames_id")]);
                geonames.join(
                    matching,
                    [col("id")],
                    [col("geonames_id")],
                    JoinArgs::new(JoinType::Semi),
                )
            }
            PlaceMode::Proximity { .. } => geonames,
            PlaceMode::Id { id } => geonames.filter(col("id").eq(lit(*id))),
            PlaceMode::Keyword { keyword } => {
                let tagged = self
                    .tables
                    .keywords_has_geonames
                    .clone()
                    .lazy()
                    .filter(col("keyword").eq(lit(keyword.as_str())))
                    .select([col("geonames_id"), col("name").alias(OVERRIDE_NAME)]);
                geonames.join(
                    tagged,
                    [col("id")],
                    [col("geonames_id")],
                    JoinArgs::new(JoinType::Inner),
                )
            }
        };
        Ok(lf)
    }

    fn filter_expr(&self, filter: &PlaceFilter) -> Result<Expr> {
        let expr = match filter {
            PlaceFilter::HasTimezone => col("timezone").is_not_null(),
            PlaceFilter::PopulationAtLeast(min) => col("population")
                .cast(DataType::Int64)
                .gt_eq(lit(i64::from(*min))),
            PlaceFilter::PopulationAtMost(max) => col("population")
                .cast(DataType::Int64)
                .lt_eq(lit(i64::from(*max))),
            PlaceFilter::FeatureIn(codes) => col("features_code").is_in(str_list(codes), false),
            PlaceFilter::CountryIn(iso2) => col("countries_iso2").is_in(str_list(iso2), false),
            PlaceFilter::CountryNotIn(iso2) => col("countries_iso2")
                .is_in(str_list(iso2), false)
                .not(),
            PlaceFilter::KeywordIn(keywords) => {
                let tagged = self
                    .tables
                    .keywords_has_geonames
                    .clone()
                    .lazy()
                    .filter(col("keyword").is_in(str_list(keywords), false))
                    .select([col("geonames_id").cast(DataType::Int64)])
                    .collect()?;
                let ids: Vec<i64> = tagged
                    .column("geonames_id")?
                    .i64()?
                    .into_iter()
                    .flatten()
                    .collect();
                col("id").cast(DataType::Int64).is_in(id_list(&ids), false)
            }
        };
        Ok(expr)
    }

    fn places(&self, query: &PlaceQuery) -> Result<DataFrame> {
        let mut lf = self.matched_places(&query.mode)?;
        for filter in &query.filters {
            lf = lf.filter(self.filter_expr(filter)?);
        }
        let mut selection = place_columns();
        if matches!(query.mode, PlaceMode::Keyword { .. }) {
            selection.push(col(OVERRIDE_NAME));
        }
        let df = lf.select(selection).collect()?;

        match query.mode {
            PlaceMode::Proximity {
                lon,
                lat,
                radius_km,
                candidate_limit,
            } => Self::nearest(&df, query, (lon, lat), radius_km, candidate_limit),
            PlaceMode::Name {
                variants: Some(_), ..
            } => Self::rank(&df, query, true),
            _ => Self::rank(&df, query, false),
        }
    }

    fn rank_rows<'a>(df: &'a DataFrame, distances: Option<&[f64]>) -> Result<Vec<RankRow<'a>>> {
        let rows = izip!(
            df.column(NAME)?.str()?,
            df.column(ISO2)?.str()?,
            df.column(FEATURES_CODE)?.str()?,
            df.column(POPULATION)?.i64()?,
            df.column(GEONAMES_PRIORITY)?.i64()?,
        )
        .enumerate()
        .map(|(i, (name, iso2, feature, population, priority))| RankRow {
            priority: priority.unwrap_or(0),
            population: population.unwrap_or(0),
            iso2,
            feature,
            name: name.unwrap_or_default(),
            distance: distances.map(|d| d[i]),
        })
        .collect();
        Ok(rows)
    }

    /// Order by the query's keys, optionally keeping the first row per id, then limit.
    fn rank(df: &DataFrame, query: &PlaceQuery, distinct: bool) -> Result<DataFrame> {
        let rows = Self::rank_rows(df, None)?;
        let ids = df.column(ID)?.i64()?;
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| query.compare(&rows[a], &rows[b]));

        let mut seen = HashSet::new();
        let indices = order
            .into_iter()
            .filter(|&i| !distinct || seen.insert(ids.get(i)))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|i| i as IdxSize)
            .collect();
        reorder(df, indices)
    }

    /// Pick the approximate nearest candidates, then rank them by exact distance and drop
    /// those outside the radius.
    fn nearest(
        df: &DataFrame,
        query: &PlaceQuery,
        (lon, lat): (f64, f64),
        radius_km: Option<f64>,
        candidate_limit: Option<usize>,
    ) -> Result<DataFrame> {
        let coordinates: Vec<Option<(f64, f64)>> =
            izip!(df.column(LON)?.f64()?, df.column(LAT)?.f64()?)
                .map(|(x, y)| x.zip(y))
                .collect();

        let mut candidates: Vec<usize> = (0..coordinates.len())
            .filter(|&i| coordinates[i].is_some())
            .collect();
        let approximate = |i: usize| {
            coordinates[i].map_or(f64::INFINITY, |(x, y)| approximate_km(lon, lat, x, y))
        };
        candidates.sort_by(|&a, &b| approximate(a).total_cmp(&approximate(b)));
        candidates.truncate(candidate_limit.unwrap_or(usize::MAX));

        let exact: Vec<f64> = coordinates
            .iter()
            .map(|c| c.map_or(f64::INFINITY, |(x, y)| haversine_km(lon, lat, x, y)))
            .collect();
        let rows = Self::rank_rows(df, Some(&exact))?;

        candidates.retain(|&i| radius_km.is_none_or(|r| exact[i] <= r));
        if query.order.is_empty() {
            candidates.sort_by(|&a, &b| exact[a].total_cmp(&exact[b]));
        } else {
            candidates.sort_by(|&a, &b| query.compare(&rows[a], &rows[b]));
        }
        candidates.truncate(query.limit.unwrap_or(usize::MAX));

        let distances: Vec<f64> = candidates.iter().map(|&i| exact[i]).collect();
        let indices = candidates.into_iter().map(|i| i as IdxSize).collect();
        let mut nearest = reorder(df, indices)?;
        nearest.with_column(Series::new(DISTANCE.into(), distances))?;
        Ok(nearest)
    }

    fn key_name(lf: LazyFrame, key: Expr, name: Expr) -> Result<DataFrame> {
        Ok(lf.select([key.alias(KEY), name.alias(NAME)]).collect()?)
    }

    fn lookup(&self, request: &StoreRequest) -> Result<DataFrame> {
        let tables = &self.tables;
        match request {
            StoreRequest::Places(query) => self.places(query),
            StoreRequest::KeywordExists { keyword } => Ok(tables
                .keywords
                .clone()
                .lazy()
                .filter(col("keyword").eq(lit(keyword.as_str())))
                .select([col("keyword").alias(KEYWORD)])
                .limit(1)
                .collect()?),
            StoreRequest::CountKeyword { keyword } => {
                let tagged = tables
                    .keywords_has_geonames
                    .clone()
                    .lazy()
                    .filter(col("keyword").eq(lit(keyword.as_str())))
                    .collect()?;
                Ok(df!(COUNT => [tagged.height() as i64])?)
            }
            StoreRequest::FeatureDescriptions { codes } => Self::key_name(
                tables
                    .features
                    .clone()
                    .lazy()
                    .filter(col("code").is_in(str_list(codes), false)),
                col("code"),
                col("shortdesc"),
            ),
            StoreRequest::CountryVariants { iso2, languages } => {
                let countries = tables
                    .geonames
                    .clone()
                    .lazy()
                    .filter(
                        col("features_code")
                            .eq(lit("PCLI"))
                            .and(col("countries_iso2").is_in(str_list(iso2), false)),
                    )
                    .select([col("id"), col("countries_iso2")]);
                let names = tables
                    .alternate_geonames
                    .clone()
                    .lazy()
                    .filter(col("language").is_in(str_list(languages), false));
                let ordered = countries
                    .join(
                        names,
                        [col("id")],
                        [col("geonames_id")],
                        JoinArgs::new(JoinType::Inner),
                    )
                    .with_column(col("name").str().len_chars().alias("name_length"))
                    .sort_by_exprs(
                        [col("preferred"), col("priority"), col("name_length")],
                        SortMultipleOptions::default()
                            .with_order_descending_multi([true, false, false])
                            .with_maintain_order(true),
                    );
                Self::key_name(ordered, col("countries_iso2"), col("name"))
            }
            StoreRequest::CountryNames { iso2 } => Self::key_name(
                tables
                    .countries
                    .clone()
                    .lazy()
                    .filter(col("iso2").is_in(str_list(iso2), false)),
                col("iso2"),
                col("name"),
            ),
            StoreRequest::MunicipalityNames { ids } => Self::key_name(
                tables
                    .municipalities
                    .clone()
                    .lazy()
                    .filter(col("id").cast(DataType::Int64).is_in(id_list(ids), false)),
                col("id").cast(DataType::Int64),
                col("name"),
            ),
            StoreRequest::MunicipalityVariants { ids, languages } => Self::key_name(
                tables.alternate_municipalities.clone().lazy().filter(
                    col("municipalities_id")
                        .cast(DataType::Int64)
                        .is_in(id_list(ids), false)
                        .and(col("language").is_in(str_list(languages), false)),
                ),
                col("municipalities_id").cast(DataType::Int64),
                col("name"),
            ),
            StoreRequest::AdminNames { keys } => Self::key_name(
                tables
                    .admin1codes
                    .clone()
                    .lazy()
                    .filter(col("code").is_in(str_list(keys), false)),
                col("code"),
                col("name"),
            ),
            StoreRequest::NameVariants {
                ids,
                languages,
                pattern,
            } => {
                let mut condition = col("geonames_id")
                    .cast(DataType::Int64)
                    .is_in(id_list(ids), false)
                    .and(col("language").is_in(str_list(languages), false))
                    .and(col("historic").fill_null(lit(false)).eq(lit(false)));
                if let Some(pattern) = pattern {
                    let pattern = LikePattern::new(pattern, true)?;
                    condition = condition.and(
                        col("name")
                            .str()
                            .contains(lit(pattern.regex_source().to_string()), true),
                    );
                }
                let ordered = tables
                    .alternate_geonames
                    .clone()
                    .lazy()
                    .filter(condition)
                    .with_column(col("name").str().len_chars().alias("name_length"))
                    .sort_by_exprs(
                        [
                            col("priority"),
                            col("preferred"),
                            col("name_length"),
                            col("name"),
                        ],
                        SortMultipleOptions::default()
                            .with_order_descending_multi([false, true, false, false])
                            .with_maintain_order(true),
                    );
                Self::key_name(ordered, col("geonames_id").cast(DataType::Int64), col("name"))
            }
            StoreRequest::ExternalIds { ids, name_type } => Self::key_name(
                tables.alternate_geonames.clone().lazy().filter(
                    col("geonames_id")
                        .cast(DataType::Int64)
                        .is_in(id_list(ids), false)
                        .and(col("language").eq(lit(name_type.as_str()))),
                ),
                col("geonames_id").cast(DataType::Int64),
                col("name"),
            ),
            StoreRequest::Languages => Ok(tables.languages.clone()),
        }
    }
}

impl DataStore for FrameStore {
    fn execute_read(
        &mut self,
        request: &StoreRequest,
        cancel: &CancelSignal,
    ) -> Result<DataFrame> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let t = Instant::now();
        let df = self.lookup(request)?;
        debug!(
            operation = request.operation(),
            rows = df.height(),
            elapsed_ms = ?t.elapsed(),
            "Store request executed"
        );
        Ok(df)
    }
}
