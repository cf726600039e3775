//! Merging place rows with resolved names into [`LocationRecord`]s.

use gazetteer_store::{Collation, columns};
use itertools::izip;
use polars::prelude::*;
use tracing::{trace, warn};

use crate::{SearchOptions, resolve::ResolutionCaches};

/// One row of a place response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceRow {
    pub id: i64,
    pub name: String,
    pub ansiname: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub iso2: Option<String>,
    pub features_code: Option<String>,
    pub timezone: Option<String>,
    pub municipalities_id: Option<i64>,
    pub admin1: Option<String>,
    pub population: i64,
    pub elevation: Option<i64>,
    pub dem: Option<i64>,
    pub override_name: Option<String>,
}

impl PlaceRow {
    pub fn from_df(df: &DataFrame) -> PolarsResult<Vec<Self>> {
        let overrides: Vec<Option<String>> = match df.get_column_index(columns::OVERRIDE_NAME) {
            Some(_) => df
                .column(columns::OVERRIDE_NAME)?
                .str()?
                .into_iter()
                .map(|s| s.map(ToString::to_string))
                .collect(),
            None => vec![None; df.height()],
        };

        Ok(izip!(
            df.column(columns::ID)?.i64()?,
            df.column(columns::NAME)?.str()?,
            df.column(columns::ANSINAME)?.str()?,
            df.column(columns::LAT)?.f64()?,
            df.column(columns::LON)?.f64()?,
            df.column(columns::ISO2)?.str()?,
            df.column(columns::FEATURES_CODE)?.str()?,
            df.column(columns::TIMEZONE)?.str()?,
            df.column(columns::MUNICIPALITIES_ID)?.i64()?,
            df.column(columns::ADMIN1)?.str()?,
            df.column(columns::POPULATION)?.i64()?,
            df.column(columns::ELEVATION)?.i64()?,
            df.column(columns::DEM)?.i64()?,
            overrides,
        )
        .filter_map(
            |(
                id,
                name,
                ansiname,
                lat,
                lon,
                iso2,
                features_code,
                timezone,
                municipalities_id,
                admin1,
                population,
                elevation,
                dem,
                override_name,
            )| {
                Some(Self {
                    id: id?,
                    name: name.unwrap_or_default().to_string(),
                    ansiname: ansiname.map(ToString::to_string),
                    lat: lat.unwrap_or_default(),
                    lon: lon.unwrap_or_default(),
                    iso2: iso2.map(ToString::to_string),
                    features_code: features_code.map(ToString::to_string),
                    timezone: timezone.map(ToString::to_string),
                    municipalities_id,
                    admin1: admin1.map(ToString::to_string),
                    population: population.unwrap_or_default(),
                    elevation,
                    dem,
                    override_name: override_name.filter(|n| !n.is_empty()),
                })
            },
        )
        .collect())
    }

    /// Lower-case `iso2.admin1` key, for rows that carry both codes.
    pub fn admin_key(&self) -> Option<String> {
        match (&self.iso2, &self.admin1) {
            (Some(iso2), Some(admin1)) if !iso2.is_empty() && !admin1.is_empty() => {
                Some(format!("{iso2}.{admin1}").to_lowercase())
            }
            _ => None,
        }
    }

    /// Administrative area comes from the admin code only when no municipality is set.
    pub fn needs_admin_name(&self) -> bool {
        self.municipalities_id.is_none()
    }

    /// Primary elevation unless missing or zero, then the elevation model, then zero.
    pub fn elevation(&self) -> i64 {
        match self.elevation {
            Some(e) if e != 0 => e,
            _ => self.dem.unwrap_or(0),
        }
    }
}

/// A resolved, localized place.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationRecord {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Country name in the requested language.
    pub country: String,
    pub feature: String,
    pub feature_description: String,
    /// Municipality or first-level administrative area.
    pub area: String,
    pub timezone: String,
    pub population: u32,
    pub iso2: String,
    /// Negative for alternate identities that share coordinates with a positive id.
    pub id: i64,
    pub elevation: i64,
    pub external_id: Option<String>,
}

/// Output character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "" | "utf8" | "utf-8" => Some(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Some(Self::Latin1),
            "ascii" | "us-ascii" => Some(Self::Ascii),
            _ => None,
        }
    }

    pub fn can_encode(self, text: &str) -> bool {
        match self {
            Self::Utf8 => true,
            Self::Latin1 => text.chars().all(|c| u32::from(c) <= 0xff),
            Self::Ascii => text.is_ascii(),
        }
    }

    /// `text` when representable, its ASCII transliteration otherwise.
    pub fn convert(self, text: &str) -> String {
        if self.can_encode(text) {
            text.to_string()
        } else {
            deunicode::deunicode(text)
        }
    }

    /// Like [`Self::convert`], but preferring the stored ASCII name over transliteration.
    pub fn convert_name(self, name: &str, ansiname: Option<&str>) -> String {
        if self.can_encode(name) {
            return name.to_string();
        }
        match ansiname {
            Some(ansi) if !ansi.is_empty() && self.can_encode(ansi) => ansi.to_string(),
            _ => deunicode::deunicode(name),
        }
    }
}

/// Turns place rows into records for one call.
#[derive(Debug, Clone)]
pub struct LocationAssembler<'a> {
    options: &'a SearchOptions,
    collation: Collation,
    charset: Charset,
}

impl<'a> LocationAssembler<'a> {
    pub fn new(options: &'a SearchOptions) -> Self {
        let charset = Charset::from_name(options.charset()).unwrap_or_else(|| {
            warn!(charset = options.charset(), "Unknown charset, using utf8");
            Charset::Utf8
        });
        Self {
            options,
            collation: Collation::from_name(options.effective_collation()),
            charset,
        }
    }

    /// Build records in row order, keeping only rows in `area` when one is given, and
    /// stopping at the result limit.
    pub fn assemble(
        &self,
        rows: &[PlaceRow],
        caches: &ResolutionCaches,
        search_word: &str,
        area: Option<&str>,
    ) -> Vec<LocationRecord> {
        let limit = self.options.result_limit();
        let mut records = Vec::new();

        for row in rows {
            if limit > 0 && records.len() >= limit {
                break;
            }
            let Some(timezone) = &row.timezone else {
                trace!(id = row.id, "Skipping place without timezone");
                continue;
            };

            let record = self.record(row, timezone, caches);
            if let Some(area) = area {
                if !self.in_area(&record, area) {
                    trace!(id = row.id, area, "Place outside requested area");
                    continue;
                }
            }
            records.push(record);
        }

        if self.options.autocomplete() {
            exact_matches_first(records, search_word)
        } else {
            records
        }
    }

    fn record(&self, row: &PlaceRow, timezone: &str, caches: &ResolutionCaches) -> LocationRecord {
        let name = match &row.override_name {
            Some(name) => name.clone(),
            None => caches
                .variants
                .get(&row.id)
                .cloned()
                .unwrap_or_else(|| row.name.clone()),
        };
        let name = self.charset.convert_name(&name, row.ansiname.as_deref());

        let lookup = |cache: &ahash::AHashMap<String, String>, key: Option<&String>| {
            key.and_then(|k| cache.get(k))
                .map(|v| self.charset.convert(v))
                .unwrap_or_default()
        };

        let area = match row.municipalities_id {
            Some(id) => caches
                .municipalities
                .get(&id)
                .map(|v| self.charset.convert(v))
                .unwrap_or_default(),
            None => lookup(&caches.admins, row.admin_key().as_ref()),
        };

        LocationRecord {
            name,
            lon: row.lon,
            lat: row.lat,
            country: lookup(&caches.countries, row.iso2.as_ref()),
            feature: row.features_code.clone().unwrap_or_default(),
            feature_description: lookup(&caches.features, row.features_code.as_ref()),
            area,
            timezone: timezone.to_string(),
            population: u32::try_from(row.population.max(0)).unwrap_or(u32::MAX),
            iso2: row.iso2.clone().unwrap_or_default(),
            id: row.id,
            elevation: row.elevation(),
            external_id: caches.external_ids.get(&row.id).cloned(),
        }
    }

    fn in_area(&self, record: &LocationRecord, area: &str) -> bool {
        self.collation.equals(area, &record.country) || self.collation.equals(area, &record.area)
    }
}

/// Stable partition: names equal to the search word (case insensitive, without a trailing
/// `%`) first, everything else after, each group in its original order.
pub fn exact_matches_first(records: Vec<LocationRecord>, search_word: &str) -> Vec<LocationRecord> {
    let word = search_word.strip_suffix('%').unwrap_or(search_word).to_lowercase();
    let (mut exact, rest): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| r.name.to_lowercase() == word);
    exact.extend(rest);
    exact
}
