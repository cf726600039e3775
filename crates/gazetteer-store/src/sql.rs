//! Render request descriptors as parameterized SQL.
//!
//! Statements use positional `$n` placeholders. Adapters without bind parameters can call
//! [`SqlStatement::inline`] with their own quoting primitive.

use std::fmt::Write as _;

use crate::{
    collation::Collation,
    request::{OrderKey, PlaceFilter, PlaceMode, PlaceQuery, StoreRequest, VariantMatch},
};

/// Standard SQL string literal: single quotes doubled.
pub fn quote_literal(literal: &str) -> String {
    format!("'{}'", literal.replace('\'', "''"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    TextList(Vec<String>),
    IntList(Vec<i64>),
}

impl SqlParam {
    fn inline(&self, quote: &dyn Fn(&str) -> String) -> String {
        match self {
            Self::Text(s) => quote(s),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::TextList(values) if values.is_empty() => "ARRAY[]::text[]".to_string(),
            Self::TextList(values) => format!(
                "ARRAY[{}]",
                values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
            ),
            Self::IntList(values) if values.is_empty() => "ARRAY[]::bigint[]".to_string(),
            Self::IntList(values) => format!(
                "ARRAY[{}]",
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Query text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<SqlParam>,
}

impl SqlStatement {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn text_param(&mut self, value: &str) -> String {
        self.bind(SqlParam::Text(value.to_string()))
    }

    /// Substitute every placeholder with its quoted literal.
    pub fn inline(&self, quote: impl Fn(&str) -> String) -> String {
        let mut out = String::with_capacity(self.text.len() + 16 * self.params.len());
        let mut chars = self.text.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' || !chars.peek().is_some_and(char::is_ascii_digit) {
                out.push(c);
                continue;
            }
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            match digits
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| self.params.get(i))
            {
                Some(param) => out.push_str(&param.inline(&quote)),
                None => {
                    out.push('$');
                    out.push_str(&digits);
                }
            }
        }
        out
    }
}

const PLACE_COLUMNS: &str = "geonames.id, geonames.name, geonames.ansiname, geonames.lat, \
     geonames.lon, geonames.countries_iso2 AS iso2, geonames.features_code, geonames.timezone, \
     geonames.municipalities_id, geonames.admin1, geonames.population, geonames.elevation, \
     geonames.dem, geonames.priority AS geonames_priority";

fn filter_sql(stmt: &mut SqlStatement, filter: &PlaceFilter) -> String {
    match filter {
        PlaceFilter::HasTimezone => "geonames.timezone IS NOT NULL".to_string(),
        PlaceFilter::PopulationAtLeast(min) => {
            format!("geonames.population >= {}", stmt.bind(SqlParam::Int(i64::from(*min))))
        }
        PlaceFilter::PopulationAtMost(max) => {
            format!("geonames.population <= {}", stmt.bind(SqlParam::Int(i64::from(*max))))
        }
        PlaceFilter::FeatureIn(codes) => format!(
            "geonames.features_code = ANY({})",
            stmt.bind(SqlParam::TextList(codes.clone()))
        ),
        PlaceFilter::CountryIn(iso2) => format!(
            "geonames.countries_iso2 = ANY({})",
            stmt.bind(SqlParam::TextList(iso2.clone()))
        ),
        PlaceFilter::CountryNotIn(iso2) => format!(
            "NOT (geonames.countries_iso2 = ANY({}))",
            stmt.bind(SqlParam::TextList(iso2.clone()))
        ),
        PlaceFilter::KeywordIn(keywords) => format!(
            "geonames.id IN (SELECT geonames_id FROM keywords_has_geonames WHERE keyword = ANY({}))",
            stmt.bind(SqlParam::TextList(keywords.clone()))
        ),
    }
}

fn where_clause(stmt: &mut SqlStatement, base: Option<String>, filters: &[PlaceFilter]) -> String {
    let conditions: Vec<String> = base
        .into_iter()
        .chain(filters.iter().map(|f| filter_sql(stmt, f)))
        .collect();
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn position_case(
    stmt: &mut SqlStatement,
    column: &str,
    values: &[String],
    unlisted: u32,
) -> String {
    let mut case = format!("CASE {column}");
    for (i, value) in values.iter().enumerate() {
        let placeholder = stmt.text_param(value);
        let _ = write!(case, " WHEN {placeholder} THEN {}", i + 1);
    }
    let _ = write!(case, " ELSE {unlisted} END");
    case
}

fn order_sql(stmt: &mut SqlStatement, key: &OrderKey, collation: &str) -> String {
    match key {
        OrderKey::StorePriority => "geonames_priority ASC".to_string(),
        OrderKey::PopulationBucket { threshold } => format!(
            "CASE WHEN population > {} THEN population ELSE 0 END DESC",
            stmt.bind(SqlParam::Int(i64::from(*threshold)))
        ),
        OrderKey::CountryPriority {
            countries,
            unlisted,
        } => format!("{} ASC", position_case(stmt, "iso2", countries, *unlisted)),
        OrderKey::FeaturePriority { features, unlisted } => format!(
            "{} ASC",
            position_case(stmt, "features_code", features, *unlisted)
        ),
        OrderKey::PopulationDesc => "population DESC".to_string(),
        OrderKey::Name => format!("name COLLATE \"{}\" ASC", Collation::from_name(collation).name()),
        OrderKey::Distance => "distance ASC".to_string(),
    }
}

fn variant_language_sql(stmt: &mut SqlStatement, variants: &VariantMatch) -> String {
    if variants.exact_language {
        return format!(
            "language = ANY({})",
            stmt.bind(SqlParam::TextList(variants.languages.clone()))
        );
    }
    let alternatives: Vec<String> = variants
        .languages
        .iter()
        .map(|language| format!("language LIKE {}", stmt.text_param(language)))
        .collect();
    if alternatives.is_empty() {
        "FALSE".to_string()
    } else {
        format!("({})", alternatives.join(" OR "))
    }
}

fn places_sql(stmt: &mut SqlStatement, query: &PlaceQuery) {
    let core = match &query.mode {
        PlaceMode::Name { pattern, variants } => {
            let pattern = stmt.text_param(pattern);
            let base = format!("LOWER(geonames.name) LIKE LOWER({pattern})");
            let canonical = format!(
                "SELECT {PLACE_COLUMNS} FROM geonames{}",
                where_clause(stmt, Some(base), &query.filters)
            );
            match variants {
                None => canonical,
                Some(variants) => {
                    let language = variant_language_sql(stmt, variants);
                    let base = format!(
                        "geonames.id IN (SELECT geonames_id FROM alternate_geonames \
                         WHERE LOWER(name) LIKE LOWER({pattern}) AND {language})"
                    );
                    format!(
                        "{canonical} UNION SELECT {PLACE_COLUMNS} FROM geonames{}",
                        where_clause(stmt, Some(base), &query.filters)
                    )
                }
            }
        }
        PlaceMode::ExternalId { name_type, value } => {
            let base = format!(
                "geonames.id IN (SELECT geonames_id FROM alternate_geonames \
                 WHERE language = {} AND name = {})",
                stmt.text_param(name_type),
                stmt.text_param(value)
            );
            format!(
                "SELECT {PLACE_COLUMNS} FROM geonames{}",
                where_clause(stmt, Some(base), &query.filters)
            )
        }
        PlaceMode::Proximity {
            lon,
            lat,
            radius_km,
            candidate_limit,
        } => {
            let lon = stmt.bind(SqlParam::Float(*lon));
            let lat = stmt.bind(SqlParam::Float(*lat));
            let point = format!("ST_MakePoint({lon}, {lat})");
            let mut candidates = format!(
                "SELECT {PLACE_COLUMNS}, ST_Distance(ST_MakePoint(geonames.lon, geonames.lat)::geography, \
                 {point}::geography) / 1000.0 AS distance FROM geonames{} \
                 ORDER BY ST_MakePoint(geonames.lon, geonames.lat) <-> {point}",
                where_clause(stmt, None, &query.filters)
            );
            if let Some(n) = candidate_limit {
                let _ = write!(candidates, " LIMIT {}", stmt.bind(SqlParam::Int(*n as i64)));
            }
            match radius_km {
                Some(r) => format!(
                    "SELECT * FROM ({candidates}) AS candidates WHERE distance <= {}",
                    stmt.bind(SqlParam::Float(*r))
                ),
                None => candidates,
            }
        }
        PlaceMode::Id { id } => {
            let base = format!("geonames.id = {}", stmt.bind(SqlParam::Int(*id)));
            format!(
                "SELECT {PLACE_COLUMNS} FROM geonames{}",
                where_clause(stmt, Some(base), &query.filters)
            )
        }
        PlaceMode::Keyword { keyword } => {
            let base = format!("keywords_has_geonames.keyword = {}", stmt.text_param(keyword));
            format!(
                "SELECT {PLACE_COLUMNS}, keywords_has_geonames.name AS override_name FROM geonames \
                 JOIN keywords_has_geonames ON keywords_has_geonames.geonames_id = geonames.id{}",
                where_clause(stmt, Some(base), &query.filters)
            )
        }
    };

    stmt.text = format!("SELECT * FROM ({core}) AS places");
    let order: Vec<String> = query
        .order
        .iter()
        .map(|key| order_sql(stmt, key, &query.collation))
        .collect();
    if !order.is_empty() {
        let _ = write!(stmt.text, " ORDER BY {}", order.join(", "));
    }
    if let Some(limit) = query.limit {
        let placeholder = stmt.bind(SqlParam::Int(limit as i64));
        let _ = write!(stmt.text, " LIMIT {placeholder}");
    }
}

/// Render a request as a parameterized statement.
pub fn render(request: &StoreRequest) -> SqlStatement {
    let mut stmt = SqlStatement::default();
    let text = match request {
        StoreRequest::Places(query) => {
            places_sql(&mut stmt, query);
            return stmt;
        }
        StoreRequest::KeywordExists { keyword } => format!(
            "SELECT keyword FROM keywords WHERE keyword = {} LIMIT 1",
            stmt.text_param(keyword)
        ),
        StoreRequest::CountKeyword { keyword } => format!(
            "SELECT COUNT(*) AS count FROM keywords_has_geonames WHERE keyword = {}",
            stmt.text_param(keyword)
        ),
        StoreRequest::FeatureDescriptions { codes } => format!(
            "SELECT code AS key, shortdesc AS name FROM features WHERE code = ANY({})",
            stmt.bind(SqlParam::TextList(codes.clone()))
        ),
        StoreRequest::CountryVariants { iso2, languages } => format!(
            "SELECT g.countries_iso2 AS key, a.name AS name FROM geonames g \
             JOIN alternate_geonames a ON a.geonames_id = g.id \
             WHERE g.features_code = {} AND g.countries_iso2 = ANY({}) AND a.language = ANY({}) \
             ORDER BY a.preferred DESC, a.priority ASC, LENGTH(a.name) ASC",
            stmt.text_param("PCLI"),
            stmt.bind(SqlParam::TextList(iso2.clone())),
            stmt.bind(SqlParam::TextList(languages.clone()))
        ),
        StoreRequest::CountryNames { iso2 } => format!(
            "SELECT iso2 AS key, name FROM countries WHERE iso2 = ANY({})",
            stmt.bind(SqlParam::TextList(iso2.clone()))
        ),
        StoreRequest::MunicipalityNames { ids } => format!(
            "SELECT id AS key, name FROM municipalities WHERE id = ANY({})",
            stmt.bind(SqlParam::IntList(ids.clone()))
        ),
        StoreRequest::MunicipalityVariants { ids, languages } => format!(
            "SELECT municipalities_id AS key, name FROM alternate_municipalities \
             WHERE municipalities_id = ANY({}) AND language = ANY({})",
            stmt.bind(SqlParam::IntList(ids.clone())),
            stmt.bind(SqlParam::TextList(languages.clone()))
        ),
        StoreRequest::AdminNames { keys } => format!(
            "SELECT code AS key, name FROM admin1codes WHERE code = ANY({})",
            stmt.bind(SqlParam::TextList(keys.clone()))
        ),
        StoreRequest::NameVariants {
            ids,
            languages,
            pattern,
        } => {
            let mut text = format!(
                "SELECT geonames_id AS key, name FROM alternate_geonames \
                 WHERE geonames_id = ANY({}) AND language = ANY({}) AND NOT historic",
                stmt.bind(SqlParam::IntList(ids.clone())),
                stmt.bind(SqlParam::TextList(languages.clone()))
            );
            if let Some(pattern) = pattern {
                let _ = write!(text, " AND LOWER(name) LIKE LOWER({})", stmt.text_param(pattern));
            }
            text.push_str(" ORDER BY priority ASC, preferred DESC, LENGTH(name) ASC, name ASC");
            text
        }
        StoreRequest::ExternalIds { ids, name_type } => format!(
            "SELECT geonames_id AS key, name FROM alternate_geonames \
             WHERE geonames_id = ANY({}) AND language = {}",
            stmt.bind(SqlParam::IntList(ids.clone())),
            stmt.text_param(name_type)
        ),
        StoreRequest::Languages => {
            "SELECT iso_639_1, iso_639_2, iso_639_3, name FROM languages".to_string()
        }
    };
    stmt.text = text;
    stmt
}
