//! Per-call search options.
//!
//! [`SearchOptions`] is a plain value: build one with
//! [`SearchOptionsBuilder`](crate::SearchOptionsBuilder), pass it by reference to an engine
//! operation, and reuse it as often as you like. The engine never mutates it; the two places
//! that need a variation (the all-countries fallback and keyword searches) derive a copy.

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use gazetteer_store::Collation;

/// List tokens that disable filtering on their dimension.
const ALL_TOKENS: [&str; 2] = ["%", "all"];

fn contains_all_token(values: &[String]) -> bool {
    values
        .iter()
        .any(|v| ALL_TOKENS.iter().any(|t| v.eq_ignore_ascii_case(t)))
}

/// Trimmed and lower-cased, as the builder stores codes.
#[cfg(feature = "serde")]
fn deserialize_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let code = <String as serde::Deserialize>::deserialize(deserializer)?;
    Ok(code.trim().to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SearchOptions {
    pub(crate) countries: Vec<String>,
    pub(crate) excluded_countries: Vec<String>,
    pub(crate) features: Vec<String>,
    pub(crate) keywords: Vec<String>,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_code"))]
    pub(crate) language: String,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_code"))]
    pub(crate) charset: String,
    pub(crate) collation: String,
    pub(crate) auto_collation: bool,
    pub(crate) autocomplete: bool,
    pub(crate) full_country_search: bool,
    pub(crate) search_variants: bool,
    pub(crate) result_limit: usize,
    pub(crate) population_min: u32,
    pub(crate) population_max: u32,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_code"))]
    pub(crate) name_type: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        crate::SearchOptionsBuilder::new().build()
    }
}

impl SearchOptions {
    pub fn builder() -> crate::SearchOptionsBuilder {
        crate::SearchOptionsBuilder::new()
    }

    /// Countries in priority order.
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn excluded_countries(&self) -> &[String] {
        &self.excluded_countries
    }

    /// Feature codes in priority order.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Always lower-case.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn collation(&self) -> &str {
        &self.collation
    }

    pub fn auto_collation(&self) -> bool {
        self.auto_collation
    }

    pub fn autocomplete(&self) -> bool {
        self.autocomplete
    }

    pub fn full_country_search(&self) -> bool {
        self.full_country_search
    }

    pub fn search_variants(&self) -> bool {
        self.search_variants
    }

    /// Maximum number of records, `0` for no limit.
    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    pub fn population_min(&self) -> u32 {
        self.population_min
    }

    pub fn population_max(&self) -> u32 {
        self.population_max
    }

    /// External identifier type (`fmisid`, `wmo`, `lpnn`), empty for ordinary name search.
    pub fn name_type(&self) -> &str {
        &self.name_type
    }

    pub fn all_countries(&self) -> bool {
        contains_all_token(&self.countries)
    }

    pub fn all_features(&self) -> bool {
        contains_all_token(&self.features)
    }

    pub fn all_keywords(&self) -> bool {
        contains_all_token(&self.keywords)
    }

    /// The collation used for ordering and area comparison.
    pub fn effective_collation(&self) -> &str {
        if !self.auto_collation {
            return &self.collation;
        }
        match self.language.as_str() {
            "fi" | "sv" => Collation::SWEDISH_NAME,
            "et" => Collation::ESTONIAN_NAME,
            _ => Collation::GENERAL_NAME,
        }
    }

    /// The options of the one-shot retry over every country.
    pub fn with_all_countries(&self) -> Self {
        Self {
            countries: vec!["%".to_string()],
            ..self.clone()
        }
    }

    /// The same options without a result limit.
    pub fn unbounded(&self) -> Self {
        Self {
            result_limit: 0,
            ..self.clone()
        }
    }

    /// Text key over every field, in declaration order.
    pub fn cache_key(&self) -> String {
        let flag = |b: bool| if b { "1" } else { "0" };
        [
            self.countries.join(","),
            self.excluded_countries.join(","),
            self.features.join(","),
            self.keywords.join(","),
            self.language.clone(),
            self.charset.clone(),
            self.collation.clone(),
            flag(self.auto_collation).to_string(),
            flag(self.autocomplete).to_string(),
            flag(self.full_country_search).to_string(),
            flag(self.search_variants).to_string(),
            self.result_limit.to_string(),
            self.population_min.to_string(),
            self.population_max.to_string(),
            self.name_type.clone(),
        ]
        .join(":")
    }

    /// Hash of [`Self::cache_key`] with fixed seeds, stable for a given build.
    pub fn fingerprint(&self) -> u64 {
        let state = RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        );
        let mut hasher = state.build_hasher();
        self.cache_key().hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchOptionsBuilder;

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialized_codes_are_lowercase() {
        let options: SearchOptions =
            serde_json::from_str(r#"{"language": " SV ", "charset": "Latin1"}"#).unwrap();
        assert_eq!(options.language(), "sv");
        assert_eq!(options.charset(), "latin1");
        // missing fields take the builder defaults
        assert_eq!(options.countries(), ["fi"]);
        assert_eq!(options.result_limit(), 100);
    }

    #[test]
    fn test_all_tokens() {
        let options = SearchOptionsBuilder::new().countries("fi,%").build();
        assert!(options.all_countries());
        let options = SearchOptionsBuilder::new().features(["ALL"]).build();
        assert!(options.all_features());
        let options = SearchOptionsBuilder::new().build();
        assert!(!options.all_countries());
        assert!(!options.all_keywords());
    }

    #[test]
    fn test_effective_collation() {
        let options = SearchOptionsBuilder::new()
            .collation("utf8_bin")
            .language("SV")
            .build();
        assert_eq!(options.effective_collation(), "utf8_bin");

        let auto = |language: &str| {
            SearchOptionsBuilder::new()
                .auto_collation(true)
                .language(language)
                .build()
                .effective_collation()
                .to_string()
        };
        assert_eq!(auto("fi"), "utf8_swedish_ci");
        assert_eq!(auto("sv"), "utf8_swedish_ci");
        assert_eq!(auto("et"), "utf8_estonian_ci");
        assert_eq!(auto("en"), "utf8_general_ci");
    }

    #[test]
    fn test_derived_copies() {
        let options = SearchOptionsBuilder::new().countries("fi,se").limit(5).build();
        let fallback = options.with_all_countries();
        assert!(fallback.all_countries());
        assert_eq!(fallback.result_limit(), 5);
        assert_eq!(options.unbounded().result_limit(), 0);
        assert_eq!(options.countries(), ["fi", "se"]);
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let a = SearchOptionsBuilder::new().countries("fi,se").build();
        let b = SearchOptionsBuilder::new().countries("se,fi").build();
        let c = SearchOptionsBuilder::new().countries(vec!["fi", "se"]).build();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_cache_key_covers_flags_and_limits() {
        let base = SearchOptionsBuilder::new().build();
        let changed = [
            SearchOptionsBuilder::new().autocomplete(true).build(),
            SearchOptionsBuilder::new().population_min(10).build(),
            SearchOptionsBuilder::new().name_type("wmo").build(),
            SearchOptionsBuilder::new().charset("latin1").build(),
        ];
        for options in changed {
            assert_ne!(options.cache_key(), base.cache_key());
            assert_ne!(options.fingerprint(), base.fingerprint());
        }
    }
}
