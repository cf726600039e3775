//! Gazetteer - Place Name Resolution and Ranking
//!
//! Resolves place names, coordinates, ids and keywords against a gazetteer data store and
//! returns ranked, localized [`LocationRecord`]s.
//!
//! # Quick Start
//!
//! ```rust
//! use gazetteer::{GazetteerEngine, SearchOptionsBuilder};
//! use gazetteer_store::{FrameStore, test_data};
//!
//! let store = FrameStore::new(test_data::sample_tables()?);
//! let mut engine = GazetteerEngine::initialize(store)?;
//!
//! // Names in Swedish, Czech and Slovak places first
//! let options = SearchOptionsBuilder::new()
//!     .countries("cz,sk")
//!     .language("sv")
//!     .build();
//! let places = engine.fetch_by_name(&options, "Prague")?;
//! assert_eq!(places[0].name, "Prag");
//!
//! // Qualify a common name with its municipality or country
//! let options = SearchOptionsBuilder::new().build();
//! let places = engine.fetch_by_name(&options, "Kumpula,Helsinki")?;
//! assert_eq!(places.len(), 1);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Pipeline
//!
//! - [`RankingQueryBuilder`] turns [`SearchOptions`] into a place query with filters and a
//!   deterministic priority ordering.
//! - The [`DataStore`](gazetteer_store::DataStore) runs it.
//! - [`BatchResolver`] resolves every country, feature, municipality, administrative area,
//!   localized name and external id the rows reference, a chunk of codes per request.
//! - [`LocationAssembler`] merges rows and names, applies the area qualifier, the result
//!   limit and the autocomplete ordering.
//!
//! Language codes are matched through a hot-swappable [`LanguageCodeTable`], so rows tagged
//! `sv`, `swe` or any other code of the same language are found together.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod assemble;
mod config;
mod core;
pub mod error;
pub mod language;
mod options;
mod query;
mod resolve;

pub use crate::core::GazetteerEngine;

pub use assemble::{Charset, LocationAssembler, LocationRecord, PlaceRow, exact_matches_first};
pub use config::{
    DEFAULT_FEATURES, EngineConfig, EngineConfigBuilder, IntoCodeList, SearchOptionsBuilder,
};
pub use gazetteer_store as store;
pub use language::{Entry, LanguageCodeTable, LanguageError, SharedLanguageTable};
pub use options::SearchOptions;
pub use polars;
pub use query::RankingQueryBuilder;
pub use resolve::{BatchResolver, ResolutionCaches};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the gazetteer.
///
/// `RUST_LOG` takes precedence over `level`. Polars output is limited to warnings.
///
/// ```rust
/// use gazetteer::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), gazetteer::error::GazetteerError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::GazetteerError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("polars=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| error::GazetteerError::Other(anyhow::anyhow!(e)))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use gazetteer_store::{FrameStore, test_data};

    use super::*;

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    fn engine() -> GazetteerEngine<FrameStore> {
        let store = FrameStore::new(test_data::sample_tables().unwrap());
        let mut engine = GazetteerEngine::new(store).with_languages(SharedLanguageTable::default());
        engine
            .reload_language_table(&EngineConfig::default().special_codes)
            .unwrap();
        engine
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_basic_search() {
        setup_test_env();

        let mut engine = engine();
        let options = SearchOptionsBuilder::new().build();
        let results = engine.fetch_by_name(&options, "Helsinki").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, test_data::HELSINKI);
        assert_eq!(results[0].timezone, "Europe/Helsinki");
    }

    #[test]
    fn test_empty_search() {
        setup_test_env();

        let mut engine = engine();
        let options = SearchOptionsBuilder::new().build();
        assert!(engine.fetch_by_name(&options, "").unwrap().is_empty());
        assert!(engine.fetch_by_name(&options, " ,Helsinki").unwrap().is_empty());
        assert!(
            engine
                .fetch_by_name(&options, "XYZ123NONEXISTENT")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_configuration() {
        setup_test_env();

        let options = SearchOptionsBuilder::global().limit(2).build();
        let mut engine = engine();
        let results = engine.fetch_by_name(&options, "Kumpula").unwrap();
        assert_eq!(results.len(), 2);

        let bad = EngineConfig {
            max_batch_size: 0,
            ..EngineConfig::default()
        };
        assert!(engine.with_config(bad).is_err());
    }
}
