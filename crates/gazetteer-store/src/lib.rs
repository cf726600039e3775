//! Data store seam for the gazetteer engine.
//!
//! The engine never talks to a database directly. Every read it needs is expressed as a
//! [`StoreRequest`], a structured descriptor with one explicit variant per request kind,
//! and handed to a [`DataStore`]. The store answers with a polars [`DataFrame`] whose
//! columns are named as documented on each request variant.
//!
//! Two implementations of the seam ship with this crate:
//!
//! - [`FrameStore`], an in-memory store over the fixed gazetteer tables held as polars
//!   frames (optionally loaded from a directory of parquet files).
//! - [`sql`], a renderer from descriptors to parameterized SQL for relational adapters.
//!
//! Locale primitives shared by both sides of the seam (collation-aware comparison and
//! SQL `LIKE` matching) live in [`collation`] and [`like`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use polars::prelude::DataFrame;

pub mod collation;
pub mod frame_store;
pub mod like;
pub mod request;
pub mod sql;
pub mod test_data;

pub use collation::Collation;
pub use error::{Result, StoreError};
pub use frame_store::{FrameStore, GazetteerTables};
pub use request::{
    OrderKey, PlaceFilter, PlaceMode, PlaceQuery, RankRow, StoreRequest, VariantMatch,
};

/// Column names shared by store responses and the engine.
pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const ANSINAME: &str = "ansiname";
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
    pub const ISO2: &str = "iso2";
    pub const FEATURES_CODE: &str = "features_code";
    pub const TIMEZONE: &str = "timezone";
    pub const MUNICIPALITIES_ID: &str = "municipalities_id";
    pub const ADMIN1: &str = "admin1";
    pub const POPULATION: &str = "population";
    pub const ELEVATION: &str = "elevation";
    pub const DEM: &str = "dem";
    pub const OVERRIDE_NAME: &str = "override_name";
    pub const GEONAMES_PRIORITY: &str = "geonames_priority";
    /// Great-circle distance in kilometres, present on proximity results.
    pub const DISTANCE: &str = "distance";
    /// Lookup key of a resolution response (code, iso2 or id).
    pub const KEY: &str = "key";
    pub const COUNT: &str = "count";
    pub const KEYWORD: &str = "keyword";
    pub const ISO_639_1: &str = "iso_639_1";
    pub const ISO_639_2: &str = "iso_639_2";
    pub const ISO_639_3: &str = "iso_639_3";
}

/// Cooperative cancellation flag forwarded with every store request.
///
/// Cloning shares the flag, so a caller can keep one handle and trip it from another
/// thread while a request is in flight. Stores that cannot abort mid-request should at
/// least check it before starting work.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A queryable source of gazetteer rows.
///
/// Implementations own their connection state, so reads take `&mut self`: one store
/// instance serves one caller at a time.
pub trait DataStore {
    /// Execute a read described by `request` and return its rows.
    fn execute_read(&mut self, request: &StoreRequest, cancel: &CancelSignal)
    -> Result<DataFrame>;

    /// Quote a string literal for inclusion in query text.
    fn quote(&self, literal: &str) -> String {
        sql::quote_literal(literal)
    }
}

impl<S: DataStore + ?Sized> DataStore for Box<S> {
    fn execute_read(
        &mut self,
        request: &StoreRequest,
        cancel: &CancelSignal,
    ) -> Result<DataFrame> {
        (**self).execute_read(request, cancel)
    }

    fn quote(&self, literal: &str) -> String {
        (**self).quote(literal)
    }
}

mod error {
    use polars::prelude::PolarsError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum StoreError {
        #[error("Connection error: {0}")]
        Connection(String),
        #[error("Query '{operation}' failed: {message}")]
        Query {
            operation: &'static str,
            message: String,
        },
        #[error("Request cancelled")]
        Cancelled,
        #[error("Table '{0}' not found")]
        MissingTable(String),
        #[error("Invalid pattern: {0}")]
        Pattern(#[from] regex::Error),
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] PolarsError),
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }

    impl StoreError {
        /// Whether the failure means the store itself is unusable.
        pub const fn is_fatal(&self) -> bool {
            matches!(self, Self::Connection(_) | Self::Cancelled)
        }
    }

    pub type Result<T> = std::result::Result<T, StoreError>;
}
