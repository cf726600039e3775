use gazetteer_store::{
    CancelSignal, DataStore, FrameStore, GazetteerTables, OrderKey, PlaceFilter, PlaceMode,
    PlaceQuery, StoreError, StoreRequest, columns, sql, test_data,
};

fn names(df: &polars::prelude::DataFrame) -> Vec<String> {
    df.column(columns::NAME)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_parquet_round_trip_answers_the_same_queries() {
    let dir = tempfile::tempdir().unwrap();
    let tables = test_data::sample_tables().unwrap();
    tables.write_parquet_dir(dir.path()).unwrap();

    for table in GazetteerTables::TABLE_NAMES {
        assert!(dir.path().join(format!("{table}.parquet")).exists());
    }

    let mut original = FrameStore::new(tables);
    let mut reloaded = FrameStore::from_parquet_dir(dir.path()).unwrap();
    assert_eq!(
        reloaded.tables().geonames.height(),
        original.tables().geonames.height()
    );

    let mut query = PlaceQuery::new(PlaceMode::Name {
        pattern: "Kumpula".into(),
        variants: None,
    });
    query.filters = vec![PlaceFilter::HasTimezone];
    query.order = vec![OrderKey::PopulationDesc, OrderKey::Name];
    let request = StoreRequest::Places(query);
    let cancel = CancelSignal::new();

    let a = original.execute_read(&request, &cancel).unwrap();
    let b = reloaded.execute_read(&request, &cancel).unwrap();
    assert!(a.equals_missing(&b));
}

#[test]
fn test_missing_table_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let result = FrameStore::from_parquet_dir(dir.path());
    assert!(matches!(result, Err(StoreError::MissingTable(table)) if table == "geonames"));
}

#[test]
fn test_external_id_search() {
    let mut store = FrameStore::new(test_data::sample_tables().unwrap());
    let request = StoreRequest::Places(PlaceQuery::new(PlaceMode::ExternalId {
        name_type: "fmisid".into(),
        value: "101004".into(),
    }));
    let df = store.execute_read(&request, &CancelSignal::new()).unwrap();
    assert_eq!(names(&df), vec!["Kumpula"]);
    assert_eq!(
        df.column(columns::ID).unwrap().i64().unwrap().get(0),
        Some(test_data::KUMPULA_HELSINKI)
    );
}

#[test]
fn test_resolution_requests_use_key_and_name_columns() {
    let mut store = FrameStore::new(test_data::sample_tables().unwrap());
    let cancel = CancelSignal::new();

    let features = store
        .execute_read(
            &StoreRequest::FeatureDescriptions {
                codes: vec!["PPLC".into(), "XXXX".into()],
            },
            &cancel,
        )
        .unwrap();
    assert_eq!(features.get_column_names_str(), ["key", "name"]);
    assert_eq!(names(&features), vec!["capital of a political entity"]);

    let admins = store
        .execute_read(
            &StoreRequest::AdminNames {
                keys: vec!["fi.15".into()],
            },
            &cancel,
        )
        .unwrap();
    assert_eq!(names(&admins), vec!["Pohjois-Savo"]);

    let municipalities = store
        .execute_read(
            &StoreRequest::MunicipalityVariants {
                ids: vec![91, 398],
                languages: vec!["sv".into(), "swe".into()],
            },
            &cancel,
        )
        .unwrap();
    assert_eq!(names(&municipalities), vec!["Helsingfors"]);
}

#[test]
fn test_sql_renders_every_request_kind() {
    let requests = [
        StoreRequest::KeywordExists {
            keyword: "finavia".into(),
        },
        StoreRequest::CountKeyword {
            keyword: "finavia".into(),
        },
        StoreRequest::CountryNames {
            iso2: vec!["FI".into()],
        },
        StoreRequest::ExternalIds {
            ids: vec![test_data::KUMPULA_HELSINKI],
            name_type: "wmo".into(),
        },
        StoreRequest::Languages,
    ];
    for request in &requests {
        let stmt = sql::render(request);
        assert!(stmt.text.starts_with("SELECT "), "{}", request.operation());
        assert!(!stmt.inline(sql::quote_literal).contains('$'));
    }
}
