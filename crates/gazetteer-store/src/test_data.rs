//! A small but realistic gazetteer for tests.
//!
//! Finnish places dominate, with enough neighbours (Prague in two countries, Stockholm,
//! Łódź) to exercise country filters, localisation and charset conversion.

use polars::prelude::*;
use tracing::info;

use crate::{Result, frame_store::GazetteerTables};

pub const HELSINKI: i64 = 658225;
/// Shares its name with the capital but has no timezone.
pub const HELSINKI_NO_TIMEZONE: i64 = 700001;
/// Stored with a negated id, looked up as `10000501`.
pub const KAISANIEMI: i64 = -10000501;
pub const KUMPULA_HELSINKI: i64 = 843429;
/// Every Finnish Kumpula, most populous first.
pub const KUMPULA_BY_POPULATION: [i64; 8] = [
    650001, 650002, 650003, 650004, 650005, 650006, 650007, KUMPULA_HELSINKI,
];
pub const PRAHA: i64 = 3067696;
pub const PRAGUE_OKLAHOMA: i64 = 4548393;
pub const STOCKHOLM: i64 = 2673730;
pub const II: i64 = 656820;
pub const IISALMI: i64 = 656913;
pub const IITTI: i64 = 656888;
pub const JOENSUU: i64 = 655808;
pub const JOENSUU_AIRPORT: i64 = 6301380;
pub const HELSINKI_AIRPORT: i64 = 6301381;
pub const KEMI_AIRPORT: i64 = 6301382;
pub const HARMAJA: i64 = 659101;
pub const KUIVASAARI: i64 = 649360;
pub const LODZ: i64 = 3093133;
pub const AHTARI: i64 = 659739;

type PlaceRow = (
    i64,
    &'static str,
    Option<&'static str>,
    f64,
    f64,
    &'static str,
    &'static str,
    Option<&'static str>,
    Option<i64>,
    Option<&'static str>,
    i64,
    Option<i64>,
    Option<i64>,
);

const HKI: Option<&str> = Some("Europe/Helsinki");

#[rustfmt::skip]
const PLACES: &[PlaceRow] = &[
    // id, name, ansiname, lat, lon, iso2, feature, timezone, municipality, admin1, population, elevation, dem
    (HELSINKI, "Helsinki", Some("Helsinki"), 60.16952, 24.93545, "FI", "PPLC", HKI, Some(91), Some("01"), 558457, Some(0), Some(10)),
    (HELSINKI_NO_TIMEZONE, "Helsinki", Some("Helsinki"), 60.17, 24.94, "FI", "PPLX", None, Some(91), Some("01"), 0, None, None),
    (KAISANIEMI, "Helsinki Kaisaniemi", Some("Helsinki Kaisaniemi"), 60.17523, 24.94459, "FI", "PPLX", HKI, Some(91), Some("01"), 0, None, Some(8)),
    (KUMPULA_HELSINKI, "Kumpula", Some("Kumpula"), 60.20889, 24.96222, "FI", "PPLX", HKI, Some(91), Some("01"), 0, None, Some(25)),
    (650001, "Kumpula", Some("Kumpula"), 60.98, 25.66, "FI", "PPL", HKI, Some(398), Some("16"), 1200, None, Some(110)),
    (650002, "Kumpula", Some("Kumpula"), 62.24, 25.75, "FI", "PPL", HKI, Some(179), Some("08"), 800, None, Some(140)),
    (650003, "Kumpula", Some("Kumpula"), 60.41, 22.50, "FI", "PPL", HKI, Some(202), Some("02"), 450, None, Some(20)),
    (650004, "Kumpula", Some("Kumpula"), 60.38, 23.12, "FI", "PPL", HKI, Some(734), Some("02"), 300, None, Some(35)),
    (650005, "Kumpula", Some("Kumpula"), 61.50, 23.76, "FI", "PPL", HKI, Some(837), Some("11"), 120, None, Some(95)),
    (650006, "Kumpula", Some("Kumpula"), 62.89, 27.68, "FI", "PPL", HKI, Some(297), Some("15"), 60, None, Some(100)),
    (650007, "Kumpula", Some("Kumpula"), 63.10, 27.20, "FI", "PPL", HKI, None, Some("15"), 15, None, None),
    (PRAHA, "Praha", Some("Praha"), 50.08804, 14.42076, "CZ", "PPLC", Some("Europe/Prague"), None, Some("52"), 1165581, Some(202), Some(200)),
    (PRAGUE_OKLAHOMA, "Prague", Some("Prague"), 35.48674, -96.68502, "US", "PPL", Some("America/Chicago"), None, Some("OK"), 2386, Some(309), None),
    (STOCKHOLM, "Stockholm", Some("Stockholm"), 59.32938, 18.06871, "SE", "PPLC", Some("Europe/Stockholm"), None, Some("26"), 1515017, Some(28), None),
    (II, "Ii", Some("Ii"), 65.31667, 25.36667, "FI", "PPL", HKI, Some(139), Some("14"), 5000, None, Some(8)),
    (IISALMI, "Iisalmi", Some("Iisalmi"), 63.55915, 27.19067, "FI", "PPLA3", HKI, Some(140), Some("15"), 21945, None, Some(95)),
    (IITTI, "Iitti", Some("Iitti"), 60.88963, 26.33815, "FI", "PPL", HKI, Some(142), Some("18"), 6700, None, Some(60)),
    (650100, "Koski", Some("Koski"), 60.65, 23.14, "FI", "PPL", HKI, Some(284), Some("02"), 2400, None, Some(50)),
    (JOENSUU, "Joensuu", Some("Joensuu"), 62.60118, 29.76316, "FI", "PPLA", HKI, Some(167), Some("13"), 76551, None, Some(80)),
    (JOENSUU_AIRPORT, "Joensuun lentoasema", Some("Joensuun lentoasema"), 62.66291, 29.6075, "FI", "AIRP", HKI, Some(167), Some("13"), 0, Some(121), None),
    (HELSINKI_AIRPORT, "Helsinki-Vantaan lentoasema", Some("Helsinki-Vantaan lentoasema"), 60.3172, 24.9633, "FI", "AIRP", HKI, Some(92), Some("01"), 0, Some(55), None),
    (KEMI_AIRPORT, "Kemi-Tornion lentoasema", Some("Kemi-Tornion lentoasema"), 65.78194, 24.5821, "FI", "AIRP", HKI, Some(240), Some("10"), 0, Some(18), None),
    (HARMAJA, "Harmaja", Some("Harmaja"), 60.10472, 24.97528, "FI", "ISL", HKI, Some(91), Some("01"), 0, None, Some(3)),
    (KUIVASAARI, "Kuivasaari", Some("Kuivasaari"), 60.10694, 25.00889, "FI", "ISL", HKI, Some(91), Some("01"), 0, None, Some(6)),
    (AHTARI, "Ähtäri", None, 62.55, 24.06667, "FI", "PPL", HKI, Some(989), Some("03"), 6000, None, Some(150)),
    (LODZ, "Łódź", Some("Lodz"), 51.75, 19.46667, "PL", "PPLA", Some("Europe/Warsaw"), None, Some("74"), 768755, Some(200), None),
    (660013, "Republic of Finland", Some("Republic of Finland"), 64.0, 26.0, "FI", "PCLI", HKI, None, Some("00"), 5244000, None, None),
    (2661886, "Kingdom of Sweden", Some("Kingdom of Sweden"), 62.0, 15.0, "SE", "PCLI", Some("Europe/Stockholm"), None, Some("00"), 10183175, None, None),
    (3077311, "Czechia", Some("Czechia"), 49.75, 15.0, "CZ", "PCLI", Some("Europe/Prague"), None, Some("00"), 10476000, None, None),
];

#[rustfmt::skip]
const ALTERNATE_NAMES: &[(i64, &str, &str, i64, bool, bool)] = &[
    // geonames_id, name, language, priority, preferred, historic
    (HELSINKI, "Helsinki", "fi", 0, true, false),
    (HELSINKI, "Helsingfors", "sv", 0, true, false),
    (HELSINKI, "Helsingfors stad", "sv", 5, false, true),
    (HELSINKI, "Helsinki", "en", 0, false, false),
    (KUMPULA_HELSINKI, "Gumtäkt", "sv", 0, false, false),
    (KUMPULA_HELSINKI, "101004", "fmisid", 0, false, false),
    (KUMPULA_HELSINKI, "2998", "wmo", 0, false, false),
    (KUMPULA_HELSINKI, "339", "lpnn", 0, false, false),
    (KAISANIEMI, "100971", "fmisid", 0, false, false),
    (PRAHA, "Praha", "fi", 0, false, false),
    (PRAHA, "Prague", "en", 0, true, false),
    (PRAHA, "Prag", "sv", 0, true, false),
    (PRAHA, "Prague", "swe", 1, false, false),
    (STOCKHOLM, "Tukholma", "fi", 0, true, false),
    (STOCKHOLM, "Stockholm", "sv", 0, true, false),
    (660013, "Suomen tasavalta", "fi", 0, false, false),
    (660013, "Suomi", "fi", 0, true, false),
    (660013, "Finland", "sv", 0, true, false),
    (660013, "Finland", "en", 0, true, false),
    (2661886, "Ruotsi", "fi", 0, true, false),
    (2661886, "Sverige", "sv", 0, true, false),
    (3077311, "Tšekki", "fi", 0, true, false),
    (3077311, "Tjeckien", "sv", 0, true, false),
    (3077311, "Czechia", "en", 0, true, false),
];

#[rustfmt::skip]
const MUNICIPALITIES: &[(i64, &str)] = &[
    (91, "Helsinki"), (92, "Vantaa"), (139, "Ii"), (140, "Iisalmi"), (142, "Iitti"),
    (167, "Joensuu"), (179, "Jyväskylä"), (202, "Kaarina"), (240, "Kemi"), (284, "Koski Tl"),
    (297, "Kuopio"), (398, "Lahti"), (734, "Salo"), (837, "Tampere"), (989, "Ähtäri"),
];

const ALTERNATE_MUNICIPALITIES: &[(i64, &str, &str)] = &[
    (91, "Helsingfors", "sv"),
    (92, "Vanda", "sv"),
    (202, "S:t Karins", "sv"),
    (837, "Tammerfors", "sv"),
];

const ADMIN1_CODES: &[(&str, &str)] = &[
    ("fi.01", "Uusimaa"),
    ("fi.15", "Pohjois-Savo"),
    ("cz.52", "Hlavní město Praha"),
    ("us.ok", "Oklahoma"),
    ("se.26", "Stockholm"),
    ("pl.74", "Łódź Voivodeship"),
];

const COUNTRIES: &[(&str, &str)] = &[
    ("FI", "Finland"),
    ("SE", "Sweden"),
    ("CZ", "Czechia"),
    ("SK", "Slovakia"),
    ("US", "United States"),
    ("PL", "Poland"),
];

const FEATURES: &[(&str, &str)] = &[
    ("PPLC", "capital of a political entity"),
    ("PPL", "populated place"),
    ("PPLX", "section of populated place"),
    ("PPLA", "seat of a first-order administrative division"),
    ("PPLA3", "seat of a third-order administrative division"),
    ("ISL", "island"),
    ("AIRP", "airport"),
    ("PCLI", "independent political entity"),
];

const KEYWORD_PLACES: &[(&str, i64, &str)] = &[
    ("finavia", JOENSUU_AIRPORT, "Joensuu"),
    ("finavia", HELSINKI_AIRPORT, "Helsinki-Vantaa"),
    ("finavia", KEMI_AIRPORT, "Kemi-Tornio"),
    ("municipalities_fi", HELSINKI, "Helsinki"),
    ("municipalities_fi", JOENSUU, "Joensuu"),
    ("municipalities_fi", IISALMI, "Iisalmi"),
];

/// Language rows, including one malformed entry and one duplicate 2-letter code.
#[rustfmt::skip]
const LANGUAGES: &[(Option<&str>, Option<&str>, &str, &str)] = &[
    (Some("fi"), Some("fin"), "fin", "Finnish"),
    (Some("sv"), Some("swe"), "swe", "Swedish"),
    (Some("en"), Some("eng"), "eng", "English"),
    (Some("cs"), Some("cze"), "ces", "Czech"),
    (Some("et"), Some("est"), "est", "Estonian"),
    (Some("de"), Some("ger"), "deu", "German"),
    (Some("pl"), Some("pol"), "pol", "Polish"),
    (Some("lv"), Some("lav"), "lav", "Latvian"),
    (None, None, "smn", "Inari Sami"),
    (Some("xx"), None, "x1x", "Broken"),
    (Some("sv"), None, "swx", "Duplicate Swedish"),
];

fn geonames() -> PolarsResult<DataFrame> {
    df!(
        "id" => PLACES.iter().map(|p| p.0).collect::<Vec<_>>(),
        "name" => PLACES.iter().map(|p| p.1).collect::<Vec<_>>(),
        "ansiname" => PLACES.iter().map(|p| p.2).collect::<Vec<_>>(),
        "lat" => PLACES.iter().map(|p| p.3).collect::<Vec<_>>(),
        "lon" => PLACES.iter().map(|p| p.4).collect::<Vec<_>>(),
        "countries_iso2" => PLACES.iter().map(|p| p.5).collect::<Vec<_>>(),
        "features_code" => PLACES.iter().map(|p| p.6).collect::<Vec<_>>(),
        "timezone" => PLACES.iter().map(|p| p.7).collect::<Vec<_>>(),
        "municipalities_id" => PLACES.iter().map(|p| p.8).collect::<Vec<_>>(),
        "admin1" => PLACES.iter().map(|p| p.9).collect::<Vec<_>>(),
        "population" => PLACES.iter().map(|p| p.10).collect::<Vec<_>>(),
        "elevation" => PLACES.iter().map(|p| p.11).collect::<Vec<_>>(),
        "dem" => PLACES.iter().map(|p| p.12).collect::<Vec<_>>(),
        "priority" => vec![0_i64; PLACES.len()],
    )
}

fn alternate_geonames() -> PolarsResult<DataFrame> {
    df!(
        "geonames_id" => ALTERNATE_NAMES.iter().map(|a| a.0).collect::<Vec<_>>(),
        "name" => ALTERNATE_NAMES.iter().map(|a| a.1).collect::<Vec<_>>(),
        "language" => ALTERNATE_NAMES.iter().map(|a| a.2).collect::<Vec<_>>(),
        "priority" => ALTERNATE_NAMES.iter().map(|a| a.3).collect::<Vec<_>>(),
        "preferred" => ALTERNATE_NAMES.iter().map(|a| a.4).collect::<Vec<_>>(),
        "historic" => ALTERNATE_NAMES.iter().map(|a| a.5).collect::<Vec<_>>(),
    )
}

fn code_names(key: &str, value: &str, rows: &[(&str, &str)]) -> PolarsResult<DataFrame> {
    df!(
        key => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        value => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
    )
}

/// The fixture gazetteer.
pub fn sample_tables() -> Result<GazetteerTables> {
    let mut keywords: Vec<&str> = KEYWORD_PLACES.iter().map(|k| k.0).collect();
    keywords.dedup();

    let tables = GazetteerTables {
        geonames: geonames()?,
        alternate_geonames: alternate_geonames()?,
        countries: code_names("iso2", "name", COUNTRIES)?,
        features: code_names("code", "shortdesc", FEATURES)?,
        municipalities: df!(
            "id" => MUNICIPALITIES.iter().map(|m| m.0).collect::<Vec<_>>(),
            "name" => MUNICIPALITIES.iter().map(|m| m.1).collect::<Vec<_>>(),
        )?,
        alternate_municipalities: df!(
            "municipalities_id" => ALTERNATE_MUNICIPALITIES.iter().map(|m| m.0).collect::<Vec<_>>(),
            "name" => ALTERNATE_MUNICIPALITIES.iter().map(|m| m.1).collect::<Vec<_>>(),
            "language" => ALTERNATE_MUNICIPALITIES.iter().map(|m| m.2).collect::<Vec<_>>(),
        )?,
        admin1codes: code_names("code", "name", ADMIN1_CODES)?,
        keywords: df!("keyword" => keywords)?,
        keywords_has_geonames: df!(
            "keyword" => KEYWORD_PLACES.iter().map(|k| k.0).collect::<Vec<_>>(),
            "geonames_id" => KEYWORD_PLACES.iter().map(|k| k.1).collect::<Vec<_>>(),
            "name" => KEYWORD_PLACES.iter().map(|k| k.2).collect::<Vec<_>>(),
        )?,
        languages: df!(
            "iso_639_1" => LANGUAGES.iter().map(|l| l.0).collect::<Vec<_>>(),
            "iso_639_2" => LANGUAGES.iter().map(|l| l.1).collect::<Vec<_>>(),
            "iso_639_3" => LANGUAGES.iter().map(|l| l.2).collect::<Vec<_>>(),
            "name" => LANGUAGES.iter().map(|l| l.3).collect::<Vec<_>>(),
        )?,
    };
    info!(
        places = tables.geonames.height(),
        alternate_names = tables.alternate_geonames.height(),
        "Created sample gazetteer"
    );
    Ok(tables)
}
