use std::fs;
use std::path::PathBuf;

use bidline_core::{
    expand_ranges, load_price_csv, BidderSelection, CreativeType, RoadblockType, SetupError,
    Settings,
};
use tempfile::TempDir;

const SETTINGS: &str = r#"
order_name = "Prebid Video"
user_email = "ops@example.com"
advertiser_name = "PubMatic"
advertiser_type = "AD_NETWORK"
line_item_type = "NETWORK"
placements = ["preroll"]
sizes = [{ width = 640, height = 480 }]
currency_code = "EUR"
creative_type = "JWPLAYER"
bidder_code = "appnexus"
exchange_rate = 0.9
"#;

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write fixture");
    path
}

#[test]
fn load_settings_and_csv_from_disk() {
    let dir = TempDir::new().unwrap();
    let csv = write(
        &dir,
        "buckets.csv",
        "order,advertiser,start,end,granularity,rate\nO,A,1,2,0.5,2\n",
    );
    let settings_path = write(&dir, "settings.toml", SETTINGS);

    let settings = Settings::load(&settings_path)
        .unwrap()
        .with_bucket_csv(csv.clone())
        .validate()
        .unwrap();

    assert_eq!(settings.bucket_csv, csv);
    assert_eq!(settings.creative_type, CreativeType::Jwplayer);
    assert_eq!(
        settings.bidder,
        Some(BidderSelection::Many(vec!["pubmatic".to_string()]))
    );
    assert_eq!(settings.roadblock_type, RoadblockType::OneOrMore);
    assert_eq!(settings.exchange_rate, 0.9);

    let ranges = load_price_csv(&settings.bucket_csv).unwrap();
    let buckets = expand_ranges(&ranges, settings.exchange_rate).unwrap();
    let rates: Vec<f64> = buckets.iter().map(|b| b.rate).collect();
    assert_eq!(rates, vec![0.9, 1.35]);
}

#[test]
fn missing_bucket_csv_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let settings_path = write(&dir, "settings.toml", SETTINGS);
    let err = Settings::load(&settings_path).unwrap().validate().unwrap_err();
    assert!(matches!(err, SetupError::Configuration(msg) if msg.contains("bucket_csv")));
}

#[test]
fn missing_files_surface_io_errors() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Settings::load(&dir.path().join("nope.toml")),
        Err(SetupError::Io(_))
    ));
    assert!(matches!(
        load_price_csv(&dir.path().join("nope.csv")),
        Err(SetupError::Io(_))
    ));
}
