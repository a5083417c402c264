use pawcare_config::DistanceCalibration;
use tempfile::tempdir;

#[test]
fn missing_file_defaults_to_one() {
    let dir = tempdir().unwrap();
    let c = DistanceCalibration::load_or_default(&dir.path().join("config.json"));
    assert_eq!(c.distance_scale, 1.0);
}

#[test]
fn garbage_or_non_positive_defaults_to_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();
    assert_eq!(DistanceCalibration::load_or_default(&path).distance_scale, 1.0);
    std::fs::write(&path, r#"{"distance_scale": -2.0}"#).unwrap();
    assert_eq!(DistanceCalibration::load_or_default(&path).distance_scale, 1.0);
}

#[test]
fn save_then_load_keeps_other_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"owner": "kitchen", "distance_scale": 1.0}"#).unwrap();

    DistanceCalibration { distance_scale: 1.25 }.save(&path).unwrap();

    let loaded = DistanceCalibration::load_or_default(&path);
    assert_eq!(loaded.distance_scale, 1.25);
    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["owner"], "kitchen");
    assert!(!path.with_extension("new").exists());
}
