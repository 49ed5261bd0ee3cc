use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use scatt_kernel::config::ScattConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SCATT_CONFIG",
        "SCATT_SOURCE_URL",
        "SCATT_THRESHOLD",
        "SCATT_COOLDOWN_MS",
        "SCATT_LEDGER_CAPACITY",
        "SCATT_EXPORT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let export_dir = file.path().with_extension("exports");
    let json = format!(
        r#"{{
            "threshold": 205,
            "cooldown_ms": 250,
            "roi": {{ "center_x": 320, "center_y": 240, "radius": 60 }},
            "scale": {{ "camera_px_per_mm": 0.45, "display_px_per_mm": 2.5 }},
            "ledger": {{ "capacity": 120 }},
            "frame_skip": {{ "frame_budget_ms": 20, "relax_after": 90, "max_skip": 3 }},
            "source": {{
                "url": "stub://lane_1",
                "width": 640,
                "height": 480,
                "target_fps": 60
            }},
            "export": {{ "dir": "{}" }}
        }}"#,
        export_dir.display()
    );
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SCATT_CONFIG", file.path());
    std::env::set_var("SCATT_THRESHOLD", "231.5");
    std::env::set_var("SCATT_LEDGER_CAPACITY", "200");

    let cfg = ScattConfig::load().expect("load config");

    assert_eq!(cfg.detection.threshold, 231.5);
    assert_eq!(cfg.detection.cooldown, Duration::from_millis(250));
    assert_eq!(
        (
            cfg.detection.roi.center_x,
            cfg.detection.roi.center_y,
            cfg.detection.roi.radius
        ),
        (320, 240, 60)
    );
    assert_eq!(cfg.detection.scale.camera_px_per_mm, 0.45);
    assert_eq!(cfg.detection.scale.display_px_per_mm, 2.5);
    assert_eq!(cfg.detection.ledger_capacity, 200);
    assert_eq!(cfg.detection.frame_skip.frame_budget, Duration::from_millis(20));
    assert_eq!(cfg.detection.frame_skip.relax_after, 90);
    assert_eq!(cfg.detection.frame_skip.max_skip, 3);
    assert_eq!(cfg.source.url, "stub://lane_1");
    assert_eq!((cfg.source.width, cfg.source.height), (640, 480));
    assert_eq!(cfg.source.target_fps, 60);
    assert_eq!(cfg.export_dir, export_dir);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        threshold = 190.0
        cooldown_ms = 400

        [ledger]
        capacity = 10
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("SCATT_CONFIG", file.path());
    std::env::set_var("SCATT_COOLDOWN_MS", "500");
    std::env::set_var("SCATT_SOURCE_URL", "stub://toml");

    let cfg = ScattConfig::load().expect("load config");
    assert_eq!(cfg.detection.threshold, 190.0);
    assert_eq!(cfg.detection.cooldown, Duration::from_millis(500));
    assert_eq!(cfg.detection.ledger_capacity, 10);
    assert_eq!(cfg.source.url, "stub://toml");
    assert_eq!(cfg.detection.roi.radius, 40);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScattConfig::load().expect("load defaults");
    assert_eq!(cfg.detection.threshold, 220.0);
    assert_eq!(cfg.detection.cooldown, Duration::from_millis(300));
    assert_eq!(cfg.detection.ledger_capacity, 50);
    assert_eq!(cfg.source.url, "stub://target");
    assert_eq!(cfg.export_dir, std::path::PathBuf::from("."));
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SCATT_THRESHOLD", "bright");
    assert!(ScattConfig::load().is_err());
    std::env::set_var("SCATT_THRESHOLD", "300");
    assert!(ScattConfig::load().is_err());
    std::env::set_var("SCATT_THRESHOLD", "-1");
    assert!(ScattConfig::load().is_err());
    std::env::remove_var("SCATT_THRESHOLD");

    std::env::set_var("SCATT_LEDGER_CAPACITY", "0");
    assert!(ScattConfig::load().is_err());
    std::env::set_var("SCATT_LEDGER_CAPACITY", "201");
    assert!(ScattConfig::load().is_err());
    std::env::remove_var("SCATT_LEDGER_CAPACITY");

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(
        &mut file,
        br#"{ "roi": { "center_x": 300, "center_y": 90, "radius": 40 } }"#,
    )
    .expect("write config");
    std::env::set_var("SCATT_CONFIG", file.path());
    let err = ScattConfig::load().expect_err("roi outside frame");
    assert!(err.to_string().contains("does not fit"));

    std::env::set_var("SCATT_CONFIG", "/nonexistent/scatt.json");
    assert!(ScattConfig::load().is_err());

    clear_env();
}
