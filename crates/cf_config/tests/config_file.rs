// crates/cf_config/tests/config_file.rs

//! 配置文件读写与选项表的集成测试

use cf_config::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_kernel_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.json");

    let config = KernelConfig {
        root_name: "Model".to_string(),
        fanout_timeout_ms: 1200,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = KernelConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_kernel_config_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "processor_name": "  " }}"#).unwrap();

    let err = KernelConfig::load(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = KernelConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_options_configured_from_plain_json() {
    let mut options = OptionList::new();
    options.add_option("cfl", 0.5).unwrap();
    options.add_option("steps", 10_i64).unwrap();
    options
        .add_option("scheme", "hllc")
        .unwrap()
        .restricted_to(["hllc", "roe"])
        .unwrap();

    let json = serde_json::json!({ "cfl": 1, "scheme": "roe" });
    let frame = ArgumentFrame::from_plain_json(&json).unwrap();
    options.configure(&frame).unwrap();

    // 整数被拓宽为实数
    assert_eq!(options.get("cfl").unwrap(), &Value::Real(1.0));
    assert_eq!(options.value::<String>("scheme").unwrap(), "roe");
    assert_eq!(options.value::<i64>("steps").unwrap(), 10);
}

#[test]
fn test_frame_survives_json_serialisation() {
    let mut frame = ArgumentFrame::new().with("cfl", 0.25).with("name", "a");
    frame.map_mut("nested").set("flags", vec![true, false]);

    let text = serde_json::to_string(&frame).unwrap();
    let back: ArgumentFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(back, frame);
}
