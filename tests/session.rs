use svg_painter::{
    EngineEvent, PainterSettings, RunController, Session, SettingsError, ShapeKind, StartRun, WireMessage,
};

#[test]
fn test_settings_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let settings = PainterSettings {
        seed: 99,
        shape_kinds: vec![ShapeKind::Stroke, ShapeKind::Rectangle],
        max_duration_secs: Some(2.5),
        ..Default::default()
    };
    settings.save(&path).unwrap();
    assert_eq!(PainterSettings::load(&path).unwrap(), settings);
}

#[test]
fn test_partial_settings_file_takes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "seed": 4, "shape_kinds": ["ellipse"] }"#).unwrap();
    let loaded = PainterSettings::load(&path).unwrap();
    assert_eq!(loaded.seed, 4);
    assert_eq!(loaded.shape_kinds, vec![ShapeKind::Ellipse]);
    assert_eq!(loaded.max_primitives, PainterSettings::default().max_primitives);
}

#[test]
fn test_invalid_settings_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "shape_kinds": [] }"#).unwrap();
    assert!(matches!(PainterSettings::load(&path), Err(SettingsError::Invalid(_))));
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(PainterSettings::load(&path), Err(SettingsError::Parse(_))));
    assert!(matches!(PainterSettings::load(dir.path().join("missing.json")), Err(SettingsError::Io(_))));
}

#[test]
fn test_wire_stream_feeds_session_and_exports_last_snapshot() {
    let request = StartRun::from_json(
        &serde_json::json!({
            "pxdata": ([10, 20, 30, 255].repeat(8 * 8)),
            "width": 8,
            "height": 8,
        })
        .to_string(),
    )
    .unwrap();
    let settings = PainterSettings { max_iterations: 40, snapshot_interval: 1, ..Default::default() };
    let handle = RunController::spawn(request, &settings).unwrap();

    let mut session = Session::new();
    let mut last_svg = None;
    for event in handle.events().iter() {
        if let EngineEvent::Snapshot(s) = &event {
            last_svg = Some(s.svg.clone());
        }
        session.receive(&WireMessage::from(&event).to_json()).unwrap();
    }
    handle.join();

    assert!(session.is_done());
    assert_eq!(session.protocol_errors(), 0);
    let last_svg = last_svg.unwrap();
    assert_eq!(session.latest_svg(), Some(last_svg.as_str()));

    let dir = tempfile::tempdir().unwrap();
    let path = session.export_at(dir.path(), 1_700_000_000_000).unwrap().unwrap();
    assert_eq!(path.file_name().unwrap(), "svg-painting-1700000000000.svg");
    assert_eq!(std::fs::read(&path).unwrap(), last_svg.into_bytes());
}

#[test]
fn test_unknown_tag_does_not_end_session() {
    let mut session = Session::new();
    session.receive(r#"["SVG","<svg/>"]"#).unwrap();
    assert!(session.receive(r#"["STATS",{"rmse":0.1}]"#).is_err());
    assert!(!session.is_done());
    session.receive(r#"["DONE"]"#).unwrap();
    assert!(session.is_done());
    assert_eq!(session.protocol_errors(), 1);
}

#[test]
fn test_export_without_snapshot_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Session::new().export_to(dir.path()).unwrap().is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
