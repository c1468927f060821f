use approx::assert_relative_eq;
use nls_core::{
    ModelKind, NlsError, PhysicalParameters, Problem, ScenarioConfig, SolutionRecord,
};

fn model(num_nodes: usize) -> nls_core::Model {
    let mut config = ScenarioConfig::new(
        ModelKind::TwoD,
        PhysicalParameters { r: 0.05, gamma: 0.566, g: 1.0e-3, tilde_g: 0.011, gamma_r: 10.0 },
    );
    config.num_nodes = Some(num_nodes);
    config.description = Some("two spots".into());
    Problem::model(config).unwrap()
}

#[test]
fn stored_file_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solution.json");

    let mut original = model(8);
    original.solve(Some(10)).unwrap();
    original.solution_mut().set_label("after ten");
    original.solution().store_to_path(&path).unwrap();

    let mut restored = model(8);
    restored.solution_mut().restore_from_path(&path).unwrap();

    let (a, b) = (original.solution(), restored.solution());
    assert_eq!(a.coefficients(), b.coefficients());
    assert_eq!(a.original_params(), b.original_params());
    assert_eq!(a.elapsed_time(), b.elapsed_time());
    assert_eq!(b.description(), "two spots");
    assert_eq!(b.label(), "after ten");
    for (x, y) in a.solution().iter().zip(b.solution()) {
        assert_relative_eq!(x.re, y.re);
        assert_relative_eq!(x.im, y.im);
    }
}

#[test]
fn record_carries_pumping_sample() {
    let m = model(6);
    let record = m.solution().to_record();
    assert_eq!(record.pumping_sample, m.solution().pumping_sample());

    let text = serde_json::to_string(&record).unwrap();
    let keys = [
        "description",
        "label",
        "coefficients",
        "elapsed_time",
        "original_params",
        "pumping_sample",
        "field",
    ];
    for key in keys {
        assert!(text.contains(&format!("\"{key}\"")), "missing {key}");
    }
    let back: SolutionRecord = serde_json::from_str(&text).unwrap();
    assert_eq!(back, record);
}

#[test]
fn restore_rejects_other_grid() {
    let mut buffer = Vec::new();
    model(6).solution().store(&mut buffer).unwrap();

    let mut other = model(7);
    assert!(matches!(
        other.solution_mut().restore(buffer.as_slice()),
        Err(NlsError::ShapeMismatch { expected: 49, found: 36 })
    ));
}

#[test]
fn zero_rate_is_not_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solution.json");

    let mut config = ScenarioConfig::new(
        ModelKind::OneD,
        PhysicalParameters { r: 0.05, gamma: 0.566, g: 0.0, tilde_g: 0.011, gamma_r: 10.0 },
    );
    config.num_nodes = Some(4);
    let model = Problem::model(config).unwrap();

    assert!(matches!(
        model.solution().store_to_path(&path),
        Err(NlsError::NonFiniteRecord { what: "coefficients", .. })
    ));
    assert!(!path.exists());
}
