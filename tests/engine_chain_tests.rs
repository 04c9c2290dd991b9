use featstream::core::{status_code, AttrValue, Severity, StreamDescriptor};
use featstream::engine::{Chain, ChainState};
use featstream::modules::{Chop, Rms, Scale, Slice};
use serde_json::json;
use std::io::Write;

fn scalar() -> StreamDescriptor {
    StreamDescriptor::new(1, 1, 100.0)
}

#[test]
fn test_state_transitions() {
    let mut chain = Chain::new();
    chain.push(Box::new(Chop::new()));
    assert_eq!(chain.state().name(), "Unconfigured");

    assert_eq!(chain.process_status(0.0, 1.0, &[1.0], 1, 1), -2);
    assert_eq!(chain.finalize_status(0.0), -2);
    assert_eq!(chain.reset_status(), -2);

    chain.negotiate(&scalar()).unwrap();
    assert_eq!(chain.state(), &ChainState::Configured);

    chain.process_values(0.0, 1.0, &[1.0], 1, 1).unwrap();
    assert_eq!(chain.state(), &ChainState::Streaming);

    chain.finalize(10.0).unwrap();
    assert_eq!(chain.state(), &ChainState::Finalized);
    assert_eq!(chain.process_status(20.0, 1.0, &[1.0], 1, 1), -2);

    chain.reset().unwrap();
    assert_eq!(chain.state(), &ChainState::Configured);
    chain.process_values(0.0, 1.0, &[1.0], 1, 1).unwrap();
}

#[test]
fn test_frame_size_mismatch_enters_error_state() {
    let mut chain = Chain::new();
    chain.push(Box::new(Scale::new()));
    chain.negotiate(&StreamDescriptor::new(2, 1, 100.0)).unwrap();

    assert_eq!(chain.process_status(0.0, 1.0, &[1.0, 2.0, 3.0], 3, 1), -4);
    assert_eq!(chain.state().name(), "Error");
    assert!(chain.sink().frames().is_empty());

    let errors = chain.drain_diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Error);

    // the output shape is still known, so reset recovers
    assert_eq!(chain.reset_status(), 0);
    assert_eq!(chain.process_status(0.0, 1.0, &[1.0, 2.0], 2, 1), 0);
}

#[test]
fn test_failed_negotiation_short_circuits() {
    let mut chain = Chain::new();
    chain.push(Box::new(Scale::new())).push(Box::new(Slice::new()));

    assert_eq!(
        chain.negotiate_status(false, 100.0, 0.0, 1, 4, &[], false, 0.0, 1),
        -3
    );
    assert_eq!(chain.state().name(), "Error");
    assert_eq!(chain.sink().negotiations(), 0);
    assert!(chain.output_descriptor().is_none());

    // nothing negotiated, reset cannot recover
    assert_eq!(chain.reset_status(), -2);

    assert_eq!(
        chain.negotiate_status(false, 8000.0, 0.0, 1, 1, &["mono"], false, 0.0, 256),
        0
    );
    assert_eq!(chain.state(), &ChainState::Configured);
    let out = chain.output_descriptor().unwrap();
    assert_eq!(out.height, 512);
    assert_eq!(out.labels, vec!["mono"]);
}

#[test]
fn test_invalid_descriptor_is_rejected() {
    let mut chain = Chain::new();
    assert_eq!(chain.negotiate_status(false, -1.0, 0.0, 1, 1, &[], false, 0.0, 1), -9);
    assert_eq!(chain.negotiate_status(false, 10.0, 0.0, 0, 1, &[], false, 0.0, 1), -9);
}

#[test]
fn test_attribute_errors() {
    let mut chain = Chain::new();
    chain.push(Box::new(Slice::new()));

    let err = chain.set_attribute(0, "size", AttrValue::Bool(true), false).unwrap_err();
    assert_eq!(status_code(&err), -6);

    let err = chain.set_attribute(0, "window", AttrValue::Int(3), false).unwrap_err();
    assert_eq!(status_code(&err), -5);

    assert!(chain.set_attribute(3, "size", AttrValue::Int(3), false).is_err());
}

#[test]
fn test_renegotiates_after_shape_attribute_change() {
    let mut chain = Chain::new();
    chain.push(Box::new(Slice::new())).push(Box::new(Rms::new()));
    chain.set_attribute(0, "size", AttrValue::Int(4), false).unwrap();
    chain.set_attribute(0, "hop", AttrValue::Int(4), false).unwrap();
    chain.negotiate(&StreamDescriptor::new(1, 1, 1000.0)).unwrap();
    assert_eq!(chain.output_descriptor().unwrap().frame_rate, 250.0);

    chain.set_attribute(0, "hop", AttrValue::Int(2), false).unwrap();
    chain.process_values(0.0, 1.0, &[1.0; 8], 1, 8).unwrap();

    assert_eq!(chain.sink().negotiations(), 2);
    assert_eq!(chain.output_descriptor().unwrap().frame_rate, 500.0);
    assert_eq!(chain.sink().times(), vec![0.0, 2.0, 4.0]);
    assert_eq!(chain.sink().column(0), vec![1.0, 1.0, 1.0]);
}

#[test]
fn test_from_json() {
    let config = json!({
        "modules": [
            {"type": "scale", "config": {"gain_db": 6.0}},
            {"type": "chop", "config": {"size": 100.0, "count": true, "max": true}}
        ],
        "input": {
            "has_time_tags": false,
            "frame_rate": 100.0,
            "offset": 0.0,
            "width": 1,
            "height": 1,
            "labels": ["level"],
            "has_var_size": false,
            "domain": 0.0,
            "max_frames": 16
        }
    });

    let chain = Chain::from_json(&config).unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.module(1).unwrap().name(), "chop");
    assert_eq!(chain.state(), &ChainState::Configured);
    assert_eq!(
        chain.output_descriptor().unwrap().labels,
        vec!["Duration", "Count", "levelMax", "levelMean"]
    );
}

#[test]
fn test_from_json_errors_map_to_codes() {
    let err = Chain::from_json(&json!({"modules": [{"type": "fft"}]})).err().unwrap();
    assert_eq!(status_code(&err), -8);

    let err = Chain::from_json(&json!({"stages": []})).err().unwrap();
    assert_eq!(status_code(&err), -9);

    let err = Chain::from_json(&json!({"modules": [{"type": "chop", "config": {"colour": 1}}]}))
        .err()
        .unwrap();
    assert_eq!(status_code(&err), -5);

    let err = Chain::from_json(&json!({"modules": [{"type": "onseg", "config": {"odf_mode": "spectral"}}]}))
        .err()
        .unwrap();
    assert_eq!(status_code(&err), -7);
}

#[test]
fn test_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"modules": [{{"type": "onseg", "config": {{"threshold": 0.5, "odf_mode": "rms"}}}}]}}"#
    )
    .unwrap();

    let chain = Chain::from_json_file(file.path()).unwrap();
    assert_eq!(chain.attribute(0, "odf_mode"), Some(&AttrValue::Enum("rms".to_string())));
    assert_eq!(chain.state(), &ChainState::Unconfigured);
}

#[test]
fn test_from_json_file_rejects_malformed_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ modules: ").unwrap();

    let err = Chain::from_json_file(file.path()).err().unwrap();
    assert_eq!(status_code(&err), -9);
}

#[test]
fn test_frames_keep_their_times_through_the_chain() {
    let mut chain = Chain::new();
    chain.push(Box::new(Scale::new()));
    chain.negotiate(&StreamDescriptor::new(1, 1, 50.0)).unwrap();
    chain.process_values(1000.0, 0.5, &[1.0, 2.0, 3.0], 1, 3).unwrap();

    assert_eq!(chain.sink().times(), vec![1000.0, 1020.0, 1040.0]);
    assert!(chain.sink().frames().iter().all(|f| f.weight == 0.5));
}

#[test]
fn test_downstream_renegotiation_keeps_partial_window() {
    let mut chain = Chain::new();
    chain.push(Box::new(Slice::new())).push(Box::new(Chop::new()));
    chain.set_attribute(0, "size", AttrValue::Int(4), false).unwrap();
    chain.set_attribute(0, "hop", AttrValue::Int(4), false).unwrap();
    chain.set_attribute(1, "size", AttrValue::Float(0.0), false).unwrap();
    chain.negotiate(&StreamDescriptor::new(1, 1, 1000.0)).unwrap();

    chain.process_values(0.0, 1.0, &[1.0, 2.0, 3.0], 1, 3).unwrap();
    chain.set_attribute(1, "count", AttrValue::Bool(true), false).unwrap();
    chain.process_values(3.0, 1.0, &[4.0], 1, 1).unwrap();
    chain.finalize(4.0).unwrap();

    let sink = chain.sink();
    assert_eq!(sink.negotiations(), 2);
    assert_eq!(sink.times(), vec![0.0]);
    assert_eq!(sink.column(0), vec![4.0]);
    assert_eq!(sink.column(1), vec![1.0]);
    assert_eq!(&sink.frames()[0].values[2..], &[1.0, 2.0, 3.0, 4.0]);
}
