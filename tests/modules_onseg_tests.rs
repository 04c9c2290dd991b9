use featstream::core::{AttrValue, Severity, StreamDescriptor};
use featstream::engine::Chain;
use featstream::modules::{Collector, Onseg};
use featstream::Module;

fn onseg_chain(settings: &[(&str, AttrValue)]) -> Chain {
    let mut chain = Chain::new();
    chain.push(Box::new(Onseg::new()));
    chain.set_attribute(0, "count", AttrValue::Bool(true), false).unwrap();
    chain.set_attribute(0, "filter_size", AttrValue::Int(1), false).unwrap();
    for (name, value) in settings {
        chain.set_attribute(0, name, value.clone(), false).unwrap();
    }
    chain
}

/// 200 Hz scalar stream of zeros with ones at the given times
fn spikes(at: &[f64], frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| if at.contains(&(i as f64 * 5.0)) { 1.0 } else { 0.0 })
        .collect()
}

#[test]
fn test_min_interval_debounces_onsets() {
    let mut chain = onseg_chain(&[
        ("threshold", AttrValue::Float(0.5)),
        ("min_interval", AttrValue::Float(50.0)),
    ]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 200.0)).unwrap();

    let values = spikes(&[10.0, 40.0, 65.0], 20);
    chain.process_values(0.0, 1.0, &values, 1, 20).unwrap();
    chain.finalize(100.0).unwrap();

    let sink = chain.sink();
    assert_eq!(sink.times(), vec![10.0, 65.0]);
    assert_eq!(sink.column(0), vec![55.0, 35.0]);
    // frames before the first onset are outside any segment
    assert_eq!(sink.column(1), vec![11.0, 7.0]);
}

#[test]
fn test_off_threshold_ends_segment() {
    let mut chain = onseg_chain(&[
        ("threshold", AttrValue::Float(0.5)),
        ("off_threshold", AttrValue::Float(0.5)),
        ("min_duration", AttrValue::Float(20.0)),
    ]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 200.0)).unwrap();

    // on from 10 to 40 ms, then silence
    let values: Vec<f32> = (0..40)
        .map(|i| if (10.0..40.0).contains(&(i as f64 * 5.0)) { 1.0 } else { 0.0 })
        .collect();
    chain.process_values(0.0, 1.0, &values, 1, 40).unwrap();
    chain.finalize(200.0).unwrap();

    let sink = chain.sink();
    assert_eq!(sink.times(), vec![10.0]);
    assert_eq!(sink.column(0), vec![30.0]);
    assert_eq!(sink.column(1), vec![6.0]);
}

#[test]
fn test_min_duration_drops_short_final_segment() {
    let mut chain = onseg_chain(&[
        ("threshold", AttrValue::Float(0.5)),
        ("min_duration", AttrValue::Float(100.0)),
    ]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 200.0)).unwrap();

    let values = spikes(&[10.0], 10);
    chain.process_values(0.0, 1.0, &values, 1, 10).unwrap();
    chain.finalize(50.0).unwrap();

    assert!(chain.sink().frames().is_empty());
    assert_eq!(chain.sink().finalized(), Some(50.0));
}

#[test]
fn test_max_duration_forces_boundaries() {
    let mut chain = onseg_chain(&[
        ("max_duration", AttrValue::Float(100.0)),
        ("start_is_onset", AttrValue::Bool(true)),
    ]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 100.0)).unwrap();

    let values = vec![0.0f32; 30];
    chain.process_values(0.0, 1.0, &values, 1, 30).unwrap();
    chain.finalize(300.0).unwrap();

    let sink = chain.sink();
    assert_eq!(sink.times(), vec![0.0, 100.0, 200.0]);
    assert_eq!(sink.column(0), vec![100.0, 100.0, 100.0]);
    assert_eq!(sink.column(1), vec![10.0, 10.0, 10.0]);
}

#[test]
fn test_latency_follows_filter_size() {
    let mut onseg = Onseg::new();
    onseg.set_attribute("filter_size", AttrValue::Int(5), false).unwrap();
    onseg
        .negotiate(&StreamDescriptor::new(1, 1, 100.0), &mut Collector::new())
        .unwrap();
    assert_eq!(onseg.latency(), 20.0);
}

#[test]
fn test_reported_onset_is_compensated_for_latency() {
    let mut chain = onseg_chain(&[
        ("threshold", AttrValue::Float(0.1)),
        ("filter_size", AttrValue::Int(5)),
    ]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 100.0)).unwrap();

    let values: Vec<f32> = (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect();
    chain.process_values(0.0, 1.0, &values, 1, 20).unwrap();
    chain.finalize(200.0).unwrap();

    // step at 100 ms detected on the smoothed signal, reported 20 ms earlier
    assert_eq!(chain.sink().times(), vec![80.0]);
}

#[test]
fn test_offset_shifts_reported_times() {
    let mut chain = onseg_chain(&[
        ("threshold", AttrValue::Float(0.5)),
        ("offset", AttrValue::Float(-5.0)),
    ]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 200.0)).unwrap();

    let values = spikes(&[10.0], 10);
    chain.process_values(0.0, 1.0, &values, 1, 10).unwrap();
    chain.finalize(50.0).unwrap();

    assert_eq!(chain.sink().times(), vec![5.0]);
}

#[test]
fn test_invalid_columns_are_dropped_with_warning() {
    let mut chain = onseg_chain(&[
        ("threshold", AttrValue::Float(0.5)),
        ("columns", AttrValue::IntList(vec![1, 7])),
    ]);
    chain.negotiate(&StreamDescriptor::new(2, 1, 200.0)).unwrap();

    let warnings = chain.drain_diagnostics();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert!(warnings[0].message.contains('7'));

    // only column 1 drives detection
    let values = [5.0, 0.0, 5.0, 0.0, 0.0, 1.0, 0.0, 1.0];
    chain.process_values(0.0, 1.0, &values, 2, 4).unwrap();
    chain.finalize(20.0).unwrap();
    assert_eq!(chain.sink().times(), vec![10.0]);
}

#[test]
fn test_live_threshold_change_does_not_renegotiate() {
    let mut chain = onseg_chain(&[]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 200.0)).unwrap();

    let values = spikes(&[10.0], 10);
    chain.process_values(0.0, 1.0, &values, 1, 10).unwrap();
    assert!(chain.sink().frames().is_empty());

    chain.set_attribute(0, "threshold", AttrValue::Float(0.5), false).unwrap();
    // spike at 60 ms, third frame of a batch starting at 50 ms
    chain.process_values(50.0, 1.0, &values, 1, 10).unwrap();
    chain.finalize(100.0).unwrap();

    assert_eq!(chain.sink().negotiations(), 1);
    assert_eq!(chain.sink().times(), vec![60.0]);
}

#[test]
fn test_negotiation_reallocates_only_on_shape_change() {
    let mut onseg = Onseg::new();
    let mut sink = Collector::new();
    let input = StreamDescriptor::new(3, 1, 100.0);

    onseg.negotiate(&input, &mut sink).unwrap();
    onseg.negotiate(&input, &mut sink).unwrap();
    assert_eq!(onseg.allocations(), 1);

    onseg.set_attribute("threshold", AttrValue::Float(1.0), false).unwrap();
    onseg.negotiate(&input, &mut sink).unwrap();
    assert_eq!(onseg.allocations(), 1);

    onseg.set_attribute("filter_size", AttrValue::Int(7), false).unwrap();
    onseg.negotiate(&input, &mut sink).unwrap();
    assert_eq!(onseg.allocations(), 2);
}

#[test]
fn test_output_change_mid_stream_keeps_open_segment() {
    let mut chain = onseg_chain(&[("threshold", AttrValue::Float(0.5))]);
    chain.negotiate(&StreamDescriptor::new(1, 1, 200.0)).unwrap();

    chain.process_values(0.0, 1.0, &spikes(&[10.0], 20), 1, 20).unwrap();
    assert!(chain.sink().frames().is_empty());

    chain.set_attribute(0, "max", AttrValue::Bool(true), false).unwrap();
    chain.process_values(100.0, 1.0, &spikes(&[30.0], 20), 1, 20).unwrap();
    chain.finalize(200.0).unwrap();

    let sink = chain.sink();
    assert_eq!(sink.negotiations(), 2);
    assert_eq!(sink.times(), vec![10.0, 130.0]);
    assert_eq!(sink.column(0), vec![120.0, 70.0]);
    // every frame from 10 ms on is counted exactly once
    assert_eq!(sink.column(1), vec![24.0, 14.0]);
    assert_eq!(sink.column(2), vec![1.0, 1.0]);
}
