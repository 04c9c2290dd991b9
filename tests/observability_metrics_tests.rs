use featstream::core::StreamDescriptor;
use featstream::engine::Chain;
use featstream::modules::{Chop, Scale};
use featstream::observability::{ChainMonitor, MetricsCollector, ModuleMetrics};
use std::sync::Arc;

#[test]
fn test_module_metrics_counters() {
    let metrics = ModuleMetrics::new("chop");
    metrics.record_batch(16);
    metrics.record_batch(4);
    metrics.record_error();
    metrics.record_emitted(2);

    assert_eq!(metrics.module_id(), "chop");
    assert_eq!(metrics.frames_emitted(), 2);
    assert_eq!(metrics.batches_processed(), 2);
    assert_eq!(metrics.frames_processed(), 20);
    assert_eq!(metrics.errors_count(), 1);

    let start = metrics.start_processing();
    metrics.finish_processing(start);
    assert!(metrics.avg_latency_us() < 1_000_000);

    metrics.reset();
    assert_eq!(metrics.frames_processed(), 0);
}

#[test]
fn test_collector_snapshot_is_ordered() {
    let mut collector = MetricsCollector::new();
    collector.register("01:chop", Arc::new(ModuleMetrics::new("chop")));
    collector.register("00:scale", Arc::new(ModuleMetrics::new("scale")));

    let slots: Vec<String> = collector.snapshot().into_iter().map(|s| s.slot).collect();
    assert_eq!(slots, vec!["00:scale", "01:chop"]);
    assert!(collector.get_module_metrics("01:chop").is_some());
}

#[test]
fn test_chain_reports_per_module_metrics() {
    let mut chain = Chain::new();
    chain.push(Box::new(Scale::new())).push(Box::new(Chop::new()));
    chain.negotiate(&StreamDescriptor::new(1, 1, 100.0)).unwrap();
    chain.process_values(0.0, 1.0, &[0.5; 50], 1, 50).unwrap();
    chain.process_values(500.0, 1.0, &[0.5; 50], 1, 50).unwrap();

    let snapshot = chain.metrics().snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].module_id, "scale");
    assert_eq!(snapshot[0].frames_processed, 100);
    assert_eq!(snapshot[0].batches_processed, 2);
    // chop receives the scaled batches unchanged in count
    assert_eq!(snapshot[0].frames_emitted, 100);
    assert_eq!(snapshot[1].frames_processed, 100);
    // segments closed at 242, 484, 726 and 968 ms
    assert_eq!(snapshot[1].frames_emitted, 4);
    assert_eq!(snapshot[1].frames_per_output(), Some(25.0));

    let report = chain.monitor().generate_report();
    assert!(report.contains("00:scale"));
    assert!(report.contains("01:chop"));
    assert!(report.contains("25.0"));
    assert!(report.ends_with("chain: 100 frames in, 4 frames out, 0 errors"));
}

#[test]
fn test_finalize_output_is_counted() {
    let mut chain = Chain::new();
    chain.push(Box::new(Chop::new()));
    chain.negotiate(&StreamDescriptor::new(1, 1, 100.0)).unwrap();
    chain.process_values(0.0, 1.0, &[0.5; 10], 1, 10).unwrap();
    assert_eq!(chain.metrics().snapshot()[0].frames_emitted, 0);
    assert_eq!(chain.metrics().snapshot()[0].frames_per_output(), None);

    chain.finalize(100.0).unwrap();
    assert_eq!(chain.metrics().snapshot()[0].frames_emitted, 1);
}

#[test]
fn test_empty_report() {
    let monitor = ChainMonitor::new(MetricsCollector::new());
    assert_eq!(monitor.generate_report(), "No modules registered");
}
