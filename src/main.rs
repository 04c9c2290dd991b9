use featstream::engine::{Chain, StreamRunner};
use featstream::registry;
use featstream::sources::SignalSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("featstream - onset segmentation demo");
    println!("====================================\n");

    println!("Registered modules:");
    for meta in registry::all() {
        println!("  {:<8} {:<20} [{}]", meta.id, meta.name, meta.category);
    }
    println!();

    // 8 kHz tone bursts -> 10 ms windows -> RMS -> onset segments
    let config = serde_json::json!({
        "modules": [
            { "type": "slice", "config": { "size": 80, "hop": 80 } },
            { "type": "rms" },
            {
                "type": "onseg",
                "config": {
                    "threshold": 0.1,
                    "off_threshold": 0.1,
                    "filter_size": 1,
                    "count": true,
                    "max": true
                }
            },
            { "type": "print", "config": { "label": "segment" } }
        ]
    });

    let chain = Chain::from_json(&config)?;
    let mut source = SignalSource::new(8000.0, 256, 2000.0)
        .with_frequency(1000.0)
        .with_burst(250.0, 300.0)
        .with_burst(1200.0, 150.0);

    let runner = StreamRunner::spawn(chain, 16);
    runner.feed(&mut source).await?;
    let chain = runner.join().await?;

    println!("\nSegments:");
    let labels = chain.output_descriptor().map(|d| d.labels.clone()).unwrap_or_default();
    for frame in chain.sink().frames() {
        let columns: Vec<String> = labels
            .iter()
            .zip(&frame.values)
            .map(|(label, v)| format!("{}={:.3}", label, v))
            .collect();
        println!("  @{:>8.1} ms  {}", frame.time, columns.join("  "));
    }

    println!("\n{}", chain.monitor().generate_report());
    Ok(())
}
