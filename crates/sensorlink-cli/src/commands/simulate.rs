use std::path::Path;

use sensorlink_client::SessionClient;
use sensorlink_core::SpikeGenerator;

pub fn run(url: &str, sn: &str, passwd: &str, config_path: Option<&Path>, ticks: Option<u64>) {
    let config = super::load_generator_config(config_path);
    let period = config.tick_interval();
    let generator = SpikeGenerator::new(sn, config).unwrap_or_else(|e| super::fail(e));

    println!("Simulating device {sn}");
    println!("  Gateway:   {url}");
    println!("  Period:    {:.2}s", period.as_secs_f64());
    match ticks {
        Some(n) => println!("  Readings:  {n}"),
        None => println!("  Readings:  until Ctrl+C"),
    }
    println!();

    let client = SessionClient::new(url, passwd, generator)
        .connect()
        .unwrap_or_else(|e| super::fail(e));

    super::stop_on_ctrlc(client.stop_handle());

    match client.run(ticks) {
        Ok(done) => println!("\nSent {done} reading(s)."),
        Err(e) => super::fail(e),
    }
}
