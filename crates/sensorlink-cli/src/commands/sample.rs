use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sensorlink_core::SpikeGenerator;

/// Emit readings on a virtual clock that advances one tick period per line,
/// so ramp resets behave as they would on a live device regardless of how
/// fast the lines are printed.
pub fn run(config_path: Option<&Path>, count: u64, interval_ms: u64, sn: &str) {
    let config = super::load_generator_config(config_path);
    let period = config.tick_interval();
    let mut generator = SpikeGenerator::new(sn, config).unwrap_or_else(|e| super::fail(e));
    let stop = Arc::new(AtomicBool::new(false));
    super::stop_on_ctrlc(Arc::clone(&stop));

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut clock = Instant::now();
    let mut emitted = 0u64;

    while !stop.load(Ordering::SeqCst) && (count == 0 || emitted < count) {
        let sample = generator.generate_sample_at(clock);
        let line = sample.to_json().unwrap_or_else(|e| super::fail(e));
        if writeln!(out, "{line}").is_err() {
            break; // Broken pipe
        }
        emitted += 1;
        clock += period;
        if interval_ms > 0 {
            let _ = out.flush();
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
    }
}
