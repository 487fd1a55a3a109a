//! Simulated reader for running without hardware

use std::time::Duration;

use rfid_core::{ReaderStep, VirtualOpener};
use rfid_detect::{DeviceScanner, ScannerConfig, StaticSource};

/// Device path the simulated reader appears under
pub const SIMULATED_PORT: &str = "/dev/ttyUSB-sim";

/// Card taps the simulated reader plays in a loop
fn demo_script() -> Vec<ReaderStep> {
    vec![
        ReaderStep::Pause(Duration::from_secs(2)),
        ReaderStep::line("04 A2 6B 1A"),
        ReaderStep::Pause(Duration::from_secs(3)),
        ReaderStep::line("DE AD BE EF"),
        ReaderStep::Pause(Duration::from_secs(3)),
        // Noise on the line
        ReaderStep::line("GG"),
        ReaderStep::Pause(Duration::from_secs(2)),
        ReaderStep::line("04 A2 6B 1A 3F 5C 80"),
        ReaderStep::Pause(Duration::from_secs(5)),
    ]
}

/// Scanner and opener for a single simulated reader
pub fn simulated_reader(config: ScannerConfig) -> (DeviceScanner, VirtualOpener) {
    let scanner = DeviceScanner::with_source(config, Box::new(StaticSource::new([SIMULATED_PORT])));
    let opener = VirtualOpener::new();
    opener.push_repeating_reader(demo_script());
    (scanner, opener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_port_is_a_candidate() {
        let (scanner, _) = simulated_reader(ScannerConfig::default());
        assert_eq!(scanner.scan().unwrap(), vec![SIMULATED_PORT.to_string()]);
    }
}
