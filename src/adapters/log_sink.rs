//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event as one
//! `log` line. A network or display adapter would implement the same
//! trait.

use log::{info, warn};

use crate::app::events::{AppEvent, Telemetry};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    /// Emit telemetry as JSON instead of the compact text line.
    json: bool,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { json: false }
    }

    pub fn json() -> Self {
        Self { json: true }
    }
}

fn first(values: &[Option<f32>]) -> f32 {
    values.first().copied().flatten().unwrap_or(f32::NAN)
}

fn text_line(t: &Telemetry) -> String {
    format!(
        "TELEM | t={:.1}s state={} | V={:.2}V I={:.2}A P={:.1}W T={:.1}\u{00b0}C | \
         purge every {:.1}s for {:.2}s (#{}) | h2={} fan={} purge={} | E={:.4}Wh | \
         faults=0b{:08b}",
        t.timestamp,
        t.state,
        first(&t.voltage),
        first(&t.current),
        t.power_total,
        first(&t.temperature),
        t.purge.frequency,
        t.purge.duration,
        t.purge_count,
        u8::from(t.outputs.h2),
        u8::from(t.outputs.fan),
        u8::from(t.outputs.purge),
        t.energy / 3600.0,
        t.fault_flags,
    )
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) if self.json => match t.to_json() {
                Ok(line) => info!("TELEM | {line}"),
                Err(e) => warn!("telemetry serialisation failed: {e}"),
            },
            AppEvent::Telemetry(t) => info!("{}", text_line(t)),
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::StartupAborted => {
                warn!("START | aborted, sensors lost");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
