//! Property tests for the decoders, purge bounds and state machine.
//!
//! Runs on the host only; everything here is pure logic or the
//! simulated rig.

use pemstack::app::service::Controller;
use pemstack::app::events::AppEvent;
use pemstack::app::ports::{EventSink, SensorPort};
use pemstack::bus::Frame;
use pemstack::config::{ControllerConfig, PurgeConfig, PurgeStrategyConfig};
use pemstack::drivers::{Actuator, FnActuator};
use pemstack::fsm::StateId;
use pemstack::fsm::context::Outputs;
use pemstack::purge::{Purge, PurgeInput, WaterTrigger};
use pemstack::sensors::adc::{self, AdcChannel, Gain, Resolution};
use pemstack::sensors::temperature::decode_celsius;
use pemstack::sensors::{ChannelReading, SensorFrame};
use proptest::prelude::*;

fn arb_resolution() -> impl Strategy<Value = Resolution> {
    prop::sample::select(Resolution::ALL.to_vec())
}

fn arb_strategy() -> impl Strategy<Value = PurgeStrategyConfig> {
    prop_oneof![
        Just(PurgeStrategyConfig::Fixed),
        (1.0f32..120.0, 0.0f32..2.0).prop_map(|(base_secs, secs_per_watt)| {
            PurgeStrategyConfig::PowerBased { base_secs, secs_per_watt }
        }),
        (1.0f32..120.0, -5.0f32..5.0, -1.0f32..1.0, -1.0f32..1.0).prop_map(|(base_secs, kp, ki, kd)| {
            PurgeStrategyConfig::PolarizationBased {
                base_secs,
                kp,
                ki,
                kd,
                slope: -0.4,
                intercept: 24.0,
            }
        }),
        (
            1u16..100,
            0.0f32..1.0,
            0.0f32..0.5,
            0.001f32..25.0,
            prop::sample::select(vec![WaterTrigger::Residual, WaterTrigger::Drop]),
        )
            .prop_map(|(cells, relative_humidity, loss_per_gram, threshold_volts, trigger)| {
                PurgeStrategyConfig::WaterAccumulation {
                    cells,
                    relative_humidity,
                    loss_per_gram,
                    threshold_volts,
                    trigger,
                }
            }),
    ]
}

// ── Converter decoding ────────────────────────────────────────

proptest! {
    /// Any in-range input voltage survives encode → decode within one LSB.
    #[test]
    fn adc_decode_within_one_lsb(res in arb_resolution(), fraction in -0.999f32..0.999) {
        let ch = AdcChannel::new(0x68, 0x69, 0, res, Gain::X1).unwrap();
        let volts = fraction * adc::DEFAULT_REFERENCE_VOLTAGE;
        let code = (volts / ch.scale()).round() as i32;
        let frame = adc::encode_frame(code, res);
        let decoded = adc::decode_frame(&frame, res).unwrap();
        prop_assert!((ch.code_to_volts(decoded) - volts).abs() <= ch.scale());
    }

    /// Only the top twelve bits matter, and the sign follows the MSB.
    #[test]
    fn temperature_decode_sign_and_range(msb in any::<u8>(), lsb in any::<u8>()) {
        let t = decode_celsius(msb, lsb);
        prop_assert!((-128.0..128.0).contains(&t));
        prop_assert_eq!(t < 0.0, msb & 0x80 != 0);
        prop_assert_eq!(t, decode_celsius(msb, lsb & 0xF0));
    }

    /// Short frames are rejected instead of read out of bounds.
    #[test]
    fn short_frames_never_decode(res in arb_resolution(), bytes in prop::collection::vec(any::<u8>(), 0..2)) {
        prop_assert_eq!(adc::decode_frame(&bytes, res), None);
    }
}

// ── Purge bounds ──────────────────────────────────────────────

proptest! {
    /// Whatever the strategy and the stack does, the interval stays in bounds.
    #[test]
    fn purge_interval_always_clamped(
        strategy in arb_strategy(),
        samples in prop::collection::vec((0.0f32..30.0, 0.0f32..15.0, 0.0f32..80.0), 1..60),
    ) {
        let cfg = PurgeConfig { strategy, ..PurgeConfig::default() };
        let mut purge = Purge::from_config(&cfg);
        let mut now = 0.0;
        for (voltage, current, temperature) in samples {
            now += 0.1;
            let input = PurgeInput {
                voltage,
                current,
                power: voltage * current,
                temperature,
                dt: 0.1,
                now,
            };
            let f = purge.frequency(&input);
            prop_assert!(f >= cfg.min_frequency_secs && f <= cfg.max_frequency_secs, "{f}");
            let d = purge.duration();
            prop_assert!(d >= cfg.min_duration_secs && d <= cfg.max_duration_secs, "{d}");
        }
    }
}

// ── State machine ─────────────────────────────────────────────

struct Scripted(SensorFrame);

impl Scripted {
    fn at(temperature: f32) -> Self {
        let r = |v| ChannelReading::fresh(Frame::new(), v);
        let mut frame = SensorFrame::default();
        frame.voltage.push(r(20.0)).unwrap();
        frame.current.push(r(3.0)).unwrap();
        frame.temperature.push(r(temperature)).unwrap();
        Self(frame)
    }
}

impl SensorPort for Scripted {
    fn acquire(&mut self) -> SensorFrame {
        self.0.sequence += 1;
        self.0.clone()
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fn controller() -> Controller {
    let quiet = || -> Box<dyn Actuator + Send> { Box::new(FnActuator::new(|| Ok(()), || Ok(()))) };
    let outputs = Outputs::new(quiet(), quiet(), quiet(), 0.0);
    let mut c = Controller::new(&ControllerConfig::default(), outputs, 0.0).unwrap();
    c.start(0.0, &mut Discard).unwrap();
    c
}

fn arb_commands() -> impl Strategy<Value = Vec<Option<&'static str>>> {
    prop::collection::vec(
        prop::option::of(prop::sample::select(vec!["on", "off", "reset"])),
        1..80,
    )
}

proptest! {
    /// Off is only ever left for Startup, and only on an `on` command.
    #[test]
    fn off_leaves_only_on_command(script in arb_commands()) {
        let mut c = controller();
        let mut sensors = Scripted::at(25.0);
        let mut now = 0.0;
        for command in script {
            let before = c.state();
            if let Some(text) = command {
                c.request(text).unwrap();
            }
            now += 0.1;
            let after = c.tick(now, &mut sensors, &mut Discard);
            if before == StateId::Off && after != StateId::Off {
                prop_assert_eq!(after, StateId::Startup);
                prop_assert_eq!(command, Some("on"));
            }
        }
    }

    /// A temperature breach while running reaches Error within one tick,
    /// whatever the operator asks for in the same tick.
    #[test]
    fn breach_reaches_error_in_one_tick(
        run_ticks in 1usize..60,
        hot in 30.5f32..90.0,
        command in prop::option::of(prop::sample::select(vec!["on", "off", "reset"])),
    ) {
        let mut c = controller();
        let mut sensors = Scripted::at(25.0);
        c.request("on").unwrap();
        let mut now = 0.0;
        for _ in 0..run_ticks {
            now += 0.1;
            c.tick(now, &mut sensors, &mut Discard);
        }
        prop_assume!(c.state().is_running());

        sensors.0.temperature[0].value = hot;
        if let Some(text) = command {
            c.request(text).unwrap();
        }
        now += 0.1;
        prop_assert_eq!(c.tick(now, &mut sensors, &mut Discard), StateId::Error);
        prop_assert!(!c.outputs().levels().h2);
        prop_assert!(c.outputs().levels().fan);
    }
}
