//! Doppler-radar driver: owns the acquisition source, gates access to the
//! shared sample block and publishes one frequency reading per completed
//! block.
//!
//! The sample memory lives on the hardware side of [`AdcDma`] and is
//! written by DMA. Block completion is signalled from interrupt context;
//! the handler body ([`Radar::handle`]) claims the block, runs the
//! pipeline (remove DC, transform, detect peak, publish) and re-arms
//! acquisition into the same memory. Only one generation is ever in
//! flight.

use core::fmt::Debug;
use core::sync::atomic::{AtomicU32, Ordering};

pub mod spectrum;
mod state;

use spectrum::Analyzer;
use state::Controller;

pub use state::State;

/// Samples per acquisition block.
pub const SAMPLE_POINTS: usize = 1024;

/// One full block of raw ADC conversions, written by the DMA controller.
pub type SampleBlock = [u16; SAMPLE_POINTS];

/// A DMA-fed ADC conversion source for one [`SampleBlock`].
///
/// The hardware owns the sample memory. Between `start` and `stop` the
/// block is being overwritten by DMA and `block` must not be used; the
/// driver's state machine upholds this.
pub trait AdcDma {
    type Error: Debug;

    /// Arm a conversion run of one full block into the sample memory.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Stop the conversion run.
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Transfer-complete flag of the current run.
    fn complete(&self) -> bool;

    /// Clear the transfer-complete flag. Idempotent.
    fn clear_complete(&mut self);

    /// The filled block. Contents are only stable while stopped.
    fn block(&self) -> &SampleBlock;
}

/// Last published frequency reading.
///
/// A single value updated with one atomic store per generation, so a
/// consumer in another context (display, telemetry) never sees a torn
/// read. Keep it in a `static` and hand the driver a reference.
pub struct Reading(AtomicU32);

impl Reading {
    pub const fn new() -> Reading {
        Reading(AtomicU32::new(0))
    }

    /// Most recently published frequency. Never blocks.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    fn publish(&self, freq: u32) {
        self.0.store(freq, Ordering::Relaxed);
    }
}

#[derive(Debug, defmt::Format)]
pub enum RadarError<E: Debug> {
    Adc(E),
}

impl<E: Debug> From<E> for RadarError<E> {
    fn from(e: E) -> RadarError<E> {
        RadarError::Adc(e)
    }
}

pub struct Radar<D: AdcDma> {
    dev: D,

    /// Frequency represented by one spectrum bin. Set once, immutable.
    period: u16,

    ctrl: Controller,
    analyzer: Analyzer,
    reading: &'static Reading,
}

impl<D: AdcDma> Radar<D> {
    pub fn new(dev: D, period: u16, reading: &'static Reading) -> Radar<D> {
        Radar {
            dev,
            period,
            ctrl: Controller::new(),
            analyzer: Analyzer::new(),
            reading,
        }
    }

    /// Arm the first acquisition cycle.
    pub fn init(&mut self) -> Result<(), RadarError<D::Error>> {
        if self.ctrl.state() != State::Idle {
            defmt::warn!("init: acquisition already armed");
            return Ok(());
        }

        defmt::debug!("arming first acquisition, bin resolution: {}", self.period);
        self.dev.start()?;
        self.ctrl.arm();

        Ok(())
    }

    /// Completion-interrupt body: consume the finished block, run the
    /// pipeline and re-arm acquisition into the same memory.
    ///
    /// Idempotent against spurious or duplicate signals, which are
    /// cleared and dropped. Returns whether a block was processed. On a
    /// device error the block is not re-armed; the caller decides whether
    /// to reset.
    pub fn handle(&mut self) -> Result<bool, RadarError<D::Error>> {
        if !self.dev.complete() {
            defmt::trace!("completion signal without transfer-complete flag, ignoring");
            return Ok(false);
        }

        if !self.ctrl.complete() {
            // No matching armed acquisition. Clear the signal so it
            // cannot fire again for the same block.
            defmt::debug!(
                "completion signal in state {:?}, dropping",
                self.ctrl.state()
            );
            self.dev.clear_complete();
            return Ok(false);
        }

        self.dev.stop()?;
        self.dev.clear_complete();

        self.ctrl.claim();

        let bin = self.analyzer.process(self.dev.block());
        let freq = bin as u32 * self.period as u32;
        self.reading.publish(freq);

        defmt::debug!("block done, peak bin: {}, frequency: {}", bin, freq);

        // Overwriting the block is permitted again from this point.
        self.ctrl.rearm();
        self.dev.start()?;

        Ok(true)
    }

    /// Most recently published frequency. Safe to call from any context.
    pub fn current_frequency(&self) -> u32 {
        self.reading.get()
    }

    pub fn state(&self) -> State {
        self.ctrl.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct MockError;

    struct MockAdc {
        block: SampleBlock,
        running: bool,
        complete: bool,
        starts: usize,
        fail_start: bool,
    }

    impl MockAdc {
        fn new(block: SampleBlock) -> MockAdc {
            MockAdc {
                block,
                running: false,
                complete: false,
                starts: 0,
                fail_start: false,
            }
        }
    }

    impl AdcDma for MockAdc {
        type Error = MockError;

        fn start(&mut self) -> Result<(), MockError> {
            if self.fail_start {
                return Err(MockError);
            }

            self.running = true;
            self.starts += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), MockError> {
            self.running = false;
            Ok(())
        }

        fn complete(&self) -> bool {
            self.complete
        }

        fn clear_complete(&mut self) {
            self.complete = false;
        }

        fn block(&self) -> &SampleBlock {
            assert!(!self.running, "block read while DMA is running");
            &self.block
        }
    }

    /// Constant offset of 2048 with a sinusoid peaking at bin `k0`.
    fn doppler_block(k0: usize) -> SampleBlock {
        let mut block = [0u16; SAMPLE_POINTS];

        for (i, b) in block.iter_mut().enumerate() {
            let x = 2. * std::f32::consts::PI * k0 as f32 * i as f32 / SAMPLE_POINTS as f32;
            *b = (2048. + 512. * x.sin()).round() as u16;
        }

        block
    }

    #[test]
    fn one_cycle_end_to_end() {
        static READING: Reading = Reading::new();

        let mut radar = Radar::new(MockAdc::new(doppler_block(100)), 7, &READING);
        radar.init().unwrap();
        assert_eq!(radar.state(), State::Acquiring);

        radar.dev.complete = true;
        assert!(radar.handle().unwrap());

        assert_eq!(radar.current_frequency(), 100 * 7);
        assert_eq!(READING.get(), 100 * 7);

        // re-armed into the same buffer
        assert_eq!(radar.state(), State::Acquiring);
        assert_eq!(radar.dev.starts, 2);
        assert!(radar.dev.running);
        assert!(!radar.dev.complete);
    }

    #[test]
    fn reading_is_overwritten_by_next_generation() {
        static READING: Reading = Reading::new();

        let mut radar = Radar::new(MockAdc::new(doppler_block(100)), 3, &READING);
        radar.init().unwrap();

        radar.dev.complete = true;
        radar.handle().unwrap();
        assert_eq!(radar.current_frequency(), 300);

        radar.dev.block = doppler_block(31);
        radar.dev.complete = true;
        radar.handle().unwrap();
        assert_eq!(radar.current_frequency(), 31 * 3);
    }

    #[test]
    fn silent_block_reports_zero() {
        static READING: Reading = Reading::new();

        let mut radar = Radar::new(MockAdc::new([0; SAMPLE_POINTS]), 5, &READING);
        radar.init().unwrap();

        radar.dev.complete = true;
        assert!(radar.handle().unwrap());
        assert_eq!(radar.current_frequency(), 0);
    }

    #[test]
    fn completion_before_init_is_dropped() {
        static READING: Reading = Reading::new();

        let mut dev = MockAdc::new(doppler_block(100));
        dev.complete = true;

        let mut radar = Radar::new(dev, 7, &READING);
        assert!(!radar.handle().unwrap());

        // signal cleared, nothing processed, nothing armed
        assert!(!radar.dev.complete);
        assert_eq!(radar.state(), State::Idle);
        assert_eq!(radar.current_frequency(), 0);
        assert_eq!(radar.dev.starts, 0);
    }

    #[test]
    fn interrupt_without_flag_is_ignored() {
        static READING: Reading = Reading::new();

        let mut radar = Radar::new(MockAdc::new(doppler_block(100)), 7, &READING);
        radar.init().unwrap();

        // shared interrupt line fires, but no transfer has completed
        assert!(!radar.handle().unwrap());
        assert_eq!(radar.state(), State::Acquiring);
        assert_eq!(radar.dev.starts, 1);
        assert!(radar.dev.running);
        assert_eq!(radar.current_frequency(), 0);
    }

    #[test]
    fn init_twice_is_a_no_op() {
        static READING: Reading = Reading::new();

        let mut radar = Radar::new(MockAdc::new(doppler_block(100)), 7, &READING);
        radar.init().unwrap();
        radar.init().unwrap();

        assert_eq!(radar.dev.starts, 1);
    }

    #[test]
    fn start_failure_propagates() {
        static READING: Reading = Reading::new();

        let mut dev = MockAdc::new(doppler_block(100));
        dev.fail_start = true;

        let mut radar = Radar::new(dev, 7, &READING);
        assert!(matches!(radar.init(), Err(RadarError::Adc(MockError))));
        assert_eq!(radar.state(), State::Idle);
    }
}
