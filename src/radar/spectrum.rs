//! Block processing: DC-offset removal, real FFT and peak extraction.

use libm::sqrtf;
use microfft::real::rfft_1024;
use num_complex::Complex32;
use static_assertions as sa;

use super::{SampleBlock, SAMPLE_POINTS};

/// Usable bins of the real transform. The upper half of the spectrum of a
/// real signal is conjugate-symmetric and carries no extra information.
pub const BINS: usize = SAMPLE_POINTS / 2;

// The transform entry point below is monomorphic in its size, so a block
// size without a matching transform cannot build.
sa::const_assert!(SAMPLE_POINTS.is_power_of_two());
sa::const_assert_eq!(SAMPLE_POINTS, 1024);

/// Scratch and result buffers for one processing cycle.
///
/// The buffers are reused every cycle, nothing is allocated. They are kept
/// out of the interrupt stack by living in the driver.
pub struct Analyzer {
    /// Centered signal, transformed in place.
    signal: [f32; SAMPLE_POINTS],
    mag: [f32; BINS],
    mean: f32,
}

impl Analyzer {
    pub const fn new() -> Analyzer {
        Analyzer {
            signal: [0.0; SAMPLE_POINTS],
            mag: [0.0; BINS],
            mean: 0.0,
        }
    }

    /// Run one completed block through the pipeline and return the
    /// dominant bin. Total for any block; an all-zero block resolves to
    /// the DC bin.
    pub fn process(&mut self, block: &SampleBlock) -> usize {
        self.center(block);

        let spec = rfft_1024(&mut self.signal);

        // The real transform packs the real-valued Nyquist coefficient
        // into the imaginary part of bin 0. The Nyquist bin is outside
        // the scanned range, drop it so bin 0 is purely DC.
        spec[0].im = 0.0;

        magnitudes(spec, &mut self.mag);

        peak(&self.mag)
    }

    /// Subtract the block mean. Accumulation is scaled by `1 / N` inside
    /// the loop, keeping the sum small independent of block length.
    fn center(&mut self, block: &SampleBlock) {
        let mut mean = 0.0;

        for (s, raw) in self.signal.iter_mut().zip(block.iter()) {
            *s = *raw as f32;
            mean += *s / SAMPLE_POINTS as f32;
        }

        for s in self.signal.iter_mut() {
            *s -= mean;
        }

        self.mean = mean;
    }

    /// Mean of the last processed block.
    pub fn mean(&self) -> f32 {
        self.mean
    }
}

fn magnitudes(spec: &[Complex32; BINS], mag: &mut [f32; BINS]) {
    for (m, c) in mag.iter_mut().zip(spec.iter()) {
        *m = sqrtf(c.re * c.re + c.im * c.im);
    }
}

/// Index of the maximum magnitude, by linear scan with strict `>`: ties
/// resolve to the lowest bin, and an all-zero spectrum to the DC bin.
pub fn peak(mag: &[f32]) -> usize {
    let mut max = 0.0;
    let mut k_max = 0;

    for (k, m) in mag.iter().enumerate() {
        if *m > max {
            max = *m;
            k_max = k;
        }
    }

    k_max
}
