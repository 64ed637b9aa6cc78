#![cfg_attr(not(test), no_std)]

//! Core of a Doppler-radar velocity sensor: sample the radar mixer output
//! with a DMA-fed ADC and publish the dominant spectral frequency of each
//! completed block.

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

pub mod radar;

pub use radar::{AdcDma, Radar, RadarError, Reading, SampleBlock, SAMPLE_POINTS};
