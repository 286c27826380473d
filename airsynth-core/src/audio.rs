//! # Audio Output Module
//!
//! Drives the synthesizer's audio graph, either from a CPAL (Cross-Platform
//! Audio Library) output stream or, without a sound card, from a background
//! thread that renders in real time and throws the samples away.
//!
//! ## Features
//! - Default output device selection
//! - F32, I16 and U16 sample formats
//! - Mono graph copied to every output channel
//! - Offline renderer so scheduled envelopes and stops still advance

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

use crate::synth::graph::{lock, SharedGraph};

/// Frames rendered per block by the offline renderer.
pub const OFFLINE_BLOCK: usize = 512;

/// The default output device and its preferred configuration.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    /// Selects the default output device of the default host.
    ///
    /// # Returns
    /// * `Ok(device)` - Device and its default stream configuration
    /// * `Err(e)` - No output device, or it refused to report a configuration
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        info!("Using audio output device: {}", device.name()?);

        let config = device.default_output_config()?;
        info!("Audio config: {:?}", config);
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> usize {
        self.config.channels() as usize
    }

    /// Builds and starts a stream that renders `graph`.
    ///
    /// The graph must have been created at `self.sample_rate()`.
    pub fn start(&self, graph: SharedGraph) -> Result<cpal::Stream> {
        let channels = self.channels();
        let config: cpal::StreamConfig = self.config.clone().into();
        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &config, graph, channels),
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &config, graph, channels),
            cpal::SampleFormat::U16 => build_stream::<u16>(&self.device, &config, graph, channels),
            other => Err(anyhow!("Unsupported sample format {:?}", other)),
        }?;

        stream.play()?;
        info!("Audio stream started at {} Hz", self.sample_rate());
        Ok(stream)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: SharedGraph,
    channels: usize,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut mix: Vec<f32> = Vec::new();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            mix.resize(data.len(), 0.0);
            lock(&graph).render_interleaved(&mut mix, channels);
            for (out, sample) in data.iter_mut().zip(mix.iter()) {
                *out = T::from_sample(*sample);
            }
        },
        |err| error!("An error occurred on the audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Renders the graph on a background thread at roughly real-time pace when
/// there is no output device.
pub struct OfflineRenderer {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl OfflineRenderer {
    pub fn start(graph: SharedGraph) -> Self {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let thread_handle = thread::spawn(move || run_offline(graph, shutdown_rx));
        Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Offline renderer thread panicked");
            }
        }
    }
}

impl Drop for OfflineRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_offline(graph: SharedGraph, shutdown_rx: Receiver<()>) {
    let sample_rate = lock(&graph).sample_rate();
    let period = Duration::from_secs_f64(OFFLINE_BLOCK as f64 / sample_rate as f64);
    let ticker = crossbeam_channel::tick(period);
    let mut block = vec![0.0; OFFLINE_BLOCK];
    info!("Offline renderer running at {} Hz", sample_rate);

    loop {
        crossbeam_channel::select! {
            recv(ticker) -> _ => lock(&graph).render(&mut block),
            recv(shutdown_rx) -> _ => break,
        }
    }
    info!("Offline renderer stopped");
}
