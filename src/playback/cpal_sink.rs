//! Output to an audio device through cpal
//!
//! The cpal stream lives on its own thread. The real-time callback pulls
//! samples from the current segment. When the segment runs out it moves on
//! to the queued successor inside the same buffer and hands the finished
//! segment's completion to a forwarding thread. Silence is output only when
//! nothing is queued.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::codec::PcmBuffer;
use crate::error::AudioError;
use crate::playback::segment::DecodedSegment;
use crate::playback::sink::{AudioSink, Completion};

/// Segment being played by the callback
struct Playhead {
    pcm: Arc<PcmBuffer>,
    /// Next sample frame to output
    frame: usize,
    completion: Option<Completion>,
}

impl Playhead {
    fn new(segment: DecodedSegment, completion: Completion) -> Self {
        Self {
            pcm: segment.pcm,
            frame: 0,
            completion: Some(completion),
        }
    }
}

/// What the callback plays now and next
#[derive(Default)]
struct Deck {
    current: Option<Playhead>,
    next: Option<Playhead>,
}

/// Sink writing to the default (or a named) output device
pub struct CpalSink {
    device_name: Option<String>,
    deck: Arc<Mutex<Deck>>,
    running: Arc<AtomicBool>,
    stream_thread: Option<JoinHandle<()>>,
    /// Format the device stream was opened with
    format: Option<(u32, u16)>,
    done_tx: Sender<Completion>,
    forwarder: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Output to the named device, or the default output when `None`
    pub fn new(device_name: Option<String>) -> Self {
        let (done_tx, done_rx) = bounded::<Completion>(16);

        let forwarder = thread::Builder::new()
            .name("cpal-completions".into())
            .spawn(move || forward_completions(done_rx))
            .ok();

        Self {
            device_name,
            deck: Arc::new(Mutex::new(Deck::default())),
            running: Arc::new(AtomicBool::new(false)),
            stream_thread: None,
            format: None,
            done_tx,
            forwarder,
        }
    }

    /// Open the device stream with the format of the first segment
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<(), AudioError> {
        let device = find_device(self.device_name.as_deref())?;
        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let running = self.running.clone();
        let deck = self.deck.clone();
        let done_tx = self.done_tx.clone();

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("cpal-output".into())
            .spawn(move || {
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        fill(data, channels.max(1) as usize, &deck, &done_tx);
                    },
                    |err| {
                        tracing::error!("Output stream error: {}", err);
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.stream_thread = Some(handle);
        ready_rx
            .recv()
            .map_err(|_| AudioError::StreamError("output thread exited".into()))??;

        tracing::info!("Opened output device at {} Hz, {} channels", sample_rate, channels);
        self.format = Some((sample_rate, channels));
        Ok(())
    }

    fn check_format(&self, segment: &DecodedSegment) {
        let format = (segment.pcm.sample_rate, segment.pcm.channels);
        if let Some(open) = self.format.filter(|open| *open != format) {
            tracing::warn!(
                "Segment {} is {:?} but the device runs at {:?}; playing unconverted",
                segment.id,
                format,
                open
            );
        }
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, segment: DecodedSegment, completion: Completion) -> Result<(), AudioError> {
        if self.format.is_none() {
            self.open(segment.pcm.sample_rate, segment.pcm.channels)?;
        }
        self.check_format(&segment);

        let mut deck = self.deck.lock();
        deck.current = Some(Playhead::new(segment, completion));
        deck.next = None;
        Ok(())
    }

    fn queue_next(
        &mut self,
        segment: DecodedSegment,
        completion: Completion,
    ) -> Result<bool, AudioError> {
        if self.format.is_none() {
            return Ok(false);
        }
        self.check_format(&segment);

        let mut deck = self.deck.lock();
        let head = Playhead::new(segment, completion);
        if deck.current.is_none() {
            // the current segment ended before the successor arrived
            deck.current = Some(head);
        } else {
            deck.next = Some(head);
        }
        Ok(true)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        *self.deck.lock() = Deck::default();
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
        self.format = None;
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop();
        // closing the channel ends the forwarder
        let (closed_tx, _) = bounded(0);
        self.done_tx = closed_tx;
        if let Some(handle) = self.forwarder.take() {
            let _ = handle.join();
        }
    }
}

/// Real-time callback body
fn fill(data: &mut [f32], out_channels: usize, deck: &Mutex<Deck>, done_tx: &Sender<Completion>) {
    let mut deck = deck.lock();
    let mut written = 0;

    while written < data.len() {
        let Some(head) = deck.current.as_mut() else {
            break;
        };
        let in_channels = head.pcm.channels.max(1) as usize;
        let total = head.pcm.frames();

        for out in data[written..].chunks_mut(out_channels) {
            if head.frame >= total {
                break;
            }
            let base = head.frame * in_channels;
            for (ch, sample) in out.iter_mut().enumerate() {
                *sample = head.pcm.samples[base + ch % in_channels];
            }
            head.frame += 1;
            written += out.len();
        }

        if head.frame < total {
            break;
        }
        if let Some(completion) = head.completion.take() {
            // never block the audio thread
            if let Err(e) = done_tx.try_send(completion) {
                tracing::error!("Completion dropped: {}", e);
            }
        }
        deck.current = deck.next.take();
    }

    for sample in &mut data[written..] {
        *sample = 0.0;
    }
}

fn forward_completions(done_rx: Receiver<Completion>) {
    for completion in done_rx {
        completion.notify();
    }
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("default output".into())),
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
    }
}
