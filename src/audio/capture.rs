use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::clip::{downmix, VoiceClip};
use crate::error::ClientError;

/// Roughly one second of stereo audio at 48kHz between drains.
const RING_CAPACITY: usize = 96_000;
const DRAIN_INTERVAL: Duration = Duration::from_millis(20);
/// Anything past this is dropped rather than growing the clip without bound.
const MAX_CLIP_SECONDS: usize = 60;

/// Microphone access, split into "start capturing" and "stop and hand me the clip".
pub trait VoiceRecorder: Send + Sync + 'static {
    type Capture: ActiveCapture;

    /// Resolves once samples are flowing, or with `CaptureDenied`.
    fn begin(&self) -> impl Future<Output = Result<Self::Capture, ClientError>> + Send;
}

pub trait ActiveCapture: Send + 'static {
    fn finish(self) -> impl Future<Output = Result<VoiceClip, ClientError>> + Send;
}

/// Default-input-device recorder. The cpal stream lives on its own thread
/// because streams are not `Send` on every host.
#[derive(Debug, Clone, Default)]
pub struct CpalRecorder {
    preferred_device: Option<String>,
}

impl CpalRecorder {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self { preferred_device }
    }
}

pub struct CpalCapture {
    stop_tx: mpsc::Sender<()>,
    clip_rx: oneshot::Receiver<VoiceClip>,
    pub sample_rate: u32,
}

impl VoiceRecorder for CpalRecorder {
    type Capture = CpalCapture;

    async fn begin(&self) -> Result<CpalCapture, ClientError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let (clip_tx, clip_rx) = oneshot::channel();
        let device = self.preferred_device.clone();

        std::thread::Builder::new()
            .name("ringback-capture".into())
            .spawn(move || capture_thread(device, ready_tx, stop_rx, clip_tx))
            .map_err(|e| ClientError::CaptureDenied(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(sample_rate)) => Ok(CpalCapture {
                stop_tx,
                clip_rx,
                sample_rate,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::CaptureDenied("capture thread exited".into())),
        }
    }
}

impl ActiveCapture for CpalCapture {
    async fn finish(self) -> Result<VoiceClip, ClientError> {
        // The thread also stops when the sender is dropped.
        let _ = self.stop_tx.send(());
        self.clip_rx
            .await
            .map_err(|_| ClientError::CaptureDenied("capture ended without audio".into()))
    }
}

fn capture_thread(
    device_name: Option<String>,
    ready_tx: oneshot::Sender<Result<u32, ClientError>>,
    stop_rx: mpsc::Receiver<()>,
    clip_tx: oneshot::Sender<VoiceClip>,
) {
    let rb = HeapRb::<f32>::new(RING_CAPACITY);
    let (producer, mut consumer) = rb.split();

    let opened = open_input_stream(device_name.as_deref(), producer);
    let (stream, sample_rate, channels) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(ClientError::CaptureDenied(e.to_string())));
            return;
        }
    };
    let _ = ready_tx.send(Ok(sample_rate));

    let limit = sample_rate as usize * channels * MAX_CLIP_SECONDS;
    let mut interleaved: Vec<f32> = Vec::new();
    let mut scratch = vec![0.0f32; 4096];

    loop {
        let stopped = !matches!(
            stop_rx.recv_timeout(DRAIN_INTERVAL),
            Err(RecvTimeoutError::Timeout)
        );
        drain(&mut consumer, &mut scratch, &mut interleaved, limit);
        if stopped {
            break;
        }
    }

    drop(stream);
    drain(&mut consumer, &mut scratch, &mut interleaved, limit);
    debug!("capture stopped with {} interleaved samples", interleaved.len());

    let _ = clip_tx.send(VoiceClip::new(sample_rate, downmix(&interleaved, channels)));
}

fn drain<C>(consumer: &mut C, scratch: &mut [f32], out: &mut Vec<f32>, limit: usize)
where
    C: Consumer<Item = f32>,
{
    loop {
        let n = consumer.pop_slice(scratch);
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(out.len());
        out.extend_from_slice(&scratch[..n.min(room)]);
    }
}

fn open_input_stream<P>(
    device_name: Option<&str>,
    mut producer: P,
) -> Result<(cpal::Stream, u32, usize), anyhow::Error>
where
    P: Producer<Item = f32> + Send + 'static,
{
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow::anyhow!("input device {name:?} not found"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?,
    };

    info!("Audio Input Device: {}", device.name().unwrap_or_default());

    let config = device.default_input_config()?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let err_fn = |err| error!("an error occurred on input stream: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &_| {
                // Full buffer drops the newest samples.
                producer.push_slice(data);
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &_| {
                for &sample in data {
                    let _ = producer.try_push(sample as f32 / i16::MAX as f32);
                }
            },
            err_fn,
            None,
        )?,
        other => return Err(anyhow::anyhow!("Unsupported sample format {other:?}")),
    };

    stream.play()?;
    Ok((stream, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Observer;

    #[test]
    fn drain_respects_limit() {
        let rb = HeapRb::<f32>::new(16);
        let (mut producer, mut consumer) = rb.split();
        producer.push_slice(&[0.1; 10]);

        let mut scratch = vec![0.0; 4];
        let mut out = Vec::new();
        drain(&mut consumer, &mut scratch, &mut out, 6);
        assert_eq!(out.len(), 6);
        assert_eq!(consumer.occupied_len(), 0, "excess samples are consumed and discarded");
    }
}
