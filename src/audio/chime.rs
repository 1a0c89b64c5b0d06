use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f32::consts::TAU;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Renders one ring "pulse". Failures are the caller's to log; they never
/// stop the ringing loop.
pub trait TonePlayer: Send + Sync + 'static {
    fn play(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub frequency_hz: f32,
    pub amplitude: f32,
    /// Time constant of the exponential decay.
    pub decay_secs: f32,
}

pub const CHIME_PARTIALS: [Partial; 3] = [
    Partial { frequency_hz: 880.0, amplitude: 0.6, decay_secs: 0.45 },
    Partial { frequency_hz: 1320.0, amplitude: 0.3, decay_secs: 0.30 },
    Partial { frequency_hz: 1760.0, amplitude: 0.15, decay_secs: 0.18 },
];

pub const CHIME_LENGTH: Duration = Duration::from_millis(900);

const ATTACK_SECS: f32 = 0.005;
const PEAK: f32 = 0.8;

/// Sum of independently decaying sine partials, normalized to `PEAK`.
pub fn render_chime(sample_rate: u32, partials: &[Partial], length: Duration) -> Vec<f32> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let rate = sample_rate as f32;
    let count = (length.as_secs_f32() * rate) as usize;

    let mut out: Vec<f32> = (0..count)
        .map(|i| {
            let t = i as f32 / rate;
            let attack = (t / ATTACK_SECS).min(1.0);
            partials
                .iter()
                .map(|p| {
                    let envelope = if p.decay_secs > 0.0 { (-t / p.decay_secs).exp() } else { 0.0 };
                    p.amplitude * envelope * (TAU * p.frequency_hz * t).sin()
                })
                .sum::<f32>()
                * attack
        })
        .collect();

    let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        let scale = PEAK / peak;
        out.iter_mut().for_each(|s| *s *= scale);
    }
    out
}

/// Plays the chime on the default output device. Each pulse gets its own
/// short-lived stream on a helper thread.
#[derive(Debug, Clone, Default)]
pub struct CpalChime;

impl TonePlayer for CpalChime {
    fn play(&self) -> anyhow::Result<()> {
        std::thread::Builder::new()
            .name("ringback-chime".into())
            .spawn(|| {
                if let Err(e) = play_blocking() {
                    warn!("chime playback failed: {e}");
                }
            })?;
        Ok(())
    }
}

fn play_blocking() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;
    let config = device.default_output_config()?;
    let channels = config.channels() as usize;
    let samples = render_chime(config.sample_rate().0, &CHIME_PARTIALS, CHIME_LENGTH);
    debug!("chime: {} samples x {} channels", samples.len(), channels);

    let err_fn = |err| error!("an error occurred on output stream: {}", err);
    let mut pos = 0usize;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &_| {
                for frame in data.chunks_mut(channels) {
                    let value = samples.get(pos).copied().unwrap_or(0.0);
                    pos += 1;
                    frame.iter_mut().for_each(|s| *s = value);
                }
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config.into(),
            move |data: &mut [i16], _: &_| {
                for frame in data.chunks_mut(channels) {
                    let value = samples.get(pos).copied().unwrap_or(0.0);
                    pos += 1;
                    frame.iter_mut().for_each(|s| *s = (value * i16::MAX as f32) as i16);
                }
            },
            err_fn,
            None,
        )?,
        other => return Err(anyhow::anyhow!("Unsupported sample format {other:?}")),
    };

    stream.play()?;
    std::thread::sleep(CHIME_LENGTH + Duration::from_millis(50));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_is_normalized_and_decays() {
        let samples = render_chime(8_000, &CHIME_PARTIALS, CHIME_LENGTH);
        assert_eq!(samples.len(), 7_200);

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - PEAK).abs() < 1e-4);

        let head = samples[..800].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let tail = samples[6_400..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail < head * 0.2, "tail {tail} should be far quieter than head {head}");
    }

    #[test]
    fn starts_without_click() {
        let samples = render_chime(48_000, &CHIME_PARTIALS, CHIME_LENGTH);
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn zero_rate_renders_nothing() {
        assert!(render_chime(0, &CHIME_PARTIALS, CHIME_LENGTH).is_empty());
    }
}
