/// Sound engine: procedural sound effects via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time, one per
/// `Cue`. One-shots are fire-and-forget via a detached `Sink`; looping cues
/// (the jetpack) keep their `Sink` so they can be stopped.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

use crate::domain::entity::CueCommand;

#[cfg(feature = "sound")]
mod inner {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

    use crate::domain::entity::Cue;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = 2.0 * std::f32::consts::PI;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx: HashMap<Cue, Arc<Vec<u8>>>,
        loops: HashMap<Cue, Sink>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "no audio output, sound disabled");
                    return None;
                }
            };

            let sfx = Cue::ALL
                .iter()
                .map(|&cue| (cue, Arc::new(make_wav(&generate(cue)))))
                .collect();

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx,
                loops: HashMap::new(),
            })
        }

        fn buffer(&self, cue: Cue) -> Option<Cursor<Vec<u8>>> {
            match self.sfx.get(&cue) {
                Some(buf) => Some(Cursor::new(buf.as_ref().clone())),
                None => {
                    tracing::warn!(cue = cue.name(), "no sound loaded for cue");
                    None
                }
            }
        }

        pub fn play(&self, cue: Cue) {
            let Some(cursor) = self.buffer(cue) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        pub fn start_loop(&mut self, cue: Cue) {
            if self.loops.contains_key(&cue) { return; }
            let Some(cursor) = self.buffer(cue) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src.repeat_infinite());
                    self.loops.insert(cue, sink);
                }
            }
        }

        pub fn stop_loop(&mut self, cue: Cue) {
            if let Some(sink) = self.loops.remove(&cue) {
                sink.stop();
            }
        }

        pub fn stop_all(&mut self) {
            for (_, sink) in self.loops.drain() {
                sink.stop();
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators, all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn generate(cue: Cue) -> Vec<f32> {
        match cue {
            Cue::Jump => gen_jump(),
            Cue::Land => gen_land(),
            Cue::Run => gen_step(),
            Cue::Explosion => gen_explosion(),
            Cue::Clink => gen_clink(),
            Cue::Jet => gen_jet(),
        }
    }

    fn samples_for(duration: f32) -> usize {
        (SAMPLE_RATE as f32 * duration) as usize
    }

    /// Simple LCG noise in [-1, 1)
    fn noise(rng: &mut u32) -> f32 {
        *rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
        (*rng as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    /// Jump: quick rising sweep
    fn gen_jump() -> Vec<f32> {
        let n = samples_for(0.12);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 250.0 + t * 450.0;
                phase += freq / SAMPLE_RATE as f32;
                let env = (1.0 - t).powf(0.7);
                (phase * TAU).sin() * env * 0.25
            })
            .collect()
    }

    /// Land: low thud with a little grit
    fn gen_land() -> Vec<f32> {
        let n = samples_for(0.08);
        let mut rng: u32 = 777;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let tone = (ti * 90.0 * TAU).sin();
                let env = (1.0 - t).powf(2.0);
                (tone * 0.7 + noise(&mut rng) * 0.3) * env * 0.35
            })
            .collect()
    }

    /// Footstep: very short filtered click
    fn gen_step() -> Vec<f32> {
        let n = samples_for(0.03);
        let mut rng: u32 = 4242;
        let mut prev = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                prev = prev * 0.6 + noise(&mut rng) * 0.4;
                prev * (1.0 - t) * 0.3
            })
            .collect()
    }

    /// Explosion: long noise burst with a falling rumble
    fn gen_explosion() -> Vec<f32> {
        let n = samples_for(0.6);
        let mut rng: u32 = 12345;
        let mut low = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                low = low * 0.92 + noise(&mut rng) * 0.08;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let rumble = (ti * (80.0 - t * 40.0) * TAU).sin();
                let env = (1.0 - t).powf(1.5);
                (low * 3.0 + rumble * 0.3) * env * 0.4
            })
            .collect()
    }

    /// Clink: grapple bouncing off a hard surface
    fn gen_clink() -> Vec<f32> {
        let n = samples_for(0.1);
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let wave = (ti * 2093.0 * TAU).sin() * 0.6
                    + (ti * 3136.0 * TAU).sin() * 0.4;
                wave * (1.0 - t).powf(3.0) * 0.25
            })
            .collect()
    }

    /// Jetpack: steady hiss, faded at both ends so the loop seam is quiet
    fn gen_jet() -> Vec<f32> {
        let n = samples_for(0.25);
        let fade = n / 20;
        let mut rng: u32 = 99;
        let mut prev = 0.0_f32;
        (0..n)
            .map(|i| {
                prev = prev * 0.8 + noise(&mut rng) * 0.2;
                let edge = if i < fade {
                    i as f32 / fade as f32
                } else if i >= n - fade {
                    (n - i) as f32 / fade as f32
                } else {
                    1.0
                };
                prev * edge * 0.5
            })
            .collect()
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    pub(super) fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2; // 16-bit = 2 bytes per sample
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        // fmt chunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes());  // PCM format
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        // data chunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

}

// ════════════════════════════════════════════════════════════
//  Public API, compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _cue: crate::domain::entity::Cue) {}
    pub fn start_loop(&mut self, _cue: crate::domain::entity::Cue) {}
    pub fn stop_loop(&mut self, _cue: crate::domain::entity::Cue) {}
    pub fn stop_all(&mut self) {}
}

impl SoundEngine {
    pub fn handle(&mut self, cmd: CueCommand) {
        match cmd {
            CueCommand::Play(cue) => self.play(cue),
            CueCommand::StartLoop(cue) => self.start_loop(cue),
            CueCommand::StopLoop(cue) => self.stop_loop(cue),
        }
    }
}
