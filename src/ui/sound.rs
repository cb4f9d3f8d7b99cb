/// Sound engine: procedural sound effects and looping level music via rodio.
///
/// All effects are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink; music runs
/// on one long-lived Sink that is swapped on level start.
///
/// The music is synthesized from a small note table per track, and
/// `music_spectrum()` derives analyser bins from the same table, so the
/// equalizer level can follow the music without tapping the audio device.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

/// A looping track: tempo plus one note (Hz) per beat.
pub struct Track {
    pub bpm: f32,
    pub notes: &'static [f32],
}

const LOBBY: Track = Track { bpm: 84.0, notes: &[220.0, 262.0, 330.0, 262.0, 196.0, 247.0, 294.0, 247.0] };
const TUTORIAL: Track = Track { bpm: 96.0, notes: &[262.0, 330.0, 392.0, 330.0] };
const FLOOR: Track = Track {
    bpm: 128.0,
    notes: &[110.0, 110.0, 220.0, 165.0, 131.0, 131.0, 262.0, 196.0, 98.0, 98.0, 196.0, 147.0, 123.0, 147.0, 185.0, 247.0],
};
const FINALE: Track = Track { bpm: 140.0, notes: &[523.0, 659.0, 784.0, 1047.0, 784.0, 659.0, 523.0, 392.0] };

pub fn track(key: &str) -> &'static Track {
    match key {
        "lobby" => &LOBBY,
        "tutorial" => &TUTORIAL,
        "finale" => &FINALE,
        _ => &FLOOR,
    }
}

const LOW_HZ: f32 = 55.0;
const OCTAVES: f32 = 5.0;

/// Analyser bins in [0, 1] for `track` at `t_ms` into the loop: the note's
/// fundamental and first harmonic on a log-frequency axis, plus a kick in
/// the lowest bin, all decaying across the beat.
pub fn music_spectrum(key: &str, t_ms: f64, bins: usize) -> Vec<f32> {
    let tr = track(key);
    if bins == 0 || tr.notes.is_empty() {
        return vec![];
    }
    let beat_ms = 60_000.0 / tr.bpm as f64;
    let beat = (t_ms.max(0.0) / beat_ms) as usize;
    let phase = ((t_ms.max(0.0) % beat_ms) / beat_ms) as f32;
    let env = (1.0 - phase).powi(2);
    let freq = tr.notes[beat % tr.notes.len()];

    let band = |f: f32| (f / LOW_HZ).log2() / OCTAVES * (bins - 1) as f32;
    let (c1, c2) = (band(freq), band(freq * 2.0));

    (0..bins)
        .map(|k| {
            let x = k as f32;
            let tone = (-(x - c1).powi(2) / 2.0).exp() + 0.5 * (-(x - c2).powi(2) / 2.0).exp();
            let kick = if k == 0 { 0.8 * (1.0 - phase).powi(4) } else { 0.0 };
            (env * tone + kick).clamp(0.0, 1.0)
        })
        .collect()
}

#[cfg(feature = "sound")]
mod inner {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

    use super::Track;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = 2.0 * std::f32::consts::PI;

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        music: RefCell<Option<Sink>>,
        sfx_stairs: Arc<Vec<u8>>,
        sfx_clear: Arc<Vec<u8>>,
        sfx_flash: Arc<Vec<u8>>,
        sfx_party_over: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("audio output unavailable: {e}");
                    return None;
                }
            };

            Some(SoundEngine {
                _stream: stream,
                handle,
                music: RefCell::new(None),
                sfx_stairs: Arc::new(make_wav(&gen_stairs())),
                sfx_clear: Arc::new(make_wav(&gen_clear())),
                sfx_flash: Arc::new(make_wav(&gen_flash())),
                sfx_party_over: Arc::new(make_wav(&gen_party_over())),
            })
        }

        fn play(&self, buf: &[u8]) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.to_vec());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        /// Trade blip: rising for a gain, falling for a loss, louder
        /// with magnitude. Zero effect stays silent.
        pub fn play_trade(&self, effect: f64) {
            if effect == 0.0 { return; }
            let mag = (effect.abs() as f32 / 5.0).min(1.0);
            let (from, to) = if effect > 0.0 { (500.0, 900.0) } else { (400.0, 180.0) };
            self.play(&make_wav(&gen_sweep(from, to, 0.06, 0.1 + 0.2 * mag)));
        }

        /// Dialogue tick, pitched by speaker side.
        pub fn play_dialogue(&self, left: bool) {
            let freq = if left { 330.0 } else { 440.0 };
            self.play(&make_wav(&gen_sweep(freq, freq, 0.03, 0.15)));
        }

        pub fn play_stairs(&self) { self.play(&self.sfx_stairs); }
        pub fn play_clear(&self) { self.play(&self.sfx_clear); }
        pub fn play_flash(&self) { self.play(&self.sfx_flash); }
        pub fn play_party_over(&self) { self.play(&self.sfx_party_over); }

        /// Replace the running music loop.
        pub fn play_music(&self, key: &str) {
            let Ok(sink) = Sink::try_new(&self.handle) else { return };
            let wav = make_wav(&gen_track(super::track(key)));
            match rodio::Decoder::new(Cursor::new(wav)) {
                Ok(src) => {
                    sink.set_volume(0.35);
                    sink.append(src.repeat_infinite());
                    if let Some(old) = self.music.borrow_mut().replace(sink) {
                        old.stop();
                    }
                }
                Err(e) => log::warn!("music {key}: {e}"),
            }
        }

        pub fn stop_music(&self) {
            if let Some(old) = self.music.borrow_mut().take() {
                old.stop();
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn gen_sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut phase = 0.0f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = from + (to - from) * t;
                phase += freq / SAMPLE_RATE as f32;
                let env = 1.0 - t;
                (phase * TAU).sin() * env * volume
            })
            .collect()
    }

    fn gen_notes(notes: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in notes {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 2.0 * TAU).sin() * 0.3;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Threshold crossed: two-note chime.
    fn gen_stairs() -> Vec<f32> {
        gen_notes(&[(784.0, 0.08), (1047.0, 0.15)], 0.3)
    }

    /// Exit taken: ascending fanfare.
    fn gen_clear() -> Vec<f32> {
        gen_notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.3)], 0.3)
    }

    fn gen_party_over() -> Vec<f32> {
        gen_notes(&[(392.0, 0.12), (392.0, 0.12), (523.0, 0.35)], 0.3)
    }

    /// Level swap: noise whoosh.
    fn gen_flash() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.2) as usize;
        let mut rng: u32 = 12345;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (t * std::f32::consts::PI).sin();
                noise * env * 0.15
            })
            .collect()
    }

    /// One pass through the track's note table with a kick on each beat.
    fn gen_track(track: &Track) -> Vec<f32> {
        let beat = 60.0 / track.bpm;
        let n = (SAMPLE_RATE as f32 * beat) as usize;
        let mut samples = Vec::with_capacity(n * track.notes.len());
        for &freq in track.notes {
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let p = i as f32 / n as f32;
                let env = (1.0 - p).powi(2);
                let tone = (t * freq * TAU).sin() * 0.6 + (t * freq * 2.0 * TAU).sin() * 0.2;
                let kick = (t * (60.0 + 90.0 * (1.0 - p).powi(8)) * TAU).sin() * (1.0 - p).powi(4);
                samples.push((tone * env + kick * 0.6) * 0.4);
            }
        }
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes());  // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

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
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_trade(&self, _effect: f64) {}
    pub fn play_dialogue(&self, _left: bool) {}
    pub fn play_stairs(&self) {}
    pub fn play_clear(&self) {}
    pub fn play_flash(&self) {}
    pub fn play_party_over(&self) {}
    pub fn play_music(&self, _key: &str) {}
    pub fn stop_music(&self) {}
}
