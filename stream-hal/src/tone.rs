//! Sine tone source for filling output buffers.
//!
//! One period of a sine is sampled into an `L`-entry table; the tone walks
//! the table one entry per frame, so its frequency is `sample_rate / L`
//! (375 Hz for the default 128 entries at 48 kHz).
//!
//! ```ignore
//! let mut tone = Tone::<128>::new(i16::MAX as f32);
//! buffer.fill(|memory| tone.fill_i16(memory))?;
//! buffer.start(Op::WRITE);
//! ```

use core::f32::consts::TAU;

/// One sine period scaled to a peak amplitude.
#[derive(Debug, Clone)]
pub struct SineTable<const L: usize> {
    samples: [i32; L],
}

impl<const L: usize> SineTable<L> {
    /// Sample `sin` at `L` points, scaled to `peak`.
    pub fn new(peak: f32) -> Self {
        let mut samples = [0i32; L];
        for (i, sample) in samples.iter_mut().enumerate() {
            let angle = i as f32 * TAU / L as f32;
            *sample = libm::roundf(peak * libm::sinf(angle)) as i32;
        }
        SineTable { samples }
    }

    pub fn get(&self, index: usize) -> i32 {
        self.samples[index % L]
    }

    pub fn len(&self) -> usize {
        L
    }

    pub fn is_empty(&self) -> bool {
        L == 0
    }
}

/// Continuous mono sine tone. The phase carries over between fills, so
/// consecutive buffers join without a click.
#[derive(Debug, Clone)]
pub struct Tone<const L: usize> {
    table: SineTable<L>,
    phase: usize,
}

impl<const L: usize> Tone<L> {
    pub fn new(peak: f32) -> Self {
        const { assert!(L > 0, "sine table needs at least one entry") };
        Tone {
            table: SineTable::new(peak),
            phase: 0,
        }
    }

    fn next(&mut self) -> i32 {
        let sample = self.table.get(self.phase);
        self.phase = (self.phase + 1) % L;
        sample
    }

    /// Fill `out` with little-endian `i16` samples. Returns the number of
    /// bytes written, which is `out.len()` rounded down to whole samples.
    pub fn fill_i16(&mut self, out: &mut [u8]) -> usize {
        let mut written = 0;
        for chunk in out.chunks_exact_mut(2) {
            let sample = self.next().clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            chunk.copy_from_slice(&sample.to_le_bytes());
            written += 2;
        }
        written
    }

    /// Fill `out` with little-endian `i32` words, for 24-in-32 formats.
    pub fn fill_i32(&mut self, out: &mut [u8]) -> usize {
        let mut written = 0;
        for chunk in out.chunks_exact_mut(4) {
            chunk.copy_from_slice(&self.next().to_le_bytes());
            written += 4;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_one_period() {
        let table = SineTable::<128>::new(32767.0);
        assert_eq!(table.get(0), 0);
        assert_eq!(table.get(32), 32767);
        assert_eq!(table.get(96), -32767);
        assert!(table.get(64).abs() <= 1);
        // Wraps
        assert_eq!(table.get(128 + 32), 32767);
    }

    #[test]
    fn phase_continues_across_fills() {
        let mut tone = Tone::<4>::new(100.0);
        let mut first = [0u8; 6];
        assert_eq!(tone.fill_i16(&mut first), 6);
        let mut second = [0u8; 4];
        assert_eq!(tone.fill_i16(&mut second), 4);

        let samples: [i16; 5] = [
            i16::from_le_bytes([first[0], first[1]]),
            i16::from_le_bytes([first[2], first[3]]),
            i16::from_le_bytes([first[4], first[5]]),
            i16::from_le_bytes([second[0], second[1]]),
            i16::from_le_bytes([second[2], second[3]]),
        ];
        assert_eq!(samples, [0, 100, 0, -100, 0]);
    }

    #[test]
    fn partial_samples_are_not_written() {
        let mut tone = Tone::<8>::new(1000.0);
        let mut out = [0xAAu8; 7];
        assert_eq!(tone.fill_i32(&mut out), 4);
        assert_eq!(out[4..], [0xAA; 3]);
    }
}
