//! Dash pattern to native line stipple conversion

use glaze_core::Dash;
use smallvec::SmallVec;

/// Native stipple pattern width in bits
const PATTERN_BITS: u32 = 16;
/// Largest repeat factor the native stipple accepts
const MAX_FACTOR: u32 = 256;

/// A 16-bit repeating line pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stipple {
    /// Pixels covered by each pattern bit
    pub factor: u16,
    /// Bit i gates the i-th run, least significant bit first
    pub pattern: u16,
}

impl Stipple {
    /// On/off state of every pixel in one full pattern repetition
    pub fn expand(&self) -> Vec<bool> {
        (0..PATTERN_BITS)
            .flat_map(|bit| {
                let on = self.pattern & (1 << bit) != 0;
                std::iter::repeat(on).take(self.factor as usize)
            })
            .collect()
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn as_units(value: f32) -> Option<u32> {
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f32 {
        return None;
    }
    Some(value as u32)
}

/// Express `dash` as a native stipple
///
/// Fails when a length is not integral, when the period reduced by the common
/// divisor of all lengths and the phase does not divide the 16-bit pattern, or
/// when that divisor exceeds the native repeat factor.
pub fn dash_to_stipple(dash: &Dash) -> Option<Stipple> {
    let mut segments: SmallVec<[u32; 16]> = dash
        .array
        .iter()
        .map(|&len| as_units(len))
        .collect::<Option<_>>()?;
    if segments.is_empty() {
        return None;
    }
    if segments.len() % 2 == 1 {
        let repeat = segments.clone();
        segments.extend(repeat);
    }
    let phase = as_units(dash.phase)?;

    let unit = segments.iter().fold(phase, |acc, &s| gcd(acc, s));
    if unit == 0 || unit > MAX_FACTOR {
        return None;
    }
    let period: u32 = segments.iter().map(|s| s / unit).sum();
    if !matches!(period, 1 | 2 | 4 | 8 | 16) {
        return None;
    }

    let mut bits: SmallVec<[bool; 16]> = SmallVec::new();
    for (i, &len) in segments.iter().enumerate() {
        let on = i % 2 == 0;
        bits.extend(std::iter::repeat(on).take((len / unit) as usize));
    }
    let offset = (phase / unit) % period;
    let pattern = (0..PATTERN_BITS).fold(0u16, |pattern, bit| {
        let index = ((bit + offset) % period) as usize;
        if bits[index] {
            pattern | 1 << bit
        } else {
            pattern
        }
    });

    Some(Stipple {
        factor: unit as u16,
        pattern,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dash() {
        let stipple = dash_to_stipple(&Dash::new(&[4.0, 4.0], 0.0)).unwrap();
        assert_eq!(stipple.factor, 4);
        assert_eq!(stipple.pattern, 0b0101_0101_0101_0101);
    }

    #[test]
    fn test_phase_rotates_pattern() {
        let stipple = dash_to_stipple(&Dash::new(&[2.0, 2.0], 2.0)).unwrap();
        assert_eq!(stipple.factor, 2);
        assert_eq!(stipple.pattern, 0b1010_1010_1010_1010);
    }

    #[test]
    fn test_odd_array_repeats() {
        // [3] behaves as [3, 3]
        let stipple = dash_to_stipple(&Dash::new(&[3.0], 0.0)).unwrap();
        assert_eq!(stipple.factor, 3);
        assert_eq!(stipple.pattern, 0x5555);
    }

    #[test]
    fn test_unexpressible_period_fails() {
        assert!(dash_to_stipple(&Dash::new(&[1.0, 2.0], 0.0)).is_none());
        assert!(dash_to_stipple(&Dash::new(&[10.0, 7.0], 0.0)).is_none());
        assert!(dash_to_stipple(&Dash::new(&[1.5, 1.5], 0.0)).is_none());
    }

    #[test]
    fn test_expand_reproduces_segments() {
        let stipple = dash_to_stipple(&Dash::new(&[6.0, 2.0], 0.0)).unwrap();
        let expanded = stipple.expand();
        assert_eq!(expanded.len(), 16 * stipple.factor as usize);
        assert!(expanded[..6].iter().all(|&on| on));
        assert!(expanded[6..8].iter().all(|&on| !on));
        assert!(expanded[8..14].iter().all(|&on| on));
    }

    #[test]
    fn test_large_unit_is_rejected() {
        assert!(dash_to_stipple(&Dash::new(&[512.0, 512.0], 0.0)).is_none());
    }
}
