use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// Constants for the spin animation
pub const SPIN_ROUNDS: u32 = 12; // Full turns added to every spin, outcome neutral
pub const SPIN_DURATION_MS: u64 = 1800;
pub const MIN_SEGMENTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum SpinError {
    AlreadySpinning,
    NotSpinning,
    TooFewSegments(usize),
}

impl fmt::Display for SpinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySpinning => write!(f, "The wheel is already spinning"),
            Self::NotSpinning => write!(f, "There is no spin to complete"),
            Self::TooFewSegments(n) => {
                write!(f, "The wheel needs at least {} segments, got {}", MIN_SEGMENTS, n)
            }
        }
    }
}

impl std::error::Error for SpinError {}

/// The outcome the pointer lands on once a spin has finished.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpinOutcome {
    pub index: usize,
    pub label: String,
    /// Cumulative rotation to carry into the next spin.
    pub rotation: f64,
}

/// Where a spin will end. Resolution is deferred until the animation completes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PendingSpin {
    pub from_rotation: f64,
    pub to_rotation: f64,
    pub duration_ms: u64,
    pub segments: Vec<String>,
}

impl PendingSpin {
    /// Wheel rotation at animation progress `t` in `[0, 1]`.
    pub fn rotation_at(&self, t: f64) -> f64 {
        let eased = ease_cubic_in_out(t.clamp(0.0, 1.0));
        self.from_rotation + (self.to_rotation - self.from_rotation) * eased
    }

    pub fn resolve(&self) -> SpinOutcome {
        let index = resolve_index(self.to_rotation, self.segments.len());
        SpinOutcome {
            index,
            label: self.segments[index].clone(),
            rotation: self.to_rotation,
        }
    }
}

/// Cumulative rotation of one wheel plus the spin in flight, if any.
/// Spins are strictly serialized: a new one cannot start until the
/// previous one has been completed.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WheelSpinner {
    rotation: f64,
    pending: Option<PendingSpin>,
}

impl WheelSpinner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rotation(rotation: f64) -> Self {
        Self {
            rotation,
            pending: None,
        }
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Angle the wheel is drawn at while idle.
    pub fn resting_angle(&self) -> f64 {
        self.rotation % 360.0
    }

    pub fn is_spinning(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingSpin> {
        self.pending.as_ref()
    }

    pub fn start(&mut self, labels: Vec<String>, extra: f64) -> Result<&PendingSpin, SpinError> {
        if self.pending.is_some() {
            return Err(SpinError::AlreadySpinning);
        }
        if labels.len() < MIN_SEGMENTS {
            return Err(SpinError::TooFewSegments(labels.len()));
        }

        let to_rotation = target_rotation(self.rotation, extra);
        log::debug!(
            "Starting spin over {} segments: {:.2} -> {:.2}",
            labels.len(),
            self.rotation,
            to_rotation
        );

        Ok(self.pending.insert(PendingSpin {
            from_rotation: self.rotation,
            to_rotation,
            duration_ms: SPIN_DURATION_MS,
            segments: labels,
        }))
    }

    pub fn start_random<R: Rng + ?Sized>(
        &mut self,
        labels: Vec<String>,
        rng: &mut R,
    ) -> Result<&PendingSpin, SpinError> {
        let extra = rng.gen_range(0.0..360.0);
        self.start(labels, extra)
    }

    /// The animation's terminal callback: resolves the label and carries the
    /// target rotation forward.
    pub fn complete(&mut self) -> Result<SpinOutcome, SpinError> {
        let pending = self.pending.take().ok_or(SpinError::NotSpinning)?;
        let outcome = pending.resolve();
        self.rotation = outcome.rotation;
        log::debug!("Spin landed on segment {} ({})", outcome.index, outcome.label);
        Ok(outcome)
    }
}

pub fn target_rotation(prior: f64, extra: f64) -> f64 {
    prior + f64::from(SPIN_ROUNDS) * 360.0 + extra
}

/// The pointer sits at the top and the wheel turns clockwise, so the
/// segment under it is found by measuring the rotation backwards.
pub fn normalized_angle(target: f64) -> f64 {
    (360.0 - target % 360.0) % 360.0
}

/// Segment index under the pointer for a wheel of `segments` equal slices.
pub fn resolve_index(target: f64, segments: usize) -> usize {
    debug_assert!(segments > 0);
    let segment_size = 360.0 / segments as f64;
    let index = (normalized_angle(target) / segment_size).floor() as usize;
    // normalized can round up to exactly 360
    index.min(segments.saturating_sub(1))
}

pub fn spin_with_extra(labels: &[String], prior: f64, extra: f64) -> Result<SpinOutcome, SpinError> {
    let mut spinner = WheelSpinner::with_rotation(prior);
    spinner.start(labels.to_vec(), extra)?;
    spinner.complete()
}

pub fn spin<R: Rng + ?Sized>(labels: &[String], prior: f64, rng: &mut R) -> Result<SpinOutcome, SpinError> {
    let extra = rng.gen_range(0.0..360.0);
    spin_with_extra(labels, prior, extra)
}

/// Symmetric cubic easing, slow at both ends.
pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_worked_example() {
        let abcd = labels(&["A", "B", "C", "D"]);

        // 4330 mod 360 = 10, pointer measures 350 -> last quarter
        let outcome = spin_with_extra(&abcd, 0.0, 10.0).unwrap();
        assert_eq!(outcome.rotation, 4330.0);
        assert_eq!(outcome.index, 3);
        assert_eq!(outcome.label, "D");

        // 4570 mod 360 = 250, pointer measures 110 -> second quarter
        let outcome = spin_with_extra(&abcd, 0.0, 250.0).unwrap();
        assert_eq!(outcome.rotation, 4570.0);
        assert_eq!(normalized_angle(outcome.rotation), 110.0);
        assert_eq!(outcome.label, "B");
    }

    #[test]
    fn test_index_clamped_at_full_turn() {
        // normalized == 0 at an exact multiple of 360
        assert_eq!(resolve_index(720.0, 3), 0);
        // A hair below a full turn measures just above 0
        assert_eq!(resolve_index(719.999_999_999, 3), 0);
        assert!(resolve_index(0.000_000_000_1, 3) <= 2);
    }

    #[test]
    fn test_same_target_same_label() {
        let wheel = labels(&["Ramen", "Curry", "Dumplings"]);
        let a = spin_with_extra(&wheel, 123.0, 77.0).unwrap();
        let b = spin_with_extra(&wheel, 123.0 + 360.0 * 5.0, 77.0).unwrap();
        assert_eq!(a.label, b.label);
    }

    #[test]
    fn test_label_always_in_range_and_rotation_increases() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 2..12 {
            let wheel: Vec<String> = (0..n).map(|i| format!("shop-{}", i)).collect();
            let mut prior = 0.0;
            for _ in 0..200 {
                let outcome = spin(&wheel, prior, &mut rng).unwrap();
                assert!(outcome.index < n);
                assert_eq!(wheel[outcome.index], outcome.label);
                assert!(outcome.rotation > prior);
                prior = outcome.rotation;
            }
        }
    }

    #[test]
    fn test_selection_is_uniform() {
        let wheel = labels(&["A", "B", "C", "D", "E"]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0usize; 5];
        let spins = 50_000;
        let mut prior = 0.0;
        for _ in 0..spins {
            let outcome = spin(&wheel, prior, &mut rng).unwrap();
            counts[outcome.index] += 1;
            prior = outcome.rotation;
        }
        for count in counts {
            let freq = count as f64 / spins as f64;
            assert!((freq - 0.2).abs() < 0.01, "frequency {} too far from 1/5", freq);
        }
    }

    #[test]
    fn test_spinner_is_not_reentrant() {
        let mut spinner = WheelSpinner::new();
        spinner.start(labels(&["A", "B"]), 30.0).unwrap();
        assert!(spinner.is_spinning());
        assert_eq!(
            spinner.start(labels(&["A", "B"]), 30.0).unwrap_err(),
            SpinError::AlreadySpinning
        );

        let outcome = spinner.complete().unwrap();
        assert!(!spinner.is_spinning());
        assert_eq!(spinner.rotation(), outcome.rotation);
        assert_eq!(spinner.complete().unwrap_err(), SpinError::NotSpinning);
    }

    #[test]
    fn test_single_segment_rejected() {
        let mut spinner = WheelSpinner::new();
        assert_eq!(
            spinner.start(labels(&["Only"]), 0.0).unwrap_err(),
            SpinError::TooFewSegments(1)
        );
        assert!(!spinner.is_spinning());
    }

    #[test]
    fn test_segment_count_change_between_spins() {
        let mut spinner = WheelSpinner::new();
        spinner.start(labels(&["A", "B", "C", "D"]), 10.0).unwrap();
        spinner.complete().unwrap();

        // 4330 + 4320 + 100 = 8750, mod 360 = 110, normalized 250 -> third slice
        spinner.start(labels(&["X", "Y", "Z"]), 100.0).unwrap();
        let outcome = spinner.complete().unwrap();
        assert_eq!(outcome.rotation, 8750.0);
        assert_eq!(outcome.label, "Z");
    }

    #[test]
    fn test_animation_curve() {
        let pending = PendingSpin {
            from_rotation: 100.0,
            to_rotation: 4500.0,
            duration_ms: SPIN_DURATION_MS,
            segments: labels(&["A", "B"]),
        };
        assert_eq!(pending.rotation_at(0.0), 100.0);
        assert_eq!(pending.rotation_at(1.0), 4500.0);
        assert_eq!(pending.rotation_at(0.5), 2300.0);
        assert!(pending.rotation_at(0.25) < 2300.0 / 2.0);
        assert_eq!(ease_cubic_in_out(0.5), 0.5);
    }
}
