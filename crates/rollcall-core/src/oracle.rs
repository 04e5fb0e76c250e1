//! Detection oracle — the opaque face-recognition capability.
//!
//! The loop consumes the oracle through a narrow contract: one poll per
//! tick, at most one candidate back. How faces are recognized is not this
//! crate's concern; [`SimulatedOracle`] emulates sensor noise with a seedable
//! RNG, [`ScriptedOracle`] replays a fixed sequence for deterministic tests.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{DetectionCandidate, FaceBox, Student};

// --- Simulated sensor characteristics ---
const DETECTION_CHANCE_OPEN: f64 = 0.80;
const DETECTION_CHANCE_TARGETED: f64 = 0.95;
const TARGET_MATCH_CHANCE: f64 = 0.90;
const OPEN_KNOWN_CHANCE: f64 = 0.70;
/// Face region side as a fraction of the short frame edge.
const REGION_SCALE: f32 = 0.4;
/// Center jitter in pixels, each axis.
const REGION_JITTER: f32 = 20.0;

/// One detection attempt per poll tick.
///
/// `target` biases the oracle toward that identity (1:1 verification);
/// without it the oracle scans the whole roster. Returning `None` means "no
/// face this tick" and is expected, frequent, and not an error. A returned
/// candidate with `matched: None` means "someone present, not recognized".
pub trait DetectionOracle: Send {
    fn poll(
        &mut self,
        roster: &[Student],
        frame_width: u32,
        frame_height: u32,
        target: Option<&str>,
    ) -> Option<DetectionCandidate>;
}

/// Pseudo-random oracle emulating a real sensor's miss rate and confidence
/// spread. Seedable so integration runs can be replayed.
pub struct SimulatedOracle {
    rng: StdRng,
}

impl SimulatedOracle {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// A face region roughly centered in the frame with a little jitter.
    fn region(&mut self, frame_width: u32, frame_height: u32) -> FaceBox {
        let side = frame_width.min(frame_height) as f32 * REGION_SCALE;
        let x = (frame_width as f32 - side) / 2.0
            + self.rng.gen_range(-REGION_JITTER..REGION_JITTER);
        let y = (frame_height as f32 - side) / 2.0
            + self.rng.gen_range(-REGION_JITTER..REGION_JITTER);
        FaceBox { x, y, width: side, height: side }
    }
}

impl Default for SimulatedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionOracle for SimulatedOracle {
    fn poll(
        &mut self,
        roster: &[Student],
        frame_width: u32,
        frame_height: u32,
        target: Option<&str>,
    ) -> Option<DetectionCandidate> {
        let detection_chance = if target.is_some() {
            DETECTION_CHANCE_TARGETED
        } else {
            DETECTION_CHANCE_OPEN
        };
        if self.rng.gen::<f64>() >= detection_chance {
            return None;
        }

        let region = self.region(frame_width, frame_height);

        if let Some(target_id) = target {
            // 1:1 verification: strong bias toward the target, but a miss is
            // still possible and surfaces as an unrecognized face.
            if self.rng.gen::<f64>() < TARGET_MATCH_CHANCE {
                if let Some(student) = roster.iter().find(|s| s.id == target_id) {
                    return Some(DetectionCandidate {
                        matched: Some(student.clone()),
                        confidence: self.rng.gen_range(88.0..99.0),
                        region,
                    });
                }
            }
            return Some(DetectionCandidate {
                matched: None,
                confidence: self.rng.gen_range(20.0..50.0),
                region,
            });
        }

        if self.rng.gen::<f64>() < OPEN_KNOWN_CHANCE && !roster.is_empty() {
            let student = roster[self.rng.gen_range(0..roster.len())].clone();
            Some(DetectionCandidate {
                matched: Some(student),
                confidence: self.rng.gen_range(85.0..99.9),
                region,
            })
        } else {
            Some(DetectionCandidate {
                matched: None,
                confidence: self.rng.gen_range(40.0..60.0),
                region,
            })
        }
    }
}

/// Deterministic oracle replaying a scripted sequence of tick results.
///
/// Each `poll` pops the next entry; an exhausted script keeps returning
/// `None`. Inputs are ignored — the script is the whole truth.
pub struct ScriptedOracle {
    script: VecDeque<Option<DetectionCandidate>>,
}

impl ScriptedOracle {
    pub fn new(script: impl IntoIterator<Item = Option<DetectionCandidate>>) -> Self {
        Self { script: script.into_iter().collect() }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectionOracle for ScriptedOracle {
    fn poll(
        &mut self,
        _roster: &[Student],
        _frame_width: u32,
        _frame_height: u32,
        _target: Option<&str>,
    ) -> Option<DetectionCandidate> {
        self.script.pop_front().flatten()
    }
}
