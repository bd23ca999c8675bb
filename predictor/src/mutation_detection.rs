//! Fixed-position marker detection.
//!
//! Every marker is checked at two windows of the raw sequence. Offsets are
//! 0-based, half-open and counted in characters; comparisons are case-sensitive.

use std::ops::Range;

use tracing::debug;

use crate::error::{PredictorError, PredictorResult};
use crate::models::{Mutation, MutationFlags};

/// Shortest sequence the marker table can be applied to.
pub const MIN_SEQUENCE_LENGTH: usize = 300;

/// What a window comparison has to show for the marker to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The wild-type motif is missing from at least one window (deletions).
    MotifAbsent,
    /// The mutant motif is present in at least one window (substitutions).
    MotifPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub mutation: Mutation,
    pub motif: &'static str,
    pub windows: [Range<usize>; 2],
    pub trigger: Trigger,
}

/// M1: AG deleted at 50–51 / 80–81.
pub const M1_MARKER: Marker = Marker {
    mutation: Mutation::M1,
    motif: "AG",
    windows: [49..51, 79..81],
    trigger: Trigger::MotifAbsent,
};

/// M2: CTT deleted at 100–102 / 130–132.
pub const M2_MARKER: Marker = Marker {
    mutation: Mutation::M2,
    motif: "CTT",
    windows: [99..102, 129..132],
    trigger: Trigger::MotifAbsent,
};

/// M3: GAG → GTG at 150–152 / 170–172.
pub const M3_MARKER: Marker = Marker {
    mutation: Mutation::M3,
    motif: "GTG",
    windows: [149..152, 169..172],
    trigger: Trigger::MotifPresent,
};

/// M4: TGC → CGC at 200–202 / 220–222.
pub const M4_MARKER: Marker = Marker {
    mutation: Mutation::M4,
    motif: "CGC",
    windows: [199..202, 219..222],
    trigger: Trigger::MotifPresent,
};

/// M5: C → T at 250 / 270.
pub const M5_MARKER: Marker = Marker {
    mutation: Mutation::M5,
    motif: "T",
    windows: [249..250, 269..270],
    trigger: Trigger::MotifPresent,
};

pub static MARKERS: [Marker; 5] = [M1_MARKER, M2_MARKER, M3_MARKER, M4_MARKER, M5_MARKER];

pub fn marker_for(mutation: Mutation) -> &'static Marker {
    &MARKERS[mutation as usize]
}

impl Marker {
    fn fires(&self, bases: &[char]) -> bool {
        let mut matches = self
            .windows
            .iter()
            .map(|w| window_matches(bases, w.clone(), self.motif));
        match self.trigger {
            Trigger::MotifAbsent => matches.any(|m| !m),
            Trigger::MotifPresent => matches.any(|m| m),
        }
    }
}

fn window_matches(bases: &[char], window: Range<usize>, motif: &str) -> bool {
    bases[window].iter().copied().eq(motif.chars())
}

/// Reject sequences the marker table cannot be applied to.
pub fn validate_sequence(sequence: &str) -> PredictorResult<()> {
    let length = sequence.chars().count();
    if length < MIN_SEQUENCE_LENGTH {
        return Err(PredictorError::Validation(format!(
            "DNA sequence has {length} bases, at least {MIN_SEQUENCE_LENGTH} are required"
        )));
    }
    Ok(())
}

/// Scan `sequence` for the five markers.
pub fn detect(sequence: &str) -> PredictorResult<MutationFlags> {
    validate_sequence(sequence)?;
    let bases: Vec<char> = sequence.chars().collect();

    let mut flags = MutationFlags::default();
    for marker in &MARKERS {
        flags.set(marker.mutation, marker.fires(&bases));
    }

    debug!(
        "Detected {} marker(s) in {} bases: {:?}",
        flags.count(),
        bases.len(),
        flags.active().collect::<Vec<_>>()
    );
    Ok(flags)
}
