//! Relevance and confidence formulas
//!
//! Two confidence scales exist and are not calibrated against each other:
//! answers use the raw distance of the best match, extracted sections use a
//! corroboration heuristic over source and evidence counts.
//!
//! The constants below were chosen empirically. Changing any of them changes
//! which chunks pass the relevance filter and which confidences are reported.

/// Distance at which relevance reaches zero
pub const MAX_RELEVANT_DISTANCE: f32 = 1.2;

/// Floor of every extraction confidence
pub const EXTRACTION_BASE_CONFIDENCE: f32 = 0.70;
/// Bonus per distinct source
pub const SOURCE_WEIGHT: f32 = 0.04;
/// Cap on the total source bonus
pub const SOURCE_BONUS_CAP: f32 = 0.20;
/// Bonus per evidence candidate
pub const EVIDENCE_WEIGHT: f32 = 0.02;
/// Cap on the total evidence bonus
pub const EVIDENCE_BONUS_CAP: f32 = 0.10;
/// Ceiling of every extraction confidence
pub const EXTRACTION_MAX_CONFIDENCE: f32 = 0.95;

/// Map a cosine distance to a relevance in [0, 1]
pub fn relevance_from_distance(distance: f32) -> f32 {
    ((MAX_RELEVANT_DISTANCE - distance) / MAX_RELEVANT_DISTANCE).clamp(0.0, 1.0)
}

/// Confidence of a direct answer, from the best candidate's raw distance
pub fn answer_confidence(top_distance: f32) -> f32 {
    (1.0 - top_distance).clamp(0.0, 1.0)
}

/// Confidence of an extracted section
pub fn extraction_confidence(source_count: usize, evidence_count: usize) -> f32 {
    let source_bonus = (source_count as f32 * SOURCE_WEIGHT).min(SOURCE_BONUS_CAP);
    let evidence_bonus = (evidence_count as f32 * EVIDENCE_WEIGHT).min(EVIDENCE_BONUS_CAP);
    let raw = (EXTRACTION_BASE_CONFIDENCE + source_bonus + evidence_bonus)
        .min(EXTRACTION_MAX_CONFIDENCE);
    round2(raw)
}

/// Round to two decimal places
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_bounds() {
        assert_eq!(relevance_from_distance(0.0), 1.0);
        assert_eq!(relevance_from_distance(1.2), 0.0);
        for step in 0..400 {
            let d = step as f32 * 0.01;
            let r = relevance_from_distance(d);
            assert!((0.0..=1.0).contains(&r), "relevance {} out of range for {}", r, d);
            if d >= 1.2 {
                assert_eq!(r, 0.0);
            }
        }
    }

    #[test]
    fn test_relevance_is_decreasing() {
        let mut previous = relevance_from_distance(0.0);
        for step in 1..150 {
            let r = relevance_from_distance(step as f32 * 0.01);
            assert!(r <= previous);
            previous = r;
        }
    }

    #[test]
    fn test_answer_confidence_clamped() {
        assert_eq!(answer_confidence(0.0), 1.0);
        assert_eq!(answer_confidence(1.5), 0.0);
        assert!((answer_confidence(0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_extraction_confidence_bounds_and_monotonicity() {
        for sources in 0..12 {
            for evidence in 0..12 {
                let c = extraction_confidence(sources, evidence);
                assert!((0.70..=0.95).contains(&c));
                assert!(extraction_confidence(sources + 1, evidence) >= c);
                assert!(extraction_confidence(sources, evidence + 1) >= c);
            }
        }
    }

    #[test]
    fn test_extraction_confidence_saturates() {
        assert_eq!(extraction_confidence(5, 5), 0.95);
        assert_eq!(extraction_confidence(9, 30), 0.95);
    }

    #[test]
    fn test_extraction_confidence_floor_without_evidence() {
        assert_eq!(extraction_confidence(0, 0), 0.70);
    }

    #[test]
    fn test_three_sources_three_evidence() {
        assert_eq!(extraction_confidence(3, 3), 0.88);
    }
}
