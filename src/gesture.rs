use crate::{
    geometry::{
        Finger, ThumbDirection, fold_depth, is_curled, is_extended, is_folded, is_raised,
        mean_fold_depth, mean_straightness, scaled_distance, straightness, thumb_extended_out,
        thumb_tucked, thumb_vertical, thumb_vertical_extension,
    },
    types::{GestureKind, HandSkeleton, Recognition, landmark},
};

use crate::geometry::Finger::{Index, Middle, Pinky, Ring};

/// Confidence awarded once a template's hard conditions hold. Graded bonuses
/// add up to the remaining 0.4.
const BASE_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.40;
/// Minimum index/middle tip separation (hand-scale units) for a peace sign.
const MIN_V_SEPARATION: f32 = 0.25;
/// Maximum thumb/index tip gap (hand-scale units) for an OK sign.
const MAX_PINCH_GAP: f32 = 0.25;

/// Scores a pose against every gesture template.
#[derive(Clone, Debug)]
pub struct TemplateScorer {
    min_confidence: f32,
}

impl Default for TemplateScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl TemplateScorer {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn score(&self, kind: GestureKind, pose: &HandSkeleton) -> f32 {
        let raw = match kind {
            GestureKind::OpenPalm => score_open_palm(pose),
            GestureKind::PeaceSign => score_peace_sign(pose),
            GestureKind::ThumbsUp => score_thumb(pose, ThumbDirection::Up),
            GestureKind::ThumbsDown => score_thumb(pose, ThumbDirection::Down),
            GestureKind::Pointing => score_pointing(pose),
            GestureKind::OkSign => score_ok_sign(pose),
            GestureKind::RockSign => score_rock_sign(pose),
            GestureKind::Shaka => score_shaka(pose),
            GestureKind::ThreeFingers => score_three_fingers(pose),
            GestureKind::FourFingers => score_four_fingers(pose),
        };
        raw.clamp(0.0, 1.0)
    }

    /// Raw template scores in priority order.
    pub fn scores(&self, pose: &HandSkeleton) -> [(GestureKind, f32); 10] {
        GestureKind::PRIORITY.map(|kind| (kind, self.score(kind, pose)))
    }

    /// Best-scoring template, weighted by hand-tracking quality. Ties go to the
    /// more specific template.
    pub fn recognize_with_confidence(&self, pose: &HandSkeleton) -> Recognition {
        let best = self
            .scores(pose)
            .into_iter()
            .fold(None::<(GestureKind, f32)>, |best, (kind, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((kind, score)),
            });

        match best {
            Some((kind, score)) if score >= self.min_confidence => Recognition {
                gesture: Some(kind),
                confidence: score * (0.9 + 0.1 * pose.handedness_confidence()),
            },
            _ => Recognition::NONE,
        }
    }

    /// Boolean single-winner mode: first template in priority order whose hard
    /// conditions hold.
    pub fn recognize(&self, pose: &HandSkeleton) -> Option<GestureKind> {
        GestureKind::PRIORITY
            .into_iter()
            .find(|kind| self.score(*kind, pose) > 0.0)
    }
}

fn ramp(value: f32, start: f32, span: f32) -> f32 {
    ((value - start) / span).clamp(0.0, 1.0)
}

fn flag(condition: bool) -> f32 {
    if condition { 1.0 } else { 0.0 }
}

fn score_open_palm(pose: &HandSkeleton) -> f32 {
    let gate = Finger::ALL.iter().all(|f| is_extended(pose, *f)) && thumb_extended_out(pose);
    if !gate {
        return 0.0;
    }
    let spread = scaled_distance(pose, landmark::INDEX_TIP, landmark::PINKY_TIP);
    BASE_CONFIDENCE
        + 0.2 * mean_straightness(pose, &Finger::ALL)
        + 0.2 * ramp(spread, 0.5, 0.5)
}

fn score_peace_sign(pose: &HandSkeleton) -> f32 {
    let separation = scaled_distance(pose, landmark::INDEX_TIP, landmark::MIDDLE_TIP);
    let gate = is_extended(pose, Index)
        && is_extended(pose, Middle)
        && is_curled(pose, Ring)
        && is_curled(pose, Pinky)
        && separation >= MIN_V_SEPARATION;
    if !gate {
        return 0.0;
    }
    BASE_CONFIDENCE
        + 0.15 * ramp(separation, MIN_V_SEPARATION, 0.35)
        + 0.15 * mean_straightness(pose, &[Index, Middle])
        + 0.1 * flag(thumb_tucked(pose))
}

fn score_thumb(pose: &HandSkeleton, direction: ThumbDirection) -> f32 {
    let gate = thumb_vertical(pose, direction) && Finger::ALL.iter().all(|f| is_folded(pose, *f));
    if !gate {
        return 0.0;
    }
    BASE_CONFIDENCE
        + 0.2 * ramp(thumb_vertical_extension(pose, direction), 0.05, 0.1)
        + 0.2 * mean_fold_depth(pose, &Finger::ALL)
}

fn score_pointing(pose: &HandSkeleton) -> f32 {
    let gate = is_extended(pose, Index)
        && !is_raised(pose, Middle)
        && !is_raised(pose, Ring)
        && !is_raised(pose, Pinky)
        && thumb_tucked(pose);
    if !gate {
        return 0.0;
    }
    BASE_CONFIDENCE
        + 0.2 * straightness(pose, Index)
        + 0.2 * mean_fold_depth(pose, &[Middle, Ring, Pinky])
}

fn score_ok_sign(pose: &HandSkeleton) -> f32 {
    let gap = scaled_distance(pose, landmark::THUMB_TIP, landmark::INDEX_TIP);
    let gate = gap < MAX_PINCH_GAP
        && is_extended(pose, Middle)
        && is_extended(pose, Ring)
        && is_extended(pose, Pinky);
    if !gate {
        return 0.0;
    }
    BASE_CONFIDENCE
        + 0.2 * (1.0 - gap / MAX_PINCH_GAP)
        + 0.2 * mean_straightness(pose, &[Middle, Ring, Pinky])
}

fn score_rock_sign(pose: &HandSkeleton) -> f32 {
    let gate = is_extended(pose, Index)
        && is_extended(pose, Pinky)
        && !is_raised(pose, Middle)
        && !is_raised(pose, Ring)
        && !thumb_extended_out(pose);
    if !gate {
        return 0.0;
    }
    BASE_CONFIDENCE
        + 0.2 * mean_straightness(pose, &[Index, Pinky])
        + 0.2 * mean_fold_depth(pose, &[Middle, Ring])
}

fn score_shaka(pose: &HandSkeleton) -> f32 {
    let gate = thumb_extended_out(pose)
        && is_extended(pose, Pinky)
        && !is_raised(pose, Index)
        && !is_raised(pose, Middle)
        && !is_raised(pose, Ring);
    if !gate {
        return 0.0;
    }
    let span = scaled_distance(pose, landmark::THUMB_TIP, landmark::PINKY_TIP);
    BASE_CONFIDENCE + 0.2 * ramp(span, 0.8, 0.6) + 0.2 * mean_fold_depth(pose, &[Index, Middle, Ring])
}

fn score_three_fingers(pose: &HandSkeleton) -> f32 {
    let gate = is_extended(pose, Index)
        && is_extended(pose, Middle)
        && is_extended(pose, Ring)
        && !is_raised(pose, Pinky);
    if !gate {
        return 0.0;
    }
    BASE_CONFIDENCE
        + 0.2 * mean_straightness(pose, &[Index, Middle, Ring])
        + 0.1 * flag(thumb_tucked(pose))
        + 0.1 * fold_depth(pose, Pinky)
}

fn score_four_fingers(pose: &HandSkeleton) -> f32 {
    let gate = Finger::ALL.iter().all(|f| is_extended(pose, *f)) && !thumb_extended_out(pose);
    if !gate {
        return 0.0;
    }
    let thumb_across = 1.0 - scaled_distance(pose, landmark::THUMB_TIP, landmark::INDEX_MCP).min(1.0);
    BASE_CONFIDENCE + 0.2 * mean_straightness(pose, &Finger::ALL) + 0.2 * thumb_across
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PoseBuilder, ThumbPose};

    fn assert_only(kind: GestureKind, pose: &HandSkeleton) {
        let scorer = TemplateScorer::default();
        for (other, score) in scorer.scores(pose) {
            if other == kind {
                assert!(score >= 0.8, "{kind} scored only {score}");
            } else {
                assert_eq!(score, 0.0, "{other} should be disqualified for {kind}, got {score}");
            }
        }
        let recognition = scorer.recognize_with_confidence(pose);
        assert_eq!(recognition.gesture, Some(kind));
    }

    #[test]
    fn every_template_matches_its_fixture_exclusively() {
        assert_only(GestureKind::OpenPalm, &fixtures::open_palm());
        assert_only(GestureKind::PeaceSign, &fixtures::peace_sign());
        assert_only(GestureKind::ThumbsUp, &fixtures::thumbs_up());
        assert_only(GestureKind::ThumbsDown, &fixtures::thumbs_down());
        assert_only(GestureKind::Pointing, &fixtures::pointing());
        assert_only(GestureKind::OkSign, &fixtures::ok_sign());
        assert_only(GestureKind::RockSign, &fixtures::rock_sign());
        assert_only(GestureKind::Shaka, &fixtures::shaka());
        assert_only(GestureKind::ThreeFingers, &fixtures::three_fingers());
        assert_only(GestureKind::FourFingers, &fixtures::four_fingers());
    }

    #[test]
    fn fist_is_not_a_command_gesture() {
        let scorer = TemplateScorer::default();
        assert_eq!(scorer.recognize_with_confidence(&fixtures::closed_fist()), Recognition::NONE);
        assert_eq!(scorer.recognize(&fixtures::closed_fist()), None);
    }

    #[test]
    fn confidence_never_exceeds_one() {
        let scorer = TemplateScorer::default();
        for pose in [fixtures::open_palm(), fixtures::peace_sign(), fixtures::shaka()] {
            for (_, score) in scorer.scores(&pose) {
                assert!((0.0..=1.0).contains(&score));
            }
        }
    }

    #[test]
    fn hand_quality_scales_confidence() {
        let scorer = TemplateScorer::default();
        let confident = scorer.recognize_with_confidence(&fixtures::peace_sign());
        let shaky = PoseBuilder::fist()
            .extend(Finger::Index, -0.04)
            .extend(Finger::Middle, 0.04)
            .handedness(0.0)
            .build();
        let shaky = scorer.recognize_with_confidence(&shaky);
        assert_eq!(shaky.gesture, Some(GestureKind::PeaceSign));
        assert!((shaky.confidence - confident.confidence * 0.9).abs() < 1e-4);
    }

    #[test]
    fn narrow_v_is_not_a_peace_sign() {
        let pose = PoseBuilder::fist()
            .extend(Finger::Index, 0.02)
            .extend(Finger::Middle, -0.02)
            .build();
        let scorer = TemplateScorer::default();
        assert_eq!(scorer.score(GestureKind::PeaceSign, &pose), 0.0);
    }

    #[test]
    fn wider_v_scores_higher() {
        let scorer = TemplateScorer::default();
        let narrow = PoseBuilder::fist()
            .extend(Finger::Index, -0.01)
            .extend(Finger::Middle, 0.0)
            .build();
        let wide = fixtures::peace_sign();
        let narrow = scorer.score(GestureKind::PeaceSign, &narrow);
        let wide = scorer.score(GestureKind::PeaceSign, &wide);
        assert!(narrow > 0.0);
        assert!(wide > narrow);
    }

    #[test]
    fn weaker_thumb_scores_lower() {
        let scorer = TemplateScorer::default();
        let weak = PoseBuilder::fist()
            .thumb(ThumbPose::Up)
            .set(landmark::THUMB_IP, 0.40, 0.65)
            .set(landmark::THUMB_TIP, 0.40, 0.62)
            .build();
        let weak = scorer.score(GestureKind::ThumbsUp, &weak);
        let strong = scorer.score(GestureKind::ThumbsUp, &fixtures::thumbs_up());
        assert!(weak >= BASE_CONFIDENCE);
        assert!(strong > weak);
    }

    #[test]
    fn below_floor_reports_none() {
        let scorer = TemplateScorer::new(1.1);
        assert_eq!(scorer.recognize_with_confidence(&fixtures::open_palm()), Recognition::NONE);
    }

    #[test]
    fn boolean_mode_prefers_specific_templates() {
        // Four fingers up with the thumb tip pinched against the index tip
        // passes both the ok_sign and four_fingers gates.
        let pose = PoseBuilder::fist()
            .extend(Finger::Index, -0.03)
            .extend(Finger::Middle, 0.0)
            .extend(Finger::Ring, 0.02)
            .extend(Finger::Pinky, 0.04)
            .set(landmark::THUMB_MCP, 0.40, 0.70)
            .set(landmark::THUMB_IP, 0.40, 0.55)
            .set(landmark::THUMB_TIP, 0.41, 0.42)
            .build();
        let scorer = TemplateScorer::default();
        assert!(scorer.score(GestureKind::FourFingers, &pose) > 0.0);
        assert!(scorer.score(GestureKind::OkSign, &pose) > 0.0);
        assert_eq!(scorer.recognize(&pose), Some(GestureKind::OkSign));
        assert_eq!(
            scorer.recognize_with_confidence(&pose).gesture,
            Some(GestureKind::OkSign)
        );
    }
}
