//! Pure geometric predicates over a single hand skeleton.
//!
//! Screen space is y-down, so "up" always means a smaller `y`. Every function
//! here is side-effect free; the 21-keypoint contract is carried by
//! [`HandSkeleton`] itself.

use crate::types::{HandSkeleton, Keypoint, landmark};

/// Minimum vertical thumb extension (fraction of frame height) before a thumb
/// counts as pointing up or down.
pub const MIN_THUMB_EXTENSION: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// `[mcp, pip, dip, tip]`
    pub fn joints(&self) -> [usize; 4] {
        match self {
            Finger::Index => [
                landmark::INDEX_MCP,
                landmark::INDEX_PIP,
                landmark::INDEX_DIP,
                landmark::INDEX_TIP,
            ],
            Finger::Middle => [
                landmark::MIDDLE_MCP,
                landmark::MIDDLE_PIP,
                landmark::MIDDLE_DIP,
                landmark::MIDDLE_TIP,
            ],
            Finger::Ring => [
                landmark::RING_MCP,
                landmark::RING_PIP,
                landmark::RING_DIP,
                landmark::RING_TIP,
            ],
            Finger::Pinky => [
                landmark::PINKY_MCP,
                landmark::PINKY_PIP,
                landmark::PINKY_DIP,
                landmark::PINKY_TIP,
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbDirection {
    Up,
    Down,
}

/// True when the tip sits above the PIP joint (and above the MCP joint when
/// one is given).
pub fn finger_extended(pose: &HandSkeleton, tip: usize, pip: usize, mcp: Option<usize>) -> bool {
    let tip_y = pose.point(tip).y;
    let above_pip = tip_y < pose.point(pip).y;
    match mcp {
        Some(mcp) => above_pip && tip_y < pose.point(mcp).y,
        None => above_pip,
    }
}

/// Fully extended: tip above both PIP and MCP.
pub fn is_extended(pose: &HandSkeleton, finger: Finger) -> bool {
    let [mcp, pip, _, tip] = finger.joints();
    finger_extended(pose, tip, pip, Some(mcp))
}

/// Loosely raised: tip above PIP only. Templates that require a finger to be
/// *down* test against this so a half-raised finger still disqualifies.
pub fn is_raised(pose: &HandSkeleton, finger: Finger) -> bool {
    let [_, pip, _, tip] = finger.joints();
    finger_extended(pose, tip, pip, None)
}

/// Tip strictly below the PIP joint.
pub fn is_curled(pose: &HandSkeleton, finger: Finger) -> bool {
    let [_, pip, _, tip] = finger.joints();
    pose.point(tip).y > pose.point(pip).y
}

/// Rotation-invariant curl test: the tip is closer to the wrist than the PIP
/// joint. Used where the whole hand may be turned (thumbs down).
pub fn is_folded(pose: &HandSkeleton, finger: Finger) -> bool {
    let [_, pip, _, tip] = finger.joints();
    let wrist = pose.point(landmark::WRIST);
    distance(pose.point(tip), wrist) < distance(pose.point(pip), wrist)
}

/// How deeply a finger is folded, in `[0, 1]`.
pub fn fold_depth(pose: &HandSkeleton, finger: Finger) -> f32 {
    let [_, pip, _, tip] = finger.joints();
    let wrist = pose.point(landmark::WRIST);
    let depth = distance(pose.point(pip), wrist) - distance(pose.point(tip), wrist);
    (depth / (0.3 * hand_scale(pose))).clamp(0.0, 1.0)
}

/// Signed thumb extension along `direction`, as a fraction of frame height.
pub fn thumb_vertical_extension(pose: &HandSkeleton, direction: ThumbDirection) -> f32 {
    let tip = pose.point(landmark::THUMB_TIP).y;
    let mcp = pose.point(landmark::THUMB_MCP).y;
    match direction {
        ThumbDirection::Up => mcp - tip,
        ThumbDirection::Down => tip - mcp,
    }
}

pub fn thumb_vertical(pose: &HandSkeleton, direction: ThumbDirection) -> bool {
    let tip = pose.point(landmark::THUMB_TIP).y;
    let ip = pose.point(landmark::THUMB_IP).y;
    let mcp = pose.point(landmark::THUMB_MCP).y;
    let ordered = match direction {
        ThumbDirection::Up => tip < ip && ip < mcp,
        ThumbDirection::Down => tip > ip && ip > mcp,
    };
    ordered && thumb_vertical_extension(pose, direction) >= MIN_THUMB_EXTENSION
}

pub fn thumb_tucked(pose: &HandSkeleton) -> bool {
    pose.point(landmark::THUMB_TIP).y >= pose.point(landmark::THUMB_IP).y
}

/// Thumb reaches sideways away from the wrist further than its own MCP joint.
pub fn thumb_extended_out(pose: &HandSkeleton) -> bool {
    let wrist = pose.point(landmark::WRIST).x;
    let tip = pose.point(landmark::THUMB_TIP).x;
    let mcp = pose.point(landmark::THUMB_MCP).x;
    (tip - wrist).abs() > (mcp - wrist).abs()
}

/// Clutch pose: all four fingers curled and the thumb tip below its IP joint.
pub fn closed_fist(pose: &HandSkeleton) -> bool {
    let fingers_curled = Finger::ALL.iter().all(|f| is_curled(pose, *f));
    let thumb_tucked =
        pose.point(landmark::THUMB_TIP).y > pose.point(landmark::THUMB_IP).y;
    fingers_curled && thumb_tucked
}

pub fn distance(a: Keypoint, b: Keypoint) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

pub fn joint_distance(pose: &HandSkeleton, a: usize, b: usize) -> f32 {
    distance(pose.point(a), pose.point(b))
}

/// Angle at `joint` between the bones towards `a` and `c`, in degrees.
/// Degenerate (zero-length) bones yield 0.
pub fn joint_angle(a: Keypoint, joint: Keypoint, c: Keypoint) -> f32 {
    let ab = distance(a, joint);
    let cb = distance(c, joint);
    if ab < 1e-6 || cb < 1e-6 {
        return 0.0;
    }
    let ac = distance(a, c);
    let cos = ((ab * ab + cb * cb - ac * ac) / (2.0 * ab * cb)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Finger straightness in `[0, 1]` from the PIP and DIP joint angles; 120°
/// or less counts as bent, 180° as perfectly straight.
pub fn straightness(pose: &HandSkeleton, finger: Finger) -> f32 {
    let [mcp, pip, dip, tip] = finger.joints().map(|i| pose.point(i));
    let mean = (joint_angle(mcp, pip, dip) + joint_angle(pip, dip, tip)) / 2.0;
    ((mean - 120.0) / 60.0).clamp(0.0, 1.0)
}

pub fn mean_straightness(pose: &HandSkeleton, fingers: &[Finger]) -> f32 {
    mean(fingers.iter().map(|f| straightness(pose, *f)))
}

pub fn mean_fold_depth(pose: &HandSkeleton, fingers: &[Finger]) -> f32 {
    mean(fingers.iter().map(|f| fold_depth(pose, *f)))
}

/// Wrist to middle-finger MCP; the unit distances are normalized against.
pub fn hand_scale(pose: &HandSkeleton) -> f32 {
    joint_distance(pose, landmark::WRIST, landmark::MIDDLE_MCP).max(1e-3)
}

/// Distance between two joints in hand-scale units.
pub fn scaled_distance(pose: &HandSkeleton, a: usize, b: usize) -> f32 {
    joint_distance(pose, a, b) / hand_scale(pose)
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PoseBuilder, ThumbPose};

    #[test]
    fn finger_extended_is_pure() {
        let pose = fixtures::peace_sign();
        let first = finger_extended(&pose, landmark::INDEX_TIP, landmark::INDEX_PIP, Some(landmark::INDEX_MCP));
        let second = finger_extended(&pose, landmark::INDEX_TIP, landmark::INDEX_PIP, Some(landmark::INDEX_MCP));
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn extended_and_curled_fingers() {
        let pose = fixtures::pointing();
        assert!(is_extended(&pose, Finger::Index));
        assert!(!is_extended(&pose, Finger::Middle));
        assert!(is_curled(&pose, Finger::Middle));
        assert!(is_folded(&pose, Finger::Ring));
        assert!(!is_folded(&pose, Finger::Index));
    }

    #[test]
    fn mcp_check_tightens_extension() {
        // Tip above the PIP but below the MCP: raised, not extended.
        let pose = PoseBuilder::fist()
            .set(landmark::INDEX_PIP, 0.44, 0.70)
            .set(landmark::INDEX_TIP, 0.44, 0.65)
            .build();
        assert!(is_raised(&pose, Finger::Index));
        assert!(!is_extended(&pose, Finger::Index));
    }

    #[test]
    fn thumb_direction() {
        assert!(thumb_vertical(&fixtures::thumbs_up(), ThumbDirection::Up));
        assert!(!thumb_vertical(&fixtures::thumbs_up(), ThumbDirection::Down));
        assert!(thumb_vertical(&fixtures::thumbs_down(), ThumbDirection::Down));
    }

    #[test]
    fn near_neutral_thumb_is_not_vertical() {
        // Correct ordering but only 0.03 of vertical travel.
        let pose = PoseBuilder::fist().thumb(ThumbPose::Out).build();
        assert!(thumb_extended_out(&pose));
        assert!(!thumb_vertical(&pose, ThumbDirection::Up));
    }

    #[test]
    fn closed_fist_detection() {
        assert!(closed_fist(&fixtures::closed_fist()));
        assert!(!closed_fist(&fixtures::open_palm()));
        assert!(!closed_fist(&fixtures::thumbs_up()));
    }

    #[test]
    fn angle_by_law_of_cosines() {
        let a = Keypoint::new(1.0, 0.0, 0.0);
        let joint = Keypoint::new(0.0, 0.0, 0.0);
        let right = Keypoint::new(0.0, 1.0, 0.0);
        let straight = Keypoint::new(-1.0, 0.0, 0.0);
        assert!((joint_angle(a, joint, right) - 90.0).abs() < 1e-3);
        assert!((joint_angle(a, joint, straight) - 180.0).abs() < 1e-2);
        assert_eq!(joint_angle(a, joint, joint), 0.0);
    }

    #[test]
    fn distance_is_three_dimensional() {
        let a = Keypoint::new(0.0, 0.0, 0.0);
        let b = Keypoint::new(0.3, 0.0, 0.4);
        assert!((distance(a, b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn straight_fingers_score_high() {
        let pose = fixtures::open_palm();
        assert!(mean_straightness(&pose, &Finger::ALL) > 0.95);
        assert!(mean_fold_depth(&fixtures::closed_fist(), &Finger::ALL) > 0.95);
    }
}
