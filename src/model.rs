use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PITCH_LIMIT: f32 = 90.0;
pub const YAW_LIMIT: f32 = 180.0;

// ── Identifiers ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TourId(String);

impl TourId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TourId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Where a tour's image lives, relative to the project directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Data Model ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: TourId,
    pub name: String,
    pub image_ref: ImageRef,
    pub created_at: DateTime<Utc>,
}

/// A point on the panorama sphere, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SphericalCoord {
    pitch: f32,
    yaw: f32,
}

impl SphericalCoord {
    /// Pitch is clamped to the poles; yaw outside [-180, 180] wraps around.
    pub fn new(pitch: f32, yaw: f32) -> anyhow::Result<Self> {
        ensure!(
            pitch.is_finite() && yaw.is_finite(),
            "non-finite coordinate (pitch {pitch}, yaw {yaw})"
        );
        Ok(Self {
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            yaw: normalize_yaw(yaw),
        })
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }
}

pub fn normalize_yaw(yaw: f32) -> f32 {
    if (-YAW_LIMIT..=YAW_LIMIT).contains(&yaw) {
        yaw
    } else {
        (yaw + YAW_LIMIT).rem_euclid(2.0 * YAW_LIMIT) - YAW_LIMIT
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(flatten)]
    pub at: SphericalCoord,
    pub text: String,
}

impl Annotation {
    pub fn new(at: SphericalCoord, text: impl Into<String>) -> Self {
        Self {
            at,
            text: text.into(),
        }
    }
}

/// The single in-progress comment awaiting text and save.
#[derive(Clone, Debug, PartialEq)]
pub struct Draft {
    pub tour_id: TourId,
    pub at: SphericalCoord,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_at_the_seam_is_kept() {
        let at = SphericalCoord::new(10.0, 180.0).unwrap();
        assert_eq!(at.yaw(), 180.0);
        assert_eq!(SphericalCoord::new(0.0, -180.0).unwrap().yaw(), -180.0);
    }

    #[test]
    fn yaw_outside_range_wraps() {
        assert_eq!(normalize_yaw(190.0), -170.0);
        assert_eq!(normalize_yaw(-190.0), 170.0);
        assert_eq!(normalize_yaw(540.0), -180.0);
    }

    #[test]
    fn pitch_is_clamped_to_the_poles() {
        assert_eq!(SphericalCoord::new(120.0, 0.0).unwrap().pitch(), 90.0);
        assert_eq!(SphericalCoord::new(-95.0, 0.0).unwrap().pitch(), -90.0);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        assert!(SphericalCoord::new(f32::NAN, 0.0).is_err());
        assert!(SphericalCoord::new(0.0, f32::INFINITY).is_err());
    }

    #[test]
    fn annotation_serializes_flat() {
        let ann = Annotation::new(SphericalCoord::new(10.0, 180.0).unwrap(), "nice view");
        let json = serde_json::to_value(&ann).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "pitch": 10.0, "yaw": 180.0, "text": "nice view" })
        );
        let back: Annotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, ann);
    }
}
