use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque participant identity, assigned by the relay per connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Position + rotation of an avatar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    /// Spawn point scattered on the floor plane within `radius` of the origin
    pub fn spawn(radius: f64, height: f64) -> Self {
        let mut rng = rand::rng();
        let x = rng.random_range(-radius..=radius);
        let z = rng.random_range(-radius..=radius);

        Self {
            position: Vec3::new(x, height, z),
            rotation: Vec3::default(),
        }
    }
}

/// Participant record as stored by the presence store and sent on the wire
///
/// Kept flat (`x`, `y`, ... `zrot`) since that's what scene clients read directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub room: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub xrot: f64,
    pub yrot: f64,
    pub zrot: f64,
    pub connected: bool,
}

impl User {
    pub fn new(id: UserId, room: impl Into<String>, pose: Pose) -> Self {
        let mut user = Self {
            id,
            room: room.into(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            xrot: 0.0,
            yrot: 0.0,
            zrot: 0.0,
            connected: true,
        };
        user.set_pose(pose);
        user
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: Vec3::new(self.x, self.y, self.z),
            rotation: Vec3::new(self.xrot, self.yrot, self.zrot),
        }
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.x = pose.position.x;
        self.y = pose.position.y;
        self.z = pose.position.z;
        self.xrot = pose.rotation.x;
        self.yrot = pose.rotation.y;
        self.zrot = pose.rotation.z;
    }
}
