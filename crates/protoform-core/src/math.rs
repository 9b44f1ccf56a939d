//! Fixed-arity float tuples understood by the compound codecs.

use serde::{Deserialize, Serialize};

/// A 2-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// A 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A 4-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Rotation quaternion, stored as written (no normalization).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Vec4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

// ---------------------------------------------------------------------------
// Component access for the tuple codecs
// ---------------------------------------------------------------------------

/// A value made of a fixed number of `f32` components.
pub trait Components: Sized {
    const ARITY: usize;
    /// Human-readable shape used in format errors, e.g. `x,y,z`.
    const SHAPE: &'static str;

    fn components(&self) -> Vec<f32>;

    /// Build from exactly `ARITY` components.
    fn from_components(parts: &[f32]) -> Self;
}

impl Components for Vec2 {
    const ARITY: usize = 2;
    const SHAPE: &'static str = "x,y";

    fn components(&self) -> Vec<f32> {
        vec![self.x, self.y]
    }

    fn from_components(parts: &[f32]) -> Self {
        Self::new(parts[0], parts[1])
    }
}

impl Components for Vec3 {
    const ARITY: usize = 3;
    const SHAPE: &'static str = "x,y,z";

    fn components(&self) -> Vec<f32> {
        vec![self.x, self.y, self.z]
    }

    fn from_components(parts: &[f32]) -> Self {
        Self::new(parts[0], parts[1], parts[2])
    }
}

impl Components for Vec4 {
    const ARITY: usize = 4;
    const SHAPE: &'static str = "x,y,z,w";

    fn components(&self) -> Vec<f32> {
        vec![self.x, self.y, self.z, self.w]
    }

    fn from_components(parts: &[f32]) -> Self {
        Self::new(parts[0], parts[1], parts[2], parts[3])
    }
}

impl Components for Color {
    const ARITY: usize = 4;
    const SHAPE: &'static str = "r,g,b,a";

    fn components(&self) -> Vec<f32> {
        vec![self.r, self.g, self.b, self.a]
    }

    fn from_components(parts: &[f32]) -> Self {
        Self::new(parts[0], parts[1], parts[2], parts[3])
    }
}

impl Components for Quat {
    const ARITY: usize = 4;
    const SHAPE: &'static str = "x,y,z,w";

    fn components(&self) -> Vec<f32> {
        vec![self.x, self.y, self.z, self.w]
    }

    fn from_components(parts: &[f32]) -> Self {
        Self::new(parts[0], parts[1], parts[2], parts[3])
    }
}
