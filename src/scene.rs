//! CPU-side description of what one benchmark configuration draws.
//!
//! The renderer uploads this once per configuration and only touches the
//! per-triangle rotation while the timed loop runs.

use image::{Rgba, RgbaImage};

use crate::schema::{BenchmarkConfiguration, LightingMode, TextureMode};

/// Rotation speed of every triangle around the Y axis.
pub const ROTATION_DEGREES_PER_SECOND: f32 = 50.0;
pub const TRIANGLE_SIZE: f32 = 0.5;
pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 50.0;
pub const CAMERA_DISTANCE: f32 = 5.0;

pub const LIT_MATERIAL_COLOR: [f32; 3] = [0.8, 0.3, 0.3];
pub const MATERIAL_SHININESS: f32 = 50.0;
pub const AMBIENT_LEVEL: f32 = 0.2;

const CHECKER_SQUARES: u32 = 8;
const CHECKER_WARM: [u8; 3] = [255, 200, 100];
const CHECKER_COOL: [u8; 3] = [100, 150, 200];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleInstance {
    pub offset: [f32; 3],
    pub color: [f32; 3],
    pub rotation_degrees: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point,
    Spot {
        direction: [f32; 3],
        cutoff_degrees: f32,
        exponent: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: [f32; 3],
    pub diffuse: [f32; 3],
    pub kind: LightKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub config: BenchmarkConfiguration,
    pub triangles: Vec<TriangleInstance>,
    pub lights: Vec<Light>,
}

impl Scene {
    pub fn build(config: BenchmarkConfiguration) -> Self {
        let triangles = (0..config.triangle_count)
            .map(|index| TriangleInstance {
                offset: grid_position(index),
                color: triangle_color(&config, index),
                rotation_degrees: 0.0,
                size: TRIANGLE_SIZE,
            })
            .collect();

        Self {
            config,
            triangles,
            lights: lights_for(config.lighting_mode),
        }
    }

    pub fn advance(&mut self, delta_seconds: f32) {
        let step = ROTATION_DEGREES_PER_SECOND * delta_seconds;
        for triangle in &mut self.triangles {
            triangle.rotation_degrees = (triangle.rotation_degrees + step) % 360.0;
        }
    }
}

/// Grid slot of the `index`-th triangle.
///
/// The grid edge grows with the index itself, so early triangles sit on a
/// tight grid and later ones spread out along X and Y.
pub fn grid_position(index: u32) -> [f32; 3] {
    let grid = (f64::from(index) + 1.0).sqrt().ceil() as u32;
    let half = grid as f32 / 2.0;
    let x = ((index % grid) as f32 - half) * 2.0;
    let y = (((index / grid) % grid) as f32 - half) * 2.0;
    let z = (index / (grid * grid)) as f32 * 2.0;
    [x, y, z]
}

fn triangle_color(config: &BenchmarkConfiguration, index: u32) -> [f32; 3] {
    if config.lighting_mode != LightingMode::None {
        return LIT_MATERIAL_COLOR;
    }
    if config.texture_mode != TextureMode::None {
        return [1.0, 1.0, 1.0];
    }
    palette_color(index)
}

/// Stable pseudo-random color per index (FNV-1a over the index bytes).
pub fn palette_color(index: u32) -> [f32; 3] {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for byte in index.to_le_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let channel = |shift: u32| ((hash >> shift) & 0xff) as f32 / 255.0;
    [channel(0), channel(8), channel(16)]
}

pub fn lights_for(mode: LightingMode) -> Vec<Light> {
    const WHITE: [f32; 3] = [1.0, 1.0, 1.0];
    match mode {
        LightingMode::None => Vec::new(),
        LightingMode::Omnidirectional => vec![Light {
            position: [0.0, 5.0, 5.0],
            diffuse: WHITE,
            kind: LightKind::Point,
        }],
        LightingMode::Spot => vec![Light {
            position: [0.0, 5.0, 5.0],
            diffuse: WHITE,
            kind: LightKind::Spot {
                direction: [0.0, -1.0, -1.0],
                cutoff_degrees: 30.0,
                exponent: 2.0,
            },
        }],
        LightingMode::Multiple => vec![
            Light {
                position: [5.0, 5.0, 5.0],
                diffuse: [1.0, 0.0, 0.0],
                kind: LightKind::Point,
            },
            Light {
                position: [-5.0, 5.0, 5.0],
                diffuse: [0.0, 1.0, 0.0],
                kind: LightKind::Point,
            },
            Light {
                position: [0.0, -5.0, 5.0],
                diffuse: [0.0, 0.0, 1.0],
                kind: LightKind::Point,
            },
        ],
    }
}

/// 8x8 checkerboard of warm and cool squares. Returns `None` for
/// [`TextureMode::None`].
pub fn checkerboard(mode: TextureMode) -> Option<RgbaImage> {
    let edge = mode.edge()?;
    let square = (edge / CHECKER_SQUARES).max(1);
    Some(RgbaImage::from_fn(edge, edge, |x, y| {
        let [r, g, b] = if ((x / square) + (y / square)) % 2 == 0 {
            CHECKER_WARM
        } else {
            CHECKER_COOL
        };
        Rgba([r, g, b, 255])
    }))
}

/// Column-major view-projection for a camera looking down -Z from
/// `CAMERA_DISTANCE`, with wgpu's 0..1 clip depth.
pub fn view_projection(aspect: f32) -> [[f32; 4]; 4] {
    let f = 1.0 / (FIELD_OF_VIEW_DEGREES.to_radians() / 2.0).tan();
    let range = NEAR_PLANE - FAR_PLANE;

    let projection = [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, FAR_PLANE / range, -1.0],
        [0.0, 0.0, NEAR_PLANE * FAR_PLANE / range, 0.0],
    ];
    let view = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, -CAMERA_DISTANCE, 1.0],
    ];
    mat4_mul(&projection, &view)
}

fn mat4_mul(a: &[[f32; 4]; 4], b: &[[f32; 4]; 4]) -> [[f32; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for (column, out_column) in out.iter_mut().enumerate() {
        for (row, cell) in out_column.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[k][row] * b[column][k]).sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_positions_follow_growing_grid() {
        assert_eq!(grid_position(0), [-1.0, -1.0, 0.0]);
        assert_eq!(grid_position(1), [0.0, -2.0, 0.0]);
        assert_eq!(grid_position(3), [0.0, 0.0, 0.0]);
        // Index 4 is the first with a 3x3 grid.
        assert_eq!(grid_position(4), [-1.0, -1.0, 0.0]);
    }

    #[test]
    fn scene_matches_configuration() {
        let config =
            BenchmarkConfiguration::new(12, LightingMode::Multiple, TextureMode::None).unwrap();
        let scene = Scene::build(config);
        assert_eq!(scene.triangles.len(), 12);
        assert_eq!(scene.lights.len(), 3);
        assert!(scene
            .triangles
            .iter()
            .all(|triangle| triangle.color == LIT_MATERIAL_COLOR));
    }

    #[test]
    fn advance_rotates_at_fixed_rate() {
        let mut scene = Scene::build(BenchmarkConfiguration::plain(2).unwrap());
        scene.advance(0.5);
        assert!((scene.triangles[0].rotation_degrees - 25.0).abs() < 1e-5);
        scene.advance(7.0);
        assert!((scene.triangles[1].rotation_degrees - 15.0).abs() < 1e-3);
    }

    #[test]
    fn palette_is_stable_and_varied() {
        assert_eq!(palette_color(7), palette_color(7));
        assert_ne!(palette_color(7), palette_color(8));
    }

    #[test]
    fn checkerboard_has_eight_squares_per_edge() {
        let image = checkerboard(TextureMode::Size64).expect("texture expected");
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(0, 0).0, [255, 200, 100, 255]);
        assert_eq!(image.get_pixel(8, 0).0, [100, 150, 200, 255]);
        assert_eq!(image.get_pixel(8, 8).0, [255, 200, 100, 255]);
        assert!(checkerboard(TextureMode::None).is_none());
    }

    #[test]
    fn view_projection_places_origin_inside_clip_volume() {
        let m = view_projection(800.0 / 600.0);
        // Transform (0, 0, 0, 1): the last column.
        let clip = m[3];
        let depth = clip[2] / clip[3];
        assert!(clip[3] > 0.0);
        assert!(depth > 0.0 && depth < 1.0, "depth was {depth}");
    }
}
