//! Procedural ski slope.
//! Uses seeded value noise and a seeded RNG so the same seed always builds the same slope.
//!
//! Scale: 1 unit = 1 meter
//! - The domain is a square centred at the origin
//! - +Z is downhill: the top of the run is at -Z, the bottom at +Z
//! - Heights are stored on a fixed grid and bilinearly interpolated between nodes

use bevy::prelude::*;
use noise::{NoiseFn, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// World generation seed - same seed = same slope
pub const WORLD_SEED: u32 = 42;

/// Side length of the slope domain (meters)
pub const DEFAULT_SIZE: f32 = 2000.0;
/// Grid nodes per axis
pub const DEFAULT_RESOLUTION: usize = 256;

/// Elevation of the first (uphill) grid row
pub const TOP_ELEVATION: f32 = 120.0;

/// Slope rate is `BASE_SLOPE_RATE + steepness_noise * SLOPE_RATE_VARIATION`, clamped
pub const BASE_SLOPE_RATE: f32 = 0.2;
pub const SLOPE_RATE_VARIATION: f32 = 0.15;
pub const MIN_SLOPE_RATE: f32 = 0.15;
pub const MAX_SLOPE_RATE: f32 = 0.45;
const STEEPNESS_SCALE: f64 = 0.01;

/// Half-width of the groomed trail down the centreline
pub const PATH_HALF_WIDTH: f32 = 30.0;
const PATH_LATERAL_DAMPING: f32 = 0.7;
const PATH_FINE_DAMPING: f32 = 0.5;
/// Below this smoothness the trail damping is ignored entirely
const PATH_EDGE: f32 = 0.1;

const LATERAL_SCALE: f64 = 0.015;
const LATERAL_AMPLITUDE: f32 = 8.0;
const FINE_SCALE: f64 = 0.05;
const FINE_AMPLITUDE: f32 = 2.0;

pub const ICE_PROBABILITY: f64 = 0.02;
pub const POWDER_PROBABILITY: f64 = 0.05;
/// Powder only settles above this elevation
pub const POWDER_MIN_HEIGHT: f32 = 80.0;

/// Central-difference step for normals (meters)
pub const NORMAL_EPSILON: f32 = 1.0;

/// Snow surface types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SurfaceType {
    #[default]
    Groomed,
    Ice,
    Powder,
}

impl SurfaceType {
    /// Sliding friction coefficient
    pub fn friction(&self) -> f32 {
        match self {
            SurfaceType::Groomed => 0.08,
            SurfaceType::Ice => 0.02,
            SurfaceType::Powder => 0.15,
        }
    }

    /// How well an edged ski bites into this surface
    pub fn grip(&self) -> f32 {
        match self {
            SurfaceType::Groomed => 0.9,
            SurfaceType::Ice => 0.2,
            SurfaceType::Powder => 0.7,
        }
    }

    /// Linear RGB tint used for terrain mesh vertex colours
    pub fn color(&self) -> [f32; 3] {
        match self {
            // Bright, slightly blue corduroy
            SurfaceType::Groomed => [0.94, 0.96, 1.0],
            // Grey-blue glaze
            SurfaceType::Ice => [0.72, 0.82, 0.92],
            // Pure white
            SurfaceType::Powder => [1.0, 1.0, 1.0],
        }
    }
}

/// Terrain construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainDef {
    pub size: f32,
    pub resolution: usize,
    pub seed: u32,
}

impl Default for TerrainDef {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            resolution: DEFAULT_RESOLUTION,
            seed: WORLD_SEED,
        }
    }
}

impl TerrainDef {
    pub fn validate(&self) -> Result<(), String> {
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(format!("terrain size must be positive, got {}", self.size));
        }
        if self.resolution < 2 {
            return Err(format!(
                "terrain resolution must be at least 2, got {}",
                self.resolution
            ));
        }
        Ok(())
    }
}

/// Everything the skier needs from one point on the slope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub height: f32,
    pub normal: Vec3,
    pub surface: SurfaceType,
    /// Angle between the surface normal and world up (radians)
    pub pitch: f32,
}

/// Seeded value-noise layers
struct SlopeNoise {
    steepness: Value,
    lateral: Value,
    fine: Value,
}

impl SlopeNoise {
    fn new(seed: u32) -> Self {
        Self {
            steepness: Value::new(seed),
            lateral: Value::new(seed.wrapping_add(1000)),
            fine: Value::new(seed.wrapping_add(2000)),
        }
    }

    fn sample(layer: &Value, x: f32, z: f32, scale: f64) -> f32 {
        layer.get([x as f64 * scale, z as f64 * scale]) as f32
    }

    /// Descent per meter for the row at `world_z`. Always positive.
    fn slope_rate(&self, world_z: f32) -> f32 {
        let steepness = Self::sample(&self.steepness, 0.0, world_z, STEEPNESS_SCALE);
        (BASE_SLOPE_RATE + steepness * SLOPE_RATE_VARIATION).clamp(MIN_SLOPE_RATE, MAX_SLOPE_RATE)
    }
}

/// Height and surface grid over the slope domain. Immutable once built.
#[derive(Debug, Clone)]
pub struct TerrainField {
    size: f32,
    resolution: usize,
    /// Row-major, `z * resolution + x`
    heights: Vec<f32>,
    surfaces: Vec<SurfaceType>,
    /// Descending baseline of each downhill row (before noise)
    row_baseline: Vec<f32>,
    row_slope_rate: Vec<f32>,
    min_height: f32,
}

impl TerrainField {
    pub fn new(def: &TerrainDef) -> Self {
        let size = if def.size.is_finite() && def.size > 0.0 {
            def.size
        } else {
            DEFAULT_SIZE
        };
        let resolution = def.resolution.max(2);
        let spacing = size / resolution as f32;
        let noise = SlopeNoise::new(def.seed);
        let mut rng = StdRng::seed_from_u64(def.seed as u64);

        // Accumulate the drop row by row so the baseline can only go down,
        // however the steepness noise moves.
        let mut row_baseline = Vec::with_capacity(resolution);
        let mut row_slope_rate = Vec::with_capacity(resolution);
        let mut baseline = TOP_ELEVATION;
        for zi in 0..resolution {
            let rate = noise.slope_rate(node_coord(zi, resolution, size));
            if zi > 0 {
                baseline -= spacing * rate;
            }
            row_baseline.push(baseline);
            row_slope_rate.push(rate);
        }

        let mut heights = Vec::with_capacity(resolution * resolution);
        let mut surfaces = Vec::with_capacity(resolution * resolution);
        let mut min_height = f32::INFINITY;

        for zi in 0..resolution {
            let world_z = node_coord(zi, resolution, size);
            for xi in 0..resolution {
                let world_x = node_coord(xi, resolution, size);

                let path_smoothness = (1.0 - world_x.abs() / PATH_HALF_WIDTH).max(0.0);
                let lateral_noise =
                    SlopeNoise::sample(&noise.lateral, world_x, world_z, LATERAL_SCALE) * LATERAL_AMPLITUDE;
                let lateral = if path_smoothness > PATH_EDGE {
                    lateral_noise * (1.0 - path_smoothness * PATH_LATERAL_DAMPING)
                } else {
                    lateral_noise
                };
                let fine = SlopeNoise::sample(&noise.fine, world_x, world_z, FINE_SCALE)
                    * FINE_AMPLITUDE
                    * (1.0 - path_smoothness * PATH_FINE_DAMPING);

                let height = row_baseline[zi] + lateral + fine;
                heights.push(height);
                min_height = min_height.min(height);

                // Draw both every node so the RNG stream doesn't depend on height
                let ice = rng.gen_bool(ICE_PROBABILITY);
                let powder = rng.gen_bool(POWDER_PROBABILITY);
                let surface = if ice {
                    SurfaceType::Ice
                } else if powder && height > POWDER_MIN_HEIGHT {
                    SurfaceType::Powder
                } else {
                    SurfaceType::Groomed
                };
                surfaces.push(surface);
            }
        }

        info!(
            "Generated {}x{} slope over {}m (seed {}), drop {:.1}m",
            resolution,
            resolution,
            size,
            def.seed,
            row_baseline[0] - row_baseline[resolution - 1]
        );

        Self {
            size,
            resolution,
            heights,
            surfaces,
            row_baseline,
            row_slope_rate,
            min_height,
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Lowest node height on the grid. Used as an absolute floor.
    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    fn spacing(&self) -> f32 {
        self.size / self.resolution as f32
    }

    /// World coordinate -> fractional grid index
    fn to_local(&self, world: f32) -> f32 {
        (world / self.size + 0.5) * self.resolution as f32
    }

    fn local_in_bounds(&self, local: f32) -> bool {
        local >= 0.0 && local < (self.resolution - 1) as f32
    }

    /// True if (x, z) can be bilinearly sampled from the grid
    pub fn contains(&self, x: f32, z: f32) -> bool {
        self.local_in_bounds(self.to_local(x)) && self.local_in_bounds(self.to_local(z))
    }

    fn node_height(&self, xi: usize, zi: usize) -> f32 {
        self.heights[zi * self.resolution + xi]
    }

    /// Terrain height at a world position.
    /// Off the grid the nearest edge of the grid is sampled and the baseline descent is
    /// continued past it, so height stays continuous across the domain edges.
    pub fn height(&self, x: f32, z: f32) -> f32 {
        let local_x = self.to_local(x);
        let local_z = self.to_local(z);
        if local_x.is_nan() || !local_z.is_finite() {
            return self.fallback_height(z);
        }

        let last = (self.resolution - 1) as f32;
        self.grid_height(local_x.clamp(0.0, last), local_z.clamp(0.0, last))
            + self.baseline_extension(local_z)
    }

    /// Bilinear height at grid-local coordinates, both within `[0, resolution - 1]`
    fn grid_height(&self, local_x: f32, local_z: f32) -> f32 {
        let max_cell = self.resolution - 2;
        let x0 = (local_x.floor() as usize).min(max_cell);
        let z0 = (local_z.floor() as usize).min(max_cell);
        let fx = local_x - x0 as f32;
        let fz = local_z - z0 as f32;

        let h00 = self.node_height(x0, z0);
        let h10 = self.node_height(x0 + 1, z0);
        let h01 = self.node_height(x0, z0 + 1);
        let h11 = self.node_height(x0 + 1, z0 + 1);

        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        h0 * (1.0 - fz) + h1 * fz
    }

    /// Extra descent beyond the first or last row, at the edge row's slope rate. Zero on the grid.
    fn baseline_extension(&self, local_z: f32) -> f32 {
        let last = self.resolution - 1;
        let spacing = self.spacing();
        if local_z < 0.0 {
            // Uphill of the first row: keep climbing
            -local_z * spacing * self.row_slope_rate[0]
        } else if local_z > last as f32 {
            -(local_z - last as f32) * spacing * self.row_slope_rate[last]
        } else {
            0.0
        }
    }

    /// Noise-free baseline at `z`, extended past the grid with the edge rows' slope rate.
    /// Falls back to `min_height` for non-finite `z`.
    pub fn fallback_height(&self, z: f32) -> f32 {
        let local = self.to_local(z);
        if !local.is_finite() {
            return self.min_height;
        }

        let last = self.resolution - 1;
        let clamped = local.clamp(0.0, last as f32);
        let z0 = (clamped.floor() as usize).min(last - 1);
        let t = clamped - z0 as f32;
        self.row_baseline[z0] * (1.0 - t) + self.row_baseline[z0 + 1] * t + self.baseline_extension(local)
    }

    /// Surface normal from a central difference of `height`
    pub fn normal(&self, x: f32, z: f32) -> Vec3 {
        let eps = NORMAL_EPSILON;
        let h_left = self.height(x - eps, z);
        let h_right = self.height(x + eps, z);
        let h_back = self.height(x, z - eps);
        let h_front = self.height(x, z + eps);

        Vec3::new(h_left - h_right, 2.0 * eps, h_back - h_front)
            .try_normalize()
            .unwrap_or(Vec3::Y)
    }

    /// Surface type of the grid cell containing (x, z). Groomed off the grid.
    pub fn surface(&self, x: f32, z: f32) -> SurfaceType {
        if !self.contains(x, z) {
            return SurfaceType::Groomed;
        }
        let xi = self.to_local(x).floor() as usize;
        let zi = self.to_local(z).floor() as usize;
        self.surfaces[zi * self.resolution + xi]
    }

    /// Height, normal, surface and slope pitch in one query
    pub fn sample(&self, x: f32, z: f32) -> SurfaceSample {
        let normal = self.normal(x, z);
        SurfaceSample {
            height: self.height(x, z),
            normal,
            surface: self.surface(x, z),
            pitch: normal.y.clamp(-1.0, 1.0).acos(),
        }
    }

    /// Vertex data for drawing the whole field as one grid mesh
    pub fn mesh_data(&self) -> TerrainMeshData {
        let res = self.resolution;
        let spacing = self.spacing();
        let mut positions = Vec::with_capacity(res * res);
        let mut normals = Vec::with_capacity(res * res);
        let mut uvs = Vec::with_capacity(res * res);
        let mut colors = Vec::with_capacity(res * res);
        let mut indices = Vec::with_capacity((res - 1) * (res - 1) * 6);

        let height_span = (TOP_ELEVATION - self.min_height).max(1.0);

        for zi in 0..res {
            for xi in 0..res {
                let height = self.node_height(xi, zi);
                positions.push([
                    node_coord(xi, res, self.size),
                    height,
                    node_coord(zi, res, self.size),
                ]);
                uvs.push([xi as f32 / (res - 1) as f32, zi as f32 / (res - 1) as f32]);

                // Snow gets a little darker toward the valley floor
                let height_factor = ((height - self.min_height) / height_span).clamp(0.0, 1.0);
                let shade = 0.9 + height_factor * 0.1;
                let [r, g, b] = self.surfaces[zi * res + xi].color();
                colors.push([(r * shade).min(1.0), (g * shade).min(1.0), (b * shade).min(1.0), 1.0]);
            }
        }

        for zi in 0..res {
            for xi in 0..res {
                let h_left = self.node_height(xi.saturating_sub(1), zi);
                let h_right = self.node_height((xi + 1).min(res - 1), zi);
                let h_down = self.node_height(xi, zi.saturating_sub(1));
                let h_up = self.node_height(xi, (zi + 1).min(res - 1));

                let normal = Vec3::new(h_left - h_right, 2.0 * spacing, h_down - h_up).normalize();
                normals.push([normal.x, normal.y, normal.z]);
            }
        }

        for zi in 0..(res - 1) {
            for xi in 0..(res - 1) {
                let top_left = (zi * res + xi) as u32;
                let top_right = top_left + 1;
                let bottom_left = top_left + res as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[top_left, bottom_left, top_right]);
                indices.extend_from_slice(&[top_right, bottom_left, bottom_right]);
            }
        }

        TerrainMeshData {
            positions,
            normals,
            uvs,
            colors,
            indices,
        }
    }
}

/// World coordinate of grid node `index`
fn node_coord(index: usize, resolution: usize, size: f32) -> f32 {
    (index as f32 / resolution as f32 - 0.5) * size
}

/// Generated mesh data for the slope. Read by renderers alongside `RenderPose`;
/// the simulation itself never needs it.
pub struct TerrainMeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}
