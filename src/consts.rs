// Floating point comparisons
pub const FEQ_EPSILON: f64 = 0.0001;

// Roots closer than this to the ray's `tmin` are discarded. Suppresses a
// reflected ray re-hitting the surface it just left.
pub const INTERSECTION_TOLERANCE: f64 = 0.00001;

// Slope error is configured in milliradians and used in radians.
pub const SLOPE_ERROR_SCALE: f64 = 1.0 / 1000.0;

// Sun directions with `1 - dot(sun, axis)` below this count as aligned.
pub const TRACKER_PARALLEL_EPSILON: f64 = 0.000001;

// Persisted matrix entries below this magnitude are written as exactly zero.
pub const MATRIX_SNAP_EPSILON: f64 = 0.000001;

// Vectors shorter than this cannot be normalized.
pub const DEGENERATE_LENGTH: f64 = 1.0e-12;

// Batch defaults
pub const NUM_THREADS: usize = 4;
pub const DEFAULT_SEED: u64 = 0x5EED;
pub const RAYS_PER_CHUNK: usize = 256;
