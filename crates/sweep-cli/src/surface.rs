//! Synthetic surface-reconstruction stand-in driven by Poisson-style parameters.
//!
//! The proxy derives a deterministic point cloud from the assignment, so equal
//! assignments always produce equal records and recordings.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sweep_core::{
    stable_hash_string, EvalError, EvalRequest, Evaluator, ParamValue, Record, ResultValue,
};

/// Octree depth beyond which the proxy refuses to run.
pub const MAX_DEPTH: i64 = 12;

const CLOUD_POINTS: usize = 64;

/// Proxy evaluator exposing `vertices`, `triangles`, `quality` and `recording`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceProxy;

impl SurfaceProxy {
    pub const IDENTITY: &'static str = "surface-proxy/v1";
}

struct SurfaceParams {
    depth: i64,
    scale: f64,
    linear_fit: bool,
}

impl SurfaceParams {
    fn from_request(request: &EvalRequest<'_>) -> Result<Self, EvalError> {
        let get = |name: &str| {
            request
                .assignment
                .get(name)
                .ok_or_else(|| EvalError::failed(format!("missing parameter `{name}`")))
        };
        let depth = get("depth")?
            .as_int()
            .ok_or_else(|| EvalError::failed("`depth` must be an integer"))?;
        let scale = match get("scale")? {
            ParamValue::Real(value) => *value,
            ParamValue::Int(value) => *value as f64,
            ParamValue::Bool(_) => return Err(EvalError::failed("`scale` must be numeric")),
        };
        let linear_fit = get("linear_fit")?
            .as_bool()
            .ok_or_else(|| EvalError::failed("`linear_fit` must be a boolean"))?;
        if !(1..=MAX_DEPTH).contains(&depth) {
            return Err(EvalError::failed(format!(
                "depth {depth} outside supported range 1..={MAX_DEPTH}"
            )));
        }
        if scale <= 0.0 {
            return Err(EvalError::failed("scale must be positive"));
        }
        Ok(Self {
            depth,
            scale,
            linear_fit,
        })
    }
}

fn seed_for(request: &EvalRequest<'_>) -> Result<u64, EvalError> {
    let digest = stable_hash_string(request.assignment)
        .map_err(|err| EvalError::failed(err.to_string()))?;
    u64::from_str_radix(&digest[..16], 16).map_err(|err| EvalError::failed(err.to_string()))
}

impl Evaluator for SurfaceProxy {
    fn identity(&self) -> String {
        Self::IDENTITY.to_string()
    }

    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Record, EvalError> {
        let params = SurfaceParams::from_request(request)?;
        let mut rng = StdRng::seed_from_u64(seed_for(request)?);

        let cloud: Vec<[f32; 3]> = (0..CLOUD_POINTS)
            .map(|_| {
                let theta = rng.gen_range(0.0..std::f64::consts::TAU);
                let phi = rng.gen_range(0.0..std::f64::consts::PI);
                let radius = params.scale * (1.0 + rng.gen_range(-0.02..0.02));
                [
                    (radius * phi.sin() * theta.cos()) as f32,
                    (radius * phi.sin() * theta.sin()) as f32,
                    (radius * phi.cos()) as f32,
                ]
            })
            .collect();

        // Octree leaves grow by four per level on a closed surface.
        let vertices = (6.0 * 4f64.powi(params.depth as i32 - 1) * params.scale).round() as i64;
        let triangles = 2 * vertices - 4;
        let fit_bonus = if params.linear_fit { 0.02 } else { 0.0 };
        let coverage = 1.0 - 1.0 / (params.depth as f64 + 1.0);
        let smoothing = 1.0 - (params.scale - 1.0).abs() / 4.0;
        let quality = coverage * smoothing + fit_bonus + rng.gen_range(-0.005..0.005);

        let mut record = Record::new();
        if request.wants("vertices") {
            record.insert("vertices", ResultValue::Int(vertices));
        }
        if request.wants("triangles") {
            record.insert("triangles", ResultValue::Int(triangles));
        }
        if request.wants("quality") {
            record.insert("quality", ResultValue::Real(quality));
        }
        if request.wants("recording") {
            let mut session = request.recorder.open("surface");
            let bytes: Vec<u8> = cloud
                .iter()
                .flat_map(|point| point.iter().flat_map(|c| c.to_le_bytes()))
                .collect();
            session.log("surface/points", &bytes);
            session.log("surface/stats", format!("{vertices} {triangles}").as_bytes());
            record.insert("recording", ResultValue::Artifact(session.finish()));
        }
        Ok(record)
    }
}
