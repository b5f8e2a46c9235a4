//! WGSL shader sources for the wgpu executor.
//!
//! `WORKGROUP_SIZE` is substituted with the configured threads-per-block
//! before compilation. Both kernels stride over the pixel index space by
//! `params.stride` (total work-items), so any grid size covers every pixel.

/// Placeholder replaced by the work group size.
pub const WORKGROUP_SIZE: &str = "WORKGROUP_SIZE";

/// Sobel gradient magnitude with a zero border.
pub const GRADIENT: &str = r#"
struct Params {
    width: u32,
    height: u32,
    total: u32,
    stride: u32,
}

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

// round(sqrt(n)) exactly: the f32 estimate is off by at most one.
fn round_sqrt(n: u32) -> u32 {
    var r = u32(round(sqrt(f32(n))));
    if r * r + r < n { r = r + 1u; }
    if r > 0u && r * r - r >= n { r = r - 1u; }
    return r;
}

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let w = params.width;
    var i = id.x;
    loop {
        if i >= params.total { break; }

        let x = i % w;
        let y = i / w;
        var g = 0u;
        if x > 0u && y > 0u && x + 1u < w && y + 1u < params.height {
            let tl = i32(src[i - w - 1u]);
            let t  = i32(src[i - w]);
            let tr = i32(src[i - w + 1u]);
            let l  = i32(src[i - 1u]);
            let r  = i32(src[i + 1u]);
            let bl = i32(src[i + w - 1u]);
            let b  = i32(src[i + w]);
            let br = i32(src[i + w + 1u]);

            let gx = tr + 2 * r + br - tl - 2 * l - bl;
            let gy = bl + 2 * b + br - tl - 2 * t - tr;
            g = round_sqrt(u32(gx * gx + gy * gy));
        }
        dst[i] = g;

        if params.total - i <= params.stride { break; }
        i = i + params.stride;
    }
}
"#;

/// Linear rescale to `0..=255`, round half up. `span == 0` maps to 0.
pub const RESCALE: &str = r#"
struct Params {
    min: u32,
    span: u32,
    total: u32,
    stride: u32,
}

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    var i = id.x;
    loop {
        if i >= params.total { break; }

        var v = 0u;
        if params.span > 0u {
            let s = src[i];
            let d = min(select(0u, s - params.min, s > params.min), params.span);
            v = (d * 510u + params.span) / (2u * params.span);
        }
        dst[i] = v;

        if params.total - i <= params.stride { break; }
        i = i + params.stride;
    }
}
"#;

/// Shader source with the work group size filled in.
pub fn with_workgroup_size(source: &str, size: u32) -> String {
    source.replace(WORKGROUP_SIZE, &size.to_string())
}
