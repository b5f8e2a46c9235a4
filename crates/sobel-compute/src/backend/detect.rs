//! Backend detection.

use super::Backend;

/// Information about an execution backend.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    /// Backend type.
    pub backend: Backend,
    /// Human-readable name.
    pub name: &'static str,
    /// Whether backend is available.
    pub available: bool,
    /// Description.
    pub description: &'static str,
}

/// Detect all backends and whether each can run here.
pub fn detect_backends() -> Vec<BackendInfo> {
    vec![
        BackendInfo {
            backend: Backend::Threads,
            name: "threads",
            available: true,
            description: "shared-memory thread pool (rayon)",
        },
        BackendInfo {
            backend: Backend::Process,
            name: "process",
            available: Backend::Process.is_available(),
            description: "worker processes exchanging framed messages over pipes",
        },
        BackendInfo {
            backend: Backend::Wgpu,
            name: "wgpu",
            available: Backend::Wgpu.is_available(),
            description: if cfg!(feature = "wgpu") {
                "GPU compute shaders via wgpu (Vulkan/Metal/DX12)"
            } else {
                "GPU compute shaders via wgpu (not compiled in)"
            },
        },
    ]
}

/// Get description of available backends.
pub fn describe_backends() -> String {
    let mut desc = String::new();
    for info in detect_backends() {
        let status = if info.available { "+" } else { "-" };
        desc.push_str(&format!("[{}] {}: {}\n", status, info.name, info.description));
    }
    desc
}
