//! Compute device and precision selection.

use candle_core::{DType, Device};

/// Pick the compute device for this invocation: CUDA when available,
/// otherwise the CPU.
#[must_use]
pub fn preferred_device() -> Device {
    match Device::cuda_if_available(0) {
        Ok(device) => device,
        Err(e) => {
            tracing::debug!("CUDA unavailable, falling back to CPU: {e}");
            Device::Cpu
        }
    }
}

/// Working precision for a device: bf16 on accelerators, f32 on the CPU.
#[must_use]
pub fn preferred_dtype(device: &Device) -> DType {
    if device.is_cuda() || device.is_metal() {
        DType::BF16
    } else {
        DType::F32
    }
}
