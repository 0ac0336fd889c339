//! Headless wgpu device setup

use wgpu::{Adapter, Device, Instance, Queue, RequestDeviceError};

use super::{TextureId, WgpuBackend};

/// GPU rendering context
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Option<Adapter>,
    pub device: Option<Device>,
    pub queue: Option<Queue>,
}

impl GpuContext {
    /// Create a new GPU context
    pub fn new() -> Self {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        Self {
            instance,
            adapter: None,
            device: None,
            queue: None,
        }
    }

    /// Initialize the GPU context (async)
    pub async fn initialize(&mut self) -> Result<(), GpuError> {
        // Request adapter
        let adapter = self
            .instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        // Request device and queue
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Osrbridge GPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await
            .map_err(|e: RequestDeviceError| GpuError::DeviceCreation(e.to_string()))?;

        log::info!("Using GPU adapter: {}", adapter.get_info().name);

        self.adapter = Some(adapter);
        self.device = Some(device);
        self.queue = Some(queue);

        Ok(())
    }

    /// Check if GPU is initialized
    pub fn is_initialized(&self) -> bool {
        self.device.is_some() && self.queue.is_some()
    }

    /// Get device reference
    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    /// Get queue reference
    pub fn queue(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }

    /// Texture backend on this context's device
    pub fn texture_backend(&self) -> Result<WgpuBackend, GpuError> {
        match (&self.device, &self.queue) {
            (Some(device), Some(queue)) => Ok(WgpuBackend::new(device.clone(), queue.clone())),
            _ => Err(GpuError::NotInitialized),
        }
    }
}

impl Default for GpuContext {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU-related errors
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// No suitable GPU adapter found
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    /// Failed to create device
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(String),
    /// GPU context or texture used before setup
    #[error("GPU resources not initialized")]
    NotInitialized,
    /// Texture could not be allocated
    #[error("Failed to allocate {width}x{height} texture: {reason}")]
    TextureAllocation {
        width: u32,
        height: u32,
        reason: String,
    },
    /// Handle does not name a live texture
    #[error("Unknown texture #{0}")]
    UnknownTexture(TextureId),
    /// Upload error
    #[error("Texture upload error: {0}")]
    Upload(String),
}
