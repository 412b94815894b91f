/// Adapter, device and surface options shared by [`super::Gpu`] and
/// [`super::HeadlessGpu`].
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick an sRGB surface format if the window offers one. Off by default:
    /// colors and blending then match the linear headless surface byte for byte.
    pub prefer_srgb: bool,

    /// `Fifo` blocks on vsync.
    pub present_mode: wgpu::PresentMode,

    /// Ignored when the surface does not support it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Both programs run on core WebGPU; empty by default.
    pub required_features: wgpu::Features,

    pub required_limits: wgpu::Limits,

    /// Hint only.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

impl GpuInit {
    /// Limits any adapter can satisfy, down to GL/software backends.
    pub fn downlevel() -> Self {
        Self {
            required_limits: wgpu::Limits::downlevel_defaults(),
            ..Self::default()
        }
    }

    pub(crate) fn device_descriptor(&self, label: &'static str) -> wgpu::DeviceDescriptor<'static> {
        wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: self.required_features,
            required_limits: self.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }
    }
}
