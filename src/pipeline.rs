use std::mem::size_of;

use wgpu::{
    BindGroupLayout, BlendState, ColorTargetState, ColorWrites, Device, Face, FragmentState,
    MultisampleState, PipelineCompilationOptions, PipelineLayoutDescriptor, PrimitiveState,
    RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource,
    TextureFormat, VertexAttribute, VertexBufferLayout, VertexState, VertexStepMode,
};

/// Bundles the shader module, layout and fixed-function state needed for one
/// [wgpu::RenderPipeline].
///
/// ```ignore
/// let pipeline = PipelineBuilder::new()
///     .with_shader(include_str!("shaders/textured.wgsl"))
///     .with_format(config.format)
///     .with_blend(Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING))
///     .with_vb::<Vertex>(&ATTRIBUTES)
///     .build(&device, &[&globals.bgl, &atlas.bgl]);
/// ```
pub struct PipelineBuilder<'a> {
    shader_src: &'a str,
    primitive_state: PrimitiveState,
    format: TextureFormat,
    blend: Option<BlendState>,
    vertex_stride: u64,
    attributes: &'a [VertexAttribute],
}

impl<'a> PipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            shader_src: "",
            primitive_state: PrimitiveState::default(),
            format: TextureFormat::Bgra8UnormSrgb,
            blend: None,
            vertex_stride: 0,
            attributes: &[],
        }
    }

    pub fn with_cull_mode(mut self, cull_mode: Option<Face>) -> Self {
        self.primitive_state.cull_mode = cull_mode;
        self
    }

    pub fn with_shader(mut self, shader_src: &'a str) -> Self {
        self.shader_src = shader_src;
        self
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_blend(mut self, blend: Option<BlendState>) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_vb<T>(mut self, attributes: &'a [VertexAttribute]) -> Self {
        self.vertex_stride = size_of::<T>() as u64;
        self.attributes = attributes;
        self
    }

    pub fn build(&self, device: &Device, layouts: &[&BindGroupLayout]) -> RenderPipeline {
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: layouts,
            push_constant_ranges: &[],
        });

        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: None,
            source: ShaderSource::Wgsl(self.shader_src.into()),
        });

        let buffers = [VertexBufferLayout {
            array_stride: self.vertex_stride,
            step_mode: VertexStepMode::Vertex,
            attributes: self.attributes,
        }];

        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: None,
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &module,
                entry_point: "vertex",
                buffers: &buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            primitive: self.primitive_state,
            depth_stencil: None,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &module,
                entry_point: "fragment",
                targets: &[Some(ColorTargetState {
                    format: self.format,
                    blend: self.blend,
                    write_mask: ColorWrites::all(),
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            multiview: None,
        })
    }
}

impl Default for PipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
