use itertools::Itertools;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, Device, Extent3d, Sampler, SamplerBindingType,
    SamplerDescriptor, ShaderStages, Texture, TextureDescriptor, TextureDimension, TextureFormat,
    TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension,
};

#[derive(Clone)]
pub enum BindEntryType {
    Uniform { size: u64 },
    /// A sampled 2D texture that can be rewritten with `Queue::write_texture`.
    Texture { format: TextureFormat, size: Extent3d },
    /// Nearest-neighbour sampling; atlas texels map one to one onto pixels.
    Sampler,
}

#[derive(Clone)]
pub struct BindEntry {
    pub visibility: ShaderStages,
    pub ty: BindEntryType,
}

pub enum BindEntryResource {
    Buffer(Buffer),
    Texture(Texture, TextureView),
    Sampler(Sampler),
}

impl BindEntryResource {
    pub fn buffer(&self) -> Option<&Buffer> {
        match self {
            BindEntryResource::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn texture(&self) -> Option<&Texture> {
        match self {
            BindEntryResource::Texture(texture, _) => Some(texture),
            _ => None,
        }
    }

    fn binding(&self) -> BindingResource<'_> {
        match self {
            BindEntryResource::Buffer(buffer) => buffer.as_entire_binding(),
            BindEntryResource::Texture(_, view) => BindingResource::TextureView(view),
            BindEntryResource::Sampler(sampler) => BindingResource::Sampler(sampler),
        }
    }
}

impl BindEntry {
    fn layout_entry(&self, binding: u32) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding,
            visibility: self.visibility,
            ty: match &self.ty {
                BindEntryType::Uniform { .. } => BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                BindEntryType::Texture { .. } => BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                BindEntryType::Sampler => BindingType::Sampler(SamplerBindingType::NonFiltering),
            },
            count: None,
        }
    }

    pub fn resource(&self, device: &Device) -> BindEntryResource {
        match &self.ty {
            BindEntryType::Uniform { size } => BindEntryResource::Buffer(device.create_buffer(
                &BufferDescriptor {
                    label: None,
                    size: *size,
                    usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                },
            )),
            BindEntryType::Texture { format, size } => {
                let texture = device.create_texture(&TextureDescriptor {
                    label: Some("atlas"),
                    size: *size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: TextureDimension::D2,
                    format: *format,
                    usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                });
                let view = texture.create_view(&TextureViewDescriptor::default());
                BindEntryResource::Texture(texture, view)
            }
            BindEntryType::Sampler => {
                BindEntryResource::Sampler(device.create_sampler(&SamplerDescriptor::default()))
            }
        }
    }
}

/// A bind group together with its layout and the resources it points at.
pub struct Bind {
    pub bg: BindGroup,
    pub bgl: BindGroupLayout,
    pub resources: Vec<BindEntryResource>,
    pub entries: Vec<BindEntry>,
}

impl Bind {
    pub fn new(entries: Vec<BindEntry>, device: &Device) -> Self {
        let layout_entries = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| entry.layout_entry(idx as u32))
            .collect_vec();
        let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: &layout_entries,
        });
        let resources = entries
            .iter()
            .map(|entry| entry.resource(device))
            .collect_vec();
        let bg = Self::create_bind_group(device, &bgl, &resources);

        Self {
            bg,
            bgl,
            resources,
            entries,
        }
    }

    fn create_bind_group(
        device: &Device,
        bgl: &BindGroupLayout,
        resources: &[BindEntryResource],
    ) -> BindGroup {
        let group_entries = resources
            .iter()
            .enumerate()
            .map(|(idx, resource)| BindGroupEntry {
                binding: idx as u32,
                resource: resource.binding(),
            })
            .collect_vec();
        device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: bgl,
            entries: &group_entries,
        })
    }

    /// Swaps the resource at `binding` and rebuilds the bind group around it.
    pub fn replace_resource(&mut self, resource: BindEntryResource, binding: usize, device: &Device) {
        self.resources[binding] = resource;
        self.bg = Self::create_bind_group(device, &self.bgl, &self.resources);
    }
}
