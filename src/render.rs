//! The wgpu implementation of [Backend].
//!
//! Module calls arrive in immediate-mode order during a frame. They are recorded into one vertex
//! stream and a list of draws, and [Renderer::end_frame] replays them in a single render pass.
//! Atlas uploads go to the queue straight away; the atlas only ever gains texels, so a draw
//! recorded before a later upload in the same frame still finds its glyphs.

use std::{collections::HashMap, ffi::c_void, mem::size_of, ops::Range, sync::Arc};

use anyhow::{anyhow, Result};
use itertools::iproduct;
use log::{debug, info, warn};
use nalgebra::{Matrix4, Orthographic3};
use wgpu::{
    vertex_attr_array, BlendState, Buffer, BufferDescriptor, BufferUsages, CommandEncoderDescriptor,
    Device, DeviceDescriptor, Extent3d, ImageDataLayout, Instance, LoadOp, Operations, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RequestAdapterOptions,
    ShaderStages, StoreOp, Surface, SurfaceConfiguration, SurfaceError, TextureFormat,
    TextureViewDescriptor, VertexAttribute,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    backend::{raw_slice, Backend, BackendEntries, Program},
    bind::{Bind, BindEntry, BindEntryType},
    geometry::{Color, Vertex},
    pipeline::PipelineBuilder,
    plain::PlainSlice,
};

const ATTRIBUTES: [VertexAttribute; 3] = vertex_attr_array![
    // position
    0 => Float32x3,
    // uv
    1 => Float32x2,
    // color
    2 => Float32x4,
];

// Coverage is stored sRGB-encoded and decoded on sampling, so edges keep their weight once the
// surface encodes the blended result again.
const ATLAS_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

const INITIAL_VERTICES: u64 = 6 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: Program,
    blend: bool,
}

struct DrawCmd {
    key: PipelineKey,
    vertices: Range<u32>,
}

pub struct Renderer {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    globals: Bind,
    atlas: Bind,
    atlas_size: Extent3d,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
    vertex_buffer: Buffer,
    // per frame
    staging: Vec<Vertex>,
    upload_base: u32,
    draws: Vec<DrawCmd>,
    clear: Option<wgpu::Color>,
    // sticky binding state
    viewport: (i32, i32),
    program: Option<Program>,
    atlas_bound: bool,
    blend: bool,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = Instance::default();
        let surface = instance.create_surface(window)?;

        let (adapter, device, queue) = pollster::block_on(async {
            let adapter = instance
                .request_adapter(&RequestAdapterOptions {
                    compatible_surface: Some(&surface),
                    ..Default::default()
                })
                .await
                .ok_or(anyhow!("No suitable adapter found."))?;

            let (device, queue) = adapter
                .request_device(&DeviceDescriptor::default(), None)
                .await?;

            Ok::<(wgpu::Adapter, wgpu::Device, wgpu::Queue), anyhow::Error>((
                adapter, device, queue,
            ))
        })?;
        info!("rendering with {:?}", adapter.get_info().backend);

        let config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .ok_or(anyhow!("Surface is not supported by the adapter."))?;
        surface.configure(&device, &config);

        let globals = Bind::new(
            vec![
                // projection
                BindEntry {
                    visibility: ShaderStages::VERTEX,
                    ty: BindEntryType::Uniform {
                        size: size_of::<Matrix4<f32>>() as u64,
                    },
                },
            ],
            &device,
        );

        let atlas_size = Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let atlas = Bind::new(
            vec![
                BindEntry {
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindEntryType::Texture {
                        format: ATLAS_FORMAT,
                        size: atlas_size,
                    },
                },
                BindEntry {
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindEntryType::Sampler,
                },
            ],
            &device,
        );

        let pipelines = iproduct!([Program::Basic, Program::Textured], [false, true])
            .map(|(program, blend)| {
                let shader = match program {
                    Program::Basic => include_str!("shaders/basic.wgsl"),
                    Program::Textured => include_str!("shaders/textured.wgsl"),
                };
                let pipeline = PipelineBuilder::new()
                    .with_shader(shader)
                    .with_format(config.format)
                    .with_cull_mode(None)
                    .with_blend(blend.then_some(BlendState::PREMULTIPLIED_ALPHA_BLENDING))
                    .with_vb::<Vertex>(&ATTRIBUTES)
                    .build(&device, &[&globals.bgl, &atlas.bgl]);
                (PipelineKey { program, blend }, pipeline)
            })
            .collect();

        let vertex_buffer = vertex_buffer(&device, INITIAL_VERTICES * size_of::<Vertex>() as u64);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            globals,
            atlas,
            atlas_size,
            pipelines,
            vertex_buffer,
            staging: Vec::new(),
            upload_base: 0,
            draws: Vec::new(),
            clear: None,
            viewport: (0, 0),
            program: None,
            atlas_bound: false,
            blend: false,
        })
    }

    /// Backend entries that dispatch to the renderer behind the context pointer.
    pub fn entries() -> BackendEntries {
        BackendEntries {
            viewport: Some(viewport),
            clear: Some(clear),
            upload_atlas: Some(upload_atlas),
            upload_vertices: Some(upload_vertices),
            use_program: Some(use_program),
            bind_atlas: Some(bind_atlas),
            set_blend: Some(set_blend),
            draw_triangles: Some(draw_triangles),
        }
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
    }

    /// Submits everything recorded since the last call and presents the frame.
    pub fn end_frame(&mut self) -> Result<()> {
        let clear = self.clear.take();
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                debug!("surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.discard();
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                warn!("timed out waiting for the next frame");
                self.discard();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if !self.staging.is_empty() {
            self.reserve_vertices(self.staging.len());
            self.queue
                .write_buffer(&self.vertex_buffer, 0, self.staging.as_bytes());
        }

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: clear.map_or(LoadOp::Load, LoadOp::Clear),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_bind_group(0, &self.globals.bg, &[]);
            rpass.set_bind_group(1, &self.atlas.bg, &[]);
            rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            for draw in &self.draws {
                let Some(pipeline) = self.pipelines.get(&draw.key) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.draw(draw.vertices.clone(), 0..1);
            }
        }

        self.queue.submit([encoder.finish()]);
        frame.present();
        self.discard();
        Ok(())
    }

    fn discard(&mut self) {
        self.staging.clear();
        self.draws.clear();
        self.upload_base = 0;
    }

    /// Grows the vertex buffer to hold `count` vertices, at least doubling it.
    fn reserve_vertices(&mut self, count: usize) {
        let needed = (count * size_of::<Vertex>()) as u64;
        if needed <= self.vertex_buffer.size() {
            return;
        }
        let size = needed.max(self.vertex_buffer.size() * 2);
        debug!("growing vertex buffer to {} bytes", size);
        self.vertex_buffer = vertex_buffer(&self.device, size);
    }
}

/// Maps window pixels, origin bottom-left, to clip space. `None` for a window with no area.
fn projection(width: i32, height: i32) -> Option<Matrix4<f32>> {
    (width > 0 && height > 0).then(|| {
        Orthographic3::new(0.0, width as f32, 0.0, height as f32, -1.0, 1.0).into_inner()
    })
}

fn vertex_buffer(device: &Device, size: u64) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some("Vertex buffer"),
        size,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl Backend for Renderer {
    fn viewport(&mut self, width: i32, height: i32) {
        if self.viewport == (width, height) {
            return;
        }
        self.viewport = (width, height);
        // A minimized window reports no area; keep the last projection until it comes back.
        let Some(projection) = projection(width, height) else {
            return;
        };
        let globals = &self.globals.resources[0];
        if let Some(buffer) = globals.buffer() {
            self.queue
                .write_buffer(buffer, 0, projection.as_slice().as_bytes());
        }
    }

    fn clear(&mut self, [r, g, b, a]: Color) {
        self.clear = Some(wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        });
    }

    fn upload_atlas(&mut self, width: u32, height: u32, pixels: &[u8]) {
        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        if size != self.atlas_size {
            let entry = BindEntry {
                visibility: ShaderStages::FRAGMENT,
                ty: BindEntryType::Texture {
                    format: ATLAS_FORMAT,
                    size,
                },
            };
            self.atlas
                .replace_resource(entry.resource(&self.device), 0, &self.device);
            self.atlas_size = size;
            debug!("atlas texture is now {}x{}", width, height);
        }

        if let Some(texture) = self.atlas.resources[0].texture() {
            self.queue.write_texture(
                texture.as_image_copy(),
                pixels,
                ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                size,
            );
        }
    }

    fn upload_vertices(&mut self, vertices: &[Vertex]) {
        self.upload_base = self.staging.len() as u32;
        self.staging.extend_from_slice(vertices);
    }

    fn use_program(&mut self, program: Option<Program>) {
        self.program = program;
    }

    fn bind_atlas(&mut self, bound: bool) {
        self.atlas_bound = bound;
    }

    fn set_blend(&mut self, enabled: bool) {
        self.blend = enabled;
    }

    fn draw_triangles(&mut self, count: u32) {
        let Some(program) = self.program else {
            warn!("draw of {} vertices with no program bound", count);
            return;
        };
        if program == Program::Textured && !self.atlas_bound {
            warn!("textured draw with no atlas bound");
        }
        let start = self.upload_base;
        self.draws.push(DrawCmd {
            key: PipelineKey {
                program,
                blend: self.blend,
            },
            vertices: start..start + count,
        });
    }
}

/// # Safety
/// `ctx` must be the pointer the host registered with [Renderer::entries], and no other reference
/// to that renderer may be live for the duration of the call.
unsafe fn renderer<'a>(ctx: *mut c_void) -> &'a mut Renderer {
    // SAFETY: upheld by the caller.
    unsafe { &mut *ctx.cast::<Renderer>() }
}

// SAFETY (all entries below): the host only hands out these entries paired with its renderer, and
// module calls happen on the event loop thread while the renderer is otherwise idle.

extern "C" fn viewport(ctx: *mut c_void, width: i32, height: i32) {
    unsafe { renderer(ctx) }.viewport(width, height);
}

extern "C" fn clear(ctx: *mut c_void, r: f32, g: f32, b: f32, a: f32) {
    unsafe { renderer(ctx) }.clear([r, g, b, a]);
}

extern "C" fn upload_atlas(
    ctx: *mut c_void,
    width: u32,
    height: u32,
    pixels: *const u8,
    len: usize,
) {
    let pixels = unsafe { raw_slice(pixels, len) };
    unsafe { renderer(ctx) }.upload_atlas(width, height, pixels);
}

extern "C" fn upload_vertices(ctx: *mut c_void, vertices: *const Vertex, count: usize) {
    let vertices = unsafe { raw_slice(vertices, count) };
    unsafe { renderer(ctx) }.upload_vertices(vertices);
}

extern "C" fn use_program(ctx: *mut c_void, program: u32) {
    unsafe { renderer(ctx) }.use_program(Program::from_raw(program));
}

extern "C" fn bind_atlas(ctx: *mut c_void, bound: bool) {
    unsafe { renderer(ctx) }.bind_atlas(bound);
}

extern "C" fn set_blend(ctx: *mut c_void, enabled: bool) {
    unsafe { renderer(ctx) }.set_blend(enabled);
}

extern "C" fn draw_triangles(ctx: *mut c_void, count: u32) {
    unsafe { renderer(ctx) }.draw_triangles(count);
}

#[cfg(test)]
mod tests {
    use nalgebra::{point, Point3};

    use super::*;

    #[test]
    fn zero_area_window_has_no_projection() {
        assert_eq!(projection(0, 0), None);
        assert_eq!(projection(640, 0), None);
        assert_eq!(projection(0, 480), None);
        assert_eq!(projection(-1, 480), None);
    }

    #[test]
    fn projection_maps_window_corners_to_clip_space() {
        let Some(projection) = projection(640, 480) else {
            panic!("a 640x480 window has a projection");
        };
        let close = |p: Point3<f32>, expected: Point3<f32>| {
            (projection.transform_point(&p) - expected).norm() < 1e-6
        };

        assert!(close(point![0.0, 0.0, 0.0], point![-1.0, -1.0, 0.0]));
        assert!(close(point![640.0, 480.0, 0.0], point![1.0, 1.0, 0.0]));
    }

    #[test]
    fn atlas_is_sampled_as_srgb() {
        assert!(ATLAS_FORMAT.is_srgb());
    }
}
