use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::errors::{CodedError, GPU_ADAPTER_UNAVAILABLE};
use crate::sampler::FrameTarget;
use crate::scene::{
    checkerboard, view_projection, LightKind, Scene, TriangleInstance, AMBIENT_LEVEL,
    MATERIAL_SHININESS,
};
use crate::schema::{RendererInfo, TextureMode};
use crate::settings::{BackendPreference, Resolution};

const SCENE_SHADER: &str = r#"
struct Light {
  position: vec4<f32>,
  // xyz: spot direction, w: cos(cutoff), or -2 for point lights
  direction: vec4<f32>,
  // rgb: diffuse color, a: spot exponent
  color: vec4<f32>,
}

struct SceneUniform {
  view_proj: mat4x4<f32>,
  // x: light count
  params: vec4<u32>,
  // x: ambient level, y: shininess
  material: vec4<f32>,
  lights: array<Light, 3>,
}

@group(0) @binding(0) var<uniform> scene: SceneUniform;
@group(0) @binding(1) var triangle_tex: texture_2d<f32>;
@group(0) @binding(2) var triangle_sampler: sampler;

struct VertexInput {
  @location(0) position: vec3<f32>,
  @location(1) uv: vec2<f32>,
}

struct InstanceInput {
  @location(2) offset: vec3<f32>,
  @location(3) rotation_degrees: f32,
  @location(4) color: vec3<f32>,
  @location(5) size: f32,
}

struct VertexOutput {
  @builtin(position) clip: vec4<f32>,
  @location(0) world: vec3<f32>,
  @location(1) normal: vec3<f32>,
  @location(2) uv: vec2<f32>,
  @location(3) color: vec3<f32>,
}

@vertex
fn vs_main(vert: VertexInput, inst: InstanceInput) -> VertexOutput {
  let angle = inst.rotation_degrees * 0.017453292;
  let c = cos(angle);
  let s = sin(angle);
  let p = vert.position * inst.size;
  let rotated = vec3<f32>(p.x * c + p.z * s, p.y, p.z * c - p.x * s);
  let world = rotated + inst.offset;

  var out: VertexOutput;
  out.clip = scene.view_proj * vec4<f32>(world, 1.0);
  out.world = world;
  out.normal = vec3<f32>(s, 0.0, c);
  out.uv = vert.uv;
  out.color = inst.color;
  return out;
}

@fragment
fn fs_main(frag: VertexOutput, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
  let base = frag.color * textureSample(triangle_tex, triangle_sampler, frag.uv).rgb;
  let count = scene.params.x;
  if count == 0u {
    return vec4<f32>(base, 1.0);
  }

  var n = normalize(frag.normal);
  if !front {
    n = -n;
  }
  let view_dir = normalize(vec3<f32>(0.0, 0.0, 5.0) - frag.world);

  var lit = base * scene.material.x;
  for (var i = 0u; i < count; i = i + 1u) {
    let light = scene.lights[i];
    let to_light = normalize(light.position.xyz - frag.world);

    var attenuation = 1.0;
    if light.direction.w > -1.5 {
      let spot_cos = dot(-to_light, normalize(light.direction.xyz));
      if spot_cos < light.direction.w {
        attenuation = 0.0;
      } else {
        attenuation = pow(spot_cos, light.color.a);
      }
    }

    let diffuse = max(dot(n, to_light), 0.0);
    let half_vec = normalize(to_light + view_dir);
    let specular = select(0.0, pow(max(dot(n, half_vec), 0.0), scene.material.y), diffuse > 0.0);
    lit = lit + attenuation * (base * light.color.rgb * diffuse + light.color.rgb * specular);
  }

  return vec4<f32>(min(lit, vec3<f32>(1.0, 1.0, 1.0)), 1.0);
}
"#;

const MAX_LIGHTS: usize = 3;
const POINT_LIGHT_MARKER: f32 = -2.0;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
}

const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex {
        position: [0.0, 1.0, 0.0],
        uv: [0.5, 0.0],
    },
    Vertex {
        position: [-1.0, -1.0, 0.0],
        uv: [0.0, 1.0],
    },
    Vertex {
        position: [1.0, -1.0, 0.0],
        uv: [1.0, 1.0],
    },
];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct InstanceRaw {
    offset: [f32; 3],
    rotation_degrees: f32,
    color: [f32; 3],
    size: f32,
}

impl From<&TriangleInstance> for InstanceRaw {
    fn from(triangle: &TriangleInstance) -> Self {
        Self {
            offset: triangle.offset,
            rotation_degrees: triangle.rotation_degrees,
            color: triangle.color,
            size: triangle.size,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LightUniform {
    position: [f32; 4],
    direction: [f32; 4],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    params: [u32; 4],
    material: [f32; 4],
    lights: [LightUniform; MAX_LIGHTS],
}

impl SceneUniform {
    fn for_scene(scene: &Scene, aspect: f32) -> Self {
        let mut lights = [LightUniform::zeroed(); MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(scene.lights.iter()) {
            let [px, py, pz] = light.position;
            let [r, g, b] = light.diffuse;
            let (direction, exponent) = match light.kind {
                LightKind::Point => ([0.0, 0.0, -1.0, POINT_LIGHT_MARKER], 0.0),
                LightKind::Spot {
                    direction: [dx, dy, dz],
                    cutoff_degrees,
                    exponent,
                } => ([dx, dy, dz, cutoff_degrees.to_radians().cos()], exponent),
            };
            *slot = LightUniform {
                position: [px, py, pz, 1.0],
                direction,
                color: [r, g, b, exponent],
            };
        }

        Self {
            view_proj: view_projection(aspect),
            params: [scene.lights.len().min(MAX_LIGHTS) as u32, 0, 0, 0],
            material: [AMBIENT_LEVEL, MATERIAL_SHININESS, 0.0, 0.0],
            lights,
        }
    }
}

struct SampledTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct Readback {
    buffer: wgpu::Buffer,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

/// Headless renderer drawing one benchmark [`Scene`] per frame into an
/// offscreen color + depth target.
pub struct SceneRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: RendererInfo,
    width: u32,
    height: u32,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instance_scratch: Vec<InstanceRaw>,
    textures: HashMap<TextureMode, SampledTexture>,
    bind_group: Option<wgpu::BindGroup>,
    scene: Option<Scene>,
    readback: Option<Readback>,
}

/// First adapter found for the preferred backends, in order.
pub async fn request_adapter(preference: BackendPreference) -> Result<wgpu::Adapter> {
    for backends in preference.candidates() {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await;
        if let Some(adapter) = adapter {
            return Ok(adapter);
        }
    }

    Err(anyhow::Error::new(CodedError::runtime(
        GPU_ADAPTER_UNAVAILABLE,
        format!("no suitable GPU adapter found (backend preference {preference:?})"),
    )))
}

impl SceneRenderer {
    pub async fn new(preference: BackendPreference, resolution: &Resolution) -> Result<Self> {
        let adapter = request_adapter(preference).await?;
        Self::with_adapter(adapter, resolution).await
    }

    pub async fn with_adapter(adapter: wgpu::Adapter, resolution: &Resolution) -> Result<Self> {
        let width = resolution.width;
        let height = resolution.height;
        let adapter_info = adapter.get_info();
        let info = RendererInfo {
            adapter: adapter_info.name.clone(),
            backend: format!("{:?}", adapter_info.backend).to_ascii_lowercase(),
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("glbench-device"),
                    required_features: wgpu::Features::empty(),
                    // GL adapters cannot meet the full default limits.
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .context("failed to request wgpu device")?;

        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glbench-color-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glbench-depth-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("glbench-scene-bind-group-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<SceneUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("glbench-scene-shader"),
            source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glbench-scene-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glbench-scene-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x3,
                            3 => Float32,
                            4 => Float32x3,
                            5 => Float32
                        ],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glbench-triangle-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glbench-scene-uniform"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glbench-triangle-vertices"),
            contents: bytemuck::cast_slice(&TRIANGLE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_capacity = 1;
        let instance_buffer = create_instance_buffer(&device, instance_capacity);

        Ok(Self {
            device,
            queue,
            info,
            width,
            height,
            color_texture,
            color_view,
            depth_view,
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            vertex_buffer,
            instance_buffer,
            instance_capacity,
            instance_scratch: Vec::new(),
            textures: HashMap::new(),
            bind_group: None,
            scene: None,
            readback: None,
        })
    }

    pub fn info(&self) -> &RendererInfo {
        &self.info
    }

    /// Replaces the scene drawn by subsequent frames.
    pub fn load_scene(&mut self, scene: Scene) -> Result<()> {
        let texture_mode = scene.config.texture_mode;
        if !self.textures.contains_key(&texture_mode) {
            let texture = create_sampled_texture(&self.device, &self.queue, texture_mode)?;
            self.textures.insert(texture_mode, texture);
        }
        let texture_view = &self
            .textures
            .get(&texture_mode)
            .ok_or_else(|| anyhow!("texture {} was not created", texture_mode))?
            .view;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("glbench-scene-bind-group-{}", texture_mode)),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let aspect = self.width as f32 / self.height as f32;
        let uniform = SceneUniform::for_scene(&scene, aspect);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let needed = scene.triangles.len().max(1);
        if needed > self.instance_capacity {
            self.instance_capacity = needed.next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.instance_capacity);
        }

        self.bind_group = Some(bind_group);
        self.scene = Some(scene);
        Ok(())
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Encodes and submits one frame, then blocks until the GPU is done.
    pub fn draw(&mut self) -> Result<()> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| anyhow!("render called before a scene was loaded"))?;
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| anyhow!("render called before a scene was loaded"))?;

        self.instance_scratch.clear();
        self.instance_scratch
            .extend(scene.triangles.iter().map(InstanceRaw::from));
        let instance_count = self.instance_scratch.len() as u32;
        if instance_count > 0 {
            self.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&self.instance_scratch),
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glbench-frame-encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glbench-frame-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if instance_count > 0 {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                render_pass.draw(0..TRIANGLE_VERTICES.len() as u32, 0..instance_count);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    /// Draws a frame and reads the color target back as tightly packed RGBA.
    pub fn render_frame_rgba(&mut self) -> Result<Vec<u8>> {
        self.draw()?;

        if self.readback.is_none() {
            self.readback = Some(create_readback(&self.device, self.width, self.height)?);
        }
        let readback = self
            .readback
            .as_ref()
            .ok_or_else(|| anyhow!("readback buffer missing"))?;

        let padded_bytes_per_row = NonZeroU32::new(readback.padded_bytes_per_row)
            .ok_or_else(|| anyhow!("invalid padded row size {}", readback.padded_bytes_per_row))?;
        let rows_per_image = NonZeroU32::new(self.height)
            .ok_or_else(|| anyhow!("invalid render height {}", self.height))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glbench-readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback.buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row.get()),
                    rows_per_image: Some(rows_per_image.get()),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = readback.buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| anyhow!("failed receiving GPU map callback"))?
            .context("GPU buffer mapping failed")?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = readback.unpadded_bytes_per_row as usize;
        let mut frame = Vec::with_capacity(row_bytes * self.height as usize);
        for chunk in mapped
            .chunks(readback.padded_bytes_per_row as usize)
            .take(self.height as usize)
        {
            frame.extend_from_slice(&chunk[..row_bytes]);
        }

        drop(mapped);
        readback.buffer.unmap();
        Ok(frame)
    }
}

impl FrameTarget for SceneRenderer {
    fn advance(&mut self, delta: Duration) {
        if let Some(scene) = &mut self.scene {
            scene.advance(delta.as_secs_f32());
        }
    }

    fn render_frame(&mut self) -> Result<()> {
        self.draw()
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("glbench-triangle-instances"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_sampled_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mode: TextureMode,
) -> Result<SampledTexture> {
    // Untextured scenes sample a single white texel.
    let image = checkerboard(mode)
        .unwrap_or_else(|| image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])));
    let (width, height) = image.dimensions();

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("glbench-texture-{}", mode)),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let bytes_per_row = NonZeroU32::new(width.saturating_mul(4))
        .ok_or_else(|| anyhow!("texture {} has invalid width {}", mode, width))?;
    let rows_per_image = NonZeroU32::new(height)
        .ok_or_else(|| anyhow!("texture {} has invalid height {}", mode, height))?;

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_row.get()),
            rows_per_image: Some(rows_per_image.get()),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(SampledTexture {
        _texture: texture,
        view,
    })
}

fn create_readback(device: &wgpu::Device, width: u32, height: u32) -> Result<Readback> {
    let unpadded_bytes_per_row = width
        .checked_mul(4)
        .ok_or_else(|| anyhow!("frame width overflow when computing row bytes"))?;
    let padded_bytes_per_row = align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("glbench-readback-buffer"),
        size: u64::from(padded_bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    Ok(Readback {
        buffer,
        unpadded_bytes_per_row,
        padded_bytes_per_row,
    })
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
