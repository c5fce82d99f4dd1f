//! Render pipelines: the lit pipeline (front and back face variants) and the
//! depth-only shadow pipeline.

pub mod basic;
pub mod light;
pub mod shadow;

#[derive(Debug)]
pub struct Pipelines {
    pub lit: wgpu::RenderPipeline,
    pub backside: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
}
