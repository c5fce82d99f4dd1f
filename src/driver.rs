//! The winit application: window and GPU setup, the per-frame loop, input
//! dispatch and delivery of asset loading results.
//!
//! Everything that touches the scene runs on the event-loop thread. Asset
//! loading runs on the tokio runtime natively and on the browser's executor
//! on the web; its progress and results come back as [`ViewerEvent`]s through
//! an [`EventLoopProxy`].

use std::sync::Arc;

use futures::StreamExt;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, KeyEvent, MouseButton, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::{AssetConfig, ViewerConfig},
    context::Context,
    controls::OrbitControls,
    data_structures::model::{DrawModel, DrawShadow},
    debug::DebugPanel,
    loading::{LoadingIndicator, PlatformOverlay},
    resources::{
        self,
        loader::{self, LoadEvent, LoadedAssets},
    },
    scene::Scene,
    viewport::Viewport,
};

const TITLE: &str = "orbit-viewer";

pub enum ViewerEvent {
    /// The GPU context finished initializing on the web.
    #[cfg(target_arch = "wasm32")]
    Initialized(Box<Viewer>),
    Load(LoadEvent),
    Assets(Box<LoadedAssets>),
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Load(event) => f.debug_tuple("Load").field(event).finish(),
            Self::Assets(_) => f.write_str("Assets"),
        }
    }
}

/// Everything that exists once the window has a GPU context.
pub struct Viewer {
    ctx: Context,
    viewport: Viewport,
    scene: Scene,
    controls: OrbitControls,
    indicator: LoadingIndicator<PlatformOverlay>,
    debug: DebugPanel,
    assets: AssetConfig,
    cursor: Option<PhysicalPosition<f64>>,
    started: Instant,
    is_surface_configured: bool,
}

impl Viewer {
    async fn new(window: Arc<Window>, cfg: ViewerConfig) -> anyhow::Result<Self> {
        let viewport = Viewport::from_physical(window.inner_size(), window.scale_factor());

        #[cfg(not(target_arch = "wasm32"))]
        let overlay = crate::loading::TitleOverlay::new(window.clone(), TITLE);
        #[cfg(target_arch = "wasm32")]
        let overlay = crate::loading::DomOverlay::default();

        let ctx = Context::new(window, &cfg, &viewport).await?;
        let scene = Scene::new(&ctx.device, &cfg.scene, &ctx.white, &ctx.material_layout);
        let controls = OrbitControls::new(cfg.controls.clone(), cfg.camera.target);
        let mut debug = DebugPanel::new(&cfg.sun, &cfg.fog);
        debug.show();

        Ok(Self {
            ctx,
            viewport,
            scene,
            controls,
            indicator: LoadingIndicator::new(overlay, Duration::from_millis(cfg.indicator_fade_millis)),
            debug,
            assets: cfg.assets,
            cursor: None,
            started: Instant::now(),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self) {
        let window = self.ctx.window();
        self.viewport = Viewport::from_physical(window.inner_size(), window.scale_factor());
        self.is_surface_configured = !self.viewport.is_empty();
        self.ctx.resize(&self.viewport);
    }

    fn pick(&mut self, position: PhysicalPosition<f64>) {
        let ndc = self.viewport.normalize_physical(position);
        self.scene.pick(
            &self.ctx.device,
            ndc,
            &self.ctx.camera.camera,
            &self.ctx.projection,
        );
    }

    fn on_load_event(&mut self, event: LoadEvent) {
        self.indicator.on_event(&event, Instant::now());
    }

    fn on_assets(&mut self, assets: LoadedAssets) {
        if let Some(model) = &assets.model {
            self.scene.attach_model(&self.ctx.device, model);
        }
        if let Some(image) = &assets.texture {
            let texture = resources::texture::load_texture(
                image,
                &self.assets.texture,
                &self.ctx.device,
                &self.ctx.queue,
            );
            self.scene
                .apply_texture(&self.ctx.device, texture, &self.ctx.material_layout);
        }
    }

    fn on_key(&mut self, key: &winit::keyboard::Key) {
        if self.debug.handle_key(key) {
            self.debug.apply(&mut self.ctx.light.uniform);
            self.ctx.light.mark_dirty();
            self.debug.show();
        }
    }

    /// Advance the scene by one frame and draw it.
    fn frame(&mut self) -> Result<(), wgpu::CurrentSurfaceTexture> {
        let now = Instant::now();
        self.indicator.poll(now);
        self.controls.update(
            &mut self.ctx.camera.camera,
            &self.ctx.projection,
            &self.viewport,
        );
        self.scene
            .animate(now.duration_since(self.started).as_secs_f32());
        self.scene.update(&self.ctx.queue);
        self.ctx.camera.write(&self.ctx.queue, &self.ctx.projection);
        self.ctx.light.write(&self.ctx.queue);
        self.render()
    }

    fn render(&self) -> Result<(), wgpu::CurrentSurfaceTexture> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(t) | wgpu::CurrentSurfaceTexture::Suboptimal(t) => t,
            other => return Err(other),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let batches = self.scene.render().into_batches();

        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.light.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            shadow_pass.set_pipeline(&self.ctx.pipelines.shadow);
            for drawable in batches.shadow_casters() {
                shadow_pass.set_vertex_buffer(1, drawable.instance.slice(..));
                shadow_pass.draw_model_shadow(drawable.model, 0..1, &self.ctx.light.shadow_bind_group);
            }
        }

        {
            // with multisampling, draw into the msaa target and resolve into the surface
            let (target, resolve_target, store) = match &self.ctx.msaa_target {
                Some(msaa) => (msaa, Some(&view), wgpu::StoreOp::Discard),
                None => (&view, None, wgpu::StoreOp::Store),
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            for (pipeline, drawables) in [
                (&self.ctx.pipelines.backside, &batches.backs),
                (&self.ctx.pipelines.lit, &batches.fronts),
            ] {
                render_pass.set_pipeline(pipeline);
                for drawable in drawables {
                    render_pass.set_vertex_buffer(1, drawable.instance.slice(..));
                    render_pass.draw_model_instanced(
                        drawable.model,
                        0..1,
                        &self.ctx.camera.bind_group,
                        &self.ctx.light.bind_group,
                    );
                }
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Load the static assets, forwarding progress to the event loop, then hand
/// over the results.
async fn load(assets: AssetConfig, proxy: EventLoopProxy<ViewerEvent>) {
    let (tx, mut rx) = futures::channel::mpsc::unbounded();
    let forward = async {
        while let Some(event) = rx.next().await {
            if proxy.send_event(ViewerEvent::Load(event)).is_err() {
                log::warn!("event loop closed while loading");
                break;
            }
        }
    };
    let (loaded, ()) = futures::join!(loader::load_assets(&assets, tx), forward);
    if proxy.send_event(ViewerEvent::Assets(Box::new(loaded))).is_err() {
        log::warn!("event loop closed before the assets arrived");
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    viewer: Option<Viewer>,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            viewer: None,
        })
    }

    /// Take over a freshly initialized viewer and start loading the assets.
    fn start(&mut self, mut viewer: Viewer) {
        viewer.resize();
        viewer.ctx.window().request_redraw();

        let task = load(self.config.assets.clone(), self.proxy.clone());
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.async_runtime.spawn(task);
        }
        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(task);
        }

        log::info!("viewer initialized");
        self.viewer = Some(viewer);
    }
}

#[cfg(target_arch = "wasm32")]
fn canvas() -> anyhow::Result<web_sys::HtmlCanvasElement> {
    use anyhow::Context as _;
    use wasm_bindgen::JsCast;

    const CANVAS_ID: &str = "canvas";

    web_sys::window()
        .and_then(|window| window.document())
        .context("no document")?
        .get_element_by_id(CANVAS_ID)
        .with_context(|| format!("no element with id {}", CANVAS_ID))?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| anyhow::anyhow!("#{} is not a canvas", CANVAS_ID))
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(TITLE);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            match canvas() {
                Ok(canvas) => window_attributes = window_attributes.with_canvas(Some(canvas)),
                Err(e) => {
                    log::error!("cannot find the canvas: {:#}", e);
                    event_loop.exit();
                    return;
                }
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let init = Viewer::new(window, self.config.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init) {
                Ok(viewer) => self.start(viewer),
                Err(e) => {
                    log::error!("viewer initialization failed: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init.await {
                    Ok(viewer) => {
                        if proxy
                            .send_event(ViewerEvent::Initialized(Box::new(viewer)))
                            .is_err()
                        {
                            log::error!("event loop closed during initialization");
                        }
                    }
                    Err(e) => log::error!("viewer initialization failed: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        log::debug!("{:?}", event);
        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(viewer) => self.start(*viewer),
            ViewerEvent::Load(event) => match &mut self.viewer {
                Some(viewer) => viewer.on_load_event(event),
                None => log::warn!("load event before initialization: {:?}", event),
            },
            ViewerEvent::Assets(assets) => match &mut self.viewer {
                Some(viewer) => viewer.on_assets(*assets),
                None => log::warn!("assets arrived before initialization"),
            },
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let viewer = match &mut self.viewer {
            Some(viewer) => viewer,
            None => return,
        };

        viewer.controls.handle_window_events(&event, &viewer.viewport);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => viewer.resize(),
            WindowEvent::RedrawRequested => {
                // schedule the next frame
                viewer.ctx.window().request_redraw();
                match viewer.frame() {
                    Ok(()) => {}
                    Err(wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated) => viewer.resize(),
                    Err(e) => log::error!("Unable to render {:?}", e),
                }
            }
            WindowEvent::CursorMoved { position, .. } => viewer.cursor = Some(position),
            WindowEvent::CursorLeft { .. } => viewer.cursor = None,
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(position) = viewer.cursor {
                    viewer.pick(position);
                }
            }
            WindowEvent::Touch(Touch {
                phase: TouchPhase::Started,
                location,
                ..
            }) => viewer.pick(location),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        logical_key,
                        ..
                    },
                ..
            } => viewer.on_key(&logical_key),
            _ => {}
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            eprintln!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)?;
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, ViewerConfig::default())?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
