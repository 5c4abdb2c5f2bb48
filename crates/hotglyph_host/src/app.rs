use std::{
    fmt::Display,
    process,
    ptr::NonNull,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use hotglyph::{
    backend::BackendEntries,
    input::{InputEvent, InputTranslator},
    reload::{BackendSource, DylibLinker, Loader, ReloadPaths},
    render::Renderer,
    text::face::FaceRegistry,
};
use log::{error, info};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    window::{Window, WindowId},
};

use crate::{config::HostConfig, services::HostServices};

/// A heap value whose address is handed to the module as a context pointer. It never moves and
/// is freed on drop.
struct Pinned<T>(NonNull<T>);

impl<T> Pinned<T> {
    fn new(value: T) -> Self {
        Self(NonNull::from(Box::leak(Box::new(value))))
    }

    fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }

    fn get_mut(&mut self) -> &mut T {
        // SAFETY: the pointer came from a live box, and `&mut self` rules out other host borrows.
        unsafe { self.0.as_mut() }
    }
}

impl<T> Drop for Pinned<T> {
    fn drop(&mut self) {
        // SAFETY: created by `Box::leak` in `new` and not freed anywhere else.
        drop(unsafe { Box::from_raw(self.0.as_ptr()) });
    }
}

struct Running {
    // Dropped first: the module must be gone before the things it points at.
    loader: Loader<DylibLinker>,
    renderer: Pinned<Renderer>,
    _services: Pinned<HostServices>,
    window: Arc<Window>,
    input: InputTranslator,
}

impl Running {
    fn start(event_loop: &ActiveEventLoop, config: &HostConfig) -> Result<Self> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title(config.title.clone())
                    .with_inner_size(LogicalSize::new(config.width, config.height)),
            )?,
        );
        let renderer = Pinned::new(Renderer::new(window.clone())?);
        let services = Pinned::new(HostServices::new(FaceRegistry::new(
            config.font_dirs.clone(),
        )));

        let paths = ReloadPaths::beside_executable(&config.reload)
            .context("locating the module beside the executable")?;
        info!("watching {}", paths.artifact.display());

        let loader = Loader::new(
            DylibLinker,
            paths,
            HostServices::table(services.as_ptr()),
            BackendSource {
                ctx: renderer.as_ptr().cast(),
                primary: Renderer::entries(),
                fallback: BackendEntries::inert(),
            },
        );

        Ok(Self {
            loader,
            renderer,
            _services: services,
            input: InputTranslator::new(window.inner_size().height),
            window,
        })
    }

    fn frame(&mut self) {
        if let Err(err) = self.loader.poll() {
            fatal(anyhow::Error::from(err).context("reloading the module"));
        }

        let size = self.window.inner_size();
        self.loader.render(size.width as i32, size.height as i32);
        if let Err(err) = self.renderer.get_mut().end_frame() {
            error!("{:#}", err);
        }
    }
}

pub struct HostApp {
    config: HostConfig,
    running: Option<Running>,
    next_frame: Instant,
}

impl HostApp {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            running: None,
            next_frame: Instant::now(),
        }
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.config.frame_rate.max(1.0))
    }
}

impl ApplicationHandler for HostApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match Running::start(event_loop, &self.config) {
            Ok(mut running) => {
                // The first poll happens before any frame so a broken build fails at startup.
                if let Err(err) = running.loader.poll() {
                    fatal(anyhow::Error::from(err).context("loading the module"));
                }
                self.running = Some(running);
            }
            Err(err) => fatal(err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                running.renderer.get_mut().resize(size);
                running.input.translate(&event);
            }
            WindowEvent::RedrawRequested => running.frame(),
            _ => {
                for input in running.input.translate(&event) {
                    match input {
                        InputEvent::Mouse(mouse) => running.loader.mouse(mouse),
                        InputEvent::Character(codepoint) => running.loader.keyboard(codepoint),
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame {
            if let Some(running) = &self.running {
                running.window.request_redraw();
            }
            self.next_frame = now + self.frame_period();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}

fn fatal(err: impl Display) -> ! {
    error!("{:#}", err);
    process::exit(1);
}
