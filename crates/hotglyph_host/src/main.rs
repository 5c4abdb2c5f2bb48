mod app;
mod config;
mod services;

use anyhow::Result;
use log::info;
use winit::event_loop::EventLoop;

use crate::{app::HostApp, config::HostConfig};

fn main() -> Result<()> {
    env_logger::init();

    let config = HostConfig::default()
        .with_title(concat!("hotglyph ", env!("CARGO_PKG_VERSION")))
        .with_framerate(60.0)
        .from_env();
    info!("font directories: {:?}", config.font_dirs);

    let event_loop = EventLoop::new()?;
    let mut app = HostApp::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
