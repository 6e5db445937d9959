//! Pacman game binary
//!
//! Opens the window, builds the Vulkan context and swapchain, then runs the
//! update/render loop until the window closes or Escape is pressed.

use std::path::{Path, PathBuf};

use ash::vk;
use glfw::{Action, Key, WindowEvent};
use maze_engine::config::Config;
use maze_engine::foundation::logging;
use maze_engine::foundation::time::Timer;
use maze_engine::render::vulkan::{Swapchain, VulkanContext, Window};
use maze_engine::render::{Owned, SharedDevice};
use pacman::input::key_event;
use pacman::{GameConfig, GameError, GameResult, Maze, Scene, ShaderLibrary};

/// Longest simulated step; slower frames are clamped so entities cannot tunnel through walls
const MAX_FRAME_MILLIS: f32 = 33.0;

const CONFIG_FILE: &str = "pacman.toml";

struct PacmanApp {
    // Drop order: scene and semaphores before the swapchain, everything before the context
    scene: Scene,
    image_available: Owned<vk::Semaphore>,
    render_finished: Owned<vk::Semaphore>,
    swapchain: Swapchain,
    shaders: ShaderLibrary,
    device: SharedDevice,
    context: VulkanContext,
    window: Window,
    timer: Timer,
}

impl PacmanApp {
    fn new(config: &GameConfig) -> GameResult<Self> {
        let window = Window::new(&config.window.title, config.window.width, config.window.height)
            .map_err(|e| GameError::Window(e.to_string()))?;
        let context = VulkanContext::new(&window, &config.window.title)?;
        let device = context.shared_device();

        let maze = Maze::load(resolve(&config.paths.level))?;
        let shaders = ShaderLibrary::load(resolve(&config.paths.shaders))?;

        let swapchain = Swapchain::new(&context, extent_of(&window), None)?;
        let image_available = Owned::new(&device, device.create_semaphore()?);
        let render_finished = Owned::new(&device, device.create_semaphore()?);

        let scene = Scene::new(
            device.clone(),
            maze,
            &swapchain.target(),
            shaders.shadow.stages(),
            shaders.scene.stages(),
            config,
        )?;

        Ok(Self {
            scene,
            image_available,
            render_finished,
            swapchain,
            shaders,
            device,
            context,
            window,
            timer: Timer::new(),
        })
    }

    fn run(&mut self) -> GameResult<()> {
        log::info!("Entering main loop");
        let mut needs_recreate = false;

        while !self.window.should_close() {
            for event in self.window.poll_events() {
                match event {
                    WindowEvent::Key(Key::Escape, _, Action::Press, _) => self.window.set_should_close(true),
                    WindowEvent::Key(key, _, action, _) => {
                        if let Some(event) = key_event(key, action) {
                            self.scene.handle_input(event);
                        }
                    }
                    WindowEvent::FramebufferSize(..) => needs_recreate = true,
                    _ => {}
                }
            }

            if needs_recreate {
                self.recreate_swapchain()?;
                needs_recreate = false;
            }

            self.timer.update();
            self.scene.update(self.timer.delta_millis().min(MAX_FRAME_MILLIS));

            let Some(image_index) = self.swapchain.acquire_next_image(self.image_available.get())? else {
                needs_recreate = true;
                continue;
            };
            self.scene.render(
                image_index,
                Some(self.image_available.get()),
                Some(self.render_finished.get()),
            )?;
            needs_recreate |= self.swapchain.present(image_index, self.render_finished.get())?;
        }

        self.device.device_wait_idle()?;
        log::info!(
            "Main loop finished after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> GameResult<()> {
        // Minimized windows have a zero-sized framebuffer
        while matches!(self.window.framebuffer_size(), (0, _) | (_, 0)) && !self.window.should_close() {
            self.window.wait_events();
        }
        self.device.device_wait_idle()?;

        let swapchain = Swapchain::new(&self.context, extent_of(&self.window), Some(&self.swapchain))?;
        self.scene.resize(&swapchain.target(), self.shaders.scene.stages())?;
        self.swapchain = swapchain;
        Ok(())
    }
}

fn extent_of(window: &Window) -> vk::Extent2D {
    let (width, height) = window.framebuffer_size();
    vk::Extent2D { width, height }
}

/// Paths are taken as given when they exist, else relative to the crate root
fn resolve(path: &str) -> PathBuf {
    let given = Path::new(path);
    if given.exists() || given.is_absolute() {
        given.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(given)
    }
}

fn run() -> GameResult<()> {
    let config = GameConfig::load_or_default(resolve(CONFIG_FILE))?;
    let mut app = PacmanApp::new(&config)?;
    app.run()
}

fn main() {
    logging::init();
    log::info!("Starting Pacman");

    if let Err(e) = run() {
        log::error!("Pacman failed: {e}");
        std::process::exit(1);
    }
}
