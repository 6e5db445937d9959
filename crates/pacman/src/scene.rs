//! Scene orchestration: entity simulation and the two-pass frame
//!
//! The scene owns the maze, the player, the ghosts and every GPU resource they
//! draw with. Each frame runs in two phases:
//!
//! 1. [`Scene::update`] moves the player, then every ghost, against the maze
//!    walls, respawns caught ghosts and refreshes the light offsets.
//! 2. [`Scene::render`] uploads the lighting block and per-object uniforms,
//!    records and submits the shadow cube-map pass, then records the main pass
//!    and submits it waiting on the shadow pass.
//!
//! Ghosts write only their own light slot during the update; the bulk upload
//! happens in `render`, after every entity has moved.

use ash::vk;
use maze_engine::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use maze_engine::render::device::AllocatedBuffer;
use maze_engine::render::renderable::{OBJECT_UNIFORM_BINDING, SCENE_UNIFORM_BINDING, SHADOW_MAP_BINDING};
use maze_engine::render::{
    LightTable, MainPass, MainPassTarget, Mesh, Owned, PlanarExtents, RenderObject, Renderable,
    SceneUniform, ShaderStages, ShadowRenderer, ShadowSettings, SharedBindings, SharedDevice, MAX_LIGHTS,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{GameConfig, GraphicsConfig};
use crate::error::{GameError, GameResult};
use crate::ghost::{Ghost, GhostSettings, GHOST_COLORS};
use crate::input::KeyEvent;
use crate::maze::Maze;
use crate::moveable::{Embodied, Moveable};
use crate::player::Player;

/// Player sphere color
const PLAYER_COLOR: [f32; 4] = [1.0, 1.0, 0.0, 1.0];

/// Player sphere radius in world units
const PLAYER_SCALE: f32 = 15.0;

/// Half the ghost cube edge in world units
const GHOST_SCALE: f32 = 10.0;

/// Perspective camera looking at the maze
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    eye: Vec3,
    target: Vec3,
    fov_y: f32,
    near: f32,
    far: f32,
    aspect: f32,
}

impl Camera {
    /// Camera from the graphics settings, sized for `extent`
    pub fn new(graphics: &GraphicsConfig, extent: vk::Extent2D) -> Self {
        let mut camera = Self {
            eye: Vec3::from(graphics.camera_eye),
            target: Vec3::from(graphics.camera_target),
            fov_y: utils::deg_to_rad(graphics.fov_degrees),
            near: graphics.z_near,
            far: graphics.z_far,
            aspect: 1.0,
        };
        camera.set_extent(extent);
        camera
    }

    /// Match the aspect ratio of a new render target
    pub fn set_extent(&mut self, extent: vk::Extent2D) {
        self.aspect = extent.width as f32 / extent.height.max(1) as f32;
    }

    /// Projection including the Vulkan axis flip
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far) * Mat4::vulkan_coordinate_transform()
    }

    /// View matrix
    pub fn view(&self) -> Mat4 {
        Mat4::look_at(self.eye, self.target, Vec3::y())
    }
}

/// An entity together with the GPU object it is drawn with
pub struct Actor<T> {
    entity: T,
    object: RenderObject,
}

impl<T> Actor<T> {
    /// The simulated entity
    pub fn entity(&self) -> &T {
        &self.entity
    }
}

impl<T: Embodied> Renderable for Actor<T> {
    fn render_object(&self) -> &RenderObject {
        &self.object
    }

    fn model_matrix(&self) -> Mat4 {
        self.entity.body().model_matrix()
    }
}

struct MazeModel {
    maze: Maze,
    object: RenderObject,
}

impl Renderable for MazeModel {
    fn render_object(&self) -> &RenderObject {
        &self.object
    }

    fn model_matrix(&self) -> Mat4 {
        Mat4::identity()
    }
}

/// All entities and the resources of both render passes
pub struct Scene {
    // Field order is drop order: objects, passes, buffers, pool, layout
    ghosts: Vec<Actor<Ghost>>,
    player: Actor<Player>,
    maze: MazeModel,
    main_pass: MainPass,
    shadows: ShadowRenderer,
    scene_uniform: Owned<AllocatedBuffer>,
    _descriptor_pool: Owned<vk::DescriptorPool>,
    set_layout: Owned<vk::DescriptorSetLayout>,
    lights: LightTable,
    spawn_points: Vec<Vec3>,
    camera: Camera,
    rng: StdRng,
    device: SharedDevice,
}

impl Scene {
    /// Build the scene and every GPU resource it needs
    ///
    /// The player starts at the first spawn point and one ghost starts at each
    /// following point, up to the number of ghost colors. Any failure releases
    /// everything created so far.
    pub fn new(
        device: SharedDevice,
        maze: Maze,
        target: &MainPassTarget,
        shadow_shaders: ShaderStages<'_>,
        main_shaders: ShaderStages<'_>,
        config: &GameConfig,
    ) -> GameResult<Self> {
        let gameplay = &config.gameplay;
        let graphics = &config.graphics;
        let spawn_points = gameplay.spawn_positions();
        let Some(&player_spawn) = spawn_points.first() else {
            return Err(GameError::InvalidConfig("at least one spawn point is required".to_string()));
        };
        let ghost_spawns: Vec<Vec3> = spawn_points[1..].iter().copied().take(GHOST_COLORS.len()).collect();

        let set_layout = Owned::new(&device, device.create_descriptor_set_layout(&descriptor_bindings())?);
        let max_sets = 2 + ghost_spawns.len() as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 2 * max_sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: MAX_LIGHTS as u32 * max_sets,
            },
        ];
        let descriptor_pool = Owned::new(&device, device.create_descriptor_pool(&pool_sizes, max_sets)?);
        let scene_uniform = Owned::new(
            &device,
            device.create_buffer(
                std::mem::size_of::<SceneUniform>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?,
        );

        let shadows = ShadowRenderer::new(
            &device,
            ShadowSettings {
                map_size: graphics.shadow_map_size,
                near: graphics.z_near,
                far: graphics.z_far,
            },
            set_layout.get(),
            shadow_shaders,
        )?;
        let main_pass = MainPass::new(&device, target, set_layout.get(), main_shaders)?;

        let bindings = SharedBindings {
            pool: descriptor_pool.get(),
            layout: set_layout.get(),
            scene_uniform: scene_uniform.get(),
            shadow_maps: shadows.shadow_map_bindings(),
        };
        let mut lights = LightTable::new(shadows.projection());

        let maze_object = RenderObject::new(&device, &maze.mesh(), true, &bindings)?;

        let player_mesh = Mesh::sphere(1.0, 16, 24, Vec4::from(PLAYER_COLOR));
        let player = Actor {
            entity: Player::new(Moveable::new(
                footprint(&player_mesh, "player")?,
                player_spawn,
                Vec3::repeat(PLAYER_SCALE),
                gameplay.movement_speed,
            )),
            object: RenderObject::new(&device, &player_mesh, true, &bindings)?,
        };

        let settings = GhostSettings::from(gameplay);
        let mut ghosts = Vec::with_capacity(ghost_spawns.len());
        for (spawn, color) in ghost_spawns.iter().zip(GHOST_COLORS) {
            let color = Vec4::from(color);
            // Ghosts carry their light inside the cube, so they face inward and cast no shadow
            let mesh = Mesh::cube(2.0, color, true);
            let body = Moveable::new(footprint(&mesh, "ghost")?, *spawn, Vec3::repeat(GHOST_SCALE), gameplay.movement_speed);
            let slot = lights.claim_slot()?;
            let object = RenderObject::new(&device, &mesh, false, &bindings)?;
            ghosts.push(Actor {
                entity: Ghost::new(body, slot, color, settings, &mut lights),
                object,
            });
        }
        lights.refresh_offsets();

        let rng = match gameplay.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::info!(
            "Scene ready: {} walls, {} ghosts, {} lights",
            maze.walls().len(),
            ghosts.len(),
            lights.active_count()
        );

        Ok(Self {
            ghosts,
            player,
            maze: MazeModel { maze, object: maze_object },
            main_pass,
            shadows,
            scene_uniform,
            _descriptor_pool: descriptor_pool,
            set_layout,
            lights,
            spawn_points,
            camera: Camera::new(graphics, target.extent),
            rng,
            device,
        })
    }

    /// Route a key event to the player
    pub fn handle_input(&mut self, event: KeyEvent) {
        self.player.entity.handle_input(event);
    }

    /// Advance the simulation by `dt` milliseconds
    ///
    /// Every ghost overlapping the player afterwards is sent to a random spawn
    /// point, one draw per ghost. The player is never moved by a capture.
    pub fn update(&mut self, dt: f32) {
        let walls = self.maze.maze.walls();

        self.player.entity.update(dt, walls);
        let player_position = *self.player.entity.body().position();
        for ghost in &mut self.ghosts {
            ghost
                .entity
                .update(dt, walls, &player_position, &mut self.lights, &mut self.rng);
        }

        let player_rect = self.player.entity.body().collider();
        for ghost in &mut self.ghosts {
            if !ghost.entity.body().collider().overlaps(&player_rect) {
                continue;
            }
            if let Some(&point) = self.spawn_points.choose(&mut self.rng) {
                log::debug!("Ghost {} caught, respawning at {:?}", ghost.entity.light_index(), point);
                ghost.entity.respawn(point);
            }
        }

        self.lights.refresh_offsets();
    }

    /// Render one frame into target image `image_index`
    ///
    /// `image_available` is waited on before color output and
    /// `render_finished` is signalled when the main pass completes.
    pub fn render(
        &mut self,
        image_index: u32,
        image_available: Option<vk::Semaphore>,
        render_finished: Option<vk::Semaphore>,
    ) -> GameResult<()> {
        let device = self.device.as_ref();

        // The previous frame may still read the uniforms
        self.main_pass.wait_for_previous_frame(device)?;
        device.write_buffer(&self.scene_uniform.get(), bytemuck::bytes_of(&self.lights.uniform()))?;

        let mut renderables: Vec<&dyn Renderable> = Vec::with_capacity(2 + self.ghosts.len());
        renderables.push(&self.maze);
        renderables.push(&self.player);
        renderables.extend(self.ghosts.iter().map(|ghost| ghost as &dyn Renderable));

        let projection = self.camera.projection();
        let view = self.camera.view();
        for renderable in &renderables {
            renderable.update_uniform_buffer(&projection, &view)?;
        }

        self.shadows.record(device, self.lights.active_count(), &renderables)?;
        let shadows = self.shadows.submit(device)?;

        if let Err(e) = self.main_pass.record(device, image_index, &renderables) {
            shadows.release(device)?;
            return Err(e.into());
        }
        self.main_pass.submit(device, shadows, image_available, render_finished)?;
        log::trace!("Frame submitted to image {image_index}");
        Ok(())
    }

    /// Rebuild the main pass for a new render target, e.g. after a swapchain resize
    pub fn resize(&mut self, target: &MainPassTarget, main_shaders: ShaderStages<'_>) -> GameResult<()> {
        self.device.device_wait_idle()?;
        self.main_pass = MainPass::new(&self.device, target, self.set_layout.get(), main_shaders)?;
        self.camera.set_extent(target.extent);
        log::info!("Main pass rebuilt at {}x{}", target.extent.width, target.extent.height);
        Ok(())
    }

    /// The player
    pub fn player(&self) -> &Player {
        &self.player.entity
    }

    /// The ghosts, in light-slot order
    pub fn ghosts(&self) -> impl Iterator<Item = &Ghost> {
        self.ghosts.iter().map(Actor::entity)
    }

    /// Mutable access to ghost `index`
    pub fn ghost_mut(&mut self, index: usize) -> Option<&mut Ghost> {
        self.ghosts.get_mut(index).map(|ghost| &mut ghost.entity)
    }

    /// The maze
    pub fn maze(&self) -> &Maze {
        &self.maze.maze
    }

    /// The light table
    pub fn lights(&self) -> &LightTable {
        &self.lights
    }

    /// Spawn and respawn points
    pub fn spawn_points(&self) -> &[Vec3] {
        &self.spawn_points
    }

    /// The camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Uniform buffer holding the lighting block
    pub fn lighting_buffer(&self) -> vk::Buffer {
        self.scene_uniform.get().buffer
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if let Err(e) = self.device.device_wait_idle() {
            log::error!("Failed to wait for the device before releasing the scene: {e}");
        }
    }
}

/// Per-object set: object uniform, lighting block, shadow cube maps
fn descriptor_bindings() -> [vk::DescriptorSetLayoutBinding; 3] {
    [
        vk::DescriptorSetLayoutBinding::builder()
            .binding(OBJECT_UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .build(),
        vk::DescriptorSetLayoutBinding::builder()
            .binding(SCENE_UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .build(),
        vk::DescriptorSetLayoutBinding::builder()
            .binding(SHADOW_MAP_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(MAX_LIGHTS as u32)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .build(),
    ]
}

fn footprint(mesh: &Mesh, name: &'static str) -> GameResult<PlanarExtents> {
    mesh.planar_extents().ok_or(GameError::EmptyMesh(name))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use maze_engine::physics::collision::CollisionRect;
    use maze_engine::render::device::{AllocatedImage, ImageDesc, ImageViewDesc};
    use maze_engine::render::testing::{Call, RecordingDevice};

    use super::*;
    use crate::input::KeyEvent;
    use crate::moveable::Direction;

    const SPIRV: ShaderStages<'static> = ShaderStages {
        vertex: &[0x03, 0x02, 0x23, 0x07],
        fragment: &[0x03, 0x02, 0x23, 0x07],
    };

    struct Harness {
        recorder: Arc<RecordingDevice>,
        device: SharedDevice,
        views: Vec<Owned<vk::ImageView>>,
        _images: Vec<Owned<AllocatedImage>>,
    }

    impl Harness {
        fn new() -> Self {
            let recorder = Arc::new(RecordingDevice::new());
            let device: SharedDevice = recorder.clone();
            let extent = vk::Extent2D { width: 320, height: 200 };
            let mut images = Vec::new();
            let mut views = Vec::new();
            for _ in 0..2 {
                let image = Owned::new(
                    &device,
                    device
                        .create_image(&ImageDesc::attachment(extent, vk::Format::B8G8R8A8_SRGB, vk::ImageUsageFlags::COLOR_ATTACHMENT))
                        .unwrap(),
                );
                let view = device
                    .create_image_view(&ImageViewDesc {
                        image: image.get().image,
                        format: vk::Format::B8G8R8A8_SRGB,
                        view_type: vk::ImageViewType::TYPE_2D,
                        aspect: vk::ImageAspectFlags::COLOR,
                        layer_count: 1,
                    })
                    .unwrap();
                views.push(Owned::new(&device, view));
                images.push(image);
            }
            Self { recorder, device, views, _images: images }
        }

        fn target(&self) -> MainPassTarget {
            MainPassTarget {
                format: vk::Format::B8G8R8A8_SRGB,
                extent: vk::Extent2D { width: 320, height: 200 },
                views: self.views.iter().map(Owned::get).collect(),
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            }
        }

        fn scene(&self) -> GameResult<Scene> {
            Scene::new(self.device.clone(), maze(), &self.target(), SPIRV, SPIRV, &config())
        }
    }

    fn config() -> GameConfig {
        let mut config = GameConfig::default();
        config.gameplay.rng_seed = Some(42);
        config.graphics.shadow_map_size = 32;
        config
    }

    fn maze() -> Maze {
        Maze::from_walls(vec![
            CollisionRect::new(0.0, 0.0, 800.0, 20.0),
            CollisionRect::new(0.0, 780.0, 800.0, 20.0),
            CollisionRect::new(0.0, 20.0, 20.0, 760.0),
            CollisionRect::new(780.0, 20.0, 20.0, 760.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_entities_start_at_spawn_points() {
        let harness = Harness::new();
        let scene = harness.scene().unwrap();

        assert_eq!(*scene.player().body().position(), Vec3::new(350.0, 30.0, 400.0));
        let ghost_positions: Vec<Vec3> = scene.ghosts().map(|g| *g.body().position()).collect();
        assert_eq!(ghost_positions, scene.spawn_points()[1..].to_vec());
        let indices: Vec<usize> = scene.ghosts().map(Ghost::light_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(scene.lights().active_count(), 3);
        assert_eq!(scene.lights().light(0).unwrap().color, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_caught_ghost_respawns_and_player_stays() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        let player_position = *scene.player().body().position();
        scene.ghost_mut(1).unwrap().respawn(player_position + Vec3::new(5.0, 0.0, 5.0));

        scene.update(0.0);

        assert_eq!(*scene.player().body().position(), player_position);
        let ghost = scene.ghosts().nth(1).unwrap();
        assert!(scene.spawn_points().contains(ghost.body().position()));
        // Untouched ghosts stay where they started
        assert_eq!(*scene.ghosts().next().unwrap().body().position(), Vec3::new(100.0, 30.0, 100.0));
    }

    #[test]
    fn test_simultaneous_captures_are_independent() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        let player_position = *scene.player().body().position();
        for index in 0..3 {
            scene.ghost_mut(index).unwrap().respawn(player_position);
        }

        scene.update(0.0);

        for ghost in scene.ghosts() {
            assert!(scene.spawn_points().contains(ghost.body().position()));
        }
    }

    #[test]
    fn test_player_input_moves_player_only_in_open_space() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();

        scene.handle_input(KeyEvent::press(Direction::Up));
        scene.update(100.0);
        assert_eq!(*scene.player().body().position(), Vec3::new(350.0, 30.0, 375.0));

        // Walk into the top wall; the last step that would overlap is rejected
        for _ in 0..200 {
            scene.update(100.0);
        }
        let collider = scene.player().body().collider();
        assert!(collider.y >= 20.0);
        assert!(!collider.overlaps_any(scene.maze().walls()));
    }

    #[test]
    fn test_light_offsets_follow_ghosts() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        scene.update(16.0);

        for ghost in scene.ghosts() {
            let offset = scene.lights().offset(ghost.light_index()).unwrap();
            let moved = offset * ghost.body().position().push(1.0);
            assert!(moved.xyz().norm() < 1e-3);
        }
    }

    #[test]
    fn test_render_uploads_lighting_and_waits_on_shadows() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        scene.update(16.0);
        harness.recorder.clear_calls();

        scene.render(0, None, None).unwrap();

        let bytes = harness.recorder.buffer_contents(scene.lighting_buffer()).unwrap();
        let uniform: SceneUniform = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(uniform.light_count, 3);
        for ghost in scene.ghosts() {
            let expected: [f32; 4] = ghost.body().position().push(1.0).into();
            assert_eq!(uniform.light_positions[ghost.light_index()], expected);
        }

        let submits: Vec<Call> = harness
            .recorder
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Submit { .. }))
            .collect();
        assert_eq!(submits.len(), 2);
        match (&submits[0], &submits[1]) {
            (Call::Submit { signal, .. }, Call::Submit { wait, fence, .. }) => {
                assert_eq!(signal.len(), 1);
                assert_eq!(wait, signal);
                assert!(fence.is_some());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_shadow_pass_covers_every_light_face() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        harness.recorder.clear_calls();

        scene.render(1, None, None).unwrap();

        let copies: Vec<(u64, u32)> = harness
            .recorder
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CopyImage { dst, dst_layer, .. } => Some((dst, dst_layer)),
                _ => None,
            })
            .collect();
        // 3 ghost lights x 6 faces
        assert_eq!(copies.len(), 18);
        for chunk in copies.chunks(6) {
            let layers: Vec<u32> = chunk.iter().map(|(_, layer)| *layer).collect();
            assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
            assert!(chunk.iter().all(|(dst, _)| *dst == chunk[0].0));
        }
    }

    #[test]
    fn test_consecutive_frames_and_resize() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        for frame in 0..3 {
            scene.update(16.0);
            scene.render(frame % 2, None, None).unwrap();
        }

        scene.resize(&harness.target(), SPIRV).unwrap();
        scene.update(16.0);
        scene.render(0, None, None).unwrap();
        assert!(harness.recorder.errors().is_empty());
    }

    #[test]
    fn test_unknown_image_index_fails_without_leaking_the_shadow_signal() {
        let harness = Harness::new();
        let mut scene = harness.scene().unwrap();
        assert!(scene.render(7, None, None).is_err());
        // The shadow semaphore was consumed, so the next frame can signal it again
        scene.render(0, None, None).unwrap();
    }

    #[test]
    fn test_scene_releases_everything() {
        let harness = Harness::new();
        let baseline = harness.recorder.live_resource_count();
        {
            let mut scene = harness.scene().unwrap();
            scene.update(16.0);
            scene.render(0, None, None).unwrap();
        }
        assert_eq!(harness.recorder.live_resource_count(), baseline);
        assert!(harness.recorder.errors().is_empty());
        assert!(harness.recorder.calls().contains(&Call::DeviceWaitIdle));
    }

    #[test]
    fn test_failed_construction_leaks_nothing() {
        let mut built = false;
        for successes in 0..200 {
            let harness = Harness::new();
            let baseline = harness.recorder.live_resource_count();
            harness.recorder.fail_creation_after(successes);
            match harness.scene() {
                Ok(_) => {
                    built = true;
                    break;
                }
                Err(GameError::Vulkan(_)) => {
                    assert_eq!(harness.recorder.live_resource_count(), baseline, "after {successes} creations");
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(built);
    }

    #[test]
    fn test_missing_spawn_points_rejected() {
        let harness = Harness::new();
        let mut config = config();
        config.gameplay.spawn_points.clear();
        let result = Scene::new(harness.device.clone(), maze(), &harness.target(), SPIRV, SPIRV, &config);
        assert!(matches!(result, Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_camera_projection_tracks_extent() {
        let mut camera = Camera::new(&GraphicsConfig::default(), vk::Extent2D { width: 1280, height: 720 });
        let wide = camera.projection();
        camera.set_extent(vk::Extent2D { width: 720, height: 720 });
        let square = camera.projection();
        assert!(wide[(0, 0)] < square[(0, 0)]);

        // The maze center is in front of the camera
        let center = camera.view().transform_point(&nalgebra::Point3::new(400.0, 0.0, 400.0));
        assert!(center.z < 0.0);
    }
}
