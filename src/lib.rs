pub mod app;
pub mod assets;
pub mod camera3d;
pub mod cli;
pub mod config;
pub mod gizmo;
pub mod input;
pub mod mesh;
pub mod mesh_registry;
pub mod picking;
pub mod props;
pub mod renderer;
pub mod scene;
pub mod session;
pub mod slime;
pub mod time;

pub use app::{run, run_with_overrides, App};
