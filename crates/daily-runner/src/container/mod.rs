// Container module - the scraper image and the docker CLI wrapper.

pub mod container_info;
pub mod docker_command_manager;

pub use container_info::{BindMount, ContainerInfo};
pub use docker_command_manager::DockerCommandManager;
