pub mod config;
pub mod filter;
pub mod geolocation;
pub mod map;
pub mod project;
pub mod remote;
pub mod session;
pub mod source;

pub use map::map_event::MapEvent;
pub use project::{Category, Project, ProjectId, Status};
pub use session::{MapSession, MapView};
