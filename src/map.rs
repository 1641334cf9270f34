/// Coordinates and bounding boxes.
pub mod coordinates;
/// Great-circle distances.
pub mod distance;
/// User actions sent from the rendering surface.
pub mod map_event;
/// Marker derivation.
pub mod markers;
/// Viewport commands.
pub mod viewport;
