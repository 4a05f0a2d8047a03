pub mod control;
pub mod entity;
pub mod grapple;
pub mod movement;
pub mod physics;
pub mod rect;
pub mod registry;
pub mod tile;
