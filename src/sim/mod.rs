pub mod catalog;
pub mod dialogue;
pub mod event;
pub mod level;
pub mod maps;
pub mod party;
pub mod save;
pub mod scenes;
pub mod step;
pub mod world;
