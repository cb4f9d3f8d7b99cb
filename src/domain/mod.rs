pub mod agents;
pub mod entity;
pub mod field;
pub mod glyphs;
pub mod intent;
pub mod maze;
pub mod trade;
