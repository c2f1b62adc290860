pub mod controller;
pub mod idle;
pub mod registry;
pub mod selection;
pub mod track;
pub mod voice;
