pub mod forge;
pub mod health;
pub mod status;
