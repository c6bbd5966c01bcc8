pub mod archive;
pub mod command;
pub mod commands;
pub mod controller;
pub mod diagnostic;
pub mod error;
pub mod input;
pub mod outcome;
pub mod registry;
pub mod replay;
pub mod workdir;

pub use error::{ForgeError, Result};
pub use input::StepInputs;
pub use outcome::{Outcome, Projection, ValidationMessage};
pub use registry::CommandRegistry;
