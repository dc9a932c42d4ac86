pub mod analyse;
pub mod collab;
pub mod eval_host;
pub mod frame;
pub mod interpolate;
pub mod manager;
mod process;
pub mod resources;

pub use analyse::{analyse, Analyser, Position};
pub use collab::{Choice, FileAccess, NullOutput, Output, TimerAction};
pub use frame::{CustomData, Frame};
pub use manager::Manager;
pub use resources::Resources;
