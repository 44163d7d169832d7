mod clock;
mod error;
mod generator;
mod input;
mod matcher;
mod pitch;
mod scheduler;
mod score;
mod session;

pub use clock::*;
pub use error::*;
pub use generator::*;
pub use input::*;
pub use matcher::*;
pub use pitch::*;
pub use scheduler::*;
pub use score::*;
pub use session::*;
