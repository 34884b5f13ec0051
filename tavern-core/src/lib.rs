//! The playback clock engine and the primitives shared by the rest of tavern.

mod config;
mod error;
mod playback;
mod queuing;
mod scope;
mod track;
mod util;

pub use config::*;
pub use error::*;
pub use playback::*;
pub use queuing::*;
pub use scope::*;
pub use track::*;
pub use util::*;
