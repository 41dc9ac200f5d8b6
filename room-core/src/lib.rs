pub mod events;
pub mod frame;
pub mod media;
pub mod playback;
pub mod reactions;

pub use events::RoomEvent; // Re-export for convenience
pub use frame::Frame;
