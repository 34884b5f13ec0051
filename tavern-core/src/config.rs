/// The configuration of the session coordinator
#[derive(Debug, Clone)]
pub struct Config {
    /// How far, in seconds, a client may drift from the server position before it should snap
    pub sync_tolerance_in_seconds: f64,
    /// The volume a freshly created playback state starts at
    pub default_volume: u8,
    /// How long a resolved audio locator is reused before it is looked up again
    pub locator_ttl_in_seconds: u64,
    /// Whether an idle room playback state is dropped once the room empties
    pub evict_idle_room_playback: bool,
}

impl Config {
    pub const MAX_VOLUME: u8 = 100;
    /// The furthest a track of unknown length can be seeked, a day
    pub const MAX_SEEK_IN_SECONDS: f64 = 60. * 60. * 24.;

    pub fn locator_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.locator_ttl_in_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Clients snap when they are more than this far off
            sync_tolerance_in_seconds: 3.0,
            default_volume: Self::MAX_VOLUME,
            // Media links usually expire after 6 hours, so stay well under that
            locator_ttl_in_seconds: 60 * 60 * 4,
            evict_idle_room_playback: true,
        }
    }
}
