//! Constants shared by configuration and the CLI

/// Project configuration file name
pub const CONFIG_FILE_NAME: &str = "pageweave.toml";

/// Template root used when no configuration sets one
pub const DEFAULT_TEMPLATE_ROOT: &str = "views";

/// Include nesting limit
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Nesting limit for `foreach`/`if` blocks within one template
pub const DEFAULT_MAX_BLOCK_DEPTH: usize = 64;

/// Live reload server defaults
pub mod live_reload {
    pub const ADDRESS: &str = "127.0.0.1:8888";
    pub const PATH: &str = "/hot-reload";
    pub const CHANNEL_CAPACITY: usize = 16;
    pub const HEARTBEAT_SECS: u64 = 15;
}
