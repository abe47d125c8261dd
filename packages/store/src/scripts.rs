//! Lua scripts backing the atomic Redis transitions.

use redis::Script;

/// Allocate an id and append a waiting job.
const INSERT_LUA: &str = include_str!("lua/insert.lua");

/// Pop the oldest waiting id onto the active list and stamp the job.
const CLAIM_LUA: &str = include_str!("lua/claim.lua");

/// Move an active job to a terminal state.
const FINISH_LUA: &str = include_str!("lua/finish.lua");

/// Delete a terminal job.
const REAP_LUA: &str = include_str!("lua/reap.lua");

/// Compiled script handles, loaded lazily by `EVALSHA`.
#[derive(Clone)]
pub(crate) struct Scripts {
    pub insert: Script,
    pub claim: Script,
    pub finish: Script,
    pub reap: Script,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            insert: Script::new(INSERT_LUA),
            claim: Script::new(CLAIM_LUA),
            finish: Script::new(FINISH_LUA),
            reap: Script::new(REAP_LUA),
        }
    }

    /// Raw sources, for loading checks.
    #[cfg(test)]
    pub fn sources() -> [&'static str; 4] {
        [INSERT_LUA, CLAIM_LUA, FINISH_LUA, REAP_LUA]
    }
}
