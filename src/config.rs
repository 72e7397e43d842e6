//! Environment-driven connection configuration, resolved once at [`crate::game::Game::connect`].

use std::env;

/// Default POSIX transport: a Unix domain socket at this path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/battlecode.sock";

/// Fallback transport on platforms without Unix domain sockets.
pub const DEFAULT_TCP_HOST: &str = "localhost";
pub const DEFAULT_TCP_PORT: u16 = 6147;

const KEY_ENV_VAR: &str = "BATTLECODE_PLAYER_KEY";
const SOCKET_ENV_VAR: &str = "BATTLECODE_SOCKET_PATH";
const TCP_ADDR_ENV_VAR: &str = "BATTLECODE_TCP_ADDR";

/// Where to dial the game server, and the shared-secret key (if any) to present at login.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub endpoint: Endpoint,
    pub key: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    #[cfg(unix)]
    UnixSocket(std::path::PathBuf),
    Tcp(String),
}

impl Config {
    /// Resolve from the environment: `BATTLECODE_PLAYER_KEY` for the login key;
    /// `BATTLECODE_SOCKET_PATH` (Unix) or `BATTLECODE_TCP_ADDR` to override the endpoint.
    pub fn from_env() -> Self {
        let key = env::var(KEY_ENV_VAR).ok();

        #[cfg(unix)]
        let endpoint = {
            let path = env::var(SOCKET_ENV_VAR).unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());
            Endpoint::UnixSocket(std::path::PathBuf::from(path))
        };
        #[cfg(not(unix))]
        let endpoint = {
            let addr = env::var(TCP_ADDR_ENV_VAR)
                .unwrap_or_else(|_| format!("{DEFAULT_TCP_HOST}:{DEFAULT_TCP_PORT}"));
            Endpoint::Tcp(addr)
        };

        Self { endpoint, key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_matches_platform_default() {
        let config = Config {
            endpoint: {
                #[cfg(unix)]
                {
                    Endpoint::UnixSocket(std::path::PathBuf::from(DEFAULT_SOCKET_PATH))
                }
                #[cfg(not(unix))]
                {
                    Endpoint::Tcp(format!("{DEFAULT_TCP_HOST}:{DEFAULT_TCP_PORT}"))
                }
            },
            key: None,
        };
        #[cfg(unix)]
        assert_eq!(
            config.endpoint,
            Endpoint::UnixSocket(std::path::PathBuf::from("/tmp/battlecode.sock"))
        );
    }
}
