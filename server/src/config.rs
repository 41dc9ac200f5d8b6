use clap::Parser;
use std::net::IpAddr;

/// Relay settings. Flags win; environment variables fill in when a flag is
/// absent.
#[derive(Debug, Clone, Parser)]
#[command(name = "movienight-server", about = "Room relay for two-person watch sessions")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "MOVIENIGHT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "MOVIENIGHT_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
}
