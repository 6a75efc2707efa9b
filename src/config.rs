use std::env;
use std::time::Duration;

/// Tunables for RTSP sessions and RTP transport.
///
/// A `Config` is plain data; construct one with [`Config::default`] (which
/// also honors `RTSPIO_*` environment variables) and pass it where needed.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP connect timeout.
    pub dial_timeout: Duration,
    /// Deadline applied to every socket read and write.
    pub read_write_timeout: Duration,
    /// Interval between keep-alive OPTIONS requests.
    pub keepalive_interval: Duration,
    /// Session is considered dead after this long without an RTP packet.
    pub inactivity_window: Duration,
    /// Maximum RTP payload size used when packetizing.
    pub mtu: usize,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config {
            dial_timeout: Duration::from_secs(10),
            read_write_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(15),
            inactivity_window: Duration::from_secs(30),
            mtu: 1200,
            user_agent: "rtspio/0.1".to_string(),
        };

        if let Some(secs) = env_secs("RTSPIO_DIAL_TIMEOUT") {
            config.dial_timeout = secs;
        }
        if let Some(secs) = env_secs("RTSPIO_RW_TIMEOUT") {
            config.read_write_timeout = secs;
        }
        if let Some(secs) = env_secs("RTSPIO_KEEPALIVE_INTERVAL") {
            config.keepalive_interval = secs;
        }
        if let Some(secs) = env_secs("RTSPIO_INACTIVITY_WINDOW") {
            config.inactivity_window = secs;
        }
        if let Ok(mtu) = env::var("RTSPIO_MTU") {
            if let Ok(mtu) = mtu.parse() {
                config.mtu = mtu;
            }
        }

        config
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name).ok()?.parse().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
        assert_eq!(config.inactivity_window, Duration::from_secs(30));
        assert_eq!(config.mtu, 1200);
    }
}
