#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Tun error: {0}")]
    TunError(#[from] tidy_tuntap::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Port: {0} has been unexpectedly closed")]
    PortClosed(u16),

    #[error("Port: {0} already in use")]
    PortInUse(u16),

    #[error("stream has been reset")]
    StreamClosed(crate::tcp::Dual),

    #[error("no route to {0}")]
    NoRoute(std::net::Ipv4Addr),

    #[error("no such interface: {0}")]
    NoSuchInterface(String),

    #[error("timer {0} is already armed")]
    TimerAlreadyArmed(usize),

    #[error("timer {0} is not armed")]
    TimerNotArmed(usize),
}
