//! TCP endpoint client: brings up its own tun-backed `NetStack` and
//! actively opens a connection to a remote endpoint, echoing whatever it
//! reads back onto the same stream.

use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::str::FromStr;

use getopts::Options;
use netkit::tcp::Dual;
use netkit::NetStack;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {program} [options]");
    print!("{}", opts.usage(&brief));
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("i", "iface", "tun interface name", "NAME");
    opts.optopt("a", "addr", "local IPv4 address", "IP");
    opts.optopt("m", "mask", "netmask", "MASK");
    opts.optopt("r", "remote-addr", "remote IPv4 address", "IP");
    opts.optopt("q", "remote-port", "remote port", "PORT");
    opts.optopt("l", "local-port", "local source port (random if omitted)", "PORT");
    opts.optflag("h", "help", "print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    let iface = matches.opt_str("i").unwrap_or_else(|| "tun0".to_string());
    let addr = parse_ip(&matches.opt_str("a").unwrap_or_else(|| "10.10.10.11".to_string()));
    let mask = parse_ip(&matches.opt_str("m").unwrap_or_else(|| "255.255.255.0".to_string()));
    let remote_addr = parse_ip(&matches.opt_str("r").unwrap_or_else(|| "10.10.10.10".to_string()));
    let remote_port: u16 = match matches.opt_get_default("q", 9090) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("invalid --remote-port: {e}");
            std::process::exit(1);
        }
    };
    let local_port: u16 = match matches.opt_str("l") {
        Some(s) => match s.parse() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("invalid --local-port: {e}");
                std::process::exit(1);
            }
        },
        None => rand::random::<u16>().saturating_add(1024),
    };

    let netstack = match NetStack::new(&iface, addr, mask) {
        Ok(n) => n,
        Err(e) => {
            log::error!("failed to bring up {iface}: {e}");
            std::process::exit(1);
        }
    };

    log::info!("connecting to {remote_addr}:{remote_port} from local port {local_port}...");
    let mut stream = match netstack.connect(local_port, Dual { ipv4: remote_addr, port: remote_port }) {
        Ok(s) => s,
        Err(e) => {
            log::error!("connect failed: {e}");
            std::process::exit(1);
        }
    };
    log::info!("connected");

    let mut buf = [0u8; 1500];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if stream.write(&buf[..n]).is_err() {
            break;
        }
    }
}

fn parse_ip(s: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(s).unwrap_or_else(|e| {
        eprintln!("invalid IPv4 address {s:?}: {e}");
        std::process::exit(1);
    })
}
