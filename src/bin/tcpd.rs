//! TCP endpoint daemon: brings up a tun-backed `NetStack`, binds one
//! listening port, and echoes back whatever each accepted stream sends.

use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::str::FromStr;

use getopts::Options;
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
    opts.optopt("p", "port", "port to listen on", "PORT");
    opts.optopt("i", "iface", "tun interface name", "NAME");
    opts.optopt("a", "addr", "local IPv4 address", "IP");
    opts.optopt("m", "mask", "netmask", "MASK");
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

    let port: u16 = match matches.opt_get_default("p", 9090) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("invalid --port: {e}");
            std::process::exit(1);
        }
    };
    let iface = matches.opt_str("i").unwrap_or_else(|| "tun0".to_string());
    let addr = parse_ip(&matches.opt_str("a").unwrap_or_else(|| "10.10.10.10".to_string()));
    let mask = parse_ip(&matches.opt_str("m").unwrap_or_else(|| "255.255.255.0".to_string()));

    let netstack = match NetStack::new(&iface, addr, mask) {
        Ok(n) => n,
        Err(e) => {
            log::error!("failed to bring up {iface}: {e}");
            std::process::exit(1);
        }
    };

    let listener = match netstack.bind(port) {
        Ok(l) => l,
        Err(e) => {
            log::error!("failed to bind port {port}: {e}");
            std::process::exit(1);
        }
    };

    log::info!("tcpd listening on {addr}:{port} via {iface}");

    loop {
        let mut stream = match listener.accept() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };
        std::thread::spawn(move || {
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
        });
    }
}

fn parse_ip(s: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(s).unwrap_or_else(|e| {
        eprintln!("invalid IPv4 address {s:?}: {e}");
        std::process::exit(1);
    })
}
