//! IP router daemon: loads an interface topology and a routing table from
//! disk, brings up one tap device per interface, and runs the forwarding
//! engine until its reader threads exit.
//!
//! Topology file: one interface per line, `<name> <mac> <ip>`, e.g.
//!   eth0 02:00:00:00:00:01 10.0.0.1
//! Routing table file: one route per line, `<dest> <mask> <gateway> <iface>`,
//! gateway 0.0.0.0 meaning on-link, e.g.
//!   10.0.1.0 255.255.255.0 0.0.0.0 eth1
//! Blank lines and lines starting with '#' are ignored in both files.

use std::fs;
use std::net::Ipv4Addr;
use std::str::FromStr;

use getopts::Options;
use netkit::router::{Interface, RouteEntry, RoutingTable};
use netkit::router::wire::MacAddr;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {program} [options]");
    print!("{}", opts.usage(&brief));
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("t", "topology", "interface topology file", "PATH");
    opts.optopt("r", "routes", "routing table file", "PATH");
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

    let Some(topology_path) = matches.opt_str("t") else {
        eprintln!("missing required --topology <PATH>");
        std::process::exit(1);
    };
    let Some(routes_path) = matches.opt_str("r") else {
        eprintln!("missing required --routes <PATH>");
        std::process::exit(1);
    };

    let interfaces = match load_topology(&topology_path) {
        Ok(ifaces) => ifaces,
        Err(e) => {
            log::error!("failed to load topology {topology_path}: {e}");
            std::process::exit(1);
        }
    };
    let routes = match load_routes(&routes_path) {
        Ok(routes) => routes,
        Err(e) => {
            log::error!("failed to load routing table {routes_path}: {e}");
            std::process::exit(1);
        }
    };

    log::info!("routerd starting with {} interface(s)", interfaces.len());

    let daemon = match netkit::router::RouterDaemon::new(interfaces, routes) {
        Ok(d) => d,
        Err(e) => {
            log::error!("failed to start router: {e}");
            std::process::exit(1);
        }
    };

    daemon.join();
}

fn load_topology(path: &str) -> Result<Vec<Interface>, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut interfaces = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(format!("line {}: expected '<name> <mac> <ip>'", lineno + 1));
        }
        let (name, mac, ip) = (fields[0], fields[1], fields[2]);
        let mac = parse_mac(mac).map_err(|e| format!("line {}: {e}", lineno + 1))?;
        let ip = Ipv4Addr::from_str(ip).map_err(|e| format!("line {}: bad ip: {e}", lineno + 1))?;
        interfaces.push(Interface::new(name.to_string(), mac, ip));
    }
    Ok(interfaces)
}

fn load_routes(path: &str) -> Result<RoutingTable, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut table = RoutingTable::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(format!("line {}: expected '<dest> <mask> <gateway> <iface>'", lineno + 1));
        }
        let (dest, mask, gateway, iface) = (fields[0], fields[1], fields[2], fields[3]);
        let dest = Ipv4Addr::from_str(dest).map_err(|e| format!("line {}: bad dest: {e}", lineno + 1))?;
        let mask = Ipv4Addr::from_str(mask).map_err(|e| format!("line {}: bad mask: {e}", lineno + 1))?;
        let gateway = Ipv4Addr::from_str(gateway).map_err(|e| format!("line {}: bad gateway: {e}", lineno + 1))?;
        table.add(RouteEntry { dest, mask, gateway, iface: iface.to_string() });
    }
    Ok(table)
}

fn parse_mac(s: &str) -> Result<MacAddr, String> {
    let mut mac = [0u8; 6];
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(format!("bad mac address {s:?}"));
    }
    for (i, part) in parts.iter().enumerate() {
        mac[i] = u8::from_str_radix(part, 16).map_err(|e| format!("bad mac address {s:?}: {e}"))?;
    }
    Ok(mac)
}
