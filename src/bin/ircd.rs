//! IRC daemon: binds a plain TCP listener and runs the dispatch core's
//! accept loop. The server is its own process, independent of this
//! project's user-space TCP stack, since an IRC network is ordinarily
//! deployed on top of whatever sockets the host OS already provides.

use std::fs;
use std::net::TcpListener;

use getopts::Options;
use netkit::irc::Server;

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
    opts.optopt("o", "oper-password", "IRC operator password", "PASSWORD");
    opts.optopt("n", "servername", "server name announced to clients", "NAME");
    opts.optopt("f", "network-file", "channels to pre-create, one per line", "PATH");
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

    let port: u16 = match matches.opt_get_default("p", 6667) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("invalid --port: {e}");
            std::process::exit(1);
        }
    };
    let Some(oper_password) = matches.opt_str("o") else {
        eprintln!("missing required --oper-password <PASSWORD>");
        std::process::exit(1);
    };
    let servername = matches.opt_str("n").unwrap_or_else(|| "irc.local".to_string());

    let server = Server::new(servername, oper_password, "this session");

    if let Some(path) = matches.opt_str("f") {
        match fs::read_to_string(&path) {
            Ok(text) => {
                for name in text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')) {
                    server.registry.channels_lock.lock().unwrap().entry(name.to_string()).or_default();
                }
            }
            Err(e) => {
                log::error!("failed to read network file {path}: {e}");
                std::process::exit(1);
            }
        }
    }

    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(l) => l,
        Err(e) => {
            log::error!("failed to bind port {port}: {e}");
            std::process::exit(1);
        }
    };

    log::info!("ircd listening on port {port} as {}", server.servername);

    if let Err(e) = server.run(listener) {
        log::error!("accept loop exited: {e}");
        std::process::exit(1);
    }
}
