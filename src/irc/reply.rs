//! Numeric reply codes and line serialization:
//! `<prefix> <command> <params...> [ :<trailing> ]` + CRLF.

pub const RPL_WELCOME: u16 = 1;
pub const RPL_YOURHOST: u16 = 2;
pub const RPL_CREATED: u16 = 3;
pub const RPL_MYINFO: u16 = 4;
pub const RPL_LUSERCLIENT: u16 = 251;
pub const RPL_LUSEROP: u16 = 252;
pub const RPL_LUSERUNKNOWN: u16 = 253;
pub const RPL_LUSERCHANNELS: u16 = 254;
pub const RPL_LUSERME: u16 = 255;
pub const RPL_WHOISUSER: u16 = 311;
pub const RPL_WHOISSERVER: u16 = 312;
pub const RPL_ENDOFWHOIS: u16 = 318;
pub const RPL_CHANNELMODEIS: u16 = 324;
pub const RPL_LISTSTART: u16 = 321;
pub const RPL_LIST: u16 = 322;
pub const RPL_LISTEND: u16 = 323;
pub const RPL_NAMREPLY: u16 = 353;
pub const RPL_ENDOFNAMES: u16 = 366;
pub const ERR_NOSUCHNICK: u16 = 401;
pub const ERR_NOSUCHCHANNEL: u16 = 403;
pub const ERR_NOMOTD: u16 = 422;
pub const ERR_UNKNOWNCOMMAND: u16 = 421;
pub const ERR_NONICKNAMEGIVEN: u16 = 431;
pub const ERR_ERRONEUSNICKNAME: u16 = 432;
pub const ERR_NICKNAMEINUSE: u16 = 433;
pub const ERR_NOTONCHANNEL: u16 = 442;
pub const ERR_NOTREGISTERED: u16 = 451;
pub const ERR_NEEDMOREPARAMS: u16 = 461;
pub const ERR_ALREADYREGISTRED: u16 = 462;
pub const ERR_PASSWDMISMATCH: u16 = 464;
pub const ERR_CHANOPRIVSNEEDED: u16 = 482;

/// Build a numeric or named reply line, ready to push onto a client's
/// socket. `target` is the recipient's nick, or "*" before registration.
pub fn line(prefix: &str, command: &str, target: &str, params: &[&str], trailing: Option<&str>) -> String {
    let mut out = format!(":{prefix} {command} {target}");
    for p in params {
        out.push(' ');
        out.push_str(p);
    }
    if let Some(t) = trailing {
        out.push_str(" :");
        out.push_str(t);
    }
    out.push_str("\r\n");
    out
}

pub fn numeric(prefix: &str, code: u16, target: &str, params: &[&str], trailing: Option<&str>) -> String {
    line(prefix, &format!("{code:03}"), target, params, trailing)
}
