//! Command handlers: the per-command state transitions and registry
//! reads/writes dispatched to from the worker's framing loop.

use std::collections::HashSet;
use std::sync::Arc;

use super::client::{Client, RegistrationState};
use super::registry::ChannelMode;
use super::reply;
use super::Server;

pub fn dispatch(server: &Arc<Server>, client: &Arc<Client>, command: &str, params: &[String]) {
    match command {
        "NICK" => handle_nick(server, client, params),
        "USER" => handle_user(server, client, params),
        "JOIN" => handle_join(server, client, params),
        "PART" => handle_part(server, client, params),
        "QUIT" => handle_disconnect(server, client, quit_message(params)),
        "PRIVMSG" => handle_message(server, client, params, false),
        "NOTICE" => handle_message(server, client, params, true),
        "MODE" => handle_mode(server, client, params),
        "OPER" => handle_oper(server, client, params),
        "LIST" => handle_list(server, client),
        "WHOIS" => handle_whois(server, client, params),
        "LUSERS" => send_lusers(server, client),
        "PING" => handle_ping(server, client, params),
        "PONG" => {}
        _ => {
            if is_registered(client) {
                client.send_one(reply::numeric(
                    &server.servername,
                    reply::ERR_UNKNOWNCOMMAND,
                    &client.nick_or_star(),
                    &[command],
                    Some("Unknown command"),
                ));
            }
        }
    }
}

fn is_registered(client: &Client) -> bool {
    *client.state.lock().unwrap() == RegistrationState::Registered
}

fn need_more_params(server: &Server, client: &Client, command: &str) {
    client.send_one(reply::numeric(
        &server.servername,
        reply::ERR_NEEDMOREPARAMS,
        &client.nick_or_star(),
        &[command],
        Some("Not enough parameters"),
    ));
}

fn is_valid_nick(nick: &str) -> bool {
    let mut chars = nick.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    !nick.is_empty() && nick.len() <= 9 && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn handle_nick(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    let Some(new_nick) = params.first() else {
        client.send_one(reply::numeric(&server.servername, reply::ERR_NONICKNAMEGIVEN, "*", &[], Some("No nickname given")));
        return;
    };

    if !is_valid_nick(new_nick) {
        client.send_one(reply::numeric(
            &server.servername,
            reply::ERR_ERRONEUSNICKNAME,
            "*",
            &[new_nick.as_str()],
            Some("Erroneous nickname"),
        ));
        return;
    }

    {
        let mut nicks = server.registry.nicks_lock.lock().unwrap();
        if nicks.get(new_nick).is_some_and(|&id| id != client.id) {
            client.send_one(reply::numeric(
                &server.servername,
                reply::ERR_NICKNAMEINUSE,
                "*",
                &[new_nick.as_str()],
                Some("Nickname is already in use"),
            ));
            return;
        }

        let old_nick = client.nick.lock().unwrap().clone();
        if let Some(old) = &old_nick {
            nicks.remove(old);
        }
        nicks.insert(new_nick.clone(), client.id);
    }

    let was_registered = is_registered(client);
    let old_nick = client.nick.lock().unwrap().replace(new_nick.clone());

    if was_registered {
        if let Some(old) = old_nick {
            broadcast_to_all_channels(server, client, &format!(":{old} NICK :{new_nick}\r\n"));
        }
        return;
    }

    advance_registration(server, client, |state| match state {
        RegistrationState::NotRegistered => RegistrationState::UserMissing,
        RegistrationState::NickMissing => RegistrationState::Registered,
        other => other,
    });
}

fn handle_user(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    if is_registered(client) {
        client.send_one(reply::numeric(
            &server.servername,
            reply::ERR_ALREADYREGISTRED,
            &client.nick_or_star(),
            &[],
            Some("You may not reregister"),
        ));
        return;
    }
    if params.len() < 4 {
        need_more_params(server, client, "USER");
        return;
    }

    *client.username.lock().unwrap() = Some(params[0].clone());
    *client.realname.lock().unwrap() = Some(params[3].clone());

    advance_registration(server, client, |state| match state {
        RegistrationState::NotRegistered => RegistrationState::NickMissing,
        RegistrationState::UserMissing => RegistrationState::Registered,
        other => other,
    });
}

fn advance_registration(server: &Arc<Server>, client: &Arc<Client>, transition: impl FnOnce(RegistrationState) -> RegistrationState) {
    let mut state = client.state.lock().unwrap();
    let next = transition(*state);
    let became_registered = next == RegistrationState::Registered && *state != RegistrationState::Registered;
    *state = next;
    drop(state);

    if became_registered {
        send_welcome(server, client);
    }
}

fn send_welcome(server: &Arc<Server>, client: &Arc<Client>) {
    let nick = client.nick_or_star();
    let sn = &server.servername;
    client.send(&[
        reply::numeric(sn, reply::RPL_WELCOME, &nick, &[], Some(format!("Welcome to the network, {nick}").as_str())),
        reply::numeric(sn, reply::RPL_YOURHOST, &nick, &[], Some(format!("Your host is {sn}").as_str())),
        reply::numeric(sn, reply::RPL_CREATED, &nick, &[], Some(format!("This server was created {}", server.created).as_str())),
        reply::numeric(sn, reply::RPL_MYINFO, &nick, &[sn.as_str(), "0.1"], None),
    ]);
    send_lusers(server, client);
    client.send_one(reply::numeric(sn, reply::ERR_NOMOTD, &nick, &[], Some("MOTD File is missing")));
}

fn send_lusers(server: &Arc<Server>, client: &Arc<Client>) {
    let nick = client.nick_or_star();
    let sn = &server.servername;
    let (clients, unknown) = {
        let registered = server.registry.clients_lock.lock().unwrap();
        let unknown = registered.values().filter(|c| !is_registered(c)).count();
        (registered.len(), unknown)
    };
    let operators = server.registry.operators_lock.lock().unwrap().len();
    let channels = server.registry.channels_lock.lock().unwrap().len();
    let unknown = unknown.to_string();
    let operators = operators.to_string();
    let channels = channels.to_string();
    client.send(&[
        reply::numeric(sn, reply::RPL_LUSERCLIENT, &nick, &[], Some(format!("There are {clients} users on 1 server").as_str())),
        reply::numeric(sn, reply::RPL_LUSEROP, &nick, &[operators.as_str()], Some("operator(s) online")),
        reply::numeric(sn, reply::RPL_LUSERUNKNOWN, &nick, &[unknown.as_str()], Some("unknown connection(s)")),
        reply::numeric(sn, reply::RPL_LUSERCHANNELS, &nick, &[channels.as_str()], Some("channels formed")),
        reply::numeric(sn, reply::RPL_LUSERME, &nick, &[], Some(format!("I have {clients} clients and 1 server").as_str())),
    ]);
}

fn handle_join(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    if !is_registered(client) {
        return not_registered(server, client);
    }
    let Some(channel_name) = params.first() else {
        return need_more_params(server, client, "JOIN");
    };
    let nick = client.nick_or_star();

    let newly_created = {
        let mut channels = server.registry.channels_lock.lock().unwrap();
        let created = !channels.contains_key(channel_name);
        let chan = channels.entry(channel_name.clone()).or_default();
        chan.members.insert(nick.clone(), ChannelMode { operator: created });
        created
    };
    let _ = newly_created;
    client.channels.lock().unwrap().insert(channel_name.clone());

    let join_line = reply::line(&nick, "JOIN", channel_name, &[], None);
    server.registry.broadcast_to_channel(channel_name, &[join_line], None);

    let names = {
        let channels = server.registry.channels_lock.lock().unwrap();
        channels.get(channel_name).map(|c| {
            c.members
                .iter()
                .map(|(n, m)| if m.operator { format!("@{n}") } else { n.clone() })
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
    .unwrap_or_default();

    client.send(&[
        reply::numeric(&server.servername, reply::RPL_NAMREPLY, &nick, &["=", channel_name.as_str()], Some(names.as_str())),
        reply::numeric(&server.servername, reply::RPL_ENDOFNAMES, &nick, &[channel_name.as_str()], Some("End of /NAMES list")),
    ]);
}

fn handle_part(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    if !is_registered(client) {
        return not_registered(server, client);
    }
    let Some(channel_name) = params.first() else {
        return need_more_params(server, client, "PART");
    };
    let nick = client.nick_or_star();

    let part_line = reply::line(&nick, "PART", channel_name, &[], None);
    server.registry.broadcast_to_channel(channel_name, &[part_line], None);
    leave_channel(server, &nick, channel_name);
    client.channels.lock().unwrap().remove(channel_name);
}

fn leave_channel(server: &Arc<Server>, nick: &str, channel_name: &str) {
    let mut channels = server.registry.channels_lock.lock().unwrap();
    if let Some(chan) = channels.get_mut(channel_name) {
        chan.members.remove(nick);
        if chan.members.is_empty() {
            channels.remove(channel_name);
        }
    }
}

fn quit_message(params: &[String]) -> &str {
    params.first().map(String::as_str).unwrap_or("Client quit")
}

pub fn handle_disconnect(server: &Arc<Server>, client: &Arc<Client>, reason: &str) {
    let nick = client.nick.lock().unwrap().clone();
    let channels: HashSet<String> = client.channels.lock().unwrap().clone();

    if let Some(nick) = &nick {
        let quit_line = reply::line(nick, "QUIT", "", &[], Some(reason));
        for channel_name in &channels {
            server.registry.broadcast_to_channel(channel_name, &[quit_line.clone()], Some(nick.as_str()));
        }
    }

    server.registry.remove_client(client.id, nick.as_deref(), &channels);
    client.shutdown();
}

fn handle_message(server: &Arc<Server>, client: &Arc<Client>, params: &[String], is_notice: bool) {
    if !is_registered(client) {
        if !is_notice {
            not_registered(server, client);
        }
        return;
    }
    if params.len() < 2 {
        if !is_notice {
            need_more_params(server, client, if is_notice { "NOTICE" } else { "PRIVMSG" });
        }
        return;
    }
    let target = &params[0];
    let text = &params[1];
    let nick = client.nick_or_star();
    let command = if is_notice { "NOTICE" } else { "PRIVMSG" };
    let line = reply::line(&nick, command, target, &[], Some(text.as_str()));

    if target.starts_with('#') {
        server.registry.broadcast_to_channel(target, &[line], Some(nick.as_str()));
    } else if let Some(recipient) = server.registry.client_by_nick(target) {
        recipient.send_one(line);
    } else if !is_notice {
        client.send_one(reply::numeric(&server.servername, reply::ERR_NOSUCHNICK, &nick, &[target.as_str()], Some("No such nick/channel")));
    }
}

fn handle_mode(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    if !is_registered(client) {
        return not_registered(server, client);
    }
    if params.len() == 1 {
        return send_channel_mode(server, client, &params[0]);
    }
    let [channel_name, flag, target_nick] = params else {
        return need_more_params(server, client, "MODE");
    };
    let nick = client.nick_or_star();

    let is_channel_op = server
        .registry
        .channels_lock
        .lock()
        .unwrap()
        .get(channel_name)
        .and_then(|c| c.members.get(&nick))
        .is_some_and(|m| m.operator);
    let is_irc_op = *client.is_operator.lock().unwrap();

    if !is_channel_op && !is_irc_op {
        client.send_one(reply::numeric(
            &server.servername,
            reply::ERR_CHANOPRIVSNEEDED,
            &nick,
            &[channel_name.as_str()],
            Some("You're not channel operator"),
        ));
        return;
    }

    let grant = flag == "+o";
    let mut channels = server.registry.channels_lock.lock().unwrap();
    let Some(chan) = channels.get_mut(channel_name) else { return };
    let Some(mode) = chan.members.get_mut(target_nick) else { return };
    mode.operator = grant;
    drop(channels);

    let mode_line = reply::line(&nick, "MODE", channel_name, &[flag.as_str(), target_nick.as_str()], None);
    server.registry.broadcast_to_channel(channel_name, &[mode_line], None);
}

/// `MODE #chan` with no flag/target: report the channel's current mode
/// string rather than changing anything.
fn send_channel_mode(server: &Arc<Server>, client: &Arc<Client>, channel_name: &str) {
    let nick = client.nick_or_star();
    let exists = server.registry.channels_lock.lock().unwrap().contains_key(channel_name);
    if !exists {
        client.send_one(reply::numeric(&server.servername, reply::ERR_NOSUCHCHANNEL, &nick, &[channel_name], Some("No such channel")));
        return;
    }
    client.send_one(reply::numeric(&server.servername, reply::RPL_CHANNELMODEIS, &nick, &[channel_name, "+"], None));
}

fn handle_oper(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    if !is_registered(client) {
        return not_registered(server, client);
    }
    let [name, password] = params else {
        return need_more_params(server, client, "OPER");
    };
    if *password != server.operator_password {
        client.send_one(reply::numeric(&server.servername, reply::ERR_PASSWDMISMATCH, &client.nick_or_star(), &[], Some("Password incorrect")));
        return;
    }
    *client.is_operator.lock().unwrap() = true;
    server.registry.operators_lock.lock().unwrap().insert(name.clone());
}

fn handle_list(server: &Arc<Server>, client: &Arc<Client>) {
    let nick = client.nick_or_star();
    let sn = &server.servername;
    client.send_one(reply::numeric(sn, reply::RPL_LISTSTART, &nick, &[], Some("Channel :Users  Name")));

    let channels = server.registry.channels_lock.lock().unwrap();
    let mut lines: Vec<String> = channels
        .iter()
        .map(|(name, chan)| {
            let count = chan.members.len().to_string();
            reply::numeric(sn, reply::RPL_LIST, &nick, &[name.as_str(), count.as_str()], Some(""))
        })
        .collect();
    drop(channels);

    lines.push(reply::numeric(sn, reply::RPL_LISTEND, &nick, &[], Some("End of /LIST")));
    client.send(&lines);
}

fn handle_whois(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    let nick = client.nick_or_star();
    let sn = &server.servername;
    let Some(target) = params.first() else {
        return need_more_params(server, client, "WHOIS");
    };

    match server.registry.client_by_nick(target) {
        Some(target_client) => {
            let username = target_client.username.lock().unwrap().clone().unwrap_or_default();
            let realname = target_client.realname.lock().unwrap().clone().unwrap_or_default();
            let host = target_client.addr.ip().to_string();
            client.send(&[
                reply::numeric(sn, reply::RPL_WHOISUSER, &nick, &[target.as_str(), username.as_str(), host.as_str(), "*"], Some(realname.as_str())),
                reply::numeric(sn, reply::RPL_WHOISSERVER, &nick, &[target.as_str(), sn.as_str()], Some("teaching-grade IRC server")),
                reply::numeric(sn, reply::RPL_ENDOFWHOIS, &nick, &[target.as_str()], Some("End of /WHOIS list")),
            ]);
        }
        None => {
            client.send_one(reply::numeric(sn, reply::ERR_NOSUCHNICK, &nick, &[target.as_str()], Some("No such nick/channel")));
        }
    }
}

fn handle_ping(server: &Arc<Server>, client: &Arc<Client>, params: &[String]) {
    let token = params.first().map(String::as_str).unwrap_or(&server.servername);
    client.send_one(reply::line(&server.servername, "PONG", &server.servername, &[], Some(token)));
}

fn not_registered(server: &Arc<Server>, client: &Arc<Client>) {
    client.send_one(reply::numeric(&server.servername, reply::ERR_NOTREGISTERED, "*", &[], Some("You have not registered")));
}

/// Send `raw_line` to every member of every channel `client` is in, each
/// recipient addressed exactly once even if they share more than one
/// channel with `client`.
fn broadcast_to_all_channels(server: &Arc<Server>, client: &Arc<Client>, raw_line: &str) {
    let channel_names: HashSet<String> = client.channels.lock().unwrap().clone();
    let mut recipients: HashSet<String> = HashSet::new();
    {
        let channels = server.registry.channels_lock.lock().unwrap();
        for channel_name in &channel_names {
            if let Some(chan) = channels.get(channel_name) {
                recipients.extend(chan.members.keys().cloned());
            }
        }
    }
    let line = raw_line.to_string();
    for nick in recipients {
        if let Some(recipient) = server.registry.client_by_nick(&nick) {
            recipient.send_one(line.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_validation_rejects_leading_digit() {
        assert!(!is_valid_nick("1bob"));
        assert!(is_valid_nick("bob"));
        assert!(is_valid_nick("bob_99"));
    }
}
