//! Shared server state: the four registries (clients, nicks, channels,
//! operators) each under their own lock, following a single-server
//! ownership model rather than scattering locks across handlers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::client::Client;

#[derive(Debug, Default, Clone)]
pub struct ChannelMode {
    pub operator: bool,
}

#[derive(Debug, Default)]
pub struct Channel {
    pub members: HashMap<String, ChannelMode>,
}

#[derive(Default)]
pub struct Counters {
    pub connections: u64,
}

#[derive(Default)]
pub struct Registry {
    pub clients_lock: Mutex<HashMap<u64, Arc<Client>>>,
    pub nicks_lock: Mutex<HashMap<String, u64>>,
    pub channels_lock: Mutex<HashMap<String, Channel>>,
    pub operators_lock: Mutex<HashSet<String>>,
    pub counters_lock: Mutex<Counters>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn client(&self, id: u64) -> Option<Arc<Client>> {
        self.clients_lock.lock().unwrap().get(&id).cloned()
    }

    pub fn client_by_nick(&self, nick: &str) -> Option<Arc<Client>> {
        let id = *self.nicks_lock.lock().unwrap().get(nick)?;
        self.client(id)
    }

    pub fn register_client(&self, client: Arc<Client>) {
        self.clients_lock.lock().unwrap().insert(client.id, client);
        self.counters_lock.lock().unwrap().connections += 1;
    }

    /// Remove a disconnected client from every registry: its nick, every
    /// channel it belonged to (destroying any that becomes empty), and
    /// the client map itself.
    pub fn remove_client(&self, id: u64, nick: Option<&str>, channels: &HashSet<String>) {
        if let Some(nick) = nick {
            self.nicks_lock.lock().unwrap().remove(nick);
            let mut chans = self.channels_lock.lock().unwrap();
            for name in channels {
                if let Some(chan) = chans.get_mut(name) {
                    chan.members.remove(nick);
                    if chan.members.is_empty() {
                        chans.remove(name);
                    }
                }
            }
        }
        self.clients_lock.lock().unwrap().remove(&id);
    }

    /// Broadcast `lines` to every member of `channel` except `skip` (if
    /// given), holding `channels_lock` for the whole fan-out so
    /// membership can't change mid-broadcast.
    pub fn broadcast_to_channel(&self, channel: &str, lines: &[String], skip: Option<&str>) {
        let chans = self.channels_lock.lock().unwrap();
        let Some(chan) = chans.get(channel) else { return };
        for nick in chan.members.keys() {
            if Some(nick.as_str()) == skip {
                continue;
            }
            if let Some(client) = self.client_by_nick(nick) {
                client.send(lines);
            }
        }
    }
}
