//! Controllable fakes for the gateway and asset collaborators
//!
//! `FakeGateway` records one `Link` per join; tests drive connection state
//! transitions and track endings through the link.

#![allow(dead_code)]

use async_trait::async_trait;
use soundbridge_common::config::VoiceSettings;
use soundbridge_common::events::EventBus;
use soundbridge_common::ids::{ChannelId, GuildId};
use soundbridge_voice::error::ConnectError;
use soundbridge_voice::gateway::{
    AssetResolver, AudioResource, StateFeed, TrackEnd, TrackHandle, VoiceChannelHandle,
    VoiceGateway, VoiceTransport,
};
use soundbridge_voice::session::ConnectionState;
use soundbridge_voice::{ConnectionManager, PlaybackOrchestrator};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Semaphore};

pub fn channel(guild: u64, channel: u64) -> VoiceChannelHandle {
    VoiceChannelHandle {
        guild_id: GuildId(guild),
        channel_id: ChannelId(channel),
    }
}

/// Let spawned supervisor/watcher tasks run to quiescence
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// One joined transport, as seen from the test
pub struct Link {
    pub channel: VoiceChannelHandle,
    states: StateFeed,
    pub closed: AtomicBool,
    tracks: Mutex<Vec<oneshot::Sender<TrackEnd>>>,
}

impl Link {
    /// Drive a connection state transition
    pub fn set_state(&self, state: ConnectionState) {
        self.states.send_replace(state);
    }

    pub fn state(&self) -> ConnectionState {
        *self.states.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    /// End the oldest still-pending track
    pub fn finish_track(&self, end: TrackEnd) {
        let sender = self.tracks.lock().unwrap().remove(0);
        let _ = sender.send(end);
    }
}

/// Gateway whose transports are driven manually from tests
#[derive(Default)]
pub struct FakeGateway {
    /// Refuse all joins with `ConnectError::Rejected`
    pub reject: AtomicBool,
    /// New transports report Ready immediately
    pub auto_ready: AtomicBool,
    /// Transports fail every `play` call
    pub fail_play: AtomicBool,
    /// When set, `join` suspends until the test adds a permit
    gate: Option<Arc<Semaphore>>,
    links: Mutex<Vec<Arc<Link>>>,
}

impl FakeGateway {
    pub fn ready() -> Arc<Self> {
        let gateway = Arc::new(Self::default());
        gateway.auto_ready.store(true, Ordering::SeqCst);
        gateway
    }

    /// Gateway whose joins park until released, one permit per join, in
    /// arrival order
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let gateway = Arc::new(Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        });
        (gateway, gate)
    }

    pub fn join_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn link(&self, index: usize) -> Arc<Link> {
        Arc::clone(&self.links.lock().unwrap()[index])
    }

    pub fn last_link(&self) -> Arc<Link> {
        let links = self.links.lock().unwrap();
        Arc::clone(links.last().expect("no joins recorded"))
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(
        &self,
        channel: &VoiceChannelHandle,
        states: StateFeed,
    ) -> Result<Box<dyn VoiceTransport>, ConnectError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ConnectError::Rejected("missing permission".to_string()));
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("join gate closed").forget();
        }

        let link = Arc::new(Link {
            channel: channel.clone(),
            states,
            closed: AtomicBool::new(false),
            tracks: Mutex::new(Vec::new()),
        });
        if self.auto_ready.load(Ordering::SeqCst) {
            link.set_state(ConnectionState::Ready);
        }
        self.links.lock().unwrap().push(Arc::clone(&link));

        Ok(Box::new(FakeTransport {
            link,
            fail_play: self.fail_play.load(Ordering::SeqCst),
        }))
    }
}

struct FakeTransport {
    link: Arc<Link>,
    fail_play: bool,
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn play(&self, _resource: AudioResource) -> Result<Box<dyn TrackHandle>, String> {
        if self.fail_play {
            return Err("encoder crashed".to_string());
        }
        let (tx, rx) = oneshot::channel();
        self.link.tracks.lock().unwrap().push(tx);
        Ok(Box::new(FakeTrack { rx }))
    }

    async fn close(&self) {
        self.link.closed.store(true, Ordering::SeqCst);
    }
}

struct FakeTrack {
    rx: oneshot::Receiver<TrackEnd>,
}

#[async_trait]
impl TrackHandle for FakeTrack {
    async fn finished(self: Box<Self>) -> TrackEnd {
        self.rx
            .await
            .unwrap_or_else(|_| TrackEnd::Errored("transport dropped".to_string()))
    }
}

/// In-memory asset store
#[derive(Default)]
pub struct MemoryResolver {
    assets: Mutex<Vec<(GuildId, String)>>,
}

impl MemoryResolver {
    pub fn with_asset(guild: u64, name: &str) -> Arc<Self> {
        let resolver = Arc::new(Self::default());
        resolver.add(GuildId(guild), name);
        resolver
    }

    pub fn add(&self, guild_id: GuildId, name: &str) {
        self.assets.lock().unwrap().push((guild_id, name.to_string()));
    }
}

#[async_trait]
impl AssetResolver for MemoryResolver {
    async fn resolve(&self, guild_id: GuildId, name: &str) -> Option<AudioResource> {
        self.assets
            .lock()
            .unwrap()
            .iter()
            .find(|(g, n)| *g == guild_id && n == name)
            .map(|(_, n)| AudioResource {
                name: n.clone(),
                path: PathBuf::from(format!("/assets/{}.mp3", n)),
            })
    }
}

/// Everything a scenario needs, wired together
pub struct Rig {
    pub gateway: Arc<FakeGateway>,
    pub resolver: Arc<MemoryResolver>,
    pub connections: Arc<ConnectionManager>,
    pub playback: PlaybackOrchestrator,
    pub events: EventBus,
}

pub fn rig(gateway: Arc<FakeGateway>, resolver: Arc<MemoryResolver>) -> Rig {
    soundbridge_common::logging::init("soundbridge_voice=debug");

    let settings = VoiceSettings::default();
    let events = EventBus::default();
    let connections = Arc::new(ConnectionManager::new(
        gateway.clone(),
        &settings,
        events.clone(),
    ));
    let playback = PlaybackOrchestrator::new(
        Arc::clone(&connections),
        resolver.clone(),
        events.clone(),
    );

    Rig {
        gateway,
        resolver,
        connections,
        playback,
        events,
    }
}
