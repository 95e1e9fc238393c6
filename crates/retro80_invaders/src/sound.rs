//! Discrete sound effects for the Space Invaders board.
//!
//! The game has no sound chip; OUT 3 and OUT 5 drive discrete analog
//! circuits, one bit per effect. We watch those latches for rising edges
//! and play a sampled WAV per effect on a dedicated audio thread.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufReader, Cursor};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use log::{error, warn};
use rodio::{Decoder, OutputStream, Sink};

/// Logical sound identifiers for the discrete audio outputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SoundType {
    Fire,
    InvaderDies,
    PlayerDies,
    Ufo,
    FleetStep1,
    FleetStep2,
    FleetStep3,
    FleetStep4,
    UfoHit,
}

/// Message sent from the main thread to the audio thread.
pub struct Message {
    pub sound_type: SoundType,
    pub on: bool,
}

/// Mapping between an output port bit and a sampled effect.
pub struct SoundInfo {
    pub sound_type: SoundType,
    pub path: &'static str,
    pub port: u8,
    pub bit: u8,
}

impl SoundInfo {
    const fn new(sound_type: SoundType, path: &'static str, port: u8, bit: u8) -> Self {
        Self {
            sound_type,
            path,
            port,
            bit,
        }
    }
}

/// All effect definitions, keyed by output port and bit.
///
/// Paths are relative to the workspace root.
pub const ALL_SOUNDS: &[SoundInfo] = &[
    // OUT 3: UFO loop, shot, player death, invader death.
    SoundInfo::new(SoundType::Ufo, "assets/sounds/invaders/ufo_lowpitch.wav", 3, 0),
    SoundInfo::new(SoundType::Fire, "assets/sounds/invaders/shoot.wav", 3, 1),
    SoundInfo::new(SoundType::PlayerDies, "assets/sounds/invaders/explosion.wav", 3, 2),
    SoundInfo::new(
        SoundType::InvaderDies,
        "assets/sounds/invaders/invaderkilled.wav",
        3,
        3,
    ),
    // OUT 5: the four fleet movement notes and the UFO hit.
    SoundInfo::new(
        SoundType::FleetStep1,
        "assets/sounds/invaders/fastinvader1.wav",
        5,
        0,
    ),
    SoundInfo::new(
        SoundType::FleetStep2,
        "assets/sounds/invaders/fastinvader2.wav",
        5,
        1,
    ),
    SoundInfo::new(
        SoundType::FleetStep3,
        "assets/sounds/invaders/fastinvader3.wav",
        5,
        2,
    ),
    SoundInfo::new(
        SoundType::FleetStep4,
        "assets/sounds/invaders/fastinvader4.wav",
        5,
        3,
    ),
    SoundInfo::new(SoundType::UfoHit, "assets/sounds/invaders/explosion.wav", 5, 4),
];

struct SoundThread {
    receiver: Receiver<Message>,
    sound_files: HashMap<SoundType, Vec<u8>>,
}

impl SoundThread {
    fn new(receiver: Receiver<Message>) -> Option<Self> {
        let mut sound_files = HashMap::new();

        for info in ALL_SOUNDS.iter() {
            match fs::read(info.path) {
                Ok(bytes) => {
                    sound_files.insert(info.sound_type, bytes);
                }
                Err(e) => {
                    warn!(
                        "Failed to load sound {:?} from {}: {e}",
                        info.sound_type, info.path
                    );
                }
            }
        }

        if sound_files.is_empty() {
            warn!("No Space Invaders sound files could be loaded, disabling audio");
            return None;
        }

        Some(Self {
            receiver,
            sound_files,
        })
    }

    fn run(self) {
        // The stream must outlive every sink appended to it.
        let Ok((stream, stream_handle)) = OutputStream::try_default() else {
            error!("Failed to open default audio output stream, disabling audio");
            return;
        };
        let _stream = stream;

        let Ok(sink) = Sink::try_new(&stream_handle) else {
            error!("Failed to create audio sink, disabling audio");
            return;
        };

        loop {
            match self.receiver.recv() {
                Ok(msg) => {
                    if !msg.on {
                        // Only rising edges trigger playback.
                        continue;
                    }

                    if let Some(bytes) = self.sound_files.get(&msg.sound_type) {
                        let reader = BufReader::new(Cursor::new(bytes.clone()));
                        match Decoder::new(reader) {
                            Ok(source) => {
                                sink.append(source);
                                sink.sleep_until_end();
                            }
                            Err(e) => {
                                error!("Failed to decode sound {:?}: {e}", msg.sound_type);
                            }
                        }
                    } else {
                        warn!("No audio data for sound {:?}", msg.sound_type);
                    }
                }
                Err(e) => {
                    warn!("Audio channel closed: {e}");
                    break;
                }
            }
        }
    }
}

/// Main-thread controller that edge-detects the output latches and feeds
/// the audio thread.
pub struct SoundManager {
    sender: Sender<Message>,
    active: HashSet<SoundType>,
}

impl SoundManager {
    /// Start the audio thread. Returns `None` when audio cannot be brought
    /// up (no device, no assets); the emulator then runs silently.
    pub fn new() -> Option<Self> {
        let (sender, receiver) = mpsc::channel::<Message>();

        let sound_thread = SoundThread::new(receiver)?;

        if let Err(e) = thread::Builder::new()
            .name("invaders_sound".into())
            .spawn(move || sound_thread.run())
        {
            error!("Failed to spawn Space Invaders audio thread: {e}");
            return None;
        }

        Some(Self {
            sender,
            active: HashSet::new(),
        })
    }

    /// Compare the current OUT 3 / OUT 5 latches against the last seen
    /// state and send a message for every bit that toggled.
    pub fn update(&mut self, out3: u8, out5: u8) {
        for info in ALL_SOUNDS.iter() {
            let value = match info.port {
                3 => out3,
                5 => out5,
                _ => 0,
            };

            let sound_type = info.sound_type;
            let was_playing = self.active.contains(&sound_type);
            let on = (value & (1 << info.bit)) != 0;

            if on {
                self.active.insert(sound_type);
            } else {
                self.active.remove(&sound_type);
            }

            if on ^ was_playing {
                // If the audio thread has gone away we simply stop
                // triggering new sounds.
                let _ = self.sender.send(Message { sound_type, on });
            }
        }
    }
}
