//! Local media tracks and the controller that swaps them

use crate::peer::engine::EngineError;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Where a track's frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Camera,
    Microphone,
    Screen,
    /// Black video frames, the video half of the placeholder stream.
    BlackFrames,
    /// A muted oscillator, the audio half of the placeholder stream.
    Silence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub kind: TrackKind,
    pub source: TrackSource,
    pub enabled: bool,
}

impl MediaTrack {
    pub fn black() -> Self {
        Self {
            kind: TrackKind::Video,
            source: TrackSource::BlackFrames,
            enabled: false,
        }
    }

    pub fn silence() -> Self {
        Self {
            kind: TrackKind::Audio,
            source: TrackSource::Silence,
            enabled: false,
        }
    }
}

/// The local stream attached to every peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaStream {
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Black frames plus silence: peer connections never carry zero senders,
    /// which sidesteps renegotiation edge cases around empty transceivers.
    pub fn placeholder() -> Self {
        Self {
            tracks: vec![MediaTrack::black(), MediaTrack::silence()],
        }
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Audio)
    }

    pub fn has_source(&self, source: TrackSource) -> bool {
        self.tracks.iter().any(|t| t.source == source)
    }
}

/// Capture surface of the platform media stack.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Camera and/or microphone capture for the requested kinds.
    async fn capture_user_media(&self, video: bool, audio: bool)
        -> Result<MediaStream, EngineError>;

    /// Screen capture.
    async fn capture_display(&self) -> Result<MediaStream, EngineError>;
}

/// Owns the local stream and the video/audio/screen toggles. Every mutation
/// produces the stream the session then pushes to all peer links.
pub struct MediaTrackController {
    source: Arc<dyn MediaSource>,
    video_enabled: bool,
    audio_enabled: bool,
    screen_active: bool,
    stream: MediaStream,
}

impl MediaTrackController {
    /// Starts with everything off: the placeholder stream.
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            video_enabled: false,
            audio_enabled: false,
            screen_active: false,
            stream: MediaStream::placeholder(),
        }
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn screen_active(&self) -> bool {
        self.screen_active
    }

    pub async fn set_video_enabled(&mut self, enabled: bool) -> &MediaStream {
        self.video_enabled = enabled;
        self.refresh().await
    }

    pub async fn set_audio_enabled(&mut self, enabled: bool) -> &MediaStream {
        self.audio_enabled = enabled;
        self.refresh().await
    }

    /// Swaps the outgoing video for a screen capture. Audio keeps whatever
    /// state it had. On capture failure the current stream stays in place.
    pub async fn start_screen_share(&mut self) -> Result<&MediaStream, EngineError> {
        let display = self.source.capture_display().await?;
        let mut tracks: Vec<MediaTrack> = display
            .tracks
            .into_iter()
            .filter(|t| t.kind == TrackKind::Video)
            .collect();
        if self.audio_enabled {
            match self.source.capture_user_media(false, true).await {
                Ok(mic) => tracks.extend(mic.tracks),
                Err(error) => {
                    tracing::warn!(%error, "Microphone capture failed during screen share");
                    tracks.push(MediaTrack::silence());
                }
            }
        } else {
            tracks.push(MediaTrack::silence());
        }
        self.screen_active = true;
        self.stream = MediaStream { tracks };
        Ok(&self.stream)
    }

    /// Back to the camera/microphone state the toggles describe.
    pub async fn stop_screen_share(&mut self) -> &MediaStream {
        self.screen_active = false;
        self.refresh().await
    }

    async fn refresh(&mut self) -> &MediaStream {
        if self.screen_active {
            // Screen stays up across audio toggles; only the mic track swaps.
            if let Err(error) = self.start_screen_share().await.map(|_| ()) {
                tracing::warn!(%error, "Screen capture lost, falling back to placeholder");
                self.screen_active = false;
                self.stream = MediaStream::placeholder();
            }
            return &self.stream;
        }

        if !self.video_enabled && !self.audio_enabled {
            self.stream = MediaStream::placeholder();
            return &self.stream;
        }

        match self
            .source
            .capture_user_media(self.video_enabled, self.audio_enabled)
            .await
        {
            Ok(stream) => self.stream = stream,
            Err(error) => {
                tracing::warn!(%error, "Media capture failed, falling back to placeholder");
                self.stream = MediaStream::placeholder();
            }
        }
        &self.stream
    }
}
