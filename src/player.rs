use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::helpers::extract_parameters;
use crate::message::User;
use crate::webhook::{Logger, Record};

/// Grace period on top of the playback limit before the next video starts.
const END_BUFFER: Duration = Duration::from_secs(2);

const VIDEO_ID_LEN: usize = 11;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedVideo {
    pub requester: String,
    pub video_id: String,
    pub music: bool,
}

impl QueuedVideo {
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Video id from a bare id, a `watch?v=` link, a `youtu.be/` link or a shorts link.
pub fn parse_video_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if is_video_id(raw) {
        return Some(raw.to_string());
    }
    if let Some(id) = extract_parameters(raw).remove("v") {
        return is_video_id(&id).then_some(id);
    }

    let path_id = ["youtu.be/", "/shorts/", "/embed/", "/live/"]
        .iter()
        .find_map(|marker| raw.split_once(marker).map(|(_, rest)| rest))?
        .split(['?', '&', '#', '/'])
        .next()?;
    is_video_id(path_id).then(|| path_id.to_string())
}

/// Chat-requested videos, played one at a time for at most the configured duration.
///
/// Each playing video has a monitor task that sleeps out the duration and then
/// reports its generation on `ended`. Stopping or replacing the video aborts the
/// monitor, and a report from an older generation is ignored.
pub struct VideoQueue {
    pending: VecDeque<QueuedVideo>,
    current: Option<QueuedVideo>,
    max_duration: Duration,
    max_queue: usize,
    generation: u64,
    monitor: Option<JoinHandle<()>>,
    ended: UnboundedSender<u64>,
    logger: Logger,
}

impl VideoQueue {
    pub fn new(max_duration: Duration, max_queue: usize, logger: Logger) -> (Self, UnboundedReceiver<u64>) {
        let (ended, rx) = unbounded_channel();
        let queue = VideoQueue {
            pending: VecDeque::new(),
            current: None,
            max_duration,
            max_queue,
            generation: 0,
            monitor: None,
            ended,
            logger,
        };
        (queue, rx)
    }

    /// `!sr <link or id> [music]`
    pub fn request(&mut self, user: &User, inputs: &[String]) -> Vec<String> {
        let name = &user.display_name;
        let Some(raw) = inputs.first().filter(|s| !s.trim().is_empty()) else {
            return vec![format!("{name}, usage: !sr <youtube link or video id> [music]")];
        };
        let Some(video_id) = parse_video_id(raw) else {
            return vec![format!("{name}, that doesn't look like a YouTube link or video id!")];
        };
        if self.current.is_some() && self.pending.len() >= self.max_queue {
            self.logger.log(Record::warning(
                "YouTube Request - Queue Full",
                format!("**User:** {name}\n**Queue Size:** {}", self.pending.len()),
            ));
            return vec![format!("{name}, the video queue is full ({} videos)! Try again later.", self.max_queue)];
        }
        let music = inputs
            .get(1)
            .is_some_and(|flag| matches!(flag.to_lowercase().as_str(), "music" | "m"));

        let video = QueuedVideo {
            requester: name.clone(),
            video_id,
            music,
        };
        self.logger.log(Record::command("!sr", name, &video.url()));

        if self.current.is_none() {
            self.play(video);
            return vec![format!("🎬 Now playing {name}'s video!")];
        }
        self.pending.push_back(video);
        vec![format!("📋 {name}, your video was added to the queue! Position: {}", self.pending.len())]
    }

    /// Moderator skip: the next queued video starts, or playback ends.
    pub fn stop(&mut self, user: &User) -> Vec<String> {
        let name = &user.display_name;
        if !user.is_moderator() {
            self.logger.log(Record::warning(
                "YouTube Stop - Unauthorized",
                format!("**User:** {name}\n**Reason:** Not a moderator"),
            ));
            return vec![format!("{name}, only moderators can stop videos!")];
        }
        if self.current.is_none() {
            return vec![format!("{name}, no video is currently playing!")];
        }

        let mut lines = if self.pending.is_empty() {
            self.logger.log(Record::success(
                "YouTube Video Stopped by Mod",
                format!("**Moderator:** {name}\n**Action:** Stopped current video (no queue)"),
            ));
            vec![format!("⏹️ Video stopped by moderator {name}.")]
        } else {
            self.logger.log(Record::success(
                "YouTube Video Stopped by Mod",
                format!("**Moderator:** {name}\n**Action:** Skipped to next video in queue"),
            ));
            vec![format!("⏹️ Video stopped by moderator {name}. Playing next video in queue...")]
        };
        lines.extend(self.advance());
        lines
    }

    /// A monitor reported that its video ran out.
    pub fn finished(&mut self, generation: u64) -> Vec<String> {
        if generation != self.generation || self.current.is_none() {
            debug!(generation, current = self.generation, "ignoring stale playback monitor");
            return Vec::new();
        }
        if let Some(video) = &self.current {
            self.logger.log(Record::info(
                "YouTube Video Ended",
                format!(
                    "**User:** {}\n**Video ID:** {}\n**Duration:** {}s",
                    video.requester,
                    video.video_id,
                    self.max_duration.as_secs()
                ),
            ));
        }
        self.monitor = None;
        self.advance().into_iter().collect()
    }

    fn advance(&mut self) -> Option<String> {
        self.cancel_monitor();
        match self.pending.pop_front() {
            Some(next) => {
                let line = format!(
                    "🎬 Next video: {}'s video is now playing! ({} videos left in queue)",
                    next.requester,
                    self.pending.len()
                );
                self.logger.log(Record::success(
                    "YouTube - Next in Queue",
                    format!("**User:** {}\n**Video ID:** {}\n**URL:** {}", next.requester, next.video_id, next.url()),
                ));
                self.play(next);
                Some(line)
            }
            None => {
                info!("video queue empty, playback stopped");
                self.current = None;
                None
            }
        }
    }

    fn play(&mut self, video: QueuedVideo) {
        self.cancel_monitor();
        self.generation += 1;
        let generation = self.generation;
        let wait = self.max_duration + END_BUFFER;
        let ended = self.ended.clone();

        info!(video_id = %video.video_id, requester = %video.requester, music = video.music, "playing video");
        self.current = Some(video);
        self.monitor = Some(tokio::spawn(async move {
            sleep(wait).await;
            let _ = ended.send(generation);
        }));
    }

    fn cancel_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

impl Drop for VideoQueue {
    fn drop(&mut self) {
        self.cancel_monitor();
    }
}
