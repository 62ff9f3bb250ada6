//! Speaking finished replies.
//!
//! [`speak_detached`] is fire-and-forget: it never touches the chat session,
//! and any failure along the way is logged and dropped.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::config::Config;

/// How synthesized audio gets to the speakers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPlayer {
    /// Pipe the audio to a player process on stdin
    Command { program: String, args: Vec<String> },
    /// Decode and play in-process
    #[cfg(feature = "rodio")]
    Rodio,
}

impl Default for AudioPlayer {
    #[cfg(feature = "rodio")]
    fn default() -> Self {
        AudioPlayer::Rodio
    }

    #[cfg(not(feature = "rodio"))]
    fn default() -> Self {
        AudioPlayer::Command {
            program: "ffplay".to_string(),
            args: ["-nodisp", "-autoexit", "-loglevel", "quiet", "-"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
        }
    }
}

impl AudioPlayer {
    pub fn from_config(config: &Config) -> Self {
        match config.audio_player.as_deref() {
            Some([program, args @ ..]) if !program.trim().is_empty() => AudioPlayer::Command {
                program: program.clone(),
                args: args.to_vec(),
            },
            _ => AudioPlayer::default(),
        }
    }

    /// Play `audio` to completion. Blocks the calling thread.
    pub fn play(&self, audio: &[u8]) -> Result<()> {
        match self {
            AudioPlayer::Command { program, args } => play_with_command(program, args, audio),
            #[cfg(feature = "rodio")]
            AudioPlayer::Rodio => play_with_rodio(audio),
        }
    }
}

fn play_with_command(program: &str, args: &[String], audio: &[u8]) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start audio player '{}'", program))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(audio)
            .with_context(|| format!("Failed to send audio to '{}'", program))?;
        // Dropping stdin closes the pipe so the player sees end of input
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(anyhow!("Audio player '{}' exited with {}", program, status));
    }

    Ok(())
}

#[cfg(feature = "rodio")]
fn play_with_rodio(audio: &[u8]) -> Result<()> {
    use rodio::{Decoder, OutputStream, Sink};
    use std::io::Cursor;

    let (_stream, stream_handle) = OutputStream::try_default()
        .context("Failed to open default audio device")?;
    let sink = Sink::try_new(&stream_handle).context("Failed to create audio sink")?;

    let source = Decoder::new(Cursor::new(audio.to_vec())).context("Unsupported audio format")?;
    sink.append(source);
    sink.sleep_until_end();

    Ok(())
}

/// Synthesize `text` and play it
pub async fn speak(client: &ApiClient, player: &AudioPlayer, text: &str) -> Result<()> {
    let audio = client.synthesize(text).await?;
    tracing::debug!(bytes = audio.len(), "speech audio received");

    let player = player.clone();
    tokio::task::spawn_blocking(move || player.play(&audio))
        .await
        .context("Audio playback task panicked")??;

    Ok(())
}

/// Speak `text` in the background, logging instead of propagating failures
pub fn speak_detached(client: ApiClient, player: AudioPlayer, text: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = speak(&client, &player, &text).await {
            tracing::warn!("Speech playback skipped: {:#}", err);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatSession;
    use crate::stream::StreamEvent;

    fn command(program: &str, args: &[&str]) -> AudioPlayer {
        AudioPlayer::Command {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_player_from_config() {
        let config = Config {
            audio_player: Some(vec!["mpv".to_string(), "-".to_string()]),
            ..Config::new()
        };
        assert_eq!(AudioPlayer::from_config(&config), command("mpv", &["-"]));

        let empty = Config {
            audio_player: Some(Vec::new()),
            ..Config::new()
        };
        assert_eq!(AudioPlayer::from_config(&empty), AudioPlayer::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_player_consumes_audio() {
        let player = command("sh", &["-c", "cat > /dev/null"]);
        player.play(b"RIFF....WAVE").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_command_player_failure_is_an_error() {
        let player = command("sh", &["-c", "cat > /dev/null; exit 3"]);
        assert!(player.play(b"audio").is_err());
    }

    #[test]
    fn test_missing_player_is_an_error() {
        let player = command("rebecca-no-such-player", &[]);
        assert!(player.play(b"audio").is_err());
    }

    #[tokio::test]
    async fn test_speech_failure_leaves_session_untouched() {
        let mut session = ChatSession::new("rebecca", "You", "Rebecca");
        session.input = "hi".to_string();
        session.begin_send().unwrap();
        session.apply(StreamEvent::Chunk("Hello".to_string()));
        let completion = session.apply(StreamEvent::Finished { malformed: 0 }).unwrap();

        let before = session.messages().to_vec();

        // Nothing listens on the discard port, so synthesis fails
        speak_detached(
            ApiClient::new("http://127.0.0.1:9"),
            command("rebecca-no-such-player", &[]),
            completion.text,
        )
        .await
        .unwrap();

        assert_eq!(session.messages(), before.as_slice());
        assert!(!session.is_streaming());
        assert!(session.last_error().is_none());
    }
}
