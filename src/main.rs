use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use translate_chat::{
    AudioPlaybackEngine, ChatEvent, ChatSessionController, ChatTurn, Config, ConnectionSession,
    LanguageCode, MicrophoneRecorder, ServiceClient, WebSocketConnector,
};
use uuid::Uuid;

/// Terminal client for the translation chat service
#[derive(Debug, Parser)]
#[command(name = "translate-chat", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/translate-chat")]
    config: String,

    /// Target language code, overrides the configured default
    #[arg(short, long)]
    language: Option<String>,

    /// Do not play synthesized speech
    #[arg(long)]
    no_audio: bool,

    /// Print the available target languages and exit
    #[arg(long)]
    list_languages: bool,
}

enum Input {
    Message(String),
    Language(String),
    Play(String),
    Record,
    Stop,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.split_once(' ').unwrap_or((trimmed, "")) {
            ("/lang", code) => Self::Language(code.trim().to_string()),
            ("/play", turn) => Self::Play(turn.trim().to_string()),
            ("/record", _) => Self::Record,
            ("/stop", _) => Self::Stop,
            ("/quit", _) => Self::Quit,
            (cmd, _) if cmd.starts_with('/') => Self::Unknown(cmd.to_string()),
            _ => Self::Message(line.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("translate-chat v{}", env!("CARGO_PKG_VERSION"));
    info!("Chat endpoint: {}", cfg.service.ws_url);

    let service = ServiceClient::new(&cfg.service.http_url)?;

    if args.list_languages {
        for language in service.languages().await? {
            println!("{}\t{}", language.language, language.name);
        }
        return Ok(());
    }

    let mut language =
        LanguageCode::new(args.language.unwrap_or_else(|| cfg.chat.default_language.clone()))?;

    let audio = (cfg.audio.enabled && !args.no_audio)
        .then(|| Arc::new(AudioPlaybackEngine::with_default_output(cfg.audio.volume)));

    let session = ConnectionSession::new(
        Arc::new(WebSocketConnector::new()),
        cfg.connection.session_config(),
    );
    let (controller, mut events) = ChatSessionController::new(session, audio);
    controller.open(&cfg.service.ws_url);

    println!("Translating into '{language}'. Commands: /lang <code>, /play <n>, /record, /stop, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut recorder: Option<MicrophoneRecorder> = None;
    // Turn ids in display order; `/play <n>` indexes into this
    let mut turn_ids: Vec<Uuid> = Vec::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ChatEvent::TurnAppended(turn)) => {
                    turn_ids.push(turn.id);
                    print_turn(turn_ids.len(), &turn);
                }
                Some(ChatEvent::ConnectivityChanged(true)) => println!("-- connected"),
                Some(ChatEvent::ConnectivityChanged(false)) => println!("-- disconnected"),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };

                match Input::parse(&line) {
                    Input::Message(text) => {
                        if let Err(e) = controller.send_text(&text, &language).await {
                            println!("!! not sent: {e}");
                        }
                    }
                    Input::Language(code) => match LanguageCode::new(code) {
                        Ok(code) => {
                            language = code;
                            println!("-- translating into '{language}'");
                        }
                        Err(e) => println!("!! {e}"),
                    },
                    Input::Play(n) => {
                        let id = n
                            .parse::<usize>()
                            .ok()
                            .and_then(|n| n.checked_sub(1))
                            .and_then(|i| turn_ids.get(i).copied());
                        match id.and_then(|id| controller.replay(id)) {
                            // Not awaited: playback runs in the background
                            Some(playback) => drop(playback),
                            None => println!("!! no audio to play for turn {n}"),
                        }
                    }
                    Input::Record => {
                        if recorder.is_none() {
                            match MicrophoneRecorder::new() {
                                Ok(rec) => recorder = Some(rec),
                                Err(e) => {
                                    println!("!! {e}");
                                    continue;
                                }
                            }
                        }

                        let started = match recorder.as_mut() {
                            Some(rec) => rec.start(),
                            None => continue,
                        };
                        match started {
                            Ok(()) => println!("-- recording, /stop to send"),
                            Err(e) => println!("!! {e}"),
                        }
                    }
                    Input::Stop => {
                        let Some(rec) = recorder.as_mut().filter(|r| r.is_recording()) else {
                            println!("!! not recording");
                            continue;
                        };

                        let recording = rec.stop();
                        info!("Recorded {:.1}s of audio", recording.duration_seconds());

                        let transcript = match recording.to_wav() {
                            Ok(wav) => service.speech_to_text(wav, &language).await,
                            Err(e) => Err(e),
                        };
                        match transcript {
                            Ok(text) => {
                                println!("-- heard: {text}");
                                if let Err(e) = controller.send_text(&text, &language).await {
                                    println!("!! not sent: {e}");
                                }
                            }
                            Err(e) => {
                                warn!("Transcription failed: {}", e);
                                println!("!! transcription failed: {e}");
                            }
                        }
                    }
                    Input::Quit => break,
                    Input::Unknown(cmd) => println!("!! unknown command {cmd}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.shutdown().await;
    let stats = controller.stats();
    info!(
        "Session ended: {} turns, {} dropped events",
        stats.turns, stats.dropped_events
    );

    Ok(())
}

fn print_turn(n: usize, turn: &ChatTurn) {
    let time = turn.created_at.with_timezone(&Local).format("%H:%M");
    if turn.is_local() {
        println!("{n:>3} [{time}] you: {}", turn.original_text);
    } else {
        println!(
            "{n:>3} [{time}] {} -> {}{}",
            turn.original_text,
            turn.translated_text,
            if turn.audio.is_some() { " (audio, /play)" } else { "" }
        );
    }
}
