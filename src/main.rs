//! Terminal front end for the studio.
//!
//! Reads one command per line from stdin and drives the shell on the main
//! thread. Type `help` for the command list.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;

use webcam_studio::config::{self, StudioConfig};
use webcam_studio::detect::{FaceDetector, HaarCascade, NoopDetector};
use webcam_studio::logging;
use webcam_studio::playback::format_clock;
use webcam_studio::shell::{Display, Notifier, Shell, UserIntent};
use webcam_studio::source::create_source;
use webcam_studio::{Filter, Frame, StudioResult};

/// Longest the loop waits for input before presenting frames again.
const FRAME_POLL: Duration = Duration::from_millis(33);

const HELP: &str = "\
commands:
  still | c          save a still of the live feed
  record | r         start/stop recording
  save               show where the last clip was saved
  play | pause       play/pause the last clip (stops the camera)
  seek <seconds>     move the playback position
  resume | stop      restart/stop the camera
  filter <name>      none, b&w, sepia, insta
  quit | q           exit";

/// Prints notices and timer-driven labels; frames are only counted.
#[derive(Default)]
struct TerminalDisplay {
    frames: u64,
    last_size: (u32, u32),
}

impl Display for TerminalDisplay {
    fn show_frame(&mut self, frame: &Frame) {
        self.frames += 1;
        if frame.size() != self.last_size {
            self.last_size = frame.size();
            println!("live: {}x{}", frame.width, frame.height);
        }
    }

    fn clear(&mut self) {
        self.last_size = (0, 0);
        println!("live: off ({} frames shown)", self.frames);
    }

    fn set_recording_label(&mut self, label: &str) {
        if !label.is_empty() {
            println!("{}", label);
        }
    }

    fn set_playback(&mut self, value: f64, max: f64, label: &str) {
        let position = Duration::from_secs_f64(value.max(0.0));
        log::debug!("[UI] Slider {} of {:.1}s", format_clock(position), max);
        println!("playback: {}", label);
    }
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&mut self, message: &str) {
        println!("** {}", message.replace('\n', " "));
    }
}

/// Translate one input line into intents.
fn parse_command(line: &str) -> Result<Vec<UserIntent>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Vec::new());
    };
    let rest: Vec<&str> = words.collect();
    let intents = match command.to_ascii_lowercase().as_str() {
        "still" | "c" => vec![UserIntent::CaptureStill],
        "record" | "r" => vec![UserIntent::ToggleRecord],
        "save" => vec![UserIntent::SaveVideo],
        "play" => vec![UserIntent::PlayClip],
        "pause" => vec![UserIntent::PauseClip],
        "seek" => {
            let seconds: f64 = rest
                .first()
                .ok_or("seek needs a position in seconds")?
                .parse()
                .map_err(|_| "seek position must be a number".to_string())?;
            vec![
                UserIntent::SeekBegin,
                UserIntent::SeekTo(seconds),
                UserIntent::SeekEnd,
            ]
        },
        "resume" => vec![UserIntent::ResumeCamera],
        "stop" => vec![UserIntent::StopCamera],
        "filter" => {
            let filter: Filter = rest.join(" ").parse().map_err(|e| format!("{}", e))?;
            vec![UserIntent::SelectFilter(filter)]
        },
        "quit" | "q" | "exit" => vec![UserIntent::Close],
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(intents)
}

fn load_detector(config: &StudioConfig) -> StudioResult<Box<dyn FaceDetector>> {
    if !config.detection.enabled {
        log::info!("[MAIN] Face detection disabled");
        return Ok(Box::new(NoopDetector));
    }
    let cascade = HaarCascade::load(&config.detection.model_path)?;
    log::info!(
        "[MAIN] Loaded cascade {} ({} stages)",
        config.detection.model_path.display(),
        cascade.stages.len()
    );
    Ok(Box::new(cascade))
}

fn spawn_input_reader(intents: flume::Sender<UserIntent>) {
    let spawned = thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("help") {
                    println!("{}", HELP);
                    continue;
                }
                match parse_command(&line) {
                    Ok(parsed) => {
                        for intent in parsed {
                            if intents.send(intent).is_err() {
                                return;
                            }
                        }
                    },
                    Err(e) => println!("{}", e),
                }
            }
            // End of input closes the studio.
            let _ = intents.send(UserIntent::Close);
        });
    if let Err(e) = spawned {
        log::error!("[MAIN] Failed to start input thread: {}", e);
    }
}

fn main() -> ExitCode {
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::default_settings_path);
    let (studio_config, settings_error) = StudioConfig::load_or_default(&settings_path);

    if let Err(e) = logging::init_logging(studio_config.log_dir.as_deref()) {
        eprintln!("{}", e);
    }
    log::info!("[MAIN] Settings: {}", settings_path.display());
    if let Some(e) = settings_error {
        log::warn!(
            "[MAIN] Ignoring unreadable settings {}: {}",
            settings_path.display(),
            e
        );
        eprintln!(
            "Ignoring unreadable settings {}: {} (using defaults)",
            settings_path.display(),
            e
        );
    }
    config::set_config(studio_config);
    let studio_config = config::get_config();

    // A missing model is a startup fault.
    let detector = match load_detector(&studio_config) {
        Ok(detector) => detector,
        Err(e) => {
            log::error!("[MAIN] {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        },
    };

    let source = create_source(&studio_config.capture);
    let mut shell = Shell::start(
        studio_config,
        source,
        detector,
        TerminalDisplay::default(),
        TerminalNotifier,
    );

    let (intent_tx, intent_rx) = flume::unbounded();
    spawn_input_reader(intent_tx);
    println!("{}", HELP);

    while !shell.is_closed() {
        let now = Instant::now();
        let deadline = shell
            .next_deadline()
            .map_or(now + FRAME_POLL, |d| d.min(now + FRAME_POLL));
        match intent_rx.recv_deadline(deadline) {
            Ok(intent) => shell.handle(intent),
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => shell.handle(UserIntent::Close),
        }
        shell.pump_display();
        shell.tick(Instant::now());
    }

    ExitCode::SUCCESS
}
