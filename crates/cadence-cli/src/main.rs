//! cadence CLI — stream and play audio URLs with the cadence engine.
//!
//! Commands:
//!   cadence play <url> [mirror...]   Play one track, extra URLs are mirrors
//!   cadence playlist <url> [url...]  Play URLs in order, skipping dead ones
//!   cadence volume <0-100>           Set and persist output volume
//!   cadence eq [band gain]           Show or set equalizer bands

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_core::backend::decode::SymphoniaDecoder;
use cadence_core::backend::http::UreqFetcher;
use cadence_core::backend::sink::CpalSink;
use cadence_core::settings::FileStore;
use cadence_core::{Player, PlaylistEvent, SystemClock, Track, TrackEvent};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    let settings = FileStore::new(format!("{}/.cadence/settings.json", home));

    let player = Player::new(
        Arc::new(SystemClock::new()),
        Arc::new(UreqFetcher),
        Arc::new(SymphoniaDecoder::new()),
        Arc::new(CpalSink::new()),
        Arc::new(settings),
    );

    match args[0].as_str() {
        "play" => cmd_play(&player, &args[1..]),
        "playlist" => cmd_playlist(&player, &args[1..]),
        "volume" => cmd_volume(&player, &args[1..]),
        "eq" => cmd_eq(&player, &args[1..]),
        other => {
            eprintln!("unknown command: {}", other);
            print_usage();
        }
    }

    player.shutdown();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_play(player: &Player, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: cadence play <url> [mirror...]");
        return;
    }

    println!("loading...");
    let track = match player.load_url(args.to_vec()) {
        Ok(track) => track,
        Err(e) => {
            eprintln!("load failed: {}", e);
            return;
        }
    };

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    track.on(TrackEvent::Finished, "cli-done", move |_| {
        flag.store(true, Ordering::SeqCst);
    });

    if let Err(e) = track.play() {
        eprintln!("play failed: {}", e);
        return;
    }
    player.start(Duration::from_millis(100));

    while !done.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(250));
        print_progress(&args[0], &track, (player.volume() * 100.0) as u32);
    }
    println!();
}

fn cmd_playlist(player: &Player, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: cadence playlist <url> [url...]");
        return;
    }

    let playlist = player.playlist(args.iter().map(|url| vec![url.clone()]).collect());

    let exhausted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exhausted);
    playlist.on(PlaylistEvent::Exhausted, "cli-exhausted", move |_| {
        flag.store(true, Ordering::SeqCst);
    });
    playlist.on(PlaylistEvent::TrackReady, "cli-ready", |track| {
        log::info!("cadence: ready: {}", track.sources().join(", "));
    });

    println!("loading...");
    if let Err(e) = playlist.load(None).and_then(|_| playlist.play(None)) {
        eprintln!("playlist failed: {}", e);
        return;
    }
    player.start(Duration::from_millis(100));

    // Auto-advance runs between tracks; only bail out once nothing has been
    // playing for a while (or every remaining track failed).
    let mut idle = 0;
    while !exhausted.load(Ordering::SeqCst) && idle < 8 {
        std::thread::sleep(Duration::from_millis(250));
        match playlist.get(None) {
            Some(track) if track.is_playing() => {
                idle = 0;
                let index = playlist.current_index().unwrap_or(0);
                let label = args.get(index).map(String::as_str).unwrap_or("?");
                print_progress(label, &track, (player.volume() * 100.0) as u32);
            }
            _ => idle += 1,
        }
    }
    println!();
}

fn cmd_volume(player: &Player, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: cadence volume <0-100>");
        return;
    }
    if let Ok(v) = args[0].parse::<u32>() {
        player.set_volume(v.min(100) as f32 / 100.0);
        println!("volume: {}%", (player.volume() * 100.0) as u32);
    } else {
        eprintln!("invalid volume: {}", args[0]);
    }
}

fn cmd_eq(player: &Player, args: &[String]) {
    if args.is_empty() {
        for (band, gain) in player.eq().iter().enumerate() {
            println!("band {}: {:+.1} dB", band, gain);
        }
        return;
    }
    if args.len() != 2 {
        eprintln!("usage: cadence eq <band> <gain-db>");
        return;
    }
    let band = match args[0].parse::<usize>() {
        Ok(band) => band,
        Err(_) => {
            eprintln!("invalid band: {}", args[0]);
            return;
        }
    };
    let gain = match args[1].parse::<f32>() {
        Ok(gain) => gain,
        Err(_) => {
            eprintln!("invalid gain: {}", args[1]);
            return;
        }
    };
    match player.set_eq(band, gain) {
        Ok(()) => println!("band {}: {:+.1} dB", band, gain),
        Err(e) => eprintln!("eq failed: {}", e),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_progress(label: &str, track: &Track, vol: u32) {
    let pos = track.current_time();
    let dur = track.duration();
    let bar_width = 30;
    let filled = if dur > 0.0 {
        ((pos / dur) * bar_width as f64) as usize
    } else {
        0
    };
    let filled = filled.min(bar_width);

    print!(
        "\r  {}  [{}{}] {} / {}  vol: {}%    ",
        label,
        "=".repeat(filled),
        " ".repeat(bar_width - filled),
        fmt_time(pos),
        fmt_time(dur),
        vol,
    );
    use std::io::Write;
    std::io::stdout().flush().ok();
}

fn fmt_time(seconds: f64) -> String {
    let secs = seconds.max(0.0) as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_usage() {
    println!("cadence - stream and play audio URLs");
    println!();
    println!("usage: cadence <command> [args]");
    println!();
    println!("commands:");
    println!("  play <url> [mirror...]   Play one track, extra URLs are mirrors");
    println!("  playlist <url> [url...]  Play URLs in order, skipping dead ones");
    println!("  volume <0-100>           Set and persist output volume");
    println!("  eq [band gain]           Show or set equalizer bands");
}
