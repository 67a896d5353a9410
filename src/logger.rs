use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::LevelFilter;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "optimizer.log";

/// Initializes the global logger. Call once at the top of `main`.
///
/// The level comes from `RUST_LOG` (default `info`). Records go to stderr
/// with colored levels and, when the `logs/` directory is writable, to
/// `logs/optimizer.log` without colors. Failing to open the log file only
/// disables the file sink; the console sink always works.
pub fn init() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    let console = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), colors.color(record.level()), record.target(), message))
        })
        .chain(std::io::stderr());

    let mut root = Dispatch::new().level(level).chain(console);

    let file_sink = std::fs::create_dir_all(LOG_DIR).and_then(|_| fern::log_file(format!("{LOG_DIR}/{LOG_FILE}")));
    match file_sink {
        Ok(file) => {
            let file_dispatch = Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                })
                .chain(file);
            root = root.chain(file_dispatch);
        }
        Err(e) => eprintln!("Log file '{LOG_DIR}/{LOG_FILE}' unavailable, logging to console only: {e}"),
    }

    if let Err(e) = root.apply() {
        eprintln!("Failed to apply logger configuration: {e}");
    }
}
