//! Logging setup.

use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;

use log::LevelFilter;

use crate::config::Config;
use crate::{Error, Result};

/// Send log messages to stderr, and to the configured log file if there is
/// one. Can only be called once per process.
pub fn init(config: &Config) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let stderr = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}] {}: {}",
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = Dispatch::new()
        .level(config.log_level)
        .level_for("r2d2", LevelFilter::Warn)
        .chain(stderr);

    if let Some(ref path) = config.log_file {
        let msg = format!("Couldn't open log file at {}", path.display());
        let file = fern::log_file(path).map_err(|err| Error::from_io_error(err, msg))?;

        dispatch = dispatch.chain(
            Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] {}: {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
    }

    dispatch.apply()?;

    Ok(())
}
