use log::{Level, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug)]
struct SimpleLogger {
    log_path: PathBuf,
    max_level: Level,
}

static LOGGER: OnceCell<SimpleLogger> = OnceCell::new();

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_entry = format!("{} - {}\n", record.level(), record.args());
            let log_file = self.log_path.join("log.txt");

            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_file) {
                let _ = file.write_all(log_entry.as_bytes());
            }
        }
    }

    fn flush(&self) {}
}

pub fn init(debug: bool) -> Result<(), SetLoggerError> {
    let log_path = PathBuf::from("./data");
    create_dir_all(&log_path).expect("Could not create log path");

    let max_level = if debug { Level::Debug } else { Level::Info };
    LOGGER
        .set(SimpleLogger {
            log_path,
            max_level,
        })
        .expect("Logger already set");

    log::set_logger(LOGGER.get().unwrap())
        .map(|()| log::set_max_level(max_level.to_level_filter()))
}
