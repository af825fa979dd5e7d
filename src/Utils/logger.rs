use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::geometry::NDIM;
use crate::numerical::Poisson_FAC::side_data::SideVector;
use chrono::Local;
use csv::Writer;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Map a loglevel string (`debug|info|warn|error|off|none`) to a filter.
pub fn parse_loglevel(loglevel: &str) -> Result<LevelFilter, FacError> {
    match loglevel {
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" | "none" => Ok(LevelFilter::Off),
        other => Err(FacError::Configuration(format!("unknown loglevel `{}`", other))),
    }
}

/// Install a terminal logger and, when `log_dir` is given, a file logger writing
/// `log_<date>_<time>.txt` into it. Returns the path of the log file. A logger that is already
/// installed is kept.
pub fn init_logger(loglevel: &str, log_dir: Option<&Path>) -> Result<Option<PathBuf>, FacError> {
    let level = parse_loglevel(loglevel)?;
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut path = None;
    if let Some(dir) = log_dir {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let name = dir.join(format!("log_{}.txt", date_and_time));
        let file = File::create(&name)
            .map_err(|e| FacError::Configuration(format!("cannot create log file {:?}: {}", name, e)))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
        path = Some(name);
    }
    if CombinedLogger::init(loggers).is_err() {
        log::debug!("logger already initialized");
    }
    Ok(path)
}

/// Write the interior faces of level `ln` as rows `patch, axis, depth, i, j, x, y, value`.
pub fn save_side_vector_to_csv(v: &SideVector, ln: usize, filename: &Path) -> io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);
    writer.write_record(["patch", "axis", "depth", "i", "j", "x", "y", "value"])?;
    let hierarchy = v.hierarchy();
    for (id, pd) in v.level_data(ln).iter().enumerate() {
        for axis in 0..NDIM {
            for p in pd.side_box(axis).iter() {
                let x = hierarchy.face_position(ln, axis, &p);
                for k in 0..pd.depth() {
                    writer.write_record(&[
                        id.to_string(),
                        axis.to_string(),
                        k.to_string(),
                        p[0].to_string(),
                        p[1].to_string(),
                        x[0].to_string(),
                        x[1].to_string(),
                        pd.get(axis, &p, k).to_string(),
                    ])?;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}
