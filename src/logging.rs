//! Log setup for the `fcdr` binary.
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{runtime::ConfigErrors, Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    Config,
};

const APPENDER: &str = "fcdr_stderr";

/// Log targets that follow the command line verbosity: the library and the binary.
const FCDR_TARGETS: [&str; 2] = ["fcdr_rs", "fcdr"];

/// Build a config that sends fcdr messages at `level` and above to stderr.
///
/// Messages from other crates are only shown from warnings up, or not at all
/// if `level` is quieter than that. Stdout stays free for `inspect` output.
pub fn logging_config(level: LevelFilter) -> Result<Config, ConfigErrors> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l})} {t} - {m}{n}")))
        .target(Target::Stderr)
        .build();

    let mut builder = Config::builder().appender(Appender::builder().build(APPENDER, Box::new(stderr)));
    for target in FCDR_TARGETS {
        builder = builder.logger(Logger::builder().appender(APPENDER).additive(false).build(target, level));
    }
    builder.build(Root::builder().appender(APPENDER).build(level.min(LevelFilter::Warn)))
}

pub fn init_logging(level: LevelFilter) {
    let config = logging_config(level).expect("Failed to configure logger");
    log4rs::init_config(config).expect("Failed to initialize logger");
}
