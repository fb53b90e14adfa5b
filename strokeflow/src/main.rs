#![warn(clippy::pedantic)]

pub mod demo;
pub mod prefs;

use anyhow::Result as AnyResult;

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }

    let preferences = prefs::Preferences::get();
    if preferences.did_fail_to_load() {
        log::info!("Using default engine config");
    }
    if let Err(e) = preferences.save() {
        log::warn!("Failed to save engine config:\n{e:?}");
    };

    demo::run(&preferences.engine)
}
