use strokeflow_core::config::EngineConfig;

const DOCUMENTATION: &str = r#"# Strokeflow engine settings. You may edit this file, but be aware that formatting and comments will
# not be preserved. Missing fields take their default value.

# worker_threads: stroke worker threads, 0 to use every available core.
# grid_cell_size: dirty regions are snapped to a grid of cells this large before being replayed.
# max_patch_cells: the longest side of a region surfaced to the UI at once, in grid cells.
# canvas_width, canvas_height: bounds of the demonstration canvas.

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

pub struct Preferences {
    failed_to_load: bool,
    pub engine: EngineConfig,
}
impl Preferences {
    const FILENAME: &'static str = "engine.toml";
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_PREFERENCES: std::sync::OnceLock<Preferences> = std::sync::OnceLock::new();

        GLOBAL_PREFERENCES.get_or_init(|| {
            let mut dir = preferences_dir();
            match dir.as_mut() {
                None => Self::no_path(),
                Some(dir) => {
                    dir.push(Self::FILENAME);
                    Self::load_or_default(dir)
                }
            }
        })
    }
    #[must_use]
    pub fn no_path() -> Self {
        log::warn!("Engine preferences weren't available, defaulting.");
        Self {
            failed_to_load: true,
            engine: EngineConfig::default(),
        }
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        let engine: anyhow::Result<EngineConfig> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let engine: EngineConfig = toml::from_str(&string)?;

            Ok(engine)
        };

        match engine {
            Ok(engine) => Self {
                failed_to_load: false,
                engine,
            },
            Err(e) => {
                log::debug!("reading {path:?}: {e:#}");
                Self::no_path()
            }
        }
    }
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let mut string = toml::ser::to_string_pretty(&self.engine)?;
        string = DOCUMENTATION.to_owned() + &string;
        std::fs::write(preferences, string)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use strokeflow_core::config::EngineConfig;

    #[test]
    fn documented_file_parses() {
        let mut string = toml::ser::to_string_pretty(&EngineConfig::default()).unwrap();
        string = super::DOCUMENTATION.to_owned() + &string;
        let parsed: EngineConfig = toml::from_str(&string).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }
    #[test]
    fn partial_file_defaults() {
        let parsed: EngineConfig = toml::from_str("worker_threads = 3").unwrap();
        assert_eq!(parsed.worker_threads, 3);
        assert_eq!(parsed.grid_cell_size, EngineConfig::default().grid_cell_size);
    }
}
