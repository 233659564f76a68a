use envconfig::Envconfig;
use lazy_static::lazy_static;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "BEACON_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Root used when a reader is opened without an explicit one
    #[envconfig(from = "BEACON_HDF5_ROOT", default = "/")]
    pub hdf5_default_root: String,
    /// Rows per record batch when iterating a file in chunks
    #[envconfig(from = "BEACON_HDF5_BATCH_SIZE", default = "65536")]
    pub hdf5_batch_size: usize,
    #[envconfig(from = "BEACON_HDF5_PREVIEW_ROWS", default = "10")]
    pub hdf5_preview_rows: usize,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.hdf5_default_root, "/");
        assert_eq!(config.hdf5_batch_size, 65536);
        assert_eq!(config.hdf5_preview_rows, 10);
    }

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([
            ("BEACON_HDF5_ROOT".to_string(), "/PartType1".to_string()),
            ("BEACON_HDF5_BATCH_SIZE".to_string(), "1024".to_string()),
        ]);
        let config = Config::init_from_hashmap(&vars).unwrap();
        assert_eq!(config.hdf5_default_root, "/PartType1");
        assert_eq!(config.hdf5_batch_size, 1024);
    }
}
