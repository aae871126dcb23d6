use config::{Config, File, FileFormat};
use std::env;

const DEFAULT_PROFILE_PATH: &str = "/etc/krb5.conf";
const KRB5_ENV_CONFIG: &str = "KRB5_CONFIG";

/// Layered view over one or more krb5.conf files, earlier files win.
#[derive(Debug)]
pub struct Profile {
    files: Vec<ProfileFile>,
}

macro_rules! get_value {
    ($fn:ident, $type:ident) => {
        pub fn $fn(&self, key: &str) -> Option<$type> {
            for file in &self.files {
                if let Ok(value) = file.config.$fn(key) {
                    return Some(value);
                }
            }
            None
        }
    };
}

impl Profile {
    /// Loads the files named by `KRB5_CONFIG`, or `/etc/krb5.conf`.
    pub fn new() -> anyhow::Result<Self> {
        Self::from_paths(&Self::default_config_files())
    }

    /// Loads `paths` in order. A path that does not exist is skipped.
    pub fn from_paths(paths: &[String]) -> anyhow::Result<Self> {
        let mut files = vec![];
        for path in paths.iter().filter(|p| !p.is_empty()) {
            files.push(ProfileFile::new(path)?);
        }
        Ok(Self { files })
    }

    fn default_config_files() -> Vec<String> {
        env::var(KRB5_ENV_CONFIG)
            .unwrap_or_else(|_| DEFAULT_PROFILE_PATH.to_owned())
            .split(':')
            .map(|f| f.to_owned())
            .collect()
    }

    get_value!(get_string, String);

    get_value!(get_int, i64);
}

#[derive(Debug)]
struct ProfileFile {
    config: Config,
}

impl ProfileFile {
    fn new(filename: &str) -> anyhow::Result<Self> {
        let expanded_filename = match (filename.starts_with("~/"), env::var("HOME")) {
            (true, Ok(home_env)) => format!("{}{}", home_env, &filename[1..]),
            _ => filename.to_owned(),
        };
        let config = Config::builder()
            .add_source(
                File::with_name(&expanded_filename)
                    .format(FileFormat::Ini)
                    .required(false),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("{} while loading profile {}", e, expanded_filename))?;
        Ok(Self { config })
    }
}
