use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Loads a `T: Default + Serialize + DeserializeOwned` config from, in
/// increasing priority: the type's `Default`, an optional TOML file, and
/// `JOB_MASTER__`-prefixed environment variables (double underscore as the
/// nested-key separator, e.g. `JOB_MASTER__TRACKER__CAPACITY=200`).
pub struct ConfigLoader<T> {
    path: PathBuf,
    env_prefix: &'static str,
    _marker: PhantomData<T>,
}

impl<T> ConfigLoader<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            env_prefix: "JOB_MASTER__",
            _marker: PhantomData,
        }
    }

    pub fn with_env_prefix(mut self, prefix: &'static str) -> Self {
        self.env_prefix = prefix;
        self
    }

    pub fn load(&self) -> Result<T, figment::Error> {
        Figment::from(Serialized::defaults(T::default()))
            .merge(Toml::file(&self.path))
            .merge(Env::prefixed(self.env_prefix).split("__"))
            .extract()
    }
}
