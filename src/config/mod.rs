mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AdminSettings, AuthSettings, AuthorizationSettings, BackChannelSettings, BootstrapHost, BootstrapSettings,
    BootstrapUnixAccount, LogSettings, PartialSettings, ServerSettings, Settings, StorageSettings,
};

/// Loads the configuration from the default file and environment variables
/// (`POPAUTH__SECTION__KEY`), after reading a `.env` file if there is one.
/// Values that are not set anywhere keep their defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("POPAUTH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
