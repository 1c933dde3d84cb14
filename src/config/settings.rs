use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub backchannel: BackChannelSettings,
    pub admin: AdminSettings,
    pub authorization: AuthorizationSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
    pub bootstrap: BootstrapSettings,
}

/// Websocket listener address.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// HTTP back channel used by hosts to ask for a login decision.
///
/// The host identity is read from `host_id_header`, set by the TLS
/// terminator to the client certificate's common name.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BackChannelSettings {
    pub host: String,
    pub port: u16,
    pub host_id_header: String,
}

/// HTTP administration listener, for users with administrator privilege.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AdminSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AuthorizationSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub cookie_name: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    /// `json`, `sled` or `memory`.
    pub backend: String,
    pub location_dir: String,
    pub hosts_filename: String,
    pub unix_accounts_filename: String,
    pub sled_path: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Records inserted into storage at startup when their id is not present yet.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub hosts: Vec<BootstrapHost>,
    #[serde(default)]
    pub unix_accounts: Vec<BootstrapUnixAccount>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BootstrapHost {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BootstrapUnixAccount {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub associated_users: Vec<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub backchannel: Option<PartialBackChannelSettings>,
    pub admin: Option<PartialAdminSettings>,
    pub authorization: Option<PartialAuthorizationSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub log: Option<PartialLogSettings>,
    pub bootstrap: Option<BootstrapSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBackChannelSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub host_id_header: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAdminSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAuthorizationSettings {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAuthSettings {
    pub jwt_secret: Option<String>,
    pub cookie_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub backend: Option<String>,
    pub location_dir: Option<String>,
    pub hosts_filename: Option<String>,
    pub unix_accounts_filename: Option<String>,
    pub sled_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let backchannel = self.backchannel.unwrap_or_default();
        let admin = self.admin.unwrap_or_default();
        let authorization = self.authorization.unwrap_or_default();
        let auth = self.auth.unwrap_or_default();
        let storage = self.storage.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            backchannel: BackChannelSettings {
                host: backchannel.host.unwrap_or(default.backchannel.host),
                port: backchannel.port.unwrap_or(default.backchannel.port),
                host_id_header: backchannel
                    .host_id_header
                    .unwrap_or(default.backchannel.host_id_header),
            },
            admin: AdminSettings {
                host: admin.host.unwrap_or(default.admin.host),
                port: admin.port.unwrap_or(default.admin.port),
            },
            authorization: AuthorizationSettings {
                timeout_secs: authorization
                    .timeout_secs
                    .unwrap_or(default.authorization.timeout_secs),
            },
            auth: AuthSettings {
                jwt_secret: auth.jwt_secret.unwrap_or(default.auth.jwt_secret),
                cookie_name: auth.cookie_name.unwrap_or(default.auth.cookie_name),
            },
            storage: StorageSettings {
                backend: storage.backend.unwrap_or(default.storage.backend),
                location_dir: storage.location_dir.unwrap_or(default.storage.location_dir),
                hosts_filename: storage
                    .hosts_filename
                    .unwrap_or(default.storage.hosts_filename),
                unix_accounts_filename: storage
                    .unix_accounts_filename
                    .unwrap_or(default.storage.unix_accounts_filename),
                sled_path: storage.sled_path.unwrap_or(default.storage.sled_path),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
            bootstrap: self.bootstrap.unwrap_or(default.bootstrap),
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            backchannel: BackChannelSettings {
                host: "127.0.0.1".to_string(),
                port: 8443,
                host_id_header: "x-client-cert-cn".to_string(),
            },
            admin: AdminSettings {
                host: "127.0.0.1".to_string(),
                port: 8081,
            },
            authorization: AuthorizationSettings { timeout_secs: 30 },
            auth: AuthSettings {
                jwt_secret: "change-me".to_string(),
                cookie_name: "auth_token".to_string(),
            },
            storage: StorageSettings {
                backend: "json".to_string(),
                location_dir: ".".to_string(),
                hosts_filename: "hosts.json".to_string(),
                unix_accounts_filename: "unix_accounts.json".to_string(),
                sled_path: "popauth_db".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
            bootstrap: BootstrapSettings::default(),
        }
    }
}
