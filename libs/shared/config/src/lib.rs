use std::env;
use std::str::FromStr;
use tracing::warn;

/// Which persistence backend the API wires its stores to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Supabase => write!(f, "supabase"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    /// Raw `mon=09:00-18:00;tue=...` override for the clinic calendar.
    pub clinic_hours: Option<String>,
    /// JSON file with services, guardians and pets for the memory backend.
    pub clinic_catalog_path: Option<String>,
    pub clinic_utc_offset_minutes: i32,
    pub slot_step_minutes: i64,
    pub no_show_grace_minutes: i64,
    pub no_show_sweep_interval_minutes: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            store_backend: StoreBackend::Memory,
            clinic_hours: None,
            clinic_catalog_path: None,
            clinic_utc_offset_minutes: 0,
            slot_step_minutes: 15,
            no_show_grace_minutes: 120,
            no_show_sweep_interval_minutes: 30,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_backend: parse_var("STORE_BACKEND", defaults.store_backend),
            clinic_hours: env::var("CLINIC_HOURS").ok().filter(|v| !v.trim().is_empty()),
            clinic_catalog_path: env::var("CLINIC_CATALOG").ok().filter(|v| !v.trim().is_empty()),
            clinic_utc_offset_minutes: parse_var("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
            slot_step_minutes: parse_var("SLOT_STEP_MINUTES", defaults.slot_step_minutes),
            no_show_grace_minutes: parse_var("NO_SHOW_GRACE_MINUTES", defaults.no_show_grace_minutes),
            no_show_sweep_interval_minutes: parse_var(
                "NO_SHOW_SWEEP_INTERVAL_MINUTES",
                defaults.no_show_sweep_interval_minutes,
            ),
            port: parse_var("PORT", defaults.port),
        };

        if config.store_backend == StoreBackend::Supabase && !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Backend actually usable with the current settings.
    pub fn effective_store_backend(&self) -> StoreBackend {
        match self.store_backend {
            StoreBackend::Supabase if !self.is_configured() => {
                warn!("STORE_BACKEND=supabase but Supabase is not configured, falling back to memory store");
                StoreBackend::Memory
            }
            backend => backend,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
