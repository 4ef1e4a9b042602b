use crate::error::ConfigError;
use chrono_tz::Tz;
use config as config_crate;
use serde::Deserialize;
use std::collections::HashSet;

/// Endereço monitorado no site da distribuidora.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AddressConfig {
    /// Identificador estável (chave no arquivo de estado e nome do .ics).
    pub id: String,
    pub city: String,
    pub street: String,
    pub house: String,
}

impl AddressConfig {
    pub fn display(&self) -> String {
        format!("{}, {}, {}", self.city, self.street, self.house)
    }
}

/// Configuração operacional do sistema.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Fuso horário do site de origem (IANA).
    pub timezone: String,
    /// Endereços processados a cada ciclo.
    pub addresses: Vec<AddressConfig>,
    /// Arquivo JSON deixado pelo coletor do site.
    pub snapshot_path: String,
    /// Arquivo JSON com o estado persistido por endereço.
    pub state_path: String,
    /// Diretório onde os arquivos .ics são publicados.
    pub output_dir: String,
    /// Lembrete antes de cada evento, em minutos.
    pub reminder_minutes: i64,
    /// Duração do evento de alerta, em minutos.
    pub alert_duration_minutes: i64,
    /// Emite também os intervalos com luz.
    pub emit_power_events: bool,
    /// Intervalo entre ciclos em segundos.
    pub cycle_interval_secs: u64,
    /// Executa um único ciclo e encerra (cron/CI).
    pub run_once: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = Self::builder()?
            .add_source(config_crate::File::with_name("config").required(false))
            .add_source(config_crate::Environment::with_prefix("CALENDARIO").separator("__"))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Valores padrão; ciclos a cada 15 minutos.
    fn builder() -> anyhow::Result<config_crate::ConfigBuilder<config_crate::builder::DefaultState>>
    {
        Ok(config_crate::Config::builder()
            .set_default("timezone", "Europe/Kyiv")?
            .set_default("snapshot_path", "snapshot.json")?
            .set_default("state_path", "state.json")?
            .set_default("output_dir", "calendars")?
            .set_default("reminder_minutes", 60)?
            .set_default("alert_duration_minutes", 5)?
            .set_default("emit_power_events", true)?
            .set_default("cycle_interval_secs", 900)?
            .set_default("run_once", false)?)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if self.addresses.is_empty() {
            return Err(ConfigError::NoAddresses);
        }
        let mut seen = HashSet::new();
        for address in &self.addresses {
            if !seen.insert(address.id.as_str()) {
                return Err(ConfigError::DuplicateAddress(address.id.clone()));
            }
        }
        if self.cycle_interval_secs == 0 {
            return Err(ConfigError::NotPositive("cycle_interval_secs"));
        }
        if self.reminder_minutes < 0 {
            return Err(ConfigError::Negative("reminder_minutes"));
        }
        if self.alert_duration_minutes <= 0 {
            return Err(ConfigError::NotPositive("alert_duration_minutes"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_crate::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        Config::builder()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const ONE_ADDRESS: &str = r#"
        [[addresses]]
        id = "gora"
        city = "с. Гора"
        street = "вул. Мостова"
        house = "21"
    "#;

    #[test]
    fn defaults_fill_optional_keys() {
        let config = parse(ONE_ADDRESS);
        assert_eq!(config.timezone, "Europe/Kyiv");
        assert_eq!(config.reminder_minutes, 60);
        assert_eq!(config.cycle_interval_secs, 900);
        assert!(config.emit_power_events);
        assert!(!config.run_once);
        assert_eq!(config.addresses[0].display(), "с. Гора, вул. Мостова, 21");
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.tz(), Ok(chrono_tz::Europe::Kyiv));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = parse(ONE_ADDRESS);
        config.timezone = "Europe/Atlantis".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownTimezone("Europe/Atlantis".into()))
        );

        let mut config = parse(ONE_ADDRESS);
        config.addresses.push(config.addresses[0].clone());
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateAddress("gora".into()))
        );

        let mut config = parse(ONE_ADDRESS);
        config.cycle_interval_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("cycle_interval_secs"))
        );

        let mut config = parse(ONE_ADDRESS);
        config.addresses.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoAddresses));
    }
}
