use clap::builder::FalseyValueParser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::sources::weather::WeatherLocation;

#[derive(clap::Parser, Debug)]
#[command(name = "enhanced-statusline", version, about = "Two-line status summary for assistant sessions")]
pub struct Args {
    /// Postal code tried first for weather
    #[arg(long, env = "STATUSLINE_WEATHER_ZIP", default_value = "10001")]
    pub weather_zip: String,

    /// City name tried when the postal code lookup fails
    #[arg(long, env = "STATUSLINE_WEATHER_CITY", default_value = "New York,NY")]
    pub weather_city: String,

    /// Latitude for the last weather tier; unparsable values fall back to the default
    #[arg(long, env = "STATUSLINE_WEATHER_LAT", allow_negative_numbers = true)]
    pub weather_lat: Option<String>,

    #[arg(long, env = "STATUSLINE_WEATHER_LON", allow_negative_numbers = true)]
    pub weather_lon: Option<String>,

    /// Location name shown when the weather service omits one
    #[arg(long, env = "STATUSLINE_WEATHER_LABEL", default_value = "New York")]
    pub weather_label: String,

    /// Directory holding the shared cache files (defaults to the OS temp dir)
    #[arg(long, env = "STATUSLINE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Credentials file with `sessionKey` and `organizationId`
    #[arg(long, env = "STATUSLINE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Usage helper executable (macOS default: ~/.claude/bin/claude-usage-helper)
    #[arg(long, env = "STATUSLINE_USAGE_HELPER")]
    pub usage_helper: Option<PathBuf>,

    /// Skip quota metering entirely
    #[arg(long, env = "STATUSLINE_NO_USAGE", value_parser = FalseyValueParser::new())]
    pub no_usage: bool,

    /// Disable ANSI colors
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,

    /// Verbose diagnostics on stderr plus a debug snapshot file
    #[arg(long, env = "DEBUG_STATUSLINE", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Print a token-calculation self check and exit
    #[arg(long)]
    pub test: bool,

    /// Print the terminal environment as JSON and exit
    #[arg(long)]
    pub debug_env: bool,
}

impl Args {
    /// Parse the process arguments without ever failing the statusline
    pub fn parse_lenient() -> Self {
        Self::parse_lenient_from(std::env::args_os())
    }

    /// `--help` and `--version` print and exit; any other parse error is
    /// logged and the command line is ignored in favour of env and defaults
    pub fn parse_lenient_from<I, T>(argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let err = match <Args as clap::Parser>::try_parse_from(argv) {
            Ok(args) => return args,
            Err(err) => err,
        };
        if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            err.exit();
        }
        tracing::warn!("ignoring command line: {}", err.kind());
        <Args as clap::Parser>::try_parse_from(["enhanced-statusline"]).unwrap_or_else(|err| {
            tracing::warn!("ignoring environment settings: {}", err.kind());
            Self::builtin()
        })
    }

    fn builtin() -> Self {
        let location = WeatherLocation::default();
        Self {
            weather_zip: location.zip_code,
            weather_city: location.city_name,
            weather_lat: None,
            weather_lon: None,
            weather_label: location.label,
            cache_dir: None,
            credentials: None,
            usage_helper: None,
            no_usage: false,
            no_color: false,
            debug: false,
            test: false,
            debug_env: false,
        }
    }
}

fn coordinate(raw: Option<&str>, name: &str, default: f64) -> f64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            tracing::warn!(name, raw, "invalid coordinate, using default");
            default
        }
    }
}

/// Per-source wait budgets for the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub weather: Duration,
    pub price: Duration,
    pub quota: Duration,
    pub version: Duration,
    /// Extra time after output for abandoned fetches to land in the cache
    pub background_grace: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            weather: Duration::from_secs(2),
            price: Duration::from_secs(2),
            quota: Duration::from_secs(3),
            version: Duration::from_secs(2),
            background_grace: Duration::from_secs(4),
        }
    }
}

/// Resolved runtime settings
#[derive(Debug, Clone)]
pub struct StatuslineConfig {
    pub location: WeatherLocation,
    pub cache_dir: PathBuf,
    pub credentials_path: Option<PathBuf>,
    pub usage_helper: Option<PathBuf>,
    pub usage_enabled: bool,
    pub color: bool,
    pub debug: bool,
    pub deadlines: Deadlines,
}

impl StatuslineConfig {
    pub fn from_args(args: &Args) -> Self {
        let builtin = WeatherLocation::default();
        Self {
            location: WeatherLocation {
                zip_code: args.weather_zip.clone(),
                city_name: args.weather_city.clone(),
                latitude: coordinate(args.weather_lat.as_deref(), "latitude", builtin.latitude),
                longitude: coordinate(args.weather_lon.as_deref(), "longitude", builtin.longitude),
                label: args.weather_label.clone(),
            },
            cache_dir: args.cache_dir.clone().unwrap_or_else(std::env::temp_dir),
            credentials_path: args.credentials.clone().or_else(default_credentials_path),
            usage_helper: args.usage_helper.clone(),
            usage_enabled: !args.no_usage,
            color: !args.no_color,
            debug: args.debug,
            deadlines: Deadlines::default(),
        }
    }
}

/// `<config dir>/claude-statusline/credentials.json`
pub fn default_credentials_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| {
        b.config_dir()
            .join("claude-statusline")
            .join("credentials.json")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_reproduce_builtin_location() {
        let args = Args::try_parse_from(["enhanced-statusline"]).unwrap();
        let config = StatuslineConfig::from_args(&args);
        // Environment may override; only check when nothing is set
        if std::env::var_os("STATUSLINE_WEATHER_ZIP").is_none() {
            assert_eq!(config.location.zip_code, "10001");
        }
        assert_eq!(config.deadlines.quota, Duration::from_secs(3));
        assert_eq!(config.deadlines.background_grace, Duration::from_secs(4));
    }

    #[test]
    #[serial]
    fn test_bad_coordinate_env_falls_back_to_default() {
        unsafe {
            std::env::set_var("STATUSLINE_WEATHER_LAT", "abc");
            std::env::set_var("STATUSLINE_WEATHER_LON", "");
        }
        let parsed = Args::try_parse_from(["enhanced-statusline"]);
        unsafe {
            std::env::remove_var("STATUSLINE_WEATHER_LAT");
            std::env::remove_var("STATUSLINE_WEATHER_LON");
        }
        let config = StatuslineConfig::from_args(&parsed.unwrap());
        assert_eq!(config.location.latitude, 40.7128);
        assert_eq!(config.location.longitude, -74.0060);
    }

    #[test]
    #[serial]
    fn test_unknown_flag_is_ignored() {
        let args = Args::parse_lenient_from(["enhanced-statusline", "--from-a-newer-host", "--no-usage"]);
        let config = StatuslineConfig::from_args(&args);
        // The whole command line is dropped, not just the unknown flag
        if std::env::var_os("STATUSLINE_NO_USAGE").is_none() {
            assert!(config.usage_enabled);
        }
        assert_eq!(config.location.latitude, 40.7128);
    }

    #[test]
    #[serial]
    fn test_explicit_flags() {
        let args = Args::try_parse_from([
            "enhanced-statusline",
            "--weather-zip",
            "94103",
            "--weather-lon",
            "-122.4",
            "--cache-dir",
            "/tmp/sl",
            "--no-usage",
            "--no-color",
        ])
        .unwrap();
        let config = StatuslineConfig::from_args(&args);
        assert_eq!(config.location.zip_code, "94103");
        assert_eq!(config.location.longitude, -122.4);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/sl"));
        assert!(!config.usage_enabled);
        assert!(!config.color);
    }
}
